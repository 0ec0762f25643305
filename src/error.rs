//! Error taxonomy for a provisioning session.
//!
//! Storage and command plumbing propagate `anyhow::Error`; the variants here
//! travel inside it and are recovered with `downcast_ref` where the exit code
//! depends on which one fired.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A mandatory key resolved to an empty value and has no default.
    #[error("required value `{key}` is missing")]
    RequiredValueMissing { key: String },

    /// The operator supplied a value the catalogue rejects.
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },

    /// A key was read before the prompt phase resolved it. This is an
    /// ordering defect in the catalogue, not an operator mistake.
    #[error("configuration key `{key}` was read before it was resolved")]
    UnresolvedKey { key: String },

    #[error("required tool `{tool}` is not installed or not on PATH")]
    ExternalToolUnavailable { tool: String },

    #[error("step `{step}` failed: {cause:#}")]
    StepActionFailed { step: String, cause: anyhow::Error },
}

impl ProvisionError {
    /// Process exit code for an error that ends the session.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::RequiredValueMissing { .. } | Self::InvalidValue { .. } => 2,
            Self::UnresolvedKey { .. }
            | Self::ExternalToolUnavailable { .. }
            | Self::StepActionFailed { .. } => 1,
        }
    }

    /// True when a failed step was caused by a missing prerequisite tool.
    pub fn is_tool_unavailable(&self) -> bool {
        match self {
            Self::ExternalToolUnavailable { .. } => true,
            Self::StepActionFailed { cause, .. } => matches!(
                cause.downcast_ref::<ProvisionError>(),
                Some(Self::ExternalToolUnavailable { .. })
            ),
            _ => false,
        }
    }
}

/// Exit code for any error surfaced from `main`.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<ProvisionError>()
        .map(ProvisionError::exit_code)
        .unwrap_or(1)
}
