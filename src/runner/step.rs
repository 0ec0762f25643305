use anyhow::Result;

/// An opaque unit of provisioning work.
///
/// The ledger only records whole steps, so an action may be re-entered after
/// a partial failure. Implementations check their own finer-grained state
/// (package present, user exists, checkout exists) before each side effect.
pub trait StepAction<C: ?Sized> {
    fn run(&self, ctx: &mut C) -> Result<()>;
}

impl<C: ?Sized, F> StepAction<C> for F
where
    F: Fn(&mut C) -> Result<()>,
{
    fn run(&self, ctx: &mut C) -> Result<()> {
        self(ctx)
    }
}

/// A named, ordered step with an applicability predicate.
pub struct Step<C: ?Sized> {
    id: &'static str,
    description: &'static str,
    applies: fn(&C) -> bool,
    action: Box<dyn StepAction<C>>,
}

impl<C: ?Sized> Step<C> {
    /// A step that always applies.
    pub fn new(
        id: &'static str,
        description: &'static str,
        action: impl StepAction<C> + 'static,
    ) -> Self {
        Self {
            id,
            description,
            applies: |_| true,
            action: Box::new(action),
        }
    }

    /// Restrict the step to contexts where `applies` holds. An inapplicable
    /// step is neither run nor recorded.
    pub fn when(mut self, applies: fn(&C) -> bool) -> Self {
        self.applies = applies;
        self
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn applies(&self, ctx: &C) -> bool {
        (self.applies)(ctx)
    }

    pub fn action(&self) -> &dyn StepAction<C> {
        self.action.as_ref()
    }
}

impl<C: ?Sized> std::fmt::Debug for Step<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
