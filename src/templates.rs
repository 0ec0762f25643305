use anyhow::{bail, Result};
use regex::{Captures, Regex};

pub const DEPLOY_WORKFLOW_YML: &str = include_str!("../templates/deploy_workflow.yml");

/// Substitute `{{name}}` placeholders. Values are inserted verbatim, so
/// callers quote them for the surrounding syntax. GitHub expressions such as
/// `${{ secrets.X }}` do not match and pass through untouched.
pub fn render(template: &str, values: &[(&str, &str)]) -> Result<String> {
    let re = Regex::new(r"\{\{([a-z_]+)\}\}").expect("regex for template placeholders");
    let mut unbound = Vec::new();
    let rendered = re.replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        match values.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => value.to_string(),
            None => {
                unbound.push(name.to_string());
                String::new()
            }
        }
    });
    if !unbound.is_empty() {
        bail!("template placeholders left unbound: {}", unbound.join(", "));
    }
    Ok(rendered.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_placeholders_only() {
        let rendered = render(
            "run {{app_name}} with ${{ secrets.KEY }}",
            &[("app_name", "demo")],
        )
        .expect("render");
        assert_eq!(rendered, "run demo with ${{ secrets.KEY }}");
    }

    #[test]
    fn unbound_placeholders_are_an_error() {
        let err = render("{{app_name}} {{branch}}", &[("app_name", "demo")]).expect_err("unbound");
        assert!(err.to_string().contains("branch"));
    }
}
