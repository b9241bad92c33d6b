//! minijinja environment used to render plan templates.

use meridian_core::RequestContext;
use minijinja::{Environment, UndefinedBehavior};

use crate::filters;

/// Template engine with the broker's filter set.
///
/// Undefined values are chainable: `{{ missing.key }}` renders as an empty
/// string instead of failing, so catalog builds that only carry injected
/// values still render. Use the `required` filter for mandatory inputs.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_keep_trailing_newline(true);

        env.add_filter("required", filters::required);
        env.add_filter("b64encode", filters::b64encode);
        env.add_filter("b64decode", filters::b64decode);

        Self { env }
    }

    /// Render a template source against a request context.
    pub fn render(&self, source: &str, ctx: &RequestContext) -> Result<String, minijinja::Error> {
        self.env.render_str(source, ctx.as_map())
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: serde_json::Value) -> RequestContext {
        let mut ctx = RequestContext::new();
        ctx.merge_payload("parameters", Some(&value)).unwrap();
        ctx
    }

    #[test]
    fn test_render_nested_values() {
        let engine = TemplateEngine::new();
        let out = engine
            .render(
                "key: {{ credentials.orgs['org-1'].public_key }}",
                &ctx(json!({"credentials": {"orgs": {"org-1": {"public_key": "pk"}}}})),
            )
            .unwrap();
        assert_eq!(out, "key: pk");
    }

    #[test]
    fn test_missing_values_render_empty() {
        let engine = TemplateEngine::new();
        let out = engine
            .render("id: {{ project.id }}|{{ nothing }}", &RequestContext::new())
            .unwrap();
        assert_eq!(out, "id: |");
    }

    #[test]
    fn test_default_and_required_filters() {
        let engine = TemplateEngine::new();
        let empty = RequestContext::new();

        let out = engine
            .render("{{ size | default('M10') | lower }}", &empty)
            .unwrap();
        assert_eq!(out, "m10");

        assert!(engine.render("{{ size | required }}", &empty).is_err());
    }

    #[test]
    fn test_trailing_newline_preserved() {
        let engine = TemplateEngine::new();
        let out = engine.render("name: a\n", &RequestContext::new()).unwrap();
        assert_eq!(out, "name: a\n");
    }
}
