//! Template engine used to render Cluster API manifests

use std::collections::BTreeMap;

use minijinja::{Environment, ErrorKind, UndefinedBehavior, Value};

use super::error::TemplateError;

/// Request-scoped key/value map fed into manifest rendering
///
/// Built fresh for every render call and never shared between calls.
pub type TemplateValues = BTreeMap<String, serde_json::Value>;

/// Manifest template engine
///
/// Supports:
/// - `{{ key }}` substitution with a hard failure on absent keys
/// - `{% if key %}` gating where an absent key is simply falsy
/// - `to_yaml` filter for rendering maps and lists as block YAML, to be
///   combined with the builtin `indent` filter
pub struct Templater {
    env: Environment<'static>,
}

impl Default for Templater {
    fn default() -> Self {
        Self::new()
    }
}

impl Templater {
    /// Create a new template engine
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::SemiStrict);
        env.set_keep_trailing_newline(true);
        env.add_filter("to_yaml", to_yaml);

        Self { env }
    }

    /// Render a template string with the given values
    ///
    /// # Errors
    ///
    /// Returns `TemplateError` if:
    /// - Template syntax is invalid
    /// - A referenced key is absent from `values`
    /// - A filter operation fails
    pub fn render(&self, template: &str, values: &TemplateValues) -> Result<String, TemplateError> {
        self.env
            .render_str(template, values)
            .map_err(TemplateError::from)
    }

    /// Render a template into a complete manifest document
    pub fn execute(&self, template: &str, values: &TemplateValues) -> Result<Vec<u8>, TemplateError> {
        self.render(template, values).map(String::into_bytes)
    }
}

/// Render a template with a default engine
pub fn execute(template: &str, values: &TemplateValues) -> Result<Vec<u8>, TemplateError> {
    Templater::new().execute(template, values)
}

/// Serialize a value as block YAML without the trailing newline
fn to_yaml(value: Value) -> Result<String, minijinja::Error> {
    let rendered = serde_yaml::to_string(&value).map_err(|e| {
        minijinja::Error::new(ErrorKind::InvalidOperation, format!("to_yaml: {e}"))
    })?;
    Ok(rendered.trim_end_matches('\n').to_string())
}
