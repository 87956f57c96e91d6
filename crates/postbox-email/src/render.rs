//! `${name}` placeholder substitution.

use std::collections::BTreeMap;

/// Replace every `${name}` with its parameter value.
///
/// Parameters are applied one after another as literal replacements, so
/// placeholders with no matching parameter are left untouched.
pub fn render(template: &str, parameters: &BTreeMap<String, String>) -> String {
    parameters
        .iter()
        .fold(template.to_string(), |rendered, (name, value)| {
            rendered.replace(&format!("${{{}}}", name), value)
        })
}
