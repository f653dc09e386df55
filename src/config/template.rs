//! Environment-variable substitution for the config template.
//!
//! The template is plain YAML with `${VAR}` placeholders for a fixed set
//! of recognized variables. Rendering substitutes each placeholder with
//! the variable's current value (empty when unset) and writes the result
//! to the output path.

use std::fs;
use std::path::Path;

use crate::config::ConfigError;

/// Environment variables substituted into the template.
pub const RECOGNIZED_VARS: &[&str] = &["BACKEND_HOST"];

/// Render `template_path` into `output_path`.
pub fn render(template_path: &Path, output_path: &Path) -> Result<(), ConfigError> {
    let template = fs::read_to_string(template_path)?;
    let rendered = substitute(&template);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(output_path, rendered)?;
    Ok(())
}

fn substitute(template: &str) -> String {
    let mut rendered = template.to_string();
    for var in RECOGNIZED_VARS {
        let value = std::env::var(var).unwrap_or_default();
        rendered = rendered.replace(&format!("${{{var}}}"), &value);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_recognized_variables() {
        std::env::set_var("BACKEND_HOST", "10.0.0.5");
        let rendered = substitute("backends:\n  - \"${BACKEND_HOST}:9001\"\n");
        assert_eq!(rendered, "backends:\n  - \"10.0.0.5:9001\"\n");
    }

    #[test]
    fn leaves_unrecognized_placeholders_untouched() {
        let rendered = substitute("value: ${SOMETHING_ELSE}\n");
        assert_eq!(rendered, "value: ${SOMETHING_ELSE}\n");
    }
}
