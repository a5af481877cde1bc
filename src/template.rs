//! Render notification bodies from named templates.
//!
//! Templates are plain text with `{{ name }}` placeholders. Values are HTML
//! escaped; unknown placeholders render as nothing.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::{Result, ServerError};

/// Activation email sent right after registration.
pub const ACTIVATION: &str = "mail/activation";

const BUILTIN: &[(&str, &str)] = &[(
    ACTIVATION,
    include_str!("../templates/mail/activation.html"),
)];
const EXTENSION: &str = "html";

/// Variables handed to a template.
pub type Variables = BTreeMap<&'static str, String>;

/// Template rendering port.
#[cfg_attr(test, mockall::automock)]
pub trait TemplateRenderer: Send + Sync {
    /// Render template `name` with `variables`.
    fn render(&self, name: &str, variables: &Variables) -> Result<String>;
}

/// Named templates kept in memory.
#[derive(Debug, Clone)]
pub struct Templates {
    sources: HashMap<String, String>,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            sources: BUILTIN
                .iter()
                .map(|(name, source)| (name.to_string(), source.to_string()))
                .collect(),
        }
    }
}

impl Templates {
    /// Built-in templates, overridden by `{dir}/{name}.html` when present.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut templates = Self::default();

        for (name, _) in BUILTIN {
            let path = dir.join(format!("{name}.{EXTENSION}"));
            if path.is_file() {
                templates.insert(*name, std::fs::read_to_string(&path)?);
                tracing::debug!(path = %path.display(), "template overridden");
            }
        }

        Ok(templates)
    }

    /// Add or replace a template.
    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(name.into(), source.into());
    }
}

impl TemplateRenderer for Templates {
    fn render(&self, name: &str, variables: &Variables) -> Result<String> {
        let source =
            self.sources
                .get(name)
                .ok_or_else(|| ServerError::Template {
                    name: name.to_owned(),
                })?;

        Ok(substitute(source, variables))
    }
}

fn substitute(source: &str, variables: &Variables) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find("}}") else {
            // Unterminated placeholder is kept verbatim.
            out.push_str(&rest[start..]);
            return out;
        };

        if let Some(value) = variables.get(after[..end].trim()) {
            escape_into(&mut out, value);
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

fn escape_into(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variables() -> Variables {
        Variables::from([
            ("email", "a@x.com".to_string()),
            ("url", "http://localhost/activation/1/code".to_string()),
        ])
    }

    #[test]
    fn test_activation_template() {
        let body = Templates::default().render(ACTIVATION, &variables()).unwrap();

        assert!(body.contains("Hello a@x.com,"));
        assert!(body.contains(r#"href="http://localhost/activation/1/code""#));
        assert!(!body.contains("{{"));
    }

    #[test]
    fn test_unknown_template() {
        let err = Templates::default()
            .render("mail/unknown", &variables())
            .unwrap_err();
        assert!(matches!(err, ServerError::Template { name } if name == "mail/unknown"));
    }

    #[test]
    fn test_substitute() {
        let vars = Variables::from([("name", "<b>&".to_string())]);

        assert_eq!(substitute("hi {{name}}!", &vars), "hi &lt;b&gt;&amp;!");
        assert_eq!(substitute("hi {{ missing }}!", &vars), "hi !");
        assert_eq!(substitute("open {{ name", &vars), "open {{ name");
        assert_eq!(substitute("no placeholder", &vars), "no placeholder");
    }

    #[test]
    fn test_load_override() {
        let dir = std::env::temp_dir().join(crate::crypto::generate_uuid());
        std::fs::create_dir_all(dir.join("mail")).unwrap();
        std::fs::write(dir.join("mail/activation.html"), "Go to {{ url }}").unwrap();

        let templates = Templates::load(&dir).unwrap();
        let body = templates.render(ACTIVATION, &variables()).unwrap();
        assert_eq!(body, "Go to http://localhost/activation/1/code");

        std::fs::remove_dir_all(dir).unwrap();
    }
}
