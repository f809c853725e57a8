//! ST-005: Template document loading and validation.
//!
//! Loads stencil.yaml (or `.toml`) and validates structural constraints:
//! - Version must be "1.0"
//! - Action/entity/identifier names are well formed
//! - Identifiers are declared once
//! - Every ref names an identifier declared by an earlier statement
//! - A param name sits in at most one of params/refs/aliases/holes

use super::error::TemplateError;
use super::template::Template;
use super::types::*;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

/// Validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_-]*$").expect("static regex"))
}

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$").expect("static regex"))
}

/// Parse a template document from disk. `.toml` files are read as TOML,
/// everything else as YAML.
pub fn parse_document_file(path: &Path) -> Result<Document, TemplateError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| TemplateError::Io(format!("failed to read {}: {}", path.display(), e)))?;
    if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&content).map_err(|e| TemplateError::Parse(format!("TOML parse error: {}", e)))
    } else {
        parse_document(&content)
    }
}

/// Parse a template document from a YAML string.
pub fn parse_document(yaml: &str) -> Result<Document, TemplateError> {
    serde_yaml_ng::from_str(yaml).map_err(|e| TemplateError::Parse(format!("YAML parse error: {}", e)))
}

/// Validate a parsed document. Returns a list of errors (empty = valid).
pub fn validate_document(doc: &Document) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if doc.version != "1.0" {
        errors.push(ValidationError {
            message: format!("version must be \"1.0\", got \"{}\"", doc.version),
        });
    }

    if doc.name.is_empty() {
        errors.push(ValidationError {
            message: "name must not be empty".to_string(),
        });
    }

    let mut declared: HashSet<&str> = HashSet::new();

    for (i, stmt) in doc.statements.iter().enumerate() {
        let expr = &stmt.expr;

        for (what, value) in [("action", &expr.action), ("entity", &expr.entity)] {
            if !word_re().is_match(value) {
                errors.push(ValidationError {
                    message: format!("statement {}: invalid {} '{}'", i, what, value),
                });
            }
        }

        // refs resolve against statements *before* this one
        for (param, ident) in &expr.refs {
            if !declared.contains(ident.as_str()) {
                errors.push(ValidationError {
                    message: format!(
                        "statement {}: param '{}' references ${} before it is declared",
                        i, param, ident
                    ),
                });
            }
        }

        for key in expr.conflicting_keys() {
            errors.push(ValidationError {
                message: format!(
                    "statement {}: param '{}' is set more than once (params/refs/aliases/holes)",
                    i, key
                ),
            });
        }

        if let Some(ref ident) = stmt.ident {
            if !ident_re().is_match(ident) {
                errors.push(ValidationError {
                    message: format!("statement {}: invalid identifier '{}'", i, ident),
                });
            }
            if !declared.insert(ident.as_str()) {
                errors.push(ValidationError {
                    message: format!("statement {}: identifier '{}' declared twice", i, ident),
                });
            }
        }
    }

    errors
}

impl Document {
    /// Build the template this document describes.
    pub fn into_template(self) -> Template {
        let statements = self.statements.into_iter().map(Statement::from).collect();
        Template::named(&self.name, statements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
version: "1.0"
name: test
statements:
  - ident: vpc
    action: create
    entity: vpc
    params: { cidr: 10.0.0.0/16 }
  - ident: sub
    action: create
    entity: subnet
    refs: { vpc: vpc }
    holes: { cidr: subnet.cidr }
  - action: create
    entity: instance
    refs: { subnet: sub }
    aliases: { image: ubuntu-lts }
"#;

    fn messages(doc: &Document) -> Vec<String> {
        validate_document(doc).into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn test_st005_parse_valid() {
        let doc = parse_document(VALID).unwrap();
        assert_eq!(doc.name, "test");
        let errors = messages(&doc);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn test_st005_into_template() {
        let templ = parse_document(VALID).unwrap().into_template();
        assert_eq!(templ.name, "test");
        assert_eq!(templ.statements.len(), 3);
        assert_eq!(templ.statements[0].ident(), Some("vpc"));
        assert_eq!(templ.statements[2].ident(), None);
        assert_eq!(templ.collect_aliases()["image"], "ubuntu-lts");
        assert_eq!(templ.pending_holes(), vec!["subnet.cidr"]);
    }

    #[test]
    fn test_st005_bad_version() {
        let doc = parse_document("version: \"2.0\"\nname: t\n").unwrap();
        assert!(messages(&doc).iter().any(|m| m.contains("version")));
    }

    #[test]
    fn test_st005_empty_name() {
        let doc = parse_document("version: \"1.0\"\nname: \"\"\n").unwrap();
        assert!(messages(&doc).iter().any(|m| m.contains("name must not be empty")));
    }

    #[test]
    fn test_st005_forward_ref() {
        let yaml = r#"
version: "1.0"
name: test
statements:
  - action: create
    entity: subnet
    refs: { vpc: vpc }
  - ident: vpc
    action: create
    entity: vpc
"#;
        let doc = parse_document(yaml).unwrap();
        assert!(messages(&doc).iter().any(|m| m.contains("before it is declared")));
    }

    #[test]
    fn test_st005_self_ref() {
        let yaml = r#"
version: "1.0"
name: test
statements:
  - ident: a
    action: create
    entity: vpc
    refs: { parent: a }
"#;
        let doc = parse_document(yaml).unwrap();
        assert!(messages(&doc).iter().any(|m| m.contains("$a before it is declared")));
    }

    #[test]
    fn test_st005_duplicate_ident() {
        let yaml = r#"
version: "1.0"
name: test
statements:
  - { ident: a, action: create, entity: vpc }
  - { ident: a, action: create, entity: vpc }
"#;
        let doc = parse_document(yaml).unwrap();
        assert!(messages(&doc).iter().any(|m| m.contains("declared twice")));
    }

    #[test]
    fn test_st005_invalid_names() {
        let yaml = r#"
version: "1.0"
name: test
statements:
  - { ident: "9lives", action: Create, entity: "" }
"#;
        let doc = parse_document(yaml).unwrap();
        let errors = messages(&doc);
        assert!(errors.iter().any(|m| m.contains("invalid action 'Create'")));
        assert!(errors.iter().any(|m| m.contains("invalid entity ''")));
        assert!(errors.iter().any(|m| m.contains("invalid identifier '9lives'")));
    }

    #[test]
    fn test_st005_conflicting_param() {
        let yaml = r#"
version: "1.0"
name: test
statements:
  - action: create
    entity: vpc
    params: { cidr: 10.0.0.0/16 }
    holes: { cidr: vpc.cidr }
"#;
        let doc = parse_document(yaml).unwrap();
        assert!(messages(&doc).iter().any(|m| m.contains("'cidr' is set more than once")));
    }

    #[test]
    fn test_st005_parse_file_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stencil.yaml");
        std::fs::write(&path, VALID).unwrap();
        let doc = parse_document_file(&path).unwrap();
        assert_eq!(doc.statements.len(), 3);
    }

    #[test]
    fn test_st005_parse_file_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stencil.toml");
        std::fs::write(
            &path,
            r#"
version = "1.0"
name = "toml-test"

[params]
"vpc.cidr" = "10.1.0.0/16"

[[statements]]
ident = "vpc"
action = "create"
entity = "vpc"

[[statements]]
action = "create"
entity = "subnet"
refs = { vpc = "vpc" }
"#,
        )
        .unwrap();
        let doc = parse_document_file(&path).unwrap();
        assert_eq!(doc.name, "toml-test");
        assert_eq!(doc.statements.len(), 2);
        assert!(validate_document(&doc).is_empty());
    }

    #[test]
    fn test_st005_parse_invalid_yaml() {
        let result = parse_document("not: [valid: yaml: {{");
        assert!(matches!(result, Err(TemplateError::Parse(_))));
    }

    #[test]
    fn test_st005_missing_file() {
        let result = parse_document_file(Path::new("/nonexistent/stencil.yaml"));
        assert!(matches!(result, Err(TemplateError::Io(_))));
    }
}
