//! Path-based document classification.
//!
//! Rules are regexes over the repository-relative path, tried in order; the
//! first match wins. Documentation files that no rule claims are notes.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use trustdebt_kernel::{ConfigurationError, DocumentClass};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassRule {
    pub pattern: String,
    pub class: DocumentClass,
}

impl ClassRule {
    pub fn new(pattern: impl Into<String>, class: DocumentClass) -> Self {
        Self {
            pattern: pattern.into(),
            class,
        }
    }
}

pub fn default_rules() -> Vec<ClassRule> {
    vec![
        ClassRule::new(
            r"(?i)(^|/)(specs?|specifications?|rfcs?|adrs?|requirements)/",
            DocumentClass::Specification,
        ),
        ClassRule::new(
            r"(?i)(^|/)[^/]*(spec|specification|requirements)[^/]*$",
            DocumentClass::Specification,
        ),
        ClassRule::new(
            r"(?i)(^|/)(readme|architecture|design|overview)[^/]*$",
            DocumentClass::CoreDocumentation,
        ),
        ClassRule::new(
            r"(?i)(^|/)(docs?|guides?|tutorials?|manual|howto)/",
            DocumentClass::Guide,
        ),
    ]
}

pub fn default_extensions() -> Vec<String> {
    ["md", "markdown", "rst", "txt", "adoc"]
        .into_iter()
        .map(ToOwned::to_owned)
        .collect()
}

/// Compiled rule table.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<(Regex, DocumentClass)>,
    extensions: BTreeSet<String>,
}

impl Classifier {
    pub fn new(rules: &[ClassRule], extensions: &[String]) -> Result<Self, ConfigurationError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            if rule.class == DocumentClass::Commit {
                return Err(ConfigurationError::Invalid(format!(
                    "classification rule `{}` cannot target commits",
                    rule.pattern
                )));
            }
            let regex = Regex::new(&rule.pattern).map_err(|e| {
                ConfigurationError::Invalid(format!(
                    "classification rule `{}` does not compile: {e}",
                    rule.pattern
                ))
            })?;
            compiled.push((regex, rule.class));
        }
        let extensions: BTreeSet<String> = extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        if extensions.is_empty() {
            return Err(ConfigurationError::Invalid(
                "at least one documentation extension is required".to_string(),
            ));
        }
        Ok(Self {
            rules: compiled,
            extensions,
        })
    }

    pub fn is_documentation(&self, path: &str) -> bool {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        file_name
            .rsplit_once('.')
            .is_some_and(|(stem, ext)| {
                !stem.is_empty() && self.extensions.contains(&ext.to_ascii_lowercase())
            })
    }

    /// Class of a documentation path; `None` for anything else.
    pub fn classify(&self, path: &str) -> Option<DocumentClass> {
        if !self.is_documentation(path) {
            return None;
        }
        let class = self
            .rules
            .iter()
            .find(|(regex, _)| regex.is_match(path))
            .map_or(DocumentClass::Note, |(_, class)| *class);
        Some(class)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        let rules = default_rules()
            .into_iter()
            .filter_map(|rule| Regex::new(&rule.pattern).ok().map(|re| (re, rule.class)))
            .collect();
        Self {
            rules,
            extensions: default_extensions().into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rules_all_compile() {
        assert!(Classifier::new(&default_rules(), &default_extensions()).is_ok());
        assert_eq!(Classifier::default().rules.len(), default_rules().len());
    }

    #[test]
    fn first_matching_rule_wins() {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.classify("specs/matrix.md"),
            Some(DocumentClass::Specification)
        );
        assert_eq!(
            classifier.classify("docs/api-spec.md"),
            Some(DocumentClass::Specification)
        );
        assert_eq!(
            classifier.classify("README.md"),
            Some(DocumentClass::CoreDocumentation)
        );
        assert_eq!(
            classifier.classify("docs/ARCHITECTURE.md"),
            Some(DocumentClass::CoreDocumentation)
        );
        assert_eq!(
            classifier.classify("docs/getting-started.md"),
            Some(DocumentClass::Guide)
        );
        assert_eq!(classifier.classify("notes/todo.txt"), Some(DocumentClass::Note));
    }

    #[test]
    fn non_documentation_is_not_classified() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify("src/spec.rs"), None);
        assert_eq!(classifier.classify("Makefile"), None);
        assert_eq!(classifier.classify("docs/.md"), None);
        assert!(classifier.is_documentation("docs/Guide.MD"));
    }

    #[test]
    fn rejects_bad_rules_and_empty_extensions() {
        let bad = [ClassRule::new("(", DocumentClass::Guide)];
        assert!(Classifier::new(&bad, &default_extensions()).is_err());
        let commit = [ClassRule::new(".*", DocumentClass::Commit)];
        assert!(Classifier::new(&commit, &default_extensions()).is_err());
        assert!(Classifier::new(&default_rules(), &[" ".to_string()]).is_err());
    }

    #[test]
    fn custom_rules_replace_defaults() {
        let rules = [ClassRule::new(r"^handbook/", DocumentClass::CoreDocumentation)];
        let classifier =
            Classifier::new(&rules, &["md".to_string()]).expect("custom rules compile");
        assert_eq!(
            classifier.classify("handbook/intro.md"),
            Some(DocumentClass::CoreDocumentation)
        );
        assert_eq!(classifier.classify("README.md"), Some(DocumentClass::Note));
        assert_eq!(classifier.classify("README.txt"), None);
    }
}
