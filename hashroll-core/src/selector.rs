//! Equality-based label selectors (`name=x,hash!=y`).
//!
//! Only the equality subset of the Kubernetes selector grammar is supported:
//! `k=v`, `k==v` and `k!=v`, comma separated. As on the API server, a `!=`
//! requirement also matches objects that do not carry the key at all.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ResourceError;

/// One `key op value` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Equals { key: String, value: String },
    NotEquals { key: String, value: String },
}

impl Requirement {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Requirement::Equals { key, value } => labels.get(key) == Some(value),
            Requirement::NotEquals { key, value } => labels.get(key) != Some(value),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Equals { key, value } => write!(f, "{key}={value}"),
            Requirement::NotEquals { key, value } => write!(f, "{key}!={value}"),
        }
    }
}

/// Conjunction of requirements. The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.requirements.push(Requirement::Equals {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn not_eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.requirements.push(Requirement::NotEquals {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self.requirements.iter().map(ToString::to_string).collect();
        f.write_str(&terms.join(","))
    }
}

impl FromStr for LabelSelector {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ResourceError::InvalidSelector {
            selector: s.to_string(),
            reason: reason.to_string(),
        };

        let mut selector = LabelSelector::new();
        if s.trim().is_empty() {
            return Ok(selector);
        }

        for term in s.split(',') {
            let term = term.trim();
            let (key, value, negated) = if let Some((k, v)) = term.split_once("!=") {
                (k, v, true)
            } else if let Some((k, v)) = term.split_once("==") {
                (k, v, false)
            } else if let Some((k, v)) = term.split_once('=') {
                (k, v, false)
            } else {
                return Err(invalid(&format!("term '{term}' has no operator")));
            };

            let key = key.trim();
            let value = value.trim();
            if key.is_empty() {
                return Err(invalid(&format!("term '{term}' has an empty key")));
            }
            if key.contains(char::is_whitespace) || value.contains(char::is_whitespace) {
                return Err(invalid(&format!("term '{term}' contains whitespace")));
            }
            if value.contains('=') || value.contains('!') {
                return Err(invalid(&format!("term '{term}' has more than one operator")));
            }

            selector = if negated {
                selector.not_eq(key, value)
            } else {
                selector.eq(key, value)
            };
        }
        Ok(selector)
    }
}
