//! # Selector Module
//!
//! Label and field selectors used to filter list requests.
//!
//! A selector is a comma-separated conjunction of terms. Each term is one of
//! `key=value`, `key==value` or `key!=value`. The empty string selects everything.
//!
//! ```rust
//! use brrtrest::selector::Selector;
//! use std::collections::BTreeMap;
//!
//! let selector: Selector = "app=web,tier!=db".parse().unwrap();
//! let mut labels = BTreeMap::new();
//! labels.insert("app".to_string(), "web".to_string());
//! assert!(selector.matches(&labels));
//! ```

use crate::error::ApiError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Operator {
    Equals,
    NotEquals,
}

impl Operator {
    fn as_str(self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::NotEquals => "!=",
        }
    }
}

/// A single `key <op> value` term.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Requirement {
    pub key: String,
    pub operator: Operator,
    pub value: String,
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let actual = labels.get(&self.key).map(String::as_str);
        match self.operator {
            Operator::Equals => actual == Some(self.value.as_str()),
            Operator::NotEquals => actual != Some(self.value.as_str()),
        }
    }
}

/// A conjunction of requirements. The default selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

/// Split `term` on `op`, accepting it only when `op` occurs exactly once.
fn split_term<'a>(term: &'a str, op: &str) -> Option<(&'a str, &'a str)> {
    let mut pieces = term.split(op);
    let lhs = pieces.next()?;
    let rhs = pieces.next()?;
    if pieces.next().is_some() {
        return None;
    }
    Some((lhs.trim(), rhs.trim()))
}

impl Selector {
    #[must_use]
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn parse(selector: &str) -> Result<Self, ApiError> {
        let invalid = |term: &str| ApiError::InvalidSelector {
            selector: selector.to_string(),
            term: term.to_string(),
        };

        let mut requirements = Vec::new();
        for term in selector.split(',').map(str::trim) {
            if term.is_empty() {
                continue;
            }
            let (key, operator, value) = if let Some((k, v)) = split_term(term, "!=") {
                (k, Operator::NotEquals, v)
            } else if let Some((k, v)) = split_term(term, "==") {
                (k, Operator::Equals, v)
            } else if let Some((k, v)) = split_term(term, "=") {
                (k, Operator::Equals, v)
            } else {
                return Err(invalid(term));
            };
            if key.is_empty() {
                return Err(invalid(term));
            }
            requirements.push(Requirement {
                key: key.to_string(),
                operator,
                value: value.to_string(),
            });
        }
        requirements.sort();
        Ok(Self { requirements })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }

    /// The value `key` must equal, when the selector pins it with `=`.
    #[must_use]
    pub fn requires_exact_match(&self, key: &str) -> Option<&str> {
        self.requirements
            .iter()
            .find(|r| r.key == key && r.operator == Operator::Equals)
            .map(|r| r.value.as_str())
    }
}

impl FromStr for Selector {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, r) in self.requirements.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}{}{}", r.key, r.operator.as_str(), r.value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_selects_everything() {
        let selector = Selector::parse("").unwrap();
        assert!(selector.is_empty());
        assert!(selector.matches(&labels(&[])));
        assert!(selector.matches(&labels(&[("a", "b")])));
    }

    #[test]
    fn test_operators() {
        let selector = Selector::parse("name=foo,env==prod,tier!=db").unwrap();
        assert_eq!(selector.requirements().len(), 3);
        assert!(selector.matches(&labels(&[("name", "foo"), ("env", "prod")])));
        assert!(!selector.matches(&labels(&[("name", "foo"), ("env", "prod"), ("tier", "db")])));
        assert!(!selector.matches(&labels(&[("name", "bar"), ("env", "prod")])));
        assert_eq!(selector.requires_exact_match("env"), Some("prod"));
        assert_eq!(selector.requires_exact_match("tier"), None);
    }

    #[test]
    fn test_display_is_sorted() {
        let selector = Selector::parse("b=2, a!=1").unwrap();
        assert_eq!(selector.to_string(), "a!=1,b=2");
    }

    #[test]
    fn test_malformed_terms() {
        for bad in ["foo", "a=b=c", "=x"] {
            assert!(
                matches!(Selector::parse(bad), Err(ApiError::InvalidSelector { .. })),
                "{bad} should fail"
            );
        }
    }

    #[test]
    fn test_empty_term_is_skipped_and_next_term_reported() {
        let result = Selector::parse("a=b,,c");
        assert!(matches!(result, Err(ApiError::InvalidSelector { term, .. }) if term == "c"));
    }
}
