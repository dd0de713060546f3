//! Label selector parsing and evaluation.
//!
//! Supports the equality-based forms `k=v`, `k==v`, `k!=v`, `k`, `!k` and
//! the set-based forms `k in (a,b)` / `k notin (a,b)`. Comma-separated
//! requirements are ANDed; commas inside parentheses belong to the set.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{HubError, HubResult};
use crate::models::object::Labels;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Equals(String),
    NotEquals(String),
    Exists,
    DoesNotExist,
    In(BTreeSet<String>),
    NotIn(BTreeSet<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub operator: Operator,
}

impl Requirement {
    /// Absent keys fail every positive requirement.
    pub fn matches(&self, labels: &Labels) -> bool {
        let value = labels.get(&self.key);
        match &self.operator {
            Operator::Equals(v) => value == Some(v),
            Operator::NotEquals(v) => value != Some(v),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
            Operator::In(set) => value.is_some_and(|v| set.contains(v)),
            Operator::NotIn(set) => !value.is_some_and(|v| set.contains(v)),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |set: &BTreeSet<String>| set.iter().cloned().collect::<Vec<_>>().join(",");
        match &self.operator {
            Operator::Equals(v) => write!(f, "{}={}", self.key, v),
            Operator::NotEquals(v) => write!(f, "{}!={}", self.key, v),
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
            Operator::In(set) => write!(f, "{} in ({})", self.key, join(set)),
            Operator::NotIn(set) => write!(f, "{} notin ({})", self.key, join(set)),
        }
    }
}

/// An ordered conjunction of requirements. The empty selector matches
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> HubResult<Self> {
        parse(input)
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        evaluate(&self.requirements, labels)
    }
}

impl FromStr for Selector {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{r}")?;
        }
        Ok(())
    }
}

pub fn parse(input: &str) -> HubResult<Selector> {
    if input.trim().is_empty() {
        return Ok(Selector::everything());
    }
    let malformed = |reason: String| HubError::MalformedSelector {
        selector: input.to_string(),
        reason,
    };

    let requirements = split_terms(input)
        .map_err(&malformed)?
        .into_iter()
        .map(|term| parse_term(term).map_err(&malformed))
        .collect::<HubResult<Vec<_>>>()?;

    Ok(Selector { requirements })
}

pub fn evaluate(requirements: &[Requirement], labels: &Labels) -> bool {
    requirements.iter().all(|r| r.matches(labels))
}

fn split_terms(input: &str) -> Result<Vec<&str>, String> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| format!("unexpected ')' at offset {i}"))?;
            }
            ',' if depth == 0 => {
                terms.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unbalanced parentheses".into());
    }
    terms.push(input[start..].trim());

    if let Some(pos) = terms.iter().position(|t| t.is_empty()) {
        return Err(format!("empty requirement at position {pos}"));
    }
    Ok(terms)
}

fn parse_term(term: &str) -> Result<Requirement, String> {
    if let Some(key) = term.strip_prefix('!') {
        let key = key.trim();
        validate_key(key)?;
        return Ok(Requirement {
            key: key.into(),
            operator: Operator::DoesNotExist,
        });
    }

    for (token, negated) in [("!=", true), ("==", false), ("=", false)] {
        if let Some((key, value)) = term.split_once(token) {
            let (key, value) = (key.trim(), value.trim());
            validate_key(key)?;
            validate_value(value)?;
            let operator = if negated {
                Operator::NotEquals(value.into())
            } else {
                Operator::Equals(value.into())
            };
            return Ok(Requirement {
                key: key.into(),
                operator,
            });
        }
    }

    if let Some(open) = term.find('(') {
        return parse_set_term(term, open);
    }

    validate_key(term)?;
    Ok(Requirement {
        key: term.into(),
        operator: Operator::Exists,
    })
}

fn parse_set_term(term: &str, open: usize) -> Result<Requirement, String> {
    let head: Vec<&str> = term[..open].split_whitespace().collect();
    let [key, op] = head.as_slice() else {
        return Err(format!("expected `<key> in|notin (...)`, got {term:?}"));
    };
    validate_key(key)?;

    let inner = term[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| format!("set in {term:?} must end with ')'"))?;
    let values = inner
        .split(',')
        .map(str::trim)
        .map(|v| {
            if v.is_empty() {
                return Err(format!("empty value in set for key {key:?}"));
            }
            validate_value(v).map(|()| v.to_string())
        })
        .collect::<Result<BTreeSet<_>, _>>()?;

    let operator = match *op {
        "in" => Operator::In(values),
        "notin" => Operator::NotIn(values),
        other => return Err(format!("unknown set operator {other:?}")),
    };
    Ok(Requirement {
        key: key.to_string(),
        operator,
    })
}

fn validate_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("missing label key".into());
    }
    if let Some(c) = key
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')))
    {
        return Err(format!("invalid character {c:?} in key {key:?}"));
    }
    Ok(())
}

fn validate_value(value: &str) -> Result<(), String> {
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(format!("invalid character {c:?} in value {value:?}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_equality_forms() {
        let sel = parse("cloud=Other,vendor!=Openshift,!testnokey,vendor,env==prod").unwrap();
        let ops: Vec<_> = sel.requirements().iter().map(|r| &r.operator).collect();
        assert_eq!(
            ops,
            [
                &Operator::Equals("Other".into()),
                &Operator::NotEquals("Openshift".into()),
                &Operator::DoesNotExist,
                &Operator::Exists,
                &Operator::Equals("prod".into()),
            ]
        );
        assert_eq!(sel.requirements()[2].key, "testnokey");
    }

    #[test]
    fn evaluates_cluster_selector() {
        let mc = labels(&[("cloud", "Other"), ("vendor", "Other")]);
        let sel: Selector = "cloud=Other,vendor!=Openshift,!testnokey,vendor"
            .parse()
            .unwrap();
        assert!(sel.matches(&mc));

        assert!(!parse("cloud=Amazon").unwrap().matches(&mc));
        assert!(!parse("region").unwrap().matches(&mc));
        assert!(!parse("!cloud").unwrap().matches(&mc));
        // Absent key satisfies a negative equality.
        assert!(parse("region!=us-east-1").unwrap().matches(&mc));
    }

    #[test]
    fn set_based_requirements() {
        let mc = labels(&[("env", "dev")]);
        assert!(parse("env in (dev, qa)").unwrap().matches(&mc));
        assert!(!parse("env notin (dev,qa)").unwrap().matches(&mc));
        assert!(parse("tier notin (gold)").unwrap().matches(&mc));
        assert!(!parse("tier in (gold)").unwrap().matches(&mc));

        let sel = parse("env in (dev,qa),!legacy").unwrap();
        assert_eq!(sel.requirements().len(), 2);
    }

    #[test]
    fn empty_value_is_legal() {
        let sel = parse("key=").unwrap();
        assert!(sel.matches(&labels(&[("key", "")])));
        assert!(!sel.matches(&labels(&[("key", "x")])));
    }

    #[test]
    fn empty_selector_matches_everything() {
        let sel = parse("   ").unwrap();
        assert!(sel.is_empty());
        assert!(sel.matches(&Labels::new()));
    }

    #[test]
    fn rejects_malformed_selectors() {
        for bad in [
            "=value",
            "a,,b",
            "a,",
            "!",
            "k!",
            "k=v=w",
            "!k=v",
            "env in (dev",
            "env in dev)",
            "env within (dev)",
            "env in ()",
            "sp ace=x",
        ] {
            assert!(
                matches!(parse(bad), Err(HubError::MalformedSelector { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn evaluation_is_order_independent() {
        let terms = ["cloud=Other", "vendor!=Openshift", "!testnokey", "vendor"];
        let sets = [
            labels(&[("cloud", "Other"), ("vendor", "Other")]),
            labels(&[("cloud", "Other"), ("vendor", "Openshift")]),
            labels(&[("cloud", "Other"), ("testnokey", "x"), ("vendor", "a")]),
            labels(&[]),
        ];
        let forward = parse(&terms.join(",")).unwrap();
        let mut rev = terms;
        rev.reverse();
        let backward = parse(&rev.join(",")).unwrap();
        for set in &sets {
            assert_eq!(forward.matches(set), backward.matches(set));
            assert_eq!(forward.matches(set), forward.matches(set));
        }
    }

    #[test]
    fn display_round_trips() {
        let sel = parse("a=1,b!=2,c,!d,e in (x,y)").unwrap();
        assert_eq!(parse(&sel.to_string()).unwrap(), sel);
    }
}
