//! Structural parsing of Debian relationship fields.
//!
//! A `Depends`-style field is a comma-separated list of relations, each of
//! which is either a single constraint or a `|`-separated alternation.
//! Parsing is purely structural: order of relations and of alternatives is
//! preserved, and no resolution is attempted.

use crate::{PublishError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version comparison operator of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VersionFlag {
    /// Strictly earlier (`<<`).
    Lt,
    /// Earlier or equal (`<=`).
    Le,
    /// Exactly equal (`=`).
    Eq,
    /// Later or equal (`>=`).
    Ge,
    /// Strictly later (`>>`).
    Gt,
}

impl VersionFlag {
    /// Map a textual operator to its flag.
    pub fn from_operator(op: &str) -> Option<Self> {
        match op {
            "<<" => Some(VersionFlag::Lt),
            "<=" => Some(VersionFlag::Le),
            "=" => Some(VersionFlag::Eq),
            ">=" => Some(VersionFlag::Ge),
            ">>" => Some(VersionFlag::Gt),
            _ => None,
        }
    }

    /// The textual operator for this flag.
    pub fn operator(&self) -> &'static str {
        match self {
            VersionFlag::Lt => "<<",
            VersionFlag::Le => "<=",
            VersionFlag::Eq => "=",
            VersionFlag::Ge => ">=",
            VersionFlag::Gt => ">>",
        }
    }
}

/// A single package constraint within a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// Name of the related package.
    pub name: String,
    /// Version the relation applies to, if restricted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Comparison operator qualifying `version`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<VersionFlag>,
    /// Architecture qualifiers (`[amd64 !i386]`), negations kept as `!arch`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<Vec<String>>,
    /// Build profile restriction lists (`<cross> <stage1 nocheck>`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Vec<Vec<String>>>,
}

impl Constraint {
    /// Create an unversioned constraint on a package name.
    pub fn simple<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            version: None,
            flag: None,
            arch: None,
            restrictions: None,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(ref version) = self.version {
            match self.flag {
                Some(flag) => write!(f, " ({} {})", flag.operator(), version)?,
                None => write!(f, " ({})", version)?,
            }
        }
        if let Some(ref arch) = self.arch {
            write!(f, " [{}]", arch.join(" "))?;
        }
        if let Some(ref restrictions) = self.restrictions {
            for list in restrictions {
                write!(f, " <{}>", list.join(" "))?;
            }
        }
        Ok(())
    }
}

/// One parsed relation: a single constraint, or an ordered alternation where
/// any one alternative satisfies the relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Relation {
    /// A single constraint.
    Single(Constraint),
    /// An ordered list of alternative constraints.
    Any(Vec<Constraint>),
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Single(constraint) => write!(f, "{}", constraint),
            Relation::Any(alternatives) => {
                let rendered: Vec<String> =
                    alternatives.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", rendered.join(" | "))
            }
        }
    }
}

/// Parse a full relationship field into its ordered relation list.
pub fn parse_relations(text: &str) -> Result<Vec<Relation>> {
    let mut relations = Vec::new();
    for entry in text.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let mut alternatives = Vec::new();
        for alternative in entry.split('|') {
            alternatives.push(parse_constraint(alternative)?);
        }
        if alternatives.len() == 1 {
            relations.push(Relation::Single(alternatives.remove(0)));
        } else {
            relations.push(Relation::Any(alternatives));
        }
    }
    Ok(relations)
}

/// Render a relation list back to control-file text.
pub fn render_relations(relations: &[Relation]) -> String {
    let rendered: Vec<String> = relations.iter().map(|r| r.to_string()).collect();
    rendered.join(", ")
}

fn parse_constraint(text: &str) -> Result<Constraint> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PublishError::invalid_package("empty relation constraint"));
    }

    let name_end = text
        .find(|c: char| c.is_whitespace() || c == '(' || c == '[' || c == '<')
        .unwrap_or(text.len());
    let mut constraint = Constraint::simple(&text[..name_end]);

    let mut rest = text[name_end..].trim_start();
    while !rest.is_empty() {
        if let Some(inner) = rest.strip_prefix('(') {
            let end = inner.find(')').ok_or_else(|| {
                PublishError::invalid_package(format!("unterminated version in: {}", text))
            })?;
            let (flag, version) = parse_version(inner[..end].trim(), text)?;
            constraint.flag = flag;
            constraint.version = Some(version);
            rest = inner[end + 1..].trim_start();
        } else if let Some(inner) = rest.strip_prefix('[') {
            let end = inner.find(']').ok_or_else(|| {
                PublishError::invalid_package(format!("unterminated arch list in: {}", text))
            })?;
            constraint.arch = Some(
                inner[..end]
                    .split_whitespace()
                    .map(str::to_string)
                    .collect(),
            );
            rest = inner[end + 1..].trim_start();
        } else if let Some(inner) = rest.strip_prefix('<') {
            let end = inner.find('>').ok_or_else(|| {
                PublishError::invalid_package(format!("unterminated restriction in: {}", text))
            })?;
            constraint
                .restrictions
                .get_or_insert_with(Vec::new)
                .push(
                    inner[..end]
                        .split_whitespace()
                        .map(str::to_string)
                        .collect(),
                );
            rest = inner[end + 1..].trim_start();
        } else {
            return Err(PublishError::invalid_package(format!(
                "unexpected token '{}' in relation: {}",
                rest, text
            )));
        }
    }

    Ok(constraint)
}

fn parse_version(inner: &str, context: &str) -> Result<(Option<VersionFlag>, String)> {
    let op_len = inner
        .chars()
        .take_while(|c| matches!(c, '<' | '>' | '='))
        .count();
    let (op, version) = inner.split_at(op_len);
    let version = version.trim();
    if version.is_empty() {
        return Err(PublishError::invalid_package(format!(
            "missing version in relation: {}",
            context
        )));
    }
    if op.is_empty() {
        return Ok((None, version.to_string()));
    }
    let flag = VersionFlag::from_operator(op).ok_or_else(|| {
        PublishError::invalid_package(format!(
            "unknown version operator '{}' in relation: {}",
            op, context
        ))
    })?;
    Ok((Some(flag), version.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let relations = parse_relations("make").unwrap();
        assert_eq!(
            relations,
            vec![Relation::Single(Constraint::simple("make"))]
        );
    }

    #[test]
    fn test_parse_versioned_and_alternation() {
        let relations =
            parse_relations("emacs | emacsen, make, debianutils (>= 1.7)").unwrap();

        assert_eq!(relations.len(), 3);
        assert_eq!(
            relations[0],
            Relation::Any(vec![
                Constraint::simple("emacs"),
                Constraint::simple("emacsen"),
            ])
        );
        assert_eq!(relations[1], Relation::Single(Constraint::simple("make")));
        assert_eq!(
            relations[2],
            Relation::Single(Constraint {
                name: "debianutils".to_string(),
                version: Some("1.7".to_string()),
                flag: Some(VersionFlag::Ge),
                arch: None,
                restrictions: None,
            })
        );
    }

    #[test]
    fn test_json_shape() {
        let relations =
            parse_relations("emacs | emacsen, make, debianutils (>= 1.7)").unwrap();
        let value = serde_json::to_value(&relations).unwrap();

        assert_eq!(
            value,
            serde_json::json!([
                [{"name": "emacs"}, {"name": "emacsen"}],
                {"name": "make"},
                {"name": "debianutils", "version": "1.7", "flag": "GE"}
            ])
        );
    }

    #[test]
    fn test_parse_arch_and_restrictions() {
        let relations =
            parse_relations("gcc [amd64 !i386] <cross> <stage1 nocheck>").unwrap();

        assert_eq!(
            relations,
            vec![Relation::Single(Constraint {
                name: "gcc".to_string(),
                version: None,
                flag: None,
                arch: Some(vec!["amd64".to_string(), "!i386".to_string()]),
                restrictions: Some(vec![
                    vec!["cross".to_string()],
                    vec!["stage1".to_string(), "nocheck".to_string()],
                ]),
            })]
        );
    }

    #[test]
    fn test_all_operators() {
        for (op, flag) in [
            ("<<", VersionFlag::Lt),
            ("<=", VersionFlag::Le),
            ("=", VersionFlag::Eq),
            (">=", VersionFlag::Ge),
            (">>", VersionFlag::Gt),
        ] {
            let text = format!("pkg ({} 2.0)", op);
            let relations = parse_relations(&text).unwrap();
            match &relations[0] {
                Relation::Single(c) => {
                    assert_eq!(c.flag, Some(flag));
                    assert_eq!(c.version.as_deref(), Some("2.0"));
                }
                other => panic!("unexpected relation: {:?}", other),
            }
        }
    }

    #[test]
    fn test_render_roundtrip() {
        let text = "emacs | emacsen, make, debianutils (>= 1.7)";
        let relations = parse_relations(text).unwrap();
        assert_eq!(render_relations(&relations), text);
        assert_eq!(parse_relations(&render_relations(&relations)).unwrap(), relations);
    }

    #[test]
    fn test_invalid_operator() {
        assert!(parse_relations("pkg (=< 1.0)").is_err());
        assert!(parse_relations("pkg (>= )").is_err());
    }
}
