//! Override rule files.
//!
//! A rule file is a JSON array of records:
//!
//! ```json
//! [
//!   { "way_ids": [1135684894, 24210972], "tags": { "highway": "motorway_link", "name": "" } },
//!   { "node_ids": [42], "tags": { "access": "no" } }
//! ]
//! ```
//!
//! Each record is validated on its own so errors can name the offending rule.

use std::{collections::BTreeMap, io, io::Read};

use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use refit_core::{EntityKey, OverrideRule, TagPatch};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while loading override rules.
#[derive(Debug, Error)]
pub enum OverrideRuleError {
    /// The rule file could not be read.
    #[error("failed to read override rules from {path:?}")]
    Read {
        /// Rule file.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The file is not a JSON array.
    #[error("override rules in {path:?} must be a JSON array of rule objects")]
    Syntax {
        /// Rule file.
        path: Utf8PathBuf,
        /// Parser failure.
        #[source]
        source: serde_json::Error,
    },
    /// A rule has unknown fields or values of the wrong type.
    #[error("override rule {index} in {path:?} is invalid")]
    InvalidRule {
        /// Rule file.
        path: Utf8PathBuf,
        /// Zero-based position of the rule.
        index: usize,
        /// Validation failure.
        #[source]
        source: serde_json::Error,
    },
    /// A rule lists no entity ids at all.
    #[error("override rule {index} in {path:?} targets no entities")]
    NoTargets {
        /// Rule file.
        path: Utf8PathBuf,
        /// Zero-based position of the rule.
        index: usize,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleRecord {
    #[serde(default)]
    node_ids: Vec<i64>,
    #[serde(default)]
    way_ids: Vec<i64>,
    #[serde(default)]
    relation_ids: Vec<i64>,
    tags: BTreeMap<String, String>,
}

impl RuleRecord {
    fn into_rule(self) -> Option<OverrideRule> {
        let targets: Vec<EntityKey> = self
            .node_ids
            .into_iter()
            .map(EntityKey::node)
            .chain(self.way_ids.into_iter().map(EntityKey::way))
            .chain(self.relation_ids.into_iter().map(EntityKey::relation))
            .collect();
        if targets.is_empty() {
            return None;
        }
        Some(OverrideRule::new(targets, TagPatch::from_rule_values(self.tags)))
    }
}

/// Parse override rules from JSON text; `path` labels errors.
///
/// # Errors
/// Returns [`OverrideRuleError`] for anything other than an array of valid
/// rule objects.
///
/// # Examples
/// ```
/// use camino::Utf8Path;
/// use refit_core::EntityKey;
/// use refit_data::parse_override_rules;
///
/// let rules = parse_override_rules(
///     r#"[{"way_ids": [1], "tags": {"name": ""}}]"#,
///     Utf8Path::new("rules.json"),
/// )?;
/// assert_eq!(rules[0].targets(), &[EntityKey::way(1)]);
/// # Ok::<(), refit_data::OverrideRuleError>(())
/// ```
pub fn parse_override_rules(
    text: &str,
    path: &Utf8Path,
) -> Result<Vec<OverrideRule>, OverrideRuleError> {
    let records: Vec<Value> =
        serde_json::from_str(text).map_err(|source| OverrideRuleError::Syntax {
            path: path.to_path_buf(),
            source,
        })?;
    records
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let record: RuleRecord =
                serde_json::from_value(value).map_err(|source| OverrideRuleError::InvalidRule {
                    path: path.to_path_buf(),
                    index,
                    source,
                })?;
            record.into_rule().ok_or_else(|| OverrideRuleError::NoTargets {
                path: path.to_path_buf(),
                index,
            })
        })
        .collect()
}

/// Load and validate every rule in `path`.
///
/// # Errors
/// Returns [`OverrideRuleError`] if the file cannot be read or any rule is
/// invalid.
pub fn load_override_rules(path: &Utf8Path) -> Result<Vec<OverrideRule>, OverrideRuleError> {
    let read_error = |source| OverrideRuleError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut text = String::new();
    refit_fs::open_utf8_file(path)
        .map_err(read_error)?
        .read_to_string(&mut text)
        .map_err(read_error)?;
    let rules = parse_override_rules(&text, path)?;
    let targets: usize = rules.iter().map(|rule| rule.targets().len()).sum();
    info!(
        "Loaded {} tag override rule(s) covering {targets} target id(s) from {path}",
        rules.len()
    );
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use refit_core::TagAction;
    use rstest::rstest;

    fn parse(text: &str) -> Result<Vec<OverrideRule>, OverrideRuleError> {
        parse_override_rules(text, Utf8Path::new("rules.json"))
    }

    #[rstest]
    fn parses_targets_of_every_kind_in_order() {
        let rules = parse(
            r#"[
                {"relation_ids": [9], "node_ids": [-1, 2], "way_ids": [3], "tags": {"access": "no"}},
                {"way_ids": [3], "tags": {"name": ""}}
            ]"#,
        )
        .expect("rules parse");
        assert_eq!(rules.len(), 2);
        assert_eq!(
            rules[0].targets(),
            &[
                EntityKey::node(-1),
                EntityKey::node(2),
                EntityKey::way(3),
                EntityKey::relation(9)
            ]
        );
        assert_eq!(rules[1].patch().action("name"), Some(&TagAction::Remove));
    }

    #[rstest]
    fn empty_file_has_no_rules() {
        assert!(parse("[]").expect("empty array parses").is_empty());
    }

    #[rstest]
    #[case(r#"{"way_ids": [1], "tags": {}}"#)]
    #[case("[")]
    #[case("")]
    fn non_arrays_are_syntax_errors(#[case] text: &str) {
        assert!(matches!(parse(text), Err(OverrideRuleError::Syntax { .. })));
    }

    #[rstest]
    #[case(r#"[{"way_ids": [1], "tags": {}}, {"way_ids": [1], "tag": {}}]"#, 1)]
    #[case(r#"[{"way_ids": ["1"], "tags": {}}]"#, 0)]
    #[case(r#"[{"way_ids": [1.5], "tags": {}}]"#, 0)]
    #[case(r#"[{"way_ids": [1], "tags": {"lanes": 2}}]"#, 0)]
    #[case(r#"[{"way_ids": [1]}]"#, 0)]
    #[case(r#"[{"way_ids": [1], "tags": {}}, 7]"#, 1)]
    fn invalid_rules_report_their_index(#[case] text: &str, #[case] expected: usize) {
        match parse(text) {
            Err(OverrideRuleError::InvalidRule { index, .. }) => assert_eq!(index, expected),
            other => panic!("expected an invalid rule error, got {other:?}"),
        }
    }

    #[rstest]
    fn rules_without_targets_are_rejected() {
        let result = parse(r#"[{"way_ids": [1], "tags": {}}, {"way_ids": [], "tags": {"a": "b"}}]"#);
        assert!(matches!(
            result,
            Err(OverrideRuleError::NoTargets { index: 1, .. })
        ));
    }

    #[rstest]
    fn missing_files_fail_to_read() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = Utf8Path::from_path(dir.path())
            .expect("utf-8 temp path")
            .join("rules.json");
        assert!(matches!(
            load_override_rules(&path),
            Err(OverrideRuleError::Read { .. })
        ));
    }
}
