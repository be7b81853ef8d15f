//! `<expr> AS <alias>` fragments and identifier-boundary matching over them.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

use crate::error::{Error, Result};

static TRAILING_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+AS\s+([A-Za-z_][A-Za-z0-9_]*)\s*$").expect("valid alias pattern")
});

/// One output column of a feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectExpression {
    pub expression: String,
    pub alias: String,
    pub source_feature: String,
}

impl SelectExpression {
    pub fn render(&self) -> String {
        format!("{} AS {}", self.expression, self.alias)
    }
}

impl fmt::Display for SelectExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} AS {}", self.expression, self.alias)
    }
}

/// Split each fragment at its trailing `AS <identifier>`.
///
/// # Errors
///
/// `Error::Validation` for any fragment without a parseable alias.
pub fn parse_select_expressions(
    expressions: &[String],
    feature_key: &str,
) -> Result<Vec<SelectExpression>> {
    expressions
        .iter()
        .map(|expression| {
            let captures = TRAILING_ALIAS.captures(expression).ok_or_else(|| {
                Error::validation(format!(
                    "Feature '{feature_key}' expression missing alias: {expression}"
                ))
            })?;
            let (Some(whole), Some(alias)) = (captures.get(0), captures.get(1)) else {
                return Err(Error::validation(format!(
                    "Feature '{feature_key}' expression missing alias: {expression}"
                )));
            };
            Ok(SelectExpression {
                expression: expression[..whole.start()].trim().to_string(),
                alias: alias.as_str().to_string(),
                source_feature: feature_key.to_string(),
            })
        })
        .collect()
}

/// Build a regex matching any of `candidates` as a whole token.
fn token_pattern<'a>(candidates: impl IntoIterator<Item = &'a str>) -> Result<Option<Regex>> {
    let mut candidates: Vec<&str> = candidates.into_iter().collect();
    if candidates.is_empty() {
        return Ok(None);
    }
    candidates.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    candidates.dedup();
    let alternation = candidates
        .iter()
        .map(|c| regex::escape(c))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{alternation})\b"))
        .map(Some)
        .map_err(|e| {
            Error::Compile(format!(
                "Could not build identifier pattern for {} columns: {e}",
                candidates.len()
            ))
        })
}

/// Candidates that occur in `expression` as whole tokens.
pub fn expression_references<'a>(
    expression: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Result<BTreeSet<String>> {
    let Some(pattern) = token_pattern(candidates)? else {
        return Ok(BTreeSet::new());
    };
    Ok(pattern
        .find_iter(expression)
        .map(|m| m.as_str().to_string())
        .collect())
}

/// Replace whole-token occurrences of each key with its value in one pass.
///
/// Replacements are not re-scanned, so `a -> b, b -> c` never chains.
pub fn rewrite_identifiers(
    expression: &str,
    renames: &BTreeMap<String, String>,
) -> Result<String> {
    let Some(pattern) = token_pattern(renames.keys().map(String::as_str))? else {
        return Ok(expression.to_string());
    };
    Ok(pattern
        .replace_all(expression, |caps: &regex::Captures<'_>| {
            let token = &caps[0];
            renames
                .get(token)
                .cloned()
                .unwrap_or_else(|| token.to_string())
        })
        .into_owned())
}
