//! Token extraction from HTML payloads and the challenge evaluator.
//!
//! Forum pages are minified inconsistently, so patterns are written with
//! `\s+` between attributes and `(?s)` so a match may span lines. Captures
//! are returned by group name.

use crate::error::{Result, SiteError};
use regex::Regex;
use std::collections::HashMap;

/// Named capture groups of a successful match.
pub type Captures = HashMap<String, String>;

/// Match `pattern` against `text` and return its named groups.
///
/// Returns `Ok(None)` when the pattern does not match. Groups that did not
/// participate in the match are absent from the map.
///
/// # Errors
///
/// Returns [`SiteError::Config`] if `pattern` is not a valid regex.
pub fn extract(pattern: &str, text: &str) -> Result<Option<Captures>> {
    Ok(named_groups(&compile(pattern)?, text))
}

/// Like [`extract`], but every named group must be present and non-empty.
///
/// # Errors
///
/// Returns [`SiteError::Extraction`] carrying `text` when the pattern does
/// not match or a named group is missing or empty.
pub fn require(pattern: &str, text: &str, what: &str) -> Result<Captures> {
    let re = compile(pattern)?;
    let groups = named_groups(&re, text).unwrap_or_default();
    let complete = re
        .capture_names()
        .flatten()
        .all(|name| groups.get(name).is_some_and(|v| !v.is_empty()));
    if groups.is_empty() || !complete {
        return Err(SiteError::Extraction {
            what: what.to_owned(),
            raw: text.to_owned(),
        });
    }
    Ok(groups)
}

/// Extract forum thread ids from `id="normalthread_<id>"` anchors, in page
/// order (the first is the newest).
pub fn thread_ids(html: &str) -> Result<Vec<String>> {
    let re = compile(r#"id="normalthread_(\d+)""#)?;
    let mut ids: Vec<String> = Vec::new();
    for caps in re.captures_iter(html) {
        let id = caps[1].to_owned();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Evaluate a two-operand arithmetic challenge such as `"12 + 7"`.
///
/// Supports `+ - * /`. There is no precedence or chaining: anything other
/// than `<int> <op> <int>` is malformed.
///
/// # Errors
///
/// - [`SiteError::UnknownOperator`] for an operator outside `+ - * /`
/// - [`SiteError::Challenge`] for malformed expressions, overflow, division
///   by zero or a non-integral quotient
pub fn evaluate(expression: &str) -> Result<i64> {
    let re = compile(r"^\s*(-?\d+)\s*([^\d\s]+?)\s*(-?\d+)\s*$")?;
    let caps = re
        .captures(expression)
        .ok_or_else(|| SiteError::Challenge(format!("'{expression}'")))?;

    let lhs = parse_operand(&caps[1], expression)?;
    let rhs = parse_operand(&caps[3], expression)?;
    let overflow = || SiteError::Challenge(format!("'{expression}' overflows"));

    match &caps[2] {
        "+" => lhs.checked_add(rhs).ok_or_else(overflow),
        "-" => lhs.checked_sub(rhs).ok_or_else(overflow),
        "*" => lhs.checked_mul(rhs).ok_or_else(overflow),
        "/" => {
            if rhs == 0 {
                return Err(SiteError::Challenge(format!(
                    "'{expression}' divides by zero"
                )));
            }
            if lhs % rhs != 0 {
                return Err(SiteError::Challenge(format!(
                    "'{expression}' has no integral answer"
                )));
            }
            lhs.checked_div(rhs).ok_or_else(overflow)
        }
        other => Err(SiteError::UnknownOperator(other.to_owned())),
    }
}

fn named_groups(re: &Regex, text: &str) -> Option<Captures> {
    let caps = re.captures(text)?;
    let groups = re
        .capture_names()
        .flatten()
        .filter_map(|name| {
            caps.name(name)
                .map(|m| (name.to_owned(), m.as_str().to_owned()))
        })
        .collect();
    Some(groups)
}

fn parse_operand(raw: &str, expression: &str) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|e| SiteError::Challenge(format!("'{expression}': {e}")))
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| SiteError::Config(format!("invalid pattern: {e}")))
}
