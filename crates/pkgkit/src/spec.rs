//! Parser for package specifiers.
//!
//! A specifier is a package name optionally followed by a comparator and a
//! version, as typed on the command line or stored in a manifest:
//! ```text
//! flask
//! requests>=2.28.0
//! numpy==1.26.4
//! django~=4.2
//! ```

use crate::error::{Error, Result};
use crate::types::{PackageRequest, VersionConstraint};
use std::str::FromStr;

/// Supported comparators, matched at their first occurrence in a token.
const COMPARATORS: &[&str] = &["==", ">=", "~="];

/// Whether a package name uses only the allowed charset.
///
/// Names start with an ASCII letter or digit and continue with letters,
/// digits, `.`, `_`, `+` or `-`. This covers both PyPI and Debian naming.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'))
}

/// Explain why a name is invalid, for error messages.
fn name_problem(name: &str) -> Option<String> {
    if name.is_empty() {
        return Some("empty package name".to_string());
    }
    if is_valid_name(name) {
        return None;
    }
    let bad = name
        .chars()
        .enumerate()
        .find(|&(i, c)| {
            if i == 0 {
                !c.is_ascii_alphanumeric()
            } else {
                !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'))
            }
        })
        .map(|(_, c)| c);
    Some(match bad {
        Some(c) => format!("invalid character '{c}' in package name"),
        None => "invalid package name".to_string(),
    })
}

/// Whether a version string uses only characters seen in real versions.
fn is_valid_version_text(version: &str) -> bool {
    version
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-' | '*' | '!'))
}

/// Find the earliest comparator in a token.
fn find_comparator(token: &str) -> Option<(usize, &'static str)> {
    COMPARATORS
        .iter()
        .filter_map(|op| token.find(op).map(|pos| (pos, *op)))
        .min_by_key(|(pos, _)| *pos)
}

fn constraint_for(op: &str, version: String) -> VersionConstraint {
    match op {
        "==" => VersionConstraint::Exact(version),
        "~=" => VersionConstraint::Compatible(version),
        _ => VersionConstraint::AtLeast(version),
    }
}

impl PackageRequest {
    /// Parse a single specifier token.
    ///
    /// Fails with [`Error::InvalidSpec`] when the name is empty or outside
    /// the allowed charset, or when a comparator has no version after it.
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim();

        let Some((pos, op)) = find_comparator(token) else {
            if let Some(reason) = name_problem(token) {
                return Err(Error::invalid_spec(token, reason));
            }
            return Ok(Self::new(token));
        };

        let name = token[..pos].trim();
        let version = token[pos + op.len()..].trim();

        if let Some(reason) = name_problem(name) {
            return Err(Error::invalid_spec(token, reason));
        }
        if version.is_empty() {
            return Err(Error::invalid_spec(token, format!("missing version after '{op}'")));
        }
        if !is_valid_version_text(version) {
            return Err(Error::invalid_spec(token, format!("malformed version '{version}'")));
        }

        Ok(Self::with_constraint(name, constraint_for(op, version.to_string())))
    }
}

impl FromStr for PackageRequest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl FromStr for VersionConstraint {
    type Err = Error;

    /// Parse a manifest constraint string: empty means any version.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(VersionConstraint::Any);
        }
        match find_comparator(s) {
            Some((0, op)) => {
                let version = s[op.len()..].trim();
                if version.is_empty() || !is_valid_version_text(version) {
                    return Err(Error::invalid_spec(s, "malformed version"));
                }
                Ok(constraint_for(op, version.to_string()))
            }
            _ => Err(Error::invalid_spec(
                s,
                "constraint must start with '==', '>=' or '~='",
            )),
        }
    }
}

/// Parse a comma- or whitespace-separated list of specifiers.
///
/// Each token yields its own result so the caller can decide whether to
/// skip bad entries or abort.
pub fn parse_list(input: &str) -> Vec<Result<PackageRequest>> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(PackageRequest::parse)
        .collect()
}
