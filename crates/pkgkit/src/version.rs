//! Best-effort version comparison.
//!
//! Versions are split into segments on `.`, `-`, `+` and `_` and compared
//! left to right, padding the shorter sequence with zeros. Numeric segments
//! compare numerically; anything else falls back to lexicographic order.
//! This is deliberately not full PEP 440 or semver compliance: it is good
//! enough to decide whether an installed package needs touching.

use crate::types::VersionConstraint;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Num(u64),
    Text(String),
}

impl Segment {
    fn cmp_segment(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Num(a), Segment::Num(b)) => a.cmp(b),
            (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
            (Segment::Num(a), Segment::Text(b)) => a.to_string().as_str().cmp(b.as_str()),
            (Segment::Text(a), Segment::Num(b)) => a.as_str().cmp(b.to_string().as_str()),
        }
    }
}

/// Split a version into segments, or `None` when it cannot be parsed.
fn segments(version: &str) -> Option<Vec<Segment>> {
    let version = version.trim();
    let version = version.strip_prefix(['v', 'V']).unwrap_or(version);
    if version.is_empty() {
        return None;
    }

    version
        .split(['.', '-', '+', '_'])
        .map(|part| {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_alphanumeric()) {
                return None;
            }
            Some(match part.parse::<u64>() {
                Ok(n) => Segment::Num(n),
                Err(_) => Segment::Text(part.to_ascii_lowercase()),
            })
        })
        .collect()
}

fn compare_segments(a: &[Segment], b: &[Segment]) -> Ordering {
    let zero = Segment::Num(0);
    let len = a.len().max(b.len());
    for i in 0..len {
        let left = a.get(i).unwrap_or(&zero);
        let right = b.get(i).unwrap_or(&zero);
        match left.cmp_segment(right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Compare two version strings.
///
/// Returns `None` when either side cannot be parsed.
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    Some(compare_segments(&segments(a)?, &segments(b)?))
}

/// Whether an installed version satisfies a constraint.
///
/// An absent installed version never satisfies anything; an unconstrained
/// request is satisfied by any installed version. Unparsable versions on
/// either side mean "not satisfied" rather than an error.
pub fn satisfies(installed: Option<&str>, constraint: &VersionConstraint) -> bool {
    let Some(installed) = installed else {
        return false;
    };

    match constraint {
        VersionConstraint::Any => true,
        VersionConstraint::AtLeast(required) => {
            matches!(compare_versions(installed, required), Some(Ordering::Greater | Ordering::Equal))
        }
        VersionConstraint::Exact(required) => {
            compare_versions(installed, required) == Some(Ordering::Equal)
        }
        VersionConstraint::Compatible(required) => compatible(installed, required),
    }
}

/// `~=X.Y.Z`: at least `X.Y.Z` and still within the `X.Y` series.
///
/// A single-segment requirement has no series to stay in and behaves like
/// `>=`.
fn compatible(installed: &str, required: &str) -> bool {
    let (Some(have), Some(want)) = (segments(installed), segments(required)) else {
        return false;
    };

    if compare_segments(&have, &want) == Ordering::Less {
        return false;
    }

    let prefix = want.len().saturating_sub(1);
    let zero = Segment::Num(0);
    (0..prefix).all(|i| {
        let h = have.get(i).unwrap_or(&zero);
        h.cmp_segment(&want[i]) == Ordering::Equal
    })
}
