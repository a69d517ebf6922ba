//! Dependency expansion and request deduplication.

use crate::backend::MetadataSource;
use crate::error::Error;
use crate::spec::is_valid_name;
use crate::types::PackageRequest;
use std::collections::HashSet;

/// A package whose declared dependencies could not be queried.
#[derive(Debug)]
pub struct LookupFailure {
    /// The package that will not be installed
    pub package: PackageRequest,
    /// Why the lookup failed
    pub error: Error,
}

/// Result of expanding a set of requests.
#[derive(Debug, Default)]
pub struct Expansion {
    /// Unique packages to process, requested ones first
    pub packages: Vec<PackageRequest>,
    /// Packages dropped because their metadata lookup failed
    pub lookup_failures: Vec<LookupFailure>,
}

/// Merge requests that name the same package.
///
/// Order follows the first occurrence of each name. When a name appears
/// more than once the more specific constraint wins; on a tie the first
/// one seen is kept.
pub fn dedup(requests: impl IntoIterator<Item = PackageRequest>) -> Vec<PackageRequest> {
    let mut merged: Vec<PackageRequest> = Vec::new();
    for request in requests {
        merge_into(&mut merged, request);
    }
    merged
}

/// Insert or merge one request; returns true when the name was new.
fn merge_into(merged: &mut Vec<PackageRequest>, request: PackageRequest) -> bool {
    match merged.iter_mut().find(|r| r.name() == request.name()) {
        Some(existing) => {
            if request.constraint().specificity() > existing.constraint().specificity() {
                *existing = request;
            }
            false
        }
        None => {
            merged.push(request);
            true
        }
    }
}

/// Expand requests with their declared dependencies.
///
/// Dependencies are added unconstrained. `depth` counts levels: 0 keeps
/// the requests as they are, 1 adds direct dependencies, and so on. A
/// package whose lookup fails is moved to [`Expansion::lookup_failures`]
/// and never re-added as someone else's dependency; the rest of the batch
/// is unaffected.
pub fn expand<M: MetadataSource>(
    requested: impl IntoIterator<Item = PackageRequest>,
    metadata: &M,
    depth: usize,
) -> Expansion {
    let mut packages = dedup(requested);
    let mut lookup_failures = Vec::new();
    let mut failed: HashSet<String> = HashSet::new();
    let mut frontier: Vec<String> = packages.iter().map(|p| p.name().to_string()).collect();

    for level in 0..depth {
        if frontier.is_empty() {
            break;
        }
        log::debug!("Expanding {} package(s) at level {}", frontier.len(), level + 1);

        let mut next = Vec::new();
        for name in frontier {
            match metadata.dependencies_of(&name) {
                Ok(deps) => {
                    for dep in deps {
                        if !is_valid_name(&dep) {
                            log::warn!("Ignoring invalid dependency name '{dep}' of {name}");
                            continue;
                        }
                        if failed.contains(&dep) {
                            continue;
                        }
                        if merge_into(&mut packages, PackageRequest::new(dep.clone())) {
                            next.push(dep);
                        }
                    }
                }
                Err(error) => {
                    log::warn!("{error}");
                    let Some(idx) = packages.iter().position(|p| p.name() == name) else {
                        continue;
                    };
                    let package = packages.remove(idx);
                    failed.insert(name);
                    lookup_failures.push(LookupFailure { package, error });
                }
            }
        }
        frontier = next;
    }

    Expansion {
        packages,
        lookup_failures,
    }
}
