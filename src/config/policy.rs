//! Mountpoint allow-list policies

use crate::config::customization::{FilesystemCustomization, PartitioningCustomization};
use crate::utils::error::{LayoutError, Result};
use crate::utils::paths::{contains_path, is_canonical};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rule for a path and everything below it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathPolicy {
    /// Reject the path and all its children
    #[serde(default)]
    pub deny: bool,
    /// Only the path itself is allowed, not its children
    #[serde(default)]
    pub exact: bool,
}

/// Policies keyed by path; the longest matching path decides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathPolicies(BTreeMap<String, PathPolicy>);

impl PathPolicies {
    pub fn new(policies: BTreeMap<String, PathPolicy>) -> Self {
        PathPolicies(policies)
    }

    /// The most specific policy covering `path`
    fn lookup(&self, path: &str) -> Option<(&str, &PathPolicy)> {
        self.0
            .iter()
            .filter(|(prefix, _)| contains_path(prefix, path))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(prefix, policy)| (prefix.as_str(), policy))
    }

    /// Check a single path, returning a description of the violation
    pub fn check(&self, path: &str) -> std::result::Result<(), String> {
        if !path.starts_with('/') {
            return Err(format!("path {:?} must be absolute", path));
        }
        if !is_canonical(path) {
            return Err(format!("path {:?} must be canonical", path));
        }

        match self.lookup(path) {
            Some((_, policy)) if policy.deny => Err(format!("path {:?} is not allowed", path)),
            Some((prefix, policy)) if policy.exact && prefix != path => {
                Err(format!("path {:?} is not allowed", path))
            }
            Some(_) => Ok(()),
            None => Err(format!("path {:?} is not allowed", path)),
        }
    }
}

/// Mountpoints images may customize by default
pub fn mountpoint_policies() -> PathPolicies {
    let allowed = ["/var", "/opt", "/srv", "/usr", "/app", "/data", "/home", "/tmp"];
    let exact = PathPolicy {
        deny: false,
        exact: true,
    };
    let deny = PathPolicy {
        deny: true,
        exact: false,
    };

    let mut policies = BTreeMap::new();
    policies.insert("/".to_string(), exact);
    policies.insert("/boot".to_string(), exact);
    policies.insert("/var/run".to_string(), deny);
    policies.insert("/var/lock".to_string(), deny);
    for path in allowed {
        policies.insert(path.to_string(), PathPolicy::default());
    }
    PathPolicies(policies)
}

fn check_all<'a>(
    mountpoints: impl IntoIterator<Item = &'a str>,
    policies: &PathPolicies,
) -> Result<()> {
    let errors: Vec<String> = mountpoints
        .into_iter()
        .filter_map(|mp| policies.check(mp).err())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(LayoutError::MountpointPolicy(errors))
    }
}

/// Check plain filesystem mountpoints, reporting every violation at once
pub fn check_mountpoints_policy(
    filesystems: &[FilesystemCustomization],
    policies: &PathPolicies,
) -> Result<()> {
    check_all(filesystems.iter().map(|fs| fs.mountpoint.as_str()), policies)
}

/// Check every mountpoint of a partitioning customization, reporting every violation at once
pub fn check_partitioning_policy(
    partitioning: Option<&PartitioningCustomization>,
    policies: &PathPolicies,
) -> Result<()> {
    match partitioning {
        Some(partitioning) => check_all(partitioning.mountpoints(), policies),
        None => Ok(()),
    }
}
