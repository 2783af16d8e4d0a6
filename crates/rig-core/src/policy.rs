//! Allow-listing of installable packages.

use rig_schema::PackageDescriptor;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Package {name} from registry {registry} is not allowed by policy")]
    Denied { name: String, registry: String },

    #[error("Invalid policy pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Gatekeeper consulted before anything is downloaded.
pub trait PolicyChecker: Send + Sync {
    /// # Errors
    ///
    /// [`PolicyError::Denied`] when the package may not be installed.
    fn validate_package(&self, pkg: &PackageDescriptor) -> Result<(), PolicyError>;
}

/// One `[[policy]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Glob over package names, e.g. `cli/*`.
    pub name: String,
    /// Restrict the rule to one registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
}

/// Allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PolicyChecker for AllowAll {
    fn validate_package(&self, _: &PackageDescriptor) -> Result<(), PolicyError> {
        Ok(())
    }
}

/// Allows a package iff some rule matches it. No rules allows everything.
#[derive(Debug, Clone, Default)]
pub struct GlobPolicy {
    rules: Vec<(glob::Pattern, Option<String>)>,
}

impl GlobPolicy {
    /// # Errors
    ///
    /// [`PolicyError::InvalidPattern`] for a malformed glob.
    pub fn new(rules: &[PolicyRule]) -> Result<Self, PolicyError> {
        let rules = rules
            .iter()
            .map(|r| {
                glob::Pattern::new(&r.name)
                    .map(|p| (p, r.registry.clone()))
                    .map_err(|e| PolicyError::InvalidPattern {
                        pattern: r.name.clone(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }
}

impl PolicyChecker for GlobPolicy {
    fn validate_package(&self, pkg: &PackageDescriptor) -> Result<(), PolicyError> {
        if self.rules.is_empty() {
            return Ok(());
        }
        let allowed = self.rules.iter().any(|(pattern, registry)| {
            pattern.matches(&pkg.name) && registry.as_ref().is_none_or(|r| *r == pkg.registry)
        });
        if allowed {
            Ok(())
        } else {
            Err(PolicyError::Denied {
                name: pkg.name.clone(),
                registry: pkg.registry.clone(),
            })
        }
    }
}
