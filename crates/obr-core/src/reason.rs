//! Why a resource ended up in a resolution.

use obr_schema::{Requirement, Resource};
use std::fmt;
use std::sync::Arc;

/// A requirement of `dependent` that pulled a provider into the working set.
#[derive(Debug, Clone)]
pub struct Reason {
    /// The requirement being satisfied.
    pub requirement: Requirement,
    /// The resource declaring it.
    pub dependent: Arc<Resource>,
}

impl Reason {
    /// Pair a requirement with the resource that declared it.
    pub fn new(requirement: Requirement, dependent: Arc<Resource>) -> Self {
        Self {
            requirement,
            dependent,
        }
    }

    /// Whether the provider must be installed before the dependent.
    pub fn is_mandatory(&self) -> bool {
        !self.requirement.is_optional()
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (from {})", self.requirement, self.dependent)
    }
}

/// A mandatory requirement no repository could satisfy.
#[derive(Debug, Clone)]
pub struct Unsatisfied {
    /// The requirement.
    pub requirement: Requirement,
    /// The resource declaring it.
    pub dependent: Arc<Resource>,
}

impl fmt::Display for Unsatisfied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.dependent, self.requirement)
    }
}
