//! Data model for the OSGi Bundle Repository resolver.
//!
//! Versions and ranges, typed capability properties, LDAP style requirement
//! filters, resources, repositories and the descriptor format repositories
//! are read from.

pub mod descriptor;
pub mod filter;
pub mod repository;
pub mod types;
pub mod value;
pub mod version;

// Re-exports
pub use descriptor::{
    CapabilityDescriptor, PropertyDescriptor, RejectedResource, RepositoryDescriptor,
    RequirementDescriptor, ResourceDescriptor,
};
pub use filter::{Filter, FilterError, PropertySource};
pub use repository::{Repository, RepositoryKind};
pub use types::{Capability, ModelError, Requirement, Resource, ResourceId, namespace};
pub use value::{PropertyError, PropertyType, PropertyValue};
pub use version::{Version, VersionError, VersionRange};
