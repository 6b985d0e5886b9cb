//! Repositories: ordered, timestamped collections of resources.

use crate::types::{Resource, ResourceId};
use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Where a repository's resources live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryKind {
    /// Resources still to be downloaded and installed.
    #[default]
    Remote,
    /// Bundles already installed in the framework.
    Local,
    /// The framework's system bundle and its exports.
    System,
}

impl RepositoryKind {
    /// Whether resources of this repository count as installed.
    pub fn is_installed(self) -> bool {
        matches!(self, Self::Local | Self::System)
    }
}

impl fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Remote => "remote",
            Self::Local => "local",
            Self::System => "system",
        })
    }
}

/// An ordered collection of resources searched for capability matches.
///
/// # Example
///
/// ```
/// use obr_schema::{Repository, RepositoryKind, Resource, Version};
///
/// let repo = Repository::new("file:/srv/obr/repository.json", "Acme")
///     .with_kind(RepositoryKind::Local)
///     .with_resource(Resource::new("org.acme.api", Version::new(1, 0, 0)));
/// assert!(repo.resources()[0].is_local());
/// ```
#[derive(Debug, Clone)]
pub struct Repository {
    uri: String,
    name: String,
    kind: RepositoryKind,
    last_modified: DateTime<Utc>,
    resources: Vec<Arc<Resource>>,
}

impl Repository {
    /// Create an empty remote repository, last modified now.
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            kind: RepositoryKind::Remote,
            last_modified: Utc::now(),
            resources: Vec::new(),
        }
    }

    /// Set the repository kind. Resources already added are re-marked.
    #[must_use]
    pub fn with_kind(mut self, kind: RepositoryKind) -> Self {
        self.kind = kind;
        if kind.is_installed() {
            self.resources = self
                .resources
                .into_iter()
                .map(|r| {
                    if r.is_local() {
                        r
                    } else {
                        Arc::new((*r).clone().with_local(true))
                    }
                })
                .collect();
        }
        self
    }

    /// Set the modification timestamp.
    #[must_use]
    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = last_modified;
        self
    }

    /// Append a resource. Resources of local and system repositories are
    /// marked as installed.
    #[must_use]
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.push(resource);
        self
    }

    /// Append a resource in place.
    pub fn push(&mut self, resource: Resource) {
        let resource = if self.kind.is_installed() {
            resource.with_local(true)
        } else {
            resource
        };
        self.resources.push(Arc::new(resource));
    }

    /// Location the repository was read from.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind.
    pub fn kind(&self) -> RepositoryKind {
        self.kind
    }

    /// Modification timestamp.
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Resources in repository order.
    pub fn resources(&self) -> &[Arc<Resource>] {
        &self.resources
    }

    /// Find a resource by identifier.
    pub fn get(&self, id: &ResourceId) -> Option<&Arc<Resource>> {
        self.resources.iter().find(|r| r.id() == id)
    }

    /// Find a resource by symbolic name and version.
    pub fn find(&self, symbolic_name: &str, version: &Version) -> Option<&Arc<Resource>> {
        self.resources
            .iter()
            .find(|r| r.symbolic_name() == symbolic_name && r.version() == version)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_kind_marks_resources_installed() {
        let repo = Repository::new("mem:a", "a")
            .with_resource(Resource::new("x", Version::new(1, 0, 0)))
            .with_kind(RepositoryKind::System)
            .with_resource(Resource::new("y", Version::new(1, 0, 0)));
        assert!(repo.resources().iter().all(|r| r.is_local()));
    }

    #[test]
    fn finds_by_name_and_version() {
        let repo = Repository::new("mem:a", "a")
            .with_resource(Resource::new("x", Version::new(1, 0, 0)))
            .with_resource(Resource::new("x", Version::new(2, 0, 0)));
        let found = repo.find("x", &Version::new(2, 0, 0)).unwrap();
        assert_eq!(found.id().as_str(), "x/2.0.0");
        assert!(repo.get(&ResourceId::new("x/3.0.0")).is_none());
    }
}
