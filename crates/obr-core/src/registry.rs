//! Repository registry and provider search.
//!
//! The registry is an owned value shared as `Arc<RepositoryRegistry>`; every
//! resolver gets one injected at construction. Searches run against a
//! snapshot taken under the read lock, so a concurrent `add` or `remove`
//! never observes a half-updated list.

use crate::options::ResolveOptions;
use chrono::{DateTime, Utc};
use obr_schema::{Repository, Requirement, Resource, ResourceId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Outcome of [`RepositoryRegistry::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A repository with a new URI was appended.
    Added,
    /// A repository with the same URI was refreshed in place.
    Replaced,
}

/// Repositories searched in registration order.
#[derive(Debug, Default)]
pub struct RepositoryRegistry {
    repositories: RwLock<Vec<Arc<Repository>>>,
}

impl RepositoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository. A repository whose URI is already registered
    /// replaces the old one and keeps its position.
    pub fn add(&self, repository: impl Into<Arc<Repository>>) -> Registration {
        let repository = repository.into();
        let mut repositories = self
            .repositories
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(slot) = repositories
            .iter_mut()
            .find(|r| r.uri() == repository.uri())
        {
            tracing::debug!("Refreshing repository {}", repository);
            *slot = repository;
            Registration::Replaced
        } else {
            tracing::debug!(
                "Registering repository {} ({} resources)",
                repository,
                repository.resources().len()
            );
            repositories.push(repository);
            Registration::Added
        }
    }

    /// Unregister the repository with the given URI.
    pub fn remove(&self, uri: &str) -> Option<Arc<Repository>> {
        let mut repositories = self
            .repositories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let idx = repositories.iter().position(|r| r.uri() == uri)?;
        Some(repositories.remove(idx))
    }

    /// Snapshot of the registered repositories in registration order.
    pub fn repositories(&self) -> Vec<Arc<Repository>> {
        self.repositories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Newest modification timestamp across all repositories.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.repositories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|r| r.last_modified())
            .max()
    }

    /// Number of registered repositories.
    pub fn len(&self) -> usize {
        self.repositories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no repository is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every resource providing a capability that satisfies `requirement`,
    /// searching all repositories.
    pub fn find_providers(&self, requirement: &Requirement) -> Vec<Arc<Resource>> {
        find_providers(
            &self.repositories(),
            requirement,
            &ResolveOptions::default(),
        )
    }
}

/// Search `repositories` in order for resources satisfying `requirement`.
///
/// Results are deduplicated by resource id in first-discovered order; when
/// the same id shows up both remote and installed, the installed copy takes
/// the remote copy's slot. Repositories excluded by `options` are skipped.
pub fn find_providers(
    repositories: &[Arc<Repository>],
    requirement: &Requirement,
    options: &ResolveOptions,
) -> Vec<Arc<Resource>> {
    let mut providers: Vec<Arc<Resource>> = Vec::new();
    let mut index: HashMap<ResourceId, usize> = HashMap::new();

    for repository in repositories {
        if !options.searches(repository.kind()) {
            tracing::trace!("Skipping {} repository {}", repository.kind(), repository);
            continue;
        }
        for resource in repository.resources() {
            if !resource.satisfies(requirement) {
                continue;
            }
            match index.get(resource.id()) {
                Some(&slot) => {
                    if resource.is_local() && !providers[slot].is_local() {
                        providers[slot] = Arc::clone(resource);
                    }
                }
                None => {
                    index.insert(resource.id().clone(), providers.len());
                    providers.push(Arc::clone(resource));
                }
            }
        }
    }

    providers
}

#[cfg(test)]
mod tests {
    use super::*;
    use obr_schema::{Capability, RepositoryKind, Version};

    fn exporter(name: &str, version: Version, package: &str) -> Resource {
        Resource::new(name, version).with_capability(
            Capability::new("package")
                .unwrap()
                .with_property("package", package),
        )
    }

    fn import(package: &str) -> Requirement {
        Requirement::new("package", &format!("(package={package})")).unwrap()
    }

    #[test]
    fn test_same_uri_replaces_in_place() {
        let registry = RepositoryRegistry::new();
        assert_eq!(
            registry.add(Repository::new("mem:a", "a")),
            Registration::Added
        );
        registry.add(Repository::new("mem:b", "b"));
        assert_eq!(
            registry.add(Repository::new("mem:a", "a2")),
            Registration::Replaced
        );

        let names: Vec<_> = registry
            .repositories()
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, ["a2", "b"]);
        assert_eq!(registry.remove("mem:b").unwrap().name(), "b");
        assert!(registry.remove("mem:b").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_last_modified_is_newest() {
        let registry = RepositoryRegistry::new();
        assert!(registry.last_modified().is_none());

        let old = DateTime::from_timestamp(1_000, 0).unwrap();
        let new = DateTime::from_timestamp(2_000, 0).unwrap();
        registry.add(Repository::new("mem:a", "a").with_last_modified(new));
        registry.add(Repository::new("mem:b", "b").with_last_modified(old));
        assert_eq!(registry.last_modified(), Some(new));
    }

    #[test]
    fn test_find_providers_dedups_and_prefers_local_copy() {
        let registry = RepositoryRegistry::new();
        registry.add(
            Repository::new("mem:remote", "remote")
                .with_resource(exporter("x", Version::new(1, 0, 0), "org.x"))
                .with_resource(exporter("y", Version::new(1, 0, 0), "org.x")),
        );
        registry.add(
            Repository::new("mem:local", "local")
                .with_kind(RepositoryKind::Local)
                .with_resource(exporter("x", Version::new(1, 0, 0), "org.x")),
        );

        let providers = registry.find_providers(&import("org.x"));
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].symbolic_name(), "x");
        assert!(providers[0].is_local());
        assert_eq!(providers[1].symbolic_name(), "y");

        assert!(registry.find_providers(&import("org.none")).is_empty());
    }

    #[test]
    fn test_options_exclude_local_repositories() {
        let repositories = vec![Arc::new(
            Repository::new("mem:local", "local")
                .with_kind(RepositoryKind::Local)
                .with_resource(exporter("x", Version::new(1, 0, 0), "org.x")),
        )];
        let options = ResolveOptions {
            no_local: true,
            ..ResolveOptions::default()
        };
        assert!(find_providers(&repositories, &import("org.x"), &options).is_empty());
    }
}
