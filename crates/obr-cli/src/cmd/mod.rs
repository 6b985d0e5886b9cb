//! Subcommand implementations and the state they share.

pub mod deploy;
pub mod info;
pub mod list;
pub mod repos;
pub mod resolve;

use crate::config::Config;
use anyhow::{Context, Result, bail};
use obr_core::{RepositoryRegistry, ResolveOptions, Resolver, loader};
use obr_schema::{Requirement, Resource, Version};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration plus the loaded repositories.
#[derive(Debug)]
pub struct Session {
    /// Parsed configuration.
    pub config: Config,
    /// Every configured repository.
    pub registry: Arc<RepositoryRegistry>,
}

impl Session {
    /// Load the config, then every repository it names followed by `extra`.
    pub fn open(config: Option<&Path>, extra: &[PathBuf]) -> Result<Self> {
        let config = Config::load(config)?;
        let registry = Arc::new(RepositoryRegistry::new());

        for path in config.repositories.iter().chain(extra) {
            let repositories = loader::load_path(path)
                .with_context(|| format!("Failed to load repository {}", path.display()))?;
            for repository in repositories {
                registry.add(repository);
            }
        }
        tracing::debug!("{} repositories registered", registry.len());

        Ok(Self { config, registry })
    }

    /// Find a resource by `name` or `name@version`. Without a version the
    /// highest one wins.
    pub fn find(&self, spec: &str) -> Result<Arc<Resource>> {
        let (name, version) = match spec.rsplit_once('@') {
            Some((name, version)) => (
                name,
                Some(
                    Version::parse(version)
                        .with_context(|| format!("Invalid version in '{spec}'"))?,
                ),
            ),
            None => (spec, None),
        };

        let mut best: Option<Arc<Resource>> = None;
        for repository in self.registry.repositories() {
            for resource in repository.resources() {
                if resource.symbolic_name() != name
                    || version.as_ref().is_some_and(|v| v != resource.version())
                {
                    continue;
                }
                if best.as_ref().is_none_or(|b| resource.version() > b.version()) {
                    best = Some(Arc::clone(resource));
                }
            }
        }

        match best {
            Some(resource) => Ok(resource),
            None => bail!("No resource matches '{spec}'"),
        }
    }

    /// Resolve options from the config, with `no_optional` forced on when
    /// asked.
    pub fn options(&self, no_optional: bool) -> ResolveOptions {
        ResolveOptions {
            no_optional: no_optional || self.config.resolve.no_optional,
            ..self.config.resolve
        }
    }

    /// A resolver with `targets` and `requirements` added.
    pub fn resolver(&self, targets: &[String], requirements: &[String]) -> Result<Resolver> {
        if targets.is_empty() && requirements.is_empty() {
            bail!("Nothing to resolve: name at least one resource or --require");
        }

        let mut resolver = Resolver::new(Arc::clone(&self.registry));
        for target in targets {
            resolver.add(self.find(target)?);
        }
        for spec in requirements {
            resolver.add_requirement(parse_requirement(spec)?);
        }
        Ok(resolver)
    }
}

/// Parse `namespace:filter`.
pub fn parse_requirement(spec: &str) -> Result<Requirement> {
    let Some((namespace, filter)) = spec.split_once(':') else {
        bail!("Expected namespace:filter, got '{spec}'");
    };
    Requirement::new(namespace.trim(), filter.trim())
        .with_context(|| format!("Invalid requirement '{spec}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use obr_schema::Repository;

    fn session() -> Session {
        let registry = Arc::new(RepositoryRegistry::new());
        registry.add(
            Repository::new("mem:a", "a")
                .with_resource(Resource::new("api", Version::new(1, 0, 0)))
                .with_resource(Resource::new("api", Version::new(2, 0, 0)))
                .with_resource(Resource::new("impl", Version::new(1, 0, 0))),
        );
        Session {
            config: Config::default(),
            registry,
        }
    }

    #[test]
    fn test_find_picks_highest_unless_pinned() {
        let session = session();
        assert_eq!(session.find("api").unwrap().version(), &Version::new(2, 0, 0));
        assert_eq!(
            session.find("api@1.0.0").unwrap().version(),
            &Version::new(1, 0, 0)
        );
        assert!(session.find("api@3.0.0").is_err());
        assert!(session.find("nope").is_err());
        assert!(session.find("api@x.y").is_err());
    }

    #[test]
    fn test_parse_requirement() {
        let req = parse_requirement("package:(package=org.api)").unwrap();
        assert_eq!(req.name(), "package");
        assert_eq!(req.filter().as_str(), "(package=org.api)");
        assert!(parse_requirement("(package=org.api)").is_err());
        assert!(parse_requirement("package:(package=").is_err());
    }

    #[test]
    fn test_resolver_needs_something_to_resolve() {
        assert!(session().resolver(&[], &[]).is_err());
    }
}
