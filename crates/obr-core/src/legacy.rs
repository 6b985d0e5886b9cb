//! Adapter for callers written against the old stringly typed OBR API.
//!
//! The legacy shapes carry every property as a string. They are converted
//! into the typed model on the way in and rendered back to strings on the
//! way out; the resolver itself only ever sees the typed model.

use crate::deploy::{DeploymentReport, Installer};
use crate::reason::Unsatisfied;
use crate::registry::RepositoryRegistry;
use crate::resolver::{ResolveError, Resolver};
use obr_schema::{
    Capability, ModelError, PropertyValue, Requirement, Resource, ResourceId, Version,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Property key converted to a [`Version`] on the way in.
const VERSION_KEY: &str = "version";

/// A capability with string properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyCapability {
    /// Namespace.
    pub name: String,
    /// Properties, all as text.
    pub properties: BTreeMap<String, String>,
}

impl LegacyCapability {
    /// Convert to the typed model. A `version` property becomes a
    /// [`PropertyValue::Version`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] for an empty name or an unparsable version.
    pub fn to_capability(&self) -> Result<Capability, ModelError> {
        let mut capability = Capability::new(self.name.clone())?;
        for (key, value) in &self.properties {
            let value = if key.eq_ignore_ascii_case(VERSION_KEY) {
                PropertyValue::Version(Version::parse(value)?)
            } else {
                PropertyValue::String(value.clone())
            };
            capability = capability.with_property(key.clone(), value);
        }
        Ok(capability)
    }
}

impl From<&Capability> for LegacyCapability {
    fn from(capability: &Capability) -> Self {
        Self {
            name: capability.name().to_string(),
            properties: capability
                .properties()
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect(),
        }
    }
}

/// A requirement with its filter as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyRequirement {
    /// Namespace.
    pub name: String,
    /// Filter text.
    pub filter: String,
    /// Optional flag.
    pub optional: bool,
    /// Multiple cardinality flag.
    pub multiple: bool,
    /// Extend flag.
    pub extend: bool,
    /// Description.
    pub comment: String,
}

impl LegacyRequirement {
    /// Convert to the typed model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] for an empty name or a malformed filter.
    pub fn to_requirement(&self) -> Result<Requirement, ModelError> {
        Ok(Requirement::new(self.name.clone(), &self.filter)?
            .with_optional(self.optional)
            .with_multiple(self.multiple)
            .with_extend(self.extend)
            .with_comment(self.comment.clone()))
    }
}

impl From<&Requirement> for LegacyRequirement {
    fn from(requirement: &Requirement) -> Self {
        Self {
            name: requirement.name().to_string(),
            filter: requirement.filter().to_string(),
            optional: requirement.is_optional(),
            multiple: requirement.is_multiple(),
            extend: requirement.is_extend(),
            comment: requirement.comment().to_string(),
        }
    }
}

/// A resource with string identity fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyResource {
    /// Identifier; derived from name and version when empty.
    pub id: String,
    /// Bundle symbolic name.
    pub symbolic_name: String,
    /// Display name.
    pub presentation_name: String,
    /// Version text.
    pub version: String,
    /// Install location.
    pub uri: String,
    /// Categories.
    pub categories: Vec<String>,
    /// Capabilities.
    pub capabilities: Vec<LegacyCapability>,
    /// Requirements.
    pub requirements: Vec<LegacyRequirement>,
    /// Already installed.
    pub local: bool,
}

impl LegacyResource {
    /// Convert to the typed model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] for an empty symbolic name or any capability
    /// or requirement that fails to convert.
    pub fn to_resource(&self) -> Result<Resource, ModelError> {
        if self.symbolic_name.trim().is_empty() {
            return Err(ModelError::EmptyName("symbolic name"));
        }
        let mut resource = Resource::new(&self.symbolic_name, Version::parse(&self.version)?)
            .with_uri(self.uri.clone())
            .with_local(self.local);
        if !self.id.is_empty() {
            resource = resource.with_id(self.id.clone());
        }
        if !self.presentation_name.is_empty() {
            resource = resource.with_presentation_name(self.presentation_name.clone());
        }
        for category in &self.categories {
            resource = resource.with_category(category.clone());
        }
        for capability in &self.capabilities {
            resource = resource.with_capability(capability.to_capability()?);
        }
        for requirement in &self.requirements {
            resource = resource.with_requirement(requirement.to_requirement()?);
        }
        Ok(resource)
    }

    fn resource_id(&self) -> Result<ResourceId, ModelError> {
        if self.id.is_empty() {
            Ok(ResourceId::derived(&self.symbolic_name, &Version::parse(&self.version)?))
        } else {
            Ok(ResourceId::new(self.id.clone()))
        }
    }
}

impl From<&Resource> for LegacyResource {
    fn from(resource: &Resource) -> Self {
        Self {
            id: resource.id().to_string(),
            symbolic_name: resource.symbolic_name().to_string(),
            presentation_name: resource.presentation_name().to_string(),
            version: resource.version().to_string(),
            uri: resource.uri().to_string(),
            categories: resource.categories().to_vec(),
            capabilities: resource.capabilities().iter().map(Into::into).collect(),
            requirements: resource.requirements().iter().map(Into::into).collect(),
            local: resource.is_local(),
        }
    }
}

/// The old resolver surface over a [`Resolver`], owning its installer so
/// `deploy` keeps the single-flag signature.
#[derive(Debug)]
pub struct LegacyResolver<I> {
    inner: Resolver,
    installer: I,
}

impl<I: Installer> LegacyResolver<I> {
    /// Create a resolver over `registry` deploying through `installer`.
    pub fn new(registry: Arc<RepositoryRegistry>, installer: I) -> Self {
        Self {
            inner: Resolver::new(registry),
            installer,
        }
    }

    /// Request a resource. Returns `Ok(false)` if it was already added.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if the resource does not convert.
    pub fn add(&mut self, resource: &LegacyResource) -> Result<bool, ModelError> {
        Ok(self.inner.add(resource.to_resource()?))
    }

    /// Resolve with default options.
    pub fn resolve(&mut self) -> bool {
        self.inner.resolve()
    }

    /// Added resources.
    pub fn added_resources(&self) -> Vec<LegacyResource> {
        self.inner.added_resources().iter().map(|r| r.as_ref().into()).collect()
    }

    /// Required resources.
    pub fn required_resources(&self) -> Vec<LegacyResource> {
        self.inner.required_resources().iter().map(|r| r.as_ref().into()).collect()
    }

    /// Optional resources.
    pub fn optional_resources(&self) -> Vec<LegacyResource> {
        self.inner.optional_resources().iter().map(|r| r.as_ref().into()).collect()
    }

    /// Unsatisfied requirements without their dependents, as the old API
    /// reported them.
    pub fn unsatisfied_requirements(&self) -> Vec<LegacyRequirement> {
        self.inner
            .unsatisfied_requirements()
            .iter()
            .map(|Unsatisfied { requirement, .. }| requirement.into())
            .collect()
    }

    /// Requirements that pulled `resource` in.
    pub fn reason(&self, resource: &LegacyResource) -> Vec<LegacyRequirement> {
        let Ok(id) = resource.resource_id() else {
            return Vec::new();
        };
        self.inner
            .resource(&id)
            .map(|r| self.inner.reason(r).into_iter().map(Into::into).collect())
            .unwrap_or_default()
    }

    /// Install, and start when `start` is set, every resolved resource.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if the last resolve did not succeed or the
    /// repositories changed since.
    pub fn deploy(&mut self, start: bool) -> Result<DeploymentReport, ResolveError> {
        self.inner.deploy(&mut self.installer, start)
    }

    /// The typed resolver underneath.
    pub fn inner(&self) -> &Resolver {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::DeploymentError;
    use obr_schema::Repository;

    fn legacy_exporter(name: &str, package: &str, version: &str) -> LegacyResource {
        LegacyResource {
            symbolic_name: name.into(),
            version: version.into(),
            capabilities: vec![LegacyCapability {
                name: "package".into(),
                properties: BTreeMap::from([
                    ("package".into(), package.into()),
                    ("version".into(), version.into()),
                ]),
            }],
            ..LegacyResource::default()
        }
    }

    #[derive(Default)]
    struct Names(Vec<String>);

    impl Installer for Names {
        type Handle = ();

        fn install(&mut self, resource: &Resource) -> Result<(), DeploymentError> {
            self.0.push(resource.symbolic_name().to_string());
            Ok(())
        }

        fn start(&mut self, _: &()) -> Result<(), DeploymentError> {
            Ok(())
        }
    }

    #[test]
    fn test_version_property_becomes_typed() {
        let cap = legacy_exporter("a", "org.a", "1.2").capabilities[0].to_capability().unwrap();
        assert_eq!(cap.get("version"), Some(&PropertyValue::Version(Version::new(1, 2, 0))));
        assert_eq!(cap.get("package"), Some(&PropertyValue::from("org.a")));

        let back = LegacyCapability::from(&cap);
        assert_eq!(back.properties["version"], "1.2.0");
    }

    #[test]
    fn test_legacy_resolve_and_deploy() {
        let registry = Arc::new(RepositoryRegistry::new());
        let api = legacy_exporter("api", "org.api", "1.0.0").to_resource().unwrap();
        registry.add(Repository::new("mem:repo", "repo").with_resource(api));

        let app = LegacyResource {
            symbolic_name: "app".into(),
            version: "1.0.0".into(),
            requirements: vec![
                LegacyRequirement {
                    name: "package".into(),
                    filter: "(package=org.api)".into(),
                    ..LegacyRequirement::default()
                },
                LegacyRequirement {
                    name: "package".into(),
                    filter: "(package=org.missing)".into(),
                    ..LegacyRequirement::default()
                },
            ],
            ..LegacyResource::default()
        };

        let mut resolver = LegacyResolver::new(registry, Names::default());
        assert!(resolver.add(&app).unwrap());
        assert!(!resolver.add(&app).unwrap());
        assert!(!resolver.resolve());

        let unsatisfied = resolver.unsatisfied_requirements();
        assert_eq!(unsatisfied.len(), 1);
        assert_eq!(unsatisfied[0].filter, "(package=org.missing)");
        assert!(resolver.deploy(false).is_err());

        let required = resolver.required_resources();
        assert_eq!(required[0].symbolic_name, "api");
        let reasons = resolver.reason(&required[0]);
        assert_eq!(reasons[0].filter, "(package=org.api)");
        assert!(resolver.reason(&legacy_exporter("zzz", "x", "1.0.0")).is_empty());
    }

    #[test]
    fn test_bad_filter_is_rejected_at_the_boundary() {
        let broken = LegacyResource {
            symbolic_name: "x".into(),
            version: "1.0.0".into(),
            requirements: vec![LegacyRequirement {
                name: "package".into(),
                filter: "(package=".into(),
                ..LegacyRequirement::default()
            }],
            ..LegacyResource::default()
        };
        let mut resolver = LegacyResolver::new(Arc::new(RepositoryRegistry::new()), Names::default());
        assert!(matches!(resolver.add(&broken), Err(ModelError::Filter(_))));
        assert!(resolver.inner().added_resources().is_empty());
    }
}
