//! Repository descriptor wire format.
//!
//! Descriptors mirror OBR's `repository.xml`: resources carry capabilities
//! made of `{ "n": name, "t": type, "v": value }` property triplets and
//! requirements carrying a filter string. They deserialize with serde from
//! JSON (here) or TOML (in the loader) and are validated when converted into
//! the model.

use crate::repository::{Repository, RepositoryKind};
use crate::types::{Capability, ModelError, Requirement, Resource};
use crate::value::PropertyValue;
use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level repository document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryDescriptor {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Canonical location; defaults to where the document was read from.
    #[serde(default)]
    pub uri: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub last_modified: Option<i64>,
    /// Remote, local or system.
    #[serde(default)]
    pub kind: RepositoryKind,
    /// Resources in repository order.
    #[serde(default, rename = "resources", alias = "resource")]
    pub resources: Vec<ResourceDescriptor>,
}

/// One resource entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    /// Explicit identifier; derived from name and version when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Bundle symbolic name.
    pub symbolic_name: String,
    /// Display name.
    #[serde(default)]
    pub presentation_name: Option<String>,
    /// Version text, cleaned leniently.
    #[serde(default)]
    pub version: Option<String>,
    /// Install location.
    #[serde(default)]
    pub uri: Option<String>,
    /// Categories.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Capabilities in declaration order.
    #[serde(default, alias = "capability")]
    pub capabilities: Vec<CapabilityDescriptor>,
    /// Requirements in declaration order.
    #[serde(default, alias = "require")]
    pub requirements: Vec<RequirementDescriptor>,
}

/// One capability entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Namespace.
    pub name: String,
    /// Properties in declaration order.
    #[serde(default, alias = "p")]
    pub properties: Vec<PropertyDescriptor>,
}

/// One `n`/`t`/`v` property triplet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// Key.
    #[serde(rename = "n")]
    pub name: String,
    /// Type name, `string` when absent.
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    /// Value text.
    #[serde(rename = "v")]
    pub value: String,
}

/// One requirement entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequirementDescriptor {
    /// Namespace.
    pub name: String,
    /// Filter text.
    pub filter: String,
    /// Optional requirement.
    #[serde(default)]
    pub optional: bool,
    /// Multiple cardinality.
    #[serde(default)]
    pub multiple: bool,
    /// Extension (fragment host) requirement.
    #[serde(default)]
    pub extend: bool,
    /// Description.
    #[serde(default)]
    pub comment: Option<String>,
}

/// A resource dropped while converting a descriptor.
#[derive(Debug, Clone)]
pub struct RejectedResource {
    /// Symbolic name as written.
    pub symbolic_name: String,
    /// Why it was dropped.
    pub error: ModelError,
}

impl RepositoryDescriptor {
    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns the serde error for malformed JSON or missing fields.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Build the repository, skipping resources that fail validation.
    ///
    /// `source` is used as the URI (and name) when the document carries none.
    pub fn into_repository(self, source: &str) -> (Repository, Vec<RejectedResource>) {
        let uri = self.uri.unwrap_or_else(|| source.to_string());
        let name = self.name.unwrap_or_else(|| uri.clone());
        let last_modified = self
            .last_modified
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_else(Utc::now);

        let mut repository = Repository::new(uri, name)
            .with_kind(self.kind)
            .with_last_modified(last_modified);
        let mut rejected = Vec::new();

        for descriptor in self.resources {
            match descriptor.to_resource() {
                Ok(resource) => repository.push(resource),
                Err(error) => {
                    tracing::warn!(
                        "Rejecting resource '{}' from {}: {error}",
                        descriptor.symbolic_name,
                        repository.uri()
                    );
                    rejected.push(RejectedResource {
                        symbolic_name: descriptor.symbolic_name,
                        error,
                    });
                }
            }
        }

        (repository, rejected)
    }
}

impl ResourceDescriptor {
    /// Validate and convert into a [`Resource`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] for an empty symbolic name, an empty namespace,
    /// an unparsable property or a malformed requirement filter.
    pub fn to_resource(&self) -> Result<Resource, ModelError> {
        if self.symbolic_name.trim().is_empty() {
            return Err(ModelError::EmptyName("symbolic name"));
        }

        let version = self
            .version
            .as_deref()
            .map(Version::clean)
            .unwrap_or_default();
        let mut resource = Resource::new(self.symbolic_name.trim(), version);

        if let Some(id) = &self.id {
            resource = resource.with_id(id.clone());
        }
        if let Some(name) = &self.presentation_name {
            resource = resource.with_presentation_name(name.clone());
        }
        if let Some(uri) = &self.uri {
            resource = resource.with_uri(uri.clone());
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
}

impl CapabilityDescriptor {
    /// Validate and convert into a [`Capability`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] for an empty namespace or a property whose
    /// text does not parse as its declared type.
    pub fn to_capability(&self) -> Result<Capability, ModelError> {
        let mut capability = Capability::new(self.name.clone())?;
        for property in &self.properties {
            let type_name = property.type_.as_deref().unwrap_or("");
            let value = PropertyValue::parse_typed(type_name, &property.value).map_err(|source| {
                ModelError::Property {
                    key: property.name.clone(),
                    source,
                }
            })?;
            capability = capability.with_property(property.name.clone(), value);
        }
        Ok(capability)
    }
}

impl RequirementDescriptor {
    /// Validate and convert into a [`Requirement`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] for an empty namespace or a malformed filter.
    pub fn to_requirement(&self) -> Result<Requirement, ModelError> {
        let mut requirement = Requirement::new(self.name.clone(), &self.filter)?
            .with_optional(self.optional)
            .with_multiple(self.multiple)
            .with_extend(self.extend);
        if let Some(comment) = &self.comment {
            requirement = requirement.with_comment(comment.clone());
        }
        Ok(requirement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "name": "Acme",
        "lastModified": 1700000000000,
        "resources": [
            {
                "symbolicName": "org.acme.api",
                "version": "1.2",
                "uri": "file:api.jar",
                "capabilities": [
                    { "name": "package", "properties": [
                        { "n": "package", "v": "org.acme.api" },
                        { "n": "version", "t": "version", "v": "1.2.0" }
                    ] }
                ]
            },
            {
                "symbolicName": "org.acme.broken",
                "requirements": [ { "name": "package", "filter": "(package=oops" } ]
            },
            {
                "symbolicName": "org.acme.impl",
                "version": "1.0.0-SNAPSHOT",
                "requirements": [
                    { "name": "package", "filter": "(package=org.acme.api)", "comment": "Import org.acme.api" },
                    { "name": "package", "filter": "(package=org.slf4j)", "optional": true }
                ]
            }
        ]
    }"#;

    #[test]
    fn converts_valid_resources_and_rejects_broken_ones() {
        let descriptor = RepositoryDescriptor::from_json(SAMPLE).unwrap();
        let (repo, rejected) = descriptor.into_repository("file:/tmp/repo.json");

        assert_eq!(repo.name(), "Acme");
        assert_eq!(repo.uri(), "file:/tmp/repo.json");
        assert_eq!(repo.last_modified().timestamp_millis(), 1_700_000_000_000);
        assert_eq!(repo.resources().len(), 2);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].symbolic_name, "org.acme.broken");
        assert!(matches!(rejected[0].error, ModelError::Filter(_)));

        let api = &repo.resources()[0];
        assert_eq!(api.version(), &Version::new(1, 2, 0));
        assert_eq!(
            api.capabilities()[0].get("version"),
            Some(&PropertyValue::Version(Version::new(1, 2, 0)))
        );

        let impl_ = &repo.resources()[1];
        assert_eq!(impl_.version().qualifier(), "SNAPSHOT");
        assert_eq!(impl_.requirements()[0].comment(), "Import org.acme.api");
        assert!(impl_.requirements()[1].is_optional());
    }

    #[test]
    fn rejects_badly_typed_properties() {
        let descriptor = ResourceDescriptor {
            symbolic_name: "x".into(),
            capabilities: vec![CapabilityDescriptor {
                name: "bundle".into(),
                properties: vec![PropertyDescriptor {
                    name: "size".into(),
                    type_: Some("long".into()),
                    value: "big".into(),
                }],
            }],
            ..ResourceDescriptor::default()
        };
        assert!(matches!(
            descriptor.to_resource(),
            Err(ModelError::Property { ref key, .. }) if key == "size"
        ));
    }

    #[test]
    fn reads_toml_documents() {
        let text = r#"
            name = "local"
            kind = "local"

            [[resources]]
            symbolicName = "org.acme.api"
            version = "1.0.0"

            [[resources.capabilities]]
            name = "bundle"
            properties = [ { n = "symbolicname", v = "org.acme.api" } ]
        "#;
        let descriptor: RepositoryDescriptor = toml::from_str(text).unwrap();
        let (repo, rejected) = descriptor.into_repository("file:local.toml");
        assert!(rejected.is_empty());
        assert_eq!(repo.kind(), RepositoryKind::Local);
        assert!(repo.resources()[0].is_local());
    }
}
