//! Capabilities, requirements and resources.

use crate::filter::{Filter, FilterError, PropertySource};
use crate::value::{PropertyError, PropertyValue};
use crate::version::{Version, VersionError};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Well-known capability namespaces.
pub mod namespace {
    /// Bundle identity (`symbolicname`, `version`).
    pub const BUNDLE: &str = "bundle";
    /// Exported Java package.
    pub const PACKAGE: &str = "package";
    /// Registered service.
    pub const SERVICE: &str = "service";
    /// Fragment host attachment.
    pub const FRAGMENT: &str = "fragment";
    /// Execution environment.
    pub const EXECUTION_ENVIRONMENT: &str = "ee";
}

/// Errors raised while constructing model objects.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A namespace or symbolic name was empty.
    #[error("{0} must not be empty")]
    EmptyName(&'static str),

    /// A requirement filter did not parse.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// A capability property did not parse.
    #[error("Property '{key}': {source}")]
    Property {
        /// Property key.
        key: String,
        /// Underlying error.
        source: PropertyError,
    },

    /// A resource version did not parse.
    #[error(transparent)]
    Version(#[from] VersionError),
}

/// A named set of typed properties offered by a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
    name: String,
    properties: Vec<(String, PropertyValue)>,
}

impl Capability {
    /// Create a capability in the given namespace with no properties.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyName`] if `name` is empty.
    pub fn new(name: impl Into<String>) -> Result<Self, ModelError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ModelError::EmptyName("capability name"));
        }
        Ok(Self {
            name,
            properties: Vec::new(),
        })
    }

    /// Append a property. A later value for the same key replaces the earlier one
    /// but keeps its position.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.properties.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.properties.push((key, value)),
        }
        self
    }

    /// Namespace.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Properties in declaration order.
    pub fn properties(&self) -> &[(String, PropertyValue)] {
        &self.properties
    }

    /// Look up a property (exact key first, then case-insensitive).
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.as_slice().property(key)
    }
}

impl PropertySource for Capability {
    fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.get(key)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.name)?;
        for (idx, (key, value)) in self.properties.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str("}")
    }
}

/// A filter a resource needs satisfied by some capability in the same namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    name: String,
    filter: Filter,
    optional: bool,
    multiple: bool,
    extend: bool,
    comment: String,
}

impl Requirement {
    /// Create a mandatory, single-cardinality requirement.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyName`] for an empty namespace and
    /// [`ModelError::Filter`] if `filter` is malformed. Malformed filters are
    /// only ever reported here, never while matching.
    pub fn new(name: impl Into<String>, filter: &str) -> Result<Self, ModelError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ModelError::EmptyName("requirement name"));
        }
        Ok(Self {
            name,
            filter: Filter::parse(filter)?,
            optional: false,
            multiple: false,
            extend: false,
            comment: String::new(),
        })
    }

    /// Set whether failing to satisfy this requirement fails resolution.
    #[must_use]
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Set whether every matching provider is bound.
    #[must_use]
    pub fn with_multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    /// Set the extend flag (fragment host requirements).
    #[must_use]
    pub fn with_extend(mut self, extend: bool) -> Self {
        self.extend = extend;
        self
    }

    /// Attach a human readable description.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Namespace.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parsed filter.
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Whether the requirement may stay unsatisfied.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Whether more than one provider may be bound.
    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    /// Whether this is an extension (fragment host) requirement.
    pub fn is_extend(&self) -> bool {
        self.extend
    }

    /// Description, possibly empty.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Whether `capability` is in the same namespace and matches the filter.
    pub fn is_satisfied(&self, capability: &Capability) -> bool {
        self.name == capability.name() && self.filter.matches(capability)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.comment.is_empty() {
            write!(f, "{}: {}", self.name, self.filter)
        } else {
            f.write_str(&self.comment)
        }
    }
}

/// Identity of a resource, by default `symbolic_name/version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    /// Wrap an explicit identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier derived from name and version.
    pub fn derived(symbolic_name: &str, version: &Version) -> Self {
        Self(format!("{symbolic_name}/{version}"))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ResourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A deployable bundle: identity plus ordered capabilities and requirements.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    id: ResourceId,
    symbolic_name: String,
    presentation_name: Option<String>,
    version: Version,
    uri: String,
    categories: Vec<String>,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
    local: bool,
}

impl Resource {
    /// Create a remote resource with no capabilities or requirements.
    pub fn new(symbolic_name: impl Into<String>, version: Version) -> Self {
        let symbolic_name = symbolic_name.into();
        Self {
            id: ResourceId::derived(&symbolic_name, &version),
            symbolic_name,
            presentation_name: None,
            version,
            uri: String::new(),
            categories: Vec::new(),
            capabilities: Vec::new(),
            requirements: Vec::new(),
            local: false,
        }
    }

    /// Override the derived identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = ResourceId::new(id);
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_presentation_name(mut self, name: impl Into<String>) -> Self {
        self.presentation_name = Some(name.into());
        self
    }

    /// Set the location the bundle is installed from.
    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    /// Add a category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    /// Append a capability.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Append a requirement.
    #[must_use]
    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Mark the resource as already installed.
    #[must_use]
    pub fn with_local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    /// Identifier.
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Bundle symbolic name.
    pub fn symbolic_name(&self) -> &str {
        &self.symbolic_name
    }

    /// Display name, falling back to the symbolic name.
    pub fn presentation_name(&self) -> &str {
        self.presentation_name
            .as_deref()
            .unwrap_or(&self.symbolic_name)
    }

    /// Version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Install location.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Categories.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Capabilities in declaration order.
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Requirements in declaration order.
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Whether the resource is already installed.
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// Fragments attach to a host and are never started on their own.
    pub fn is_fragment(&self) -> bool {
        self.requirements.iter().any(Requirement::is_extend)
    }

    /// Whether any capability satisfies `requirement`.
    pub fn satisfies(&self, requirement: &Requirement) -> bool {
        self.capabilities.iter().any(|c| requirement.is_satisfied(c))
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.presentation_name(), self.version)
    }
}
