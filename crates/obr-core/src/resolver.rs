//! The resolve state machine.
//!
//! A [`Resolver`] collects the resources a caller asks for, walks their
//! requirements breadth first against a snapshot of the registry and ends up
//! with three disjoint sets: the added roots, the resources pulled in by
//! mandatory requirement chains and those pulled in through at least one
//! optional requirement. Selection is greedy: once a provider is picked it
//! is never reconsidered.

use crate::deploy::{self, DeploymentReport, Installer};
use crate::options::ResolveOptions;
use crate::reason::{Reason, Unsatisfied};
use crate::registry::{self, RepositoryRegistry};
use crate::reporter::{NullReporter, Reporter};
use chrono::{DateTime, Utc};
use obr_schema::{Capability, Repository, Requirement, Resource, ResourceId, Version};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Symbolic name of the resource carrying added requirements and global
/// capabilities.
pub const ROOT_NAME: &str = "obr.resolver.root";

/// Lifecycle of a [`Resolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveState {
    /// Nothing resolved since the last change to the working set.
    #[default]
    Initial,
    /// A resolve is running.
    Resolving,
    /// The last resolve satisfied every mandatory requirement.
    Resolved,
    /// The last resolve left mandatory requirements unsatisfied.
    Unresolved,
}

impl fmt::Display for ResolveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initial => "initial",
            Self::Resolving => "resolving",
            Self::Resolved => "resolved",
            Self::Unresolved => "unresolved",
        })
    }
}

/// Errors from [`Resolver::deploy`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Deploy requires a successful resolve.
    #[error("Cannot deploy while {0}; resolve successfully first")]
    IllegalState(ResolveState),

    /// A repository changed after the resolve.
    #[error("Repositories changed since the resolve ({resolved} < {current}); resolve again")]
    StaleRepositories {
        /// Newest repository timestamp seen by the resolve.
        resolved: DateTime<Utc>,
        /// Newest repository timestamp now.
        current: DateTime<Utc>,
    },
}

/// Where a working-set member sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Root,
    Added,
    Required,
    Optional,
}

/// Computes the transitive closure of a set of resources.
///
/// # Example
///
/// ```
/// use obr_core::{RepositoryRegistry, Resolver};
/// use obr_schema::{Capability, Repository, Requirement, Resource, Version};
/// use std::sync::Arc;
///
/// let api = Resource::new("api", Version::new(1, 0, 0))
///     .with_capability(Capability::new("package").unwrap().with_property("package", "org.api"));
/// let registry = Arc::new(RepositoryRegistry::new());
/// registry.add(Repository::new("mem:repo", "repo").with_resource(api));
///
/// let app = Resource::new("app", Version::new(1, 0, 0))
///     .with_requirement(Requirement::new("package", "(package=org.api)").unwrap());
///
/// let mut resolver = Resolver::new(registry);
/// resolver.add(app);
/// assert!(resolver.resolve());
/// assert_eq!(resolver.required_resources()[0].symbolic_name(), "api");
/// ```
pub struct Resolver {
    registry: Arc<RepositoryRegistry>,
    reporter: Arc<dyn Reporter>,
    state: ResolveState,
    root_requirements: Vec<Requirement>,
    global_capabilities: Vec<Capability>,
    root: Option<Arc<Resource>>,
    added: Vec<Arc<Resource>>,
    required: Vec<Arc<Resource>>,
    optional: Vec<Arc<Resource>>,
    unsatisfied: Vec<Unsatisfied>,
    discarded: Vec<Unsatisfied>,
    reasons: HashMap<ResourceId, Vec<Reason>>,
    resolved_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("state", &self.state)
            .field("added", &self.added.len())
            .field("required", &self.required.len())
            .field("optional", &self.optional.len())
            .field("unsatisfied", &self.unsatisfied.len())
            .finish_non_exhaustive()
    }
}

impl Resolver {
    /// Create a resolver searching `registry`.
    pub fn new(registry: Arc<RepositoryRegistry>) -> Self {
        Self {
            registry,
            reporter: Arc::new(NullReporter),
            state: ResolveState::Initial,
            root_requirements: Vec::new(),
            global_capabilities: Vec::new(),
            root: None,
            added: Vec::new(),
            required: Vec::new(),
            optional: Vec::new(),
            unsatisfied: Vec::new(),
            discarded: Vec::new(),
            reasons: HashMap::new(),
            resolved_at: None,
        }
    }

    /// Report deploy progress to `reporter`.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Current state.
    pub fn state(&self) -> ResolveState {
        self.state
    }

    /// Request a resource. Returns `false`, changing nothing, if a resource
    /// with the same id was already added.
    pub fn add(&mut self, resource: impl Into<Arc<Resource>>) -> bool {
        let resource = resource.into();
        if self.added.iter().any(|r| r.id() == resource.id()) {
            tracing::trace!("{resource} already added");
            return false;
        }
        self.added.push(resource);
        self.state = ResolveState::Initial;
        true
    }

    /// Request whatever satisfies `requirement`, without naming a resource.
    pub fn add_requirement(&mut self, requirement: Requirement) {
        self.root_requirements.push(requirement);
        self.state = ResolveState::Initial;
    }

    /// Declare a capability the environment already provides.
    pub fn add_global_capability(&mut self, capability: Capability) {
        self.global_capabilities.push(capability);
        self.state = ResolveState::Initial;
    }

    /// Explicitly requested resources, in insertion order.
    pub fn added_resources(&self) -> &[Arc<Resource>] {
        &self.added
    }

    /// Resources pulled in by mandatory requirement chains, in discovery order.
    pub fn required_resources(&self) -> &[Arc<Resource>] {
        &self.required
    }

    /// Resources pulled in through an optional requirement, in discovery order.
    pub fn optional_resources(&self) -> &[Arc<Resource>] {
        &self.optional
    }

    /// Mandatory requirements nothing could satisfy.
    pub fn unsatisfied_requirements(&self) -> &[Unsatisfied] {
        &self.unsatisfied
    }

    /// Failures that dropped an optional resource instead of failing the
    /// resolve.
    pub fn discarded_optional(&self) -> &[Unsatisfied] {
        &self.discarded
    }

    /// Every reason `resource` is in the working set.
    pub fn reasons(&self, resource: &Resource) -> &[Reason] {
        self.reasons.get(resource.id()).map_or(&[], Vec::as_slice)
    }

    /// The requirements that pulled `resource` in. Empty for resources
    /// outside the working set.
    pub fn reason(&self, resource: &Resource) -> Vec<&Requirement> {
        self.reasons(resource)
            .iter()
            .map(|r| &r.requirement)
            .collect()
    }

    /// Look up an added, required or optional resource by id.
    pub fn resource(&self, id: &ResourceId) -> Option<&Arc<Resource>> {
        self.working_set()
            .filter(|r| !self.is_root(r))
            .find(|r| r.id() == id)
    }

    /// Resolve with default options.
    pub fn resolve(&mut self) -> bool {
        self.resolve_with(&ResolveOptions::default())
    }

    /// Compute the closure of the added resources and requirements.
    ///
    /// Always walks every reachable requirement so the unsatisfied list is
    /// complete; returns whether it is empty.
    pub fn resolve_with(&mut self, options: &ResolveOptions) -> bool {
        self.state = ResolveState::Resolving;
        self.required.clear();
        self.optional.clear();
        self.unsatisfied.clear();
        self.discarded.clear();
        self.reasons.clear();
        self.root = self.build_root();

        let repositories = self.registry.repositories();
        self.resolved_at = repositories.iter().map(|r| r.last_modified()).max();
        tracing::debug!(
            "Resolving {} resources against {} repositories",
            self.added.len(),
            repositories.len()
        );

        let mut pass = Pass {
            repositories: &repositories,
            options,
            queue: self.root.iter().chain(&self.added).cloned().collect(),
            failures: Vec::new(),
        };
        while let Some(resource) = pass.queue.pop_front() {
            self.walk(&resource, &mut pass);
        }

        let failures = std::mem::take(&mut pass.failures);
        self.settle(failures);

        self.state = if self.unsatisfied.is_empty() {
            ResolveState::Resolved
        } else {
            ResolveState::Unresolved
        };
        tracing::debug!(
            "Resolve {}: {} required, {} optional, {} unsatisfied",
            self.state,
            self.required.len(),
            self.optional.len(),
            self.unsatisfied.len()
        );
        self.state == ResolveState::Resolved
    }

    /// Install the resolved resources, providers first. A resource replaces
    /// an older installed version of itself when nothing that version
    /// satisfies would break.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::IllegalState`] unless the last resolve
    /// succeeded and [`ResolveError::StaleRepositories`] if a repository was
    /// modified since. Per-resource failures are reported in the
    /// [`DeploymentReport`] instead.
    pub fn deploy<I: Installer>(
        &mut self,
        installer: &mut I,
        start: bool,
    ) -> Result<DeploymentReport, ResolveError> {
        if self.state != ResolveState::Resolved {
            return Err(ResolveError::IllegalState(self.state));
        }
        let resolved = self.resolved_at.unwrap_or(DateTime::<Utc>::MIN_UTC);
        if let Some(current) = self
            .registry
            .last_modified()
            .filter(|current| *current > resolved)
        {
            return Err(ResolveError::StaleRepositories { resolved, current });
        }

        let nodes: Vec<Arc<Resource>> = self.working_set().cloned().collect();
        let order: Vec<Arc<Resource>> = deploy::deployment_order(&nodes, &self.reasons)
            .into_iter()
            .filter(|r| !self.is_root(r))
            .collect();

        let installed: Vec<Arc<Resource>> = self
            .registry
            .repositories()
            .iter()
            .filter(|r| r.kind().is_installed())
            .flat_map(|r| r.resources().iter().cloned())
            .collect();
        let updates: HashMap<ResourceId, Arc<Resource>> = order
            .iter()
            .filter(|r| !r.is_local())
            .filter_map(|r| {
                deploy::find_updatable(r, &installed, &order).map(|old| (r.id().clone(), old))
            })
            .collect();

        Ok(deploy::run(
            &order,
            &updates,
            installer,
            start,
            self.reporter.as_ref(),
        ))
    }

    fn build_root(&self) -> Option<Arc<Resource>> {
        if self.root_requirements.is_empty() && self.global_capabilities.is_empty() {
            return None;
        }
        let mut root = Resource::new(ROOT_NAME, Version::default())
            .with_presentation_name("Added requirements")
            .with_local(true);
        for capability in &self.global_capabilities {
            root = root.with_capability(capability.clone());
        }
        for requirement in &self.root_requirements {
            root = root.with_requirement(requirement.clone());
        }
        Some(Arc::new(root))
    }

    fn is_root(&self, resource: &Resource) -> bool {
        self.root.as_ref().is_some_and(|r| r.id() == resource.id())
    }

    fn slot(&self, id: &ResourceId) -> Option<Slot> {
        if self.root.as_ref().is_some_and(|r| r.id() == id) {
            Some(Slot::Root)
        } else if self.added.iter().any(|r| r.id() == id) {
            Some(Slot::Added)
        } else if self.required.iter().any(|r| r.id() == id) {
            Some(Slot::Required)
        } else if self.optional.iter().any(|r| r.id() == id) {
            Some(Slot::Optional)
        } else {
            None
        }
    }

    /// Working-set members in search order: root, added, required, optional.
    fn working_set(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.root
            .iter()
            .chain(&self.added)
            .chain(&self.required)
            .chain(&self.optional)
    }

    fn walk(&mut self, resource: &Arc<Resource>, pass: &mut Pass<'_>) {
        let chain_optional = self.slot(resource.id()) == Some(Slot::Optional);

        for requirement in resource.requirements() {
            if requirement.is_optional() && pass.options.no_optional {
                tracing::trace!("Ignoring optional {requirement} of {resource}");
                continue;
            }
            let optional = chain_optional || requirement.is_optional();

            let present: Vec<Arc<Resource>> = self
                .working_set()
                .filter(|r| r.satisfies(requirement))
                .cloned()
                .collect();

            if requirement.is_multiple() {
                self.bind_all(resource, requirement, optional, present, pass);
                continue;
            }

            if let Some(provider) = present.into_iter().next() {
                tracing::trace!("{requirement} of {resource} already met by {provider}");
                self.record(&provider, requirement, resource);
                if !optional {
                    self.promote(provider.id());
                }
                continue;
            }

            let candidates = registry::find_providers(pass.repositories, requirement, pass.options);
            match select(&candidates, !pass.options.do_not_prefer_local) {
                Some(provider) => {
                    let provider = Arc::clone(provider);
                    self.include(&provider, requirement, resource, optional, pass);
                }
                None if requirement.is_optional() => {
                    tracing::trace!("No provider for optional {requirement} of {resource}");
                }
                None => self.fail(requirement, resource, chain_optional, pass),
            }
        }
    }

    fn bind_all(
        &mut self,
        resource: &Arc<Resource>,
        requirement: &Requirement,
        optional: bool,
        present: Vec<Arc<Resource>>,
        pass: &mut Pass<'_>,
    ) {
        let candidates = registry::find_providers(pass.repositories, requirement, pass.options);
        let fresh: Vec<Arc<Resource>> = candidates
            .into_iter()
            .filter(|c| self.slot(c.id()).is_none())
            .collect();

        if present.is_empty() && fresh.is_empty() {
            if requirement.is_optional() {
                tracing::trace!("No provider for optional {requirement} of {resource}");
            } else {
                let chain_optional = self.slot(resource.id()) == Some(Slot::Optional);
                self.fail(requirement, resource, chain_optional, pass);
            }
            return;
        }

        for provider in &present {
            self.record(provider, requirement, resource);
            if !optional {
                self.promote(provider.id());
            }
        }
        for provider in &fresh {
            self.include(provider, requirement, resource, optional, pass);
        }
    }

    fn include(
        &mut self,
        provider: &Arc<Resource>,
        requirement: &Requirement,
        dependent: &Arc<Resource>,
        optional: bool,
        pass: &mut Pass<'_>,
    ) {
        tracing::debug!(
            "Selected {provider} for {requirement} of {dependent}{}",
            if optional { " (optional)" } else { "" }
        );
        if optional {
            self.optional.push(Arc::clone(provider));
        } else {
            self.required.push(Arc::clone(provider));
        }
        self.record(provider, requirement, dependent);
        pass.queue.push_back(Arc::clone(provider));
    }

    fn record(
        &mut self,
        provider: &Arc<Resource>,
        requirement: &Requirement,
        dependent: &Arc<Resource>,
    ) {
        self.reasons
            .entry(provider.id().clone())
            .or_default()
            .push(Reason::new(requirement.clone(), Arc::clone(dependent)));
    }

    fn fail(
        &mut self,
        requirement: &Requirement,
        dependent: &Arc<Resource>,
        chain_optional: bool,
        pass: &mut Pass<'_>,
    ) {
        let failure = Unsatisfied {
            requirement: requirement.clone(),
            dependent: Arc::clone(dependent),
        };
        if chain_optional {
            tracing::debug!("Optional {dependent} cannot satisfy {requirement}");
            pass.failures.push(failure);
        } else {
            tracing::debug!("Unsatisfied {requirement} of {dependent}");
            self.unsatisfied.push(failure);
        }
    }

    /// Move an optional resource, and the optional providers of its
    /// mandatory requirements, into the required set.
    fn promote(&mut self, id: &ResourceId) {
        let mut pending = vec![id.clone()];
        while let Some(id) = pending.pop() {
            let Some(idx) = self.optional.iter().position(|r| r.id() == &id) else {
                continue;
            };
            let resource = self.optional.remove(idx);
            tracing::debug!("Promoting {resource} to required");
            self.required.push(resource);

            for (provider, reasons) in &self.reasons {
                if reasons
                    .iter()
                    .any(|r| r.is_mandatory() && r.dependent.id() == &id)
                {
                    pending.push(provider.clone());
                }
            }
        }
    }

    /// Turn optional-chain failures into unsatisfied entries or discards,
    /// then drop whatever the discarded resources alone pulled in.
    fn settle(&mut self, failures: Vec<Unsatisfied>) {
        let mut dropped: HashSet<ResourceId> = HashSet::new();

        for failure in failures {
            if self.slot(failure.dependent.id()) == Some(Slot::Optional) {
                tracing::debug!(
                    "Discarding optional {} ({})",
                    failure.dependent,
                    failure.requirement
                );
                dropped.insert(failure.dependent.id().clone());
                self.discarded.push(failure);
            } else {
                // Promoted after the failure was seen.
                self.unsatisfied.push(failure);
            }
        }
        if dropped.is_empty() {
            return;
        }

        loop {
            let before = dropped.len();
            let live = self.reachable(&dropped);
            for resource in &self.optional {
                let id = resource.id();
                if dropped.contains(id) {
                    continue;
                }
                // Needs a dropped provider.
                let broken = self.reasons.iter().any(|(provider, rs)| {
                    dropped.contains(provider)
                        && rs.iter().any(|r| r.is_mandatory() && r.dependent.id() == id)
                });
                if broken || !live.contains(id) {
                    dropped.insert(id.clone());
                }
            }
            if dropped.len() == before {
                break;
            }
        }

        self.optional.retain(|r| !dropped.contains(r.id()));
        self.reasons.retain(|id, _| !dropped.contains(id));
        for reasons in self.reasons.values_mut() {
            reasons.retain(|r| !dropped.contains(r.dependent.id()));
        }
    }

    /// Ids reachable from the root, added and required sets through reasons
    /// of resources that are not `dropped`. Self-edges do not count.
    fn reachable(&self, dropped: &HashSet<ResourceId>) -> HashSet<ResourceId> {
        let mut live: HashSet<ResourceId> = self
            .root
            .iter()
            .chain(&self.added)
            .chain(&self.required)
            .map(|r| r.id().clone())
            .collect();
        loop {
            let before = live.len();
            for resource in &self.optional {
                let id = resource.id();
                if dropped.contains(id) || live.contains(id) {
                    continue;
                }
                let wanted = self.reasons(resource).iter().any(|r| {
                    let dependent = r.dependent.id();
                    dependent != id && live.contains(dependent)
                });
                if wanted {
                    live.insert(id.clone());
                }
            }
            if live.len() == before {
                return live;
            }
        }
    }
}

/// State of one resolve pass.
struct Pass<'a> {
    repositories: &'a [Arc<Repository>],
    options: &'a ResolveOptions,
    queue: VecDeque<Arc<Resource>>,
    failures: Vec<Unsatisfied>,
}

/// Pick one provider: installed first (when `prefer_local`), then the
/// highest version, then the first discovered.
fn select(candidates: &[Arc<Resource>], prefer_local: bool) -> Option<&Arc<Resource>> {
    let rank = |r: &Arc<Resource>| (prefer_local && r.is_local(), r.version().clone());
    let mut best: Option<&Arc<Resource>> = None;
    for candidate in candidates {
        if best.is_none_or(|current| rank(candidate) > rank(current)) {
            best = Some(candidate);
        }
    }
    best
}
