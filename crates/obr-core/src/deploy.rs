//! Deployment: install order and the best-effort install loop.

use crate::reason::Reason;
use crate::reporter::Reporter;
use obr_schema::{Resource, ResourceId};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Failure to install or start one resource.
#[derive(thiserror::Error, Debug)]
pub enum DeploymentError {
    /// The resource has no location to install from.
    #[error("{0} has no install location")]
    MissingUri(String),

    /// The installer rejected the resource.
    #[error("Failed to install {resource}: {message}")]
    Install {
        /// Resource being installed.
        resource: String,
        /// Installer message.
        message: String,
    },

    /// The installed resource failed to start.
    #[error("Failed to start {resource}: {message}")]
    Start {
        /// Resource being started.
        resource: String,
        /// Installer message.
        message: String,
    },

    /// Filesystem error while installing.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// The bundle-install collaborator.
///
/// `install` returns a handle that `start` later receives; neither is
/// retried.
pub trait Installer {
    /// Installed bundle handle.
    type Handle;

    /// Install the bundle found at the resource's URI.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError`] if the bundle cannot be installed.
    fn install(&mut self, resource: &Resource) -> Result<Self::Handle, DeploymentError>;

    /// Start a previously installed bundle.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError`] if the bundle fails to start.
    fn start(&mut self, handle: &Self::Handle) -> Result<(), DeploymentError>;

    /// Replace the installed bundle `installed` with `resource`.
    ///
    /// The default installs `resource` alongside it.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError`] if the bundle cannot be replaced.
    fn update(
        &mut self,
        installed: &Resource,
        resource: &Resource,
    ) -> Result<Self::Handle, DeploymentError> {
        tracing::debug!("{installed} cannot be replaced in place, installing {resource}");
        self.install(resource)
    }
}

/// One failed resource.
#[derive(Debug)]
pub struct DeploymentFailure {
    /// The resource.
    pub resource: Arc<Resource>,
    /// What went wrong.
    pub error: DeploymentError,
}

/// What a deploy did, in install order.
#[derive(Debug, Default)]
pub struct DeploymentReport {
    /// Resources installed.
    pub installed: Vec<Arc<Resource>>,
    /// Resources that replaced an older installed version.
    pub updated: Vec<Arc<Resource>>,
    /// Resources started after install.
    pub started: Vec<Arc<Resource>>,
    /// Installed resources left untouched.
    pub skipped: Vec<Arc<Resource>>,
    /// Install and start failures.
    pub failures: Vec<DeploymentFailure>,
}

impl DeploymentReport {
    /// Whether every resource installed or updated (and started when asked).
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Order `nodes` so that every resource follows the providers of its
/// mandatory requirements.
///
/// `nodes` must be in discovery order. Resources that depend on each other
/// form one component; its members are emitted together in discovery order.
pub fn deployment_order(
    nodes: &[Arc<Resource>],
    reasons: &HashMap<ResourceId, Vec<Reason>>,
) -> Vec<Arc<Resource>> {
    let mut edges: HashMap<&ResourceId, Vec<&Arc<Resource>>> = HashMap::new();
    for provider in nodes {
        for reason in reasons.get(provider.id()).into_iter().flatten() {
            if reason.is_mandatory() && reason.dependent.id() != provider.id() {
                edges
                    .entry(reason.dependent.id())
                    .or_default()
                    .push(provider);
            }
        }
    }

    let mut walk = Components {
        edges: &edges,
        position: nodes.iter().enumerate().map(|(i, r)| (r.id(), i)).collect(),
        index: HashMap::new(),
        low: HashMap::new(),
        stack: Vec::new(),
        on_stack: HashSet::new(),
        order: Vec::with_capacity(nodes.len()),
    };
    for node in nodes {
        if !walk.index.contains_key(node.id()) {
            walk.visit(node);
        }
    }
    walk.order
}

/// Tarjan's strongly connected components over `dependent -> provider`
/// edges. A component is emitted once all of its providers are.
struct Components<'a> {
    edges: &'a HashMap<&'a ResourceId, Vec<&'a Arc<Resource>>>,
    position: HashMap<&'a ResourceId, usize>,
    index: HashMap<&'a ResourceId, usize>,
    low: HashMap<&'a ResourceId, usize>,
    stack: Vec<&'a Arc<Resource>>,
    on_stack: HashSet<&'a ResourceId>,
    order: Vec<Arc<Resource>>,
}

impl<'a> Components<'a> {
    fn visit(&mut self, node: &'a Arc<Resource>) {
        let id = node.id();
        let index = self.index.len();
        self.index.insert(id, index);
        self.low.insert(id, index);
        self.stack.push(node);
        self.on_stack.insert(id);

        let edges = self.edges;
        for &provider in edges.get(id).into_iter().flatten() {
            let pid = provider.id();
            let reached = match self.index.get(pid) {
                None => {
                    self.visit(provider);
                    self.low[pid]
                }
                Some(&i) if self.on_stack.contains(pid) => i,
                Some(_) => continue,
            };
            let low = self.low[id].min(reached);
            self.low.insert(id, low);
        }

        if self.low[id] != index {
            return;
        }
        let mut component = Vec::new();
        while let Some(member) = self.stack.pop() {
            self.on_stack.remove(member.id());
            component.push(member);
            if member.id() == id {
                break;
            }
        }
        component.sort_by_key(|r| self.position.get(r.id()).copied().unwrap_or(usize::MAX));
        self.order.extend(component.into_iter().cloned());
    }
}

/// The installed resource `resource` can replace in place, if any.
///
/// Candidates are installed resources with the same symbolic name but a
/// different id, tried in order. One qualifies when the new version still
/// satisfies everything it satisfies among `installed` and among
/// `deploying`. Installed resources that are themselves being deployed are
/// never replaced.
pub fn find_updatable(
    resource: &Resource,
    installed: &[Arc<Resource>],
    deploying: &[Arc<Resource>],
) -> Option<Arc<Resource>> {
    installed
        .iter()
        .filter(|old| old.symbolic_name() == resource.symbolic_name())
        .filter(|old| old.id() != resource.id())
        .filter(|old| !deploying.iter().any(|r| r.id() == old.id()))
        .find(|old| {
            is_updatable(old, resource, installed) && is_updatable(old, resource, deploying)
        })
        .cloned()
}

/// Whether `new` satisfies every requirement of `resources` that `old`
/// satisfies. Requirements of `old` itself are not considered.
pub fn is_updatable(old: &Resource, new: &Resource, resources: &[Arc<Resource>]) -> bool {
    resources
        .iter()
        .filter(|r| r.id() != old.id())
        .flat_map(|r| r.requirements())
        .filter(|requirement| old.satisfies(requirement))
        .all(|requirement| new.satisfies(requirement))
}

/// Install (and optionally start) `order` one resource at a time.
///
/// Installed resources are skipped, fragments are never started and a
/// failure never stops the loop. A resource keyed in `updates` replaces the
/// installed resource it maps to.
pub(crate) fn run<I: Installer>(
    order: &[Arc<Resource>],
    updates: &HashMap<ResourceId, Arc<Resource>>,
    installer: &mut I,
    start: bool,
    reporter: &dyn Reporter,
) -> DeploymentReport {
    let started_at = Instant::now();
    let mut report = DeploymentReport::default();
    reporter.section("Deploying");

    for resource in order {
        if resource.is_local() {
            tracing::debug!("{resource} is already installed");
            reporter.skipped(resource, "already installed");
            report.skipped.push(Arc::clone(resource));
            continue;
        }

        reporter.installing(resource);
        let replaces = updates.get(resource.id());
        let outcome = match replaces {
            Some(old) => {
                tracing::info!("Updating {old} to {resource}");
                installer.update(old, resource)
            }
            None => installer.install(resource),
        };
        let handle = match outcome {
            Ok(handle) => handle,
            Err(error) => {
                tracing::warn!("{error}");
                reporter.failed(resource, &error.to_string());
                report.failures.push(DeploymentFailure {
                    resource: Arc::clone(resource),
                    error,
                });
                continue;
            }
        };
        if replaces.is_some() {
            report.updated.push(Arc::clone(resource));
        } else {
            report.installed.push(Arc::clone(resource));
        }

        let mut started = false;
        if start && !resource.is_fragment() {
            match installer.start(&handle) {
                Ok(()) => {
                    started = true;
                    report.started.push(Arc::clone(resource));
                }
                Err(error) => {
                    tracing::warn!("{error}");
                    reporter.failed(resource, &error.to_string());
                    report.failures.push(DeploymentFailure {
                        resource: Arc::clone(resource),
                        error,
                    });
                    continue;
                }
            }
        }
        reporter.done(resource, started);
    }

    tracing::info!(
        "Deployed {} resources ({} updated, {} started, {} skipped, {} failed)",
        report.installed.len(),
        report.updated.len(),
        report.started.len(),
        report.skipped.len(),
        report.failures.len()
    );
    reporter.summary(
        report.installed.len() + report.updated.len(),
        "deployed",
        started_at.elapsed().as_secs_f64(),
    );
    report
}
