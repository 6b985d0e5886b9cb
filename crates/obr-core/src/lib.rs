//! Resolution engine for the OSGi Bundle Repository.
//!
//! A [`RepositoryRegistry`] holds the repositories to search. A [`Resolver`]
//! takes the resources a caller wants, computes everything they transitively
//! need with a greedy breadth-first walk and deploys the result through an
//! [`Installer`] in dependency order.
//!
//! # Concurrency
//!
//! The registry is shared and guarded by a read-write lock; each resolve
//! searches a snapshot of it. A resolver itself is used by one caller at a
//! time. There is no cancellation: a resolve over a huge repository runs to
//! completion.

pub mod deploy;
pub mod legacy;
pub mod loader;
pub mod options;
pub mod reason;
pub mod registry;
pub mod reporter;
pub mod resolver;

pub use deploy::{DeploymentError, DeploymentFailure, DeploymentReport, Installer};
pub use loader::LoadError;
pub use options::ResolveOptions;
pub use reason::{Reason, Unsatisfied};
pub use registry::{Registration, RepositoryRegistry};
pub use reporter::{NullReporter, Reporter};
pub use resolver::{ResolveError, ResolveState, Resolver};
