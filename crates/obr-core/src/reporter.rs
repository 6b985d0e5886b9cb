//! Reporter trait for dependency injection
//!
//! Deploy reports progress through this trait so the core stays independent
//! of how (or whether) the front end renders it.

use obr_schema::Resource;

/// Receives deploy progress events.
pub trait Reporter: Send + Sync {
    /// A new phase has started (e.g. "Deploying").
    fn section(&self, title: &str);

    /// A resource is about to be installed.
    fn installing(&self, resource: &Resource);

    /// A resource was installed, and started when `started` is set.
    fn done(&self, resource: &Resource, started: bool);

    /// A resource was left alone, with the reason why.
    fn skipped(&self, resource: &Resource, reason: &str);

    /// Installing or starting a resource failed.
    fn failed(&self, resource: &Resource, reason: &str);

    /// Final summary of the deploy.
    fn summary(&self, count: usize, action: &str, elapsed_secs: f64);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn installing(&self, resource: &Resource) {
        (**self).installing(resource);
    }
    fn done(&self, resource: &Resource, started: bool) {
        (**self).done(resource, started);
    }
    fn skipped(&self, resource: &Resource, reason: &str) {
        (**self).skipped(resource, reason);
    }
    fn failed(&self, resource: &Resource, reason: &str) {
        (**self).failed(resource, reason);
    }
    fn summary(&self, count: usize, action: &str, elapsed_secs: f64) {
        (**self).summary(count, action, elapsed_secs);
    }
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn installing(&self, _: &Resource) {}
    fn done(&self, _: &Resource, _: bool) {}
    fn skipped(&self, _: &Resource, _: &str) {}
    fn failed(&self, _: &Resource, _: &str) {}
    fn summary(&self, _: usize, _: &str, _: f64) {}
}
