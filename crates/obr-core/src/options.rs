//! Knobs that change how a resolve searches and selects providers.

use obr_schema::RepositoryKind;
use serde::{Deserialize, Serialize};

/// Resolve flags, also read from the `[resolve]` table of `obr.toml`.
///
/// # Example
///
/// ```
/// use obr_core::ResolveOptions;
///
/// let options: ResolveOptions = toml::from_str("no-optional = true").unwrap();
/// assert!(options.no_optional);
/// assert!(!options.no_local);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ResolveOptions {
    /// Ignore optional requirements entirely.
    pub no_optional: bool,
    /// Do not search local (installed) repositories.
    pub no_local: bool,
    /// Do not search the system repository.
    pub no_system: bool,
    /// Rank installed providers like any other when breaking ties.
    pub do_not_prefer_local: bool,
}

impl ResolveOptions {
    /// Whether repositories of `kind` are searched.
    pub fn searches(&self, kind: RepositoryKind) -> bool {
        match kind {
            RepositoryKind::Remote => true,
            RepositoryKind::Local => !self.no_local,
            RepositoryKind::System => !self.no_system,
        }
    }
}
