//! `obr resolve`

use super::Session;
use crate::ui;
use anyhow::{Result, bail};

/// Resolve and print the outcome. Fails when mandatory requirements stay
/// unsatisfied.
pub fn resolve(
    session: &Session,
    targets: &[String],
    requirements: &[String],
    no_optional: bool,
) -> Result<()> {
    let mut resolver = session.resolver(targets, requirements)?;
    let resolved = resolver.resolve_with(&session.options(no_optional));

    ui::print_resolution(&resolver);
    if !resolved {
        bail!(
            "Unable to resolve: {} unsatisfied requirement(s)",
            resolver.unsatisfied_requirements().len()
        );
    }
    Ok(())
}
