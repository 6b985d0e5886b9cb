//! `obr list`

use super::Session;
use crate::ui;
use anyhow::Result;
use obr_schema::{Resource, ResourceId};
use std::collections::HashSet;
use std::sync::Arc;

/// List resources, optionally filtered by a case-insensitive query on name,
/// presentation name or category.
pub fn list(session: &Session, query: Option<&str>) -> Result<()> {
    let needle = query.map(str::to_lowercase);
    let mut seen: HashSet<ResourceId> = HashSet::new();
    let mut resources: Vec<Arc<Resource>> = Vec::new();

    for repository in session.registry.repositories() {
        for resource in repository.resources() {
            if needle.as_deref().is_some_and(|n| !matches(resource, n)) {
                continue;
            }
            if seen.insert(resource.id().clone()) {
                resources.push(Arc::clone(resource));
            }
        }
    }

    if resources.is_empty() {
        println!();
        match query {
            Some(query) => println!("  No resources match '{query}'."),
            None => println!("  No resources available."),
        }
        return Ok(());
    }

    resources.sort_by(|a, b| {
        a.symbolic_name()
            .cmp(b.symbolic_name())
            .then_with(|| b.version().cmp(a.version()))
    });

    let mut table = ui::table(&["Name", "Version", "Title", "Categories"]);
    for resource in &resources {
        let name = if resource.is_local() {
            format!("{} *", resource.symbolic_name())
        } else {
            resource.symbolic_name().to_string()
        };
        table.add_row(vec![
            name,
            resource.version().to_string(),
            resource.presentation_name().to_string(),
            resource.categories().join(", "),
        ]);
    }
    println!("{table}");
    println!("{} resource(s); * = installed", resources.len());
    Ok(())
}

fn matches(resource: &Resource, needle: &str) -> bool {
    resource.symbolic_name().to_lowercase().contains(needle)
        || resource.presentation_name().to_lowercase().contains(needle)
        || resource
            .categories()
            .iter()
            .any(|c| c.to_lowercase().contains(needle))
}
