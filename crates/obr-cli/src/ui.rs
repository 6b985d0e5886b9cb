//! Terminal output: tables, resolution summaries and deploy progress.

use comfy_table::{ContentArrangement, Table, presets};
use obr_core::{Reporter, Resolver, Unsatisfied};
use obr_schema::Resource;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A table with the workspace's common styling.
pub fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_BORDERS_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.iter().copied());
    table
}

fn heading(title: &str) {
    println!("{title}");
    println!("{}", "-".repeat(title.len()));
}

fn resource_list(title: &str, resources: &[Arc<Resource>]) {
    if resources.is_empty() {
        return;
    }
    heading(title);
    for resource in resources {
        println!("   {resource}");
    }
    println!();
}

/// Print the outcome of a resolve: targets, required and optional
/// resources, then unsatisfied requirements grouped with their dependents.
pub fn print_resolution(resolver: &Resolver) {
    resource_list("Target resource(s):", resolver.added_resources());
    resource_list("Required resource(s):", resolver.required_resources());
    resource_list("Optional resource(s):", resolver.optional_resources());

    print_unsatisfied("Unsatisfied requirement(s):", resolver.unsatisfied_requirements());
    print_unsatisfied(
        "Discarded optional requirement(s):",
        resolver.discarded_optional(),
    );
}

fn print_unsatisfied(title: &str, entries: &[Unsatisfied]) {
    if entries.is_empty() {
        return;
    }
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entry in entries {
        grouped
            .entry(entry.requirement.to_string())
            .or_default()
            .push(entry.dependent.to_string());
    }

    heading(title);
    for (requirement, dependents) in grouped {
        println!("   {requirement}");
        for dependent in dependents {
            println!("      {dependent}");
        }
    }
    println!();
}

/// Prints deploy progress line by line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        println!("{title}...");
    }

    fn installing(&self, resource: &Resource) {
        tracing::debug!("Installing {resource}");
    }

    fn done(&self, resource: &Resource, started: bool) {
        if started {
            println!("   installed and started {resource}");
        } else {
            println!("   installed {resource}");
        }
    }

    fn skipped(&self, resource: &Resource, reason: &str) {
        println!("   skipped {resource} ({reason})");
    }

    fn failed(&self, resource: &Resource, reason: &str) {
        eprintln!("   failed {resource}: {reason}");
    }

    fn summary(&self, count: usize, action: &str, elapsed_secs: f64) {
        println!("{count} resource(s) {action} in {elapsed_secs:.2}s");
    }
}
