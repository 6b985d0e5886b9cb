//! `obr repos`

use super::Session;
use crate::ui;
use anyhow::Result;

/// List configured repositories in search order.
pub fn repos(session: &Session) -> Result<()> {
    let repositories = session.registry.repositories();
    if repositories.is_empty() {
        println!();
        println!("  No repositories configured.");
        println!("  Add paths to 'repositories' in obr.toml or pass --repository.");
        return Ok(());
    }

    let mut table = ui::table(&["Name", "Kind", "Resources", "Modified", "URI"]);
    for repository in &repositories {
        table.add_row(vec![
            repository.name().to_string(),
            repository.kind().to_string(),
            repository.resources().len().to_string(),
            repository.last_modified().format("%Y-%m-%d %H:%M").to_string(),
            repository.uri().to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
