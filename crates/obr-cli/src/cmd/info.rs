//! `obr info`

use super::Session;
use anyhow::Result;

/// Print a resource's identity, capabilities and requirements.
pub fn info(session: &Session, spec: &str) -> Result<()> {
    let resource = session.find(spec)?;

    println!("{resource}");
    println!("{}", "-".repeat(resource.to_string().len()));
    println!("   id:            {}", resource.id());
    println!("   symbolic name: {}", resource.symbolic_name());
    println!("   version:       {}", resource.version());
    if !resource.uri().is_empty() {
        println!("   uri:           {}", resource.uri());
    }
    if !resource.categories().is_empty() {
        println!("   categories:    {}", resource.categories().join(", "));
    }
    if resource.is_local() {
        println!("   installed:     yes");
    }

    if !resource.capabilities().is_empty() {
        println!();
        println!("Capabilities:");
        for capability in resource.capabilities() {
            println!("   {capability}");
        }
    }

    if !resource.requirements().is_empty() {
        println!();
        println!("Requirements:");
        for requirement in resource.requirements() {
            let mut flags = Vec::new();
            if requirement.is_optional() {
                flags.push("optional");
            }
            if requirement.is_multiple() {
                flags.push("multiple");
            }
            if requirement.is_extend() {
                flags.push("extend");
            }
            if flags.is_empty() {
                println!("   {}: {}", requirement.name(), requirement.filter());
            } else {
                println!(
                    "   {}: {} [{}]",
                    requirement.name(),
                    requirement.filter(),
                    flags.join(", ")
                );
            }
        }
    }
    Ok(())
}
