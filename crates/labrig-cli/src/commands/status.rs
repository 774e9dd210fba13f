use super::{colorize_node, json_pretty, EXIT_SUCCESS};
use labrig_core::Engine;

pub fn run(engine: &Engine, json: bool) -> Result<u8, String> {
    let status = engine.status().map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&status)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("lab:         {}", status.name);
    println!(
        "deployed_at: {}",
        status.deployed_at.as_deref().unwrap_or("(never)")
    );
    println!(
        "topology:    {}",
        if status.stale { "stale" } else { "current" }
    );
    for node in &status.expected {
        let running = status.running.contains(node);
        println!("  {}", colorize_node(node, running));
    }
    Ok(EXIT_SUCCESS)
}
