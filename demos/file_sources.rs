//! Example demonstrating containers loaded from files and the environment.
//!
//! This example shows how to:
//! - Layer defaults, files and environment variables
//! - Reset a container to its loaded values
//! - Reload after the files change
//!
//! Run with: cargo run --example file_sources

use dotstore::prelude::*;
use serde_json::json;
use std::fs;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== File Sources Example ===\n");

    let dir = std::env::temp_dir().join("dotstore-file-sources");
    fs::create_dir_all(&dir)?;
    let path = dir.join("vehicle.yaml");
    fs::write(&path, "engine:\n  cylinders: 4\nchassis:\n  wheels: 4\n")?;

    // VEHICLE_ENGINE__CYLINDERS=8 would override the file
    let container = Container::builder()
        .with_values(json!({"engine": {"fuel": "petrol"}}))
        .with_file(&path)
        .with_env_overrides("VEHICLE", "__")
        .build()?;
    let engine = View::new(&container, ["engine"])?;
    println!("Loaded engine: {:?}", engine.snapshot());

    container.set("engine.cylinders", 12)?;
    println!("After set:     {:?}", engine.snapshot());
    container.reset()?;
    println!("After reset:   {:?}\n", engine.snapshot());

    println!("Rewriting {} and reloading...", path.display());
    fs::write(&path, "engine:\n  cylinders: 6\n  hybrid: true\nchassis:\n  wheels: 4\n")?;
    container.reload()?;
    println!("After reload:  {:?}", engine.snapshot());

    fs::remove_dir_all(&dir)?;
    println!("\n=== Example Complete ===");
    Ok(())
}
