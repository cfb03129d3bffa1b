//! Example demonstrating views over a shared container.
//!
//! This example shows how to:
//! - Project prefixes of a container into views
//! - Keep several views in sync through one container
//! - Freeze a view and bring it back up to date
//! - Derive view prefixes from types
//!
//! Run with: cargo run --example vehicle_views

use dotstore::core::type_dotkey;
use dotstore::prelude::*;
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct Engine {
    cylinders: u8,
    fuel: String,
}

struct Vehicle;

impl Scoped for Vehicle {}

struct Truck;

impl Scoped for Truck {
    fn bases() -> Vec<String> {
        vec![type_dotkey::<Vehicle>()]
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== Vehicle Views Example ===\n");

    let container = Container::from_value(json!({
        "engine": {"cylinders": 4, "fuel": "petrol"},
        "chassis": {"wheels": 4, "mass": 1200},
    }))?;

    let engine = View::new(&container, ["engine"])?;
    let everything = View::new(&container, ["engine", "chassis"])?;
    println!("Engine view:   {:?}", engine.snapshot());
    println!("Combined view: {:?}\n", everything.snapshot());

    println!("Writing cylinders = 6 through the combined view...");
    everything.set("cylinders", 6)?;
    let typed: Engine = engine.extract()?;
    println!("Engine view now sees: {:?}\n", typed);

    println!("Freezing the engine view and switching fuel...");
    engine.set_live(false)?;
    container.set("engine.fuel", "diesel")?;
    println!("  frozen fuel:    {}", engine.get("fuel")?);
    println!("  container fuel: {}", container.get("engine.fuel")?);
    engine.set_live(true)?;
    println!("  after thaw:     {}\n", engine.get("fuel")?);

    println!("Views keyed by type:");
    container.set(&format!("{}.wheels", type_dotkey::<Vehicle>()), 4)?;
    container.set(&format!("{}.payload_kg", type_dotkey::<Truck>()), 8000)?;
    let truck = View::for_type::<Truck>(&container)?;
    println!("  prefixes: {:?}", truck.prefixes());
    println!("  values:   {:?}", truck.snapshot());

    println!("\n=== Example Complete ===");
    Ok(())
}
