//! Example demonstrating scoped overrides.
//!
//! This example shows how to:
//! - Temporarily replace values for the length of a scope
//! - Nest overrides
//! - Rely on restoration when a scope fails
//! - Write code generic over any `Store`
//!
//! Run with: cargo run --example scoped_overrides

use dotstore::prelude::*;
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn top_speed<S: Store>(store: &S) -> Result<f64> {
    let power: f64 = store.get_as("engine.power_kw")?;
    let drag: f64 = store.get_as("body.drag")?;
    Ok((power / drag).cbrt() * 10.0)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== Scoped Override Example ===\n");

    let container = Container::from_value(json!({
        "engine": {"power_kw": 90.0},
        "body": {"drag": 0.3},
    }))?;
    println!("Baseline top speed: {:.1}", top_speed(&container)?);

    {
        let _tuned = container.context([("engine.power_kw", 150.0)])?;
        println!("Tuned top speed:    {:.1}", top_speed(&container)?);
        {
            let _sleek = container.context([("body.drag", 0.22)])?;
            println!("Tuned and sleek:    {:.1}", top_speed(&container)?);
        }
        println!("Tuned again:        {:.1}", top_speed(&container)?);
    }
    println!("Back to baseline:   {:.1}\n", top_speed(&container)?);

    println!("Overriding a key that does not exist...");
    match container.context([("engine.torque", 300)]) {
        Err(e) => println!("  rejected: {}", e),
        Ok(_) => println!("  unexpectedly accepted"),
    }

    println!("\nFailing inside an override...");
    let overrides: FlatMap = [("body.drag".to_string(), json!(0.0))].into_iter().collect();
    let result = container.with_context(overrides, |store| {
        let speed = top_speed(store)?;
        if speed.is_infinite() {
            return Err(StoreError::InvalidInput("drag must be positive".to_string()));
        }
        Ok(speed)
    });
    println!("  result: {:?}", result.map_err(|e| e.to_string()));
    println!("  drag restored to {}", container.get("body.drag")?);

    println!("\n=== Example Complete ===");
    Ok(())
}
