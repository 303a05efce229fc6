//! Strategy listing command

use anyhow::Result;

use deep_signal::strategies::{available_strategies, create_strategy};

pub fn run() -> Result<()> {
    println!("\nAvailable strategies:\n");
    for info in available_strategies() {
        let min_candles = create_strategy(&info.name)
            .map(|s| s.min_candles())
            .unwrap_or_default();
        println!(
            "  {:<20} {} (needs {} candles)",
            info.name, info.description, min_candles
        );
    }
    println!();
    Ok(())
}
