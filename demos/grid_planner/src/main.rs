mod config;
mod grid;
mod simulation;
mod statistics;

use clap::Parser;

use config::Config;
use simulation::Simulation;

fn main() {
    env_logger::init();
    let config = Config::parse();

    println!("Starting grid_planner demo...");
    println!("Grid size: {}x{}", config.grid_size, config.grid_size);
    println!("Walls: {}, Obstacles per cycle: {}", config.num_walls, config.num_obstacles);
    println!("Algorithm: {}", config.algorithm);

    if config.no_visualization {
        println!("Visualization disabled - running in fast mode");
    } else {
        println!("Visualization enabled with {}ms delay", config.delay_ms);
    }
    println!();

    match Simulation::new(config.clone()) {
        Ok(mut sim) => {
            let stats = sim.run();
            println!("\n=== FINAL RESULTS ===");
            println!("{}", stats);
        }
        Err(e) => {
            eprintln!("Failed to set up simulation: {e}");
            std::process::exit(1);
        }
    }
}
