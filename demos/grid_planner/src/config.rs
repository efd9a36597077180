use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    #[arg(long, default_value_t = 20)]
    pub grid_size: usize,

    #[arg(long, default_value_t = 50)]
    pub num_walls: usize,

    #[arg(long, default_value_t = 10)]
    pub num_obstacles: usize,

    /// `astar` replans from scratch every call; `lpastar` reuses the
    /// persistent state space and only relaxes what the obstacle
    /// lifecycle actually touched.
    #[arg(long, default_value = "lpastar")]
    pub algorithm: String,

    /// Weighted-A* inflation applied to every node's heuristic.
    #[arg(long, default_value_t = 1.0)]
    pub eps: f64,

    #[arg(long, default_value_t = 0)]
    pub max_expand: i64,

    #[arg(long, default_value_t = 50)]
    pub delay_ms: u64,

    #[arg(long, default_value_t = false)]
    pub no_visualization: bool,

    #[arg(long, default_value_t = false)]
    pub quiet: bool,

    /// Cycles between each new batch of obstacles appearing.
    #[arg(long, default_value_t = 5)]
    pub obstacle_cycle_interval: usize,

    /// How many cycles a placed obstacle group stays before clearing.
    #[arg(long, default_value_t = 5)]
    pub obstacle_persistence_cycles: usize,

    #[arg(long)]
    pub seed: Option<u64>,
}
