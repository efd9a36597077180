//! Drives `mpl_core::plan` against a [`GridEnvironment`] whose obstacle
//! layout changes on a timeline, exercising the incremental maintenance
//! API (`increase_cost`/`decrease_cost`/`get_sub_state_space`) the way a
//! real embedder would rather than replanning from scratch every step.

use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};

use mpl_core::{Algorithm, Environment, PlanOutcome, StateSpace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Config;
use crate::grid::{Cell, Grid, GridEnvironment, Position};
use crate::statistics::{Statistics, TimingData};

struct ObstacleGroup {
    positions: HashSet<Position>,
    cycles_remaining: usize,
}

pub struct Simulation {
    env: GridEnvironment,
    sss: StateSpace<Position>,
    config: Config,
    agent: Position,
    optimal_path_length: usize,
    active_groups: Vec<ObstacleGroup>,
    cycles_since_last_obstacle: usize,
    current_obstacle_cycle: usize,
    obstacle_timeline: Vec<HashSet<Position>>,
    algorithm: Algorithm,
}

impl Simulation {
    pub fn new(config: Config) -> Result<Self, String> {
        let mut rng = match config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let grid = Grid::new(config.grid_size, config.num_walls, &mut rng);
        let start = grid.start;
        let goal = grid.goal;
        let env = GridEnvironment::new(grid);

        let optimal_path_length = Self::shortest_path_length(&env, start, config.eps);
        if optimal_path_length.is_none() {
            return Err(format!(
                "no valid path exists from {:?} to {:?} with {} walls",
                start, goal, config.num_walls
            ));
        }

        let obstacle_timeline =
            Self::build_obstacle_timeline(&env, &mut rng, &config, start, goal);

        let algorithm = match config.algorithm.as_str() {
            "astar" => Algorithm::Astar,
            "lpastar" => Algorithm::LPAstar,
            other => return Err(format!("unknown algorithm '{other}'")),
        };

        Ok(Simulation {
            env,
            sss: StateSpace::new(config.eps, 1.0),
            config,
            agent: start,
            optimal_path_length: optimal_path_length.unwrap(),
            active_groups: Vec::new(),
            cycles_since_last_obstacle: 0,
            current_obstacle_cycle: 0,
            obstacle_timeline,
            algorithm,
        })
    }

    fn shortest_path_length(env: &GridEnvironment, start: Position, eps: f64) -> Option<usize> {
        let mut sss = StateSpace::new(eps, 1.0);
        let start_key = env.with_grid(|g| g.key_of(start));
        let (outcome, _) = mpl_core::plan(Algorithm::Astar, start, start_key, env, &mut sss, 0, 0.0);
        match outcome {
            PlanOutcome::Found { trajectory, .. } => Some(trajectory.len()),
            PlanOutcome::Infeasible => None,
        }
    }

    fn build_obstacle_timeline(
        env: &GridEnvironment,
        rng: &mut StdRng,
        config: &Config,
        start: Position,
        goal: Position,
    ) -> Vec<HashSet<Position>> {
        let max_cycles = config.grid_size * config.grid_size;
        let num_cycles = (max_cycles / config.obstacle_cycle_interval.max(1)).max(1);
        let mut timeline = Vec::new();

        env.with_grid(|grid| {
            for _ in 0..num_cycles {
                let mut group = HashSet::new();
                let mut attempts = 0;
                let max_attempts = config.num_obstacles * 10;
                while group.len() < config.num_obstacles && attempts < max_attempts {
                    let x = rng.gen_range(0..config.grid_size);
                    let y = rng.gen_range(0..config.grid_size);
                    let pos = Position { x, y };
                    if pos != start
                        && pos != goal
                        && grid.cells[x][y] == Cell::Empty
                        && !group.contains(&pos)
                    {
                        group.insert(pos);
                    }
                    attempts += 1;
                }
                timeline.push(group);
            }
        });

        timeline
    }

    /// Advances the obstacle lifecycle by one cycle, returning the cells
    /// that became blocked and the cells that became free this cycle.
    fn step_obstacles(&mut self) -> (Vec<Position>, Vec<Position>) {
        let mut newly_blocked = Vec::new();
        let mut newly_freed = Vec::new();

        self.cycles_since_last_obstacle += 1;

        let mut expired = Vec::new();
        for (i, group) in self.active_groups.iter_mut().enumerate() {
            group.cycles_remaining = group.cycles_remaining.saturating_sub(1);
            if group.cycles_remaining == 0 {
                expired.push(i);
            }
        }
        for &i in expired.iter().rev() {
            let group = self.active_groups.remove(i);
            self.env.with_grid_mut(|grid| {
                for &pos in &group.positions {
                    grid.cells[pos.x][pos.y] = Cell::Empty;
                }
            });
            newly_freed.extend(group.positions);
        }

        if self.cycles_since_last_obstacle >= self.config.obstacle_cycle_interval
            && self.current_obstacle_cycle < self.obstacle_timeline.len()
        {
            let candidates = self.obstacle_timeline[self.current_obstacle_cycle].clone();
            self.current_obstacle_cycle += 1;
            self.cycles_since_last_obstacle = 0;

            let mut placed = HashSet::new();
            self.env.with_grid_mut(|grid| {
                for &pos in &candidates {
                    if pos != self.agent && pos != grid.start && pos != grid.goal && grid.cells[pos.x][pos.y] == Cell::Empty {
                        grid.cells[pos.x][pos.y] = Cell::Obstacle;
                        placed.insert(pos);
                    }
                }
            });
            if !placed.is_empty() {
                newly_blocked.extend(placed.iter().copied());
                self.active_groups.push(ObstacleGroup {
                    positions: placed,
                    cycles_remaining: self.config.obstacle_persistence_cycles,
                });
            }
        }

        (newly_blocked, newly_freed)
    }

    /// Translates cell-level obstacle changes into edge-level
    /// `increase_cost`/`decrease_cost` calls against every already-known
    /// neighbor of the affected cell.
    fn apply_cell_changes(&mut self, blocked: &[Position], freed: &[Position]) {
        const DIRS: [(i64, i64); 4] = [(0, -1), (0, 1), (1, 0), (-1, 0)];

        for &cell in blocked {
            let key = self.env.with_grid(|g| g.key_of(cell));
            let Some(idx) = self.sss.get(key) else { continue };
            let mut affected = Vec::new();
            for (dx, dy) in DIRS {
                let nx = cell.x as i64 + dx;
                let ny = cell.y as i64 + dy;
                if nx < 0 || ny < 0 {
                    continue;
                }
                let neighbor_key = self.env.with_grid(|g| {
                    if (nx as usize) < g.size && (ny as usize) < g.size {
                        Some(g.key_of(Position { x: nx as usize, y: ny as usize }))
                    } else {
                        None
                    }
                });
                let Some(neighbor_key) = neighbor_key else { continue };
                if let Some(pos) = self.sss.node(idx).pred_hashkey.iter().position(|&k| k == neighbor_key) {
                    affected.push((key, pos));
                }
            }
            let diagnostics = self.sss.increase_cost(&affected);
            for d in diagnostics {
                log::warn!("{d}");
            }
        }

        for &cell in freed {
            let key = self.env.with_grid(|g| g.key_of(cell));
            let Some(idx) = self.sss.get(key) else { continue };
            let mut affected = Vec::new();
            for (dx, dy) in DIRS {
                let nx = cell.x as i64 + dx;
                let ny = cell.y as i64 + dy;
                if nx < 0 || ny < 0 {
                    continue;
                }
                let neighbor_key = self.env.with_grid(|g| {
                    if (nx as usize) < g.size && (ny as usize) < g.size {
                        Some(g.key_of(Position { x: nx as usize, y: ny as usize }))
                    } else {
                        None
                    }
                });
                let Some(neighbor_key) = neighbor_key else { continue };
                if let Some(pos) = self.sss.node(idx).pred_hashkey.iter().position(|&k| k == neighbor_key) {
                    affected.push((key, pos));
                }
            }
            let diagnostics = self.sss.decrease_cost(&affected, &self.env);
            for d in diagnostics {
                log::warn!("{d}");
            }
        }
    }

    pub fn run(&mut self) -> Statistics {
        let mut stats = Statistics::new(self.config.num_walls, self.config.num_obstacles, self.optimal_path_length);
        let mut timing = TimingData::new();
        let max_iterations = self.config.grid_size * self.config.grid_size * 4;
        let mut iterations = 0;
        let mut stuck_attempts = 0;
        const MAX_STUCK_ATTEMPTS: usize = 5;

        loop {
            if self.env.is_goal(&self.agent) {
                break;
            }
            if iterations >= max_iterations {
                log::warn!("reached max iterations, stopping");
                break;
            }

            let (blocked, freed) = self.step_obstacles();
            if !blocked.is_empty() || !freed.is_empty() {
                self.apply_cell_changes(&blocked, &freed);
            }

            let start_key = self.env.with_grid(|g| g.key_of(self.agent));
            let plan_start = Instant::now();
            let (outcome, diagnostics) = mpl_core::plan(
                self.algorithm,
                self.agent,
                start_key,
                &self.env,
                &mut self.sss,
                self.config.max_expand,
                0.0,
            );
            timing.plan_times.push(plan_start.elapsed());
            for d in diagnostics {
                log::warn!("{d}");
            }

            match outcome {
                PlanOutcome::Found { trajectory, .. } if !trajectory.is_empty() => {
                    stuck_attempts = 0;
                    stats.replans += 1;
                    let next = trajectory[0].to;
                    self.agent = next;
                    stats.total_moves += 1;
                    self.sss.get_sub_state_space(1);

                    if !self.config.no_visualization {
                        self.report_step(iterations, &stats);
                        thread::sleep(Duration::from_millis(self.config.delay_ms));
                    }
                }
                PlanOutcome::Found { .. } => break, // already at the goal
                PlanOutcome::Infeasible => {
                    stuck_attempts += 1;
                    if !self.config.quiet {
                        log::warn!("no path found, waiting (attempt {stuck_attempts}/{MAX_STUCK_ATTEMPTS})");
                    }
                    if stuck_attempts > MAX_STUCK_ATTEMPTS {
                        log::error!("agent permanently stuck");
                        break;
                    }
                }
            }

            iterations += 1;
        }

        stats.calculate_efficiency();
        if !self.config.quiet {
            let issues = self.sss.check_validation();
            if !issues.is_empty() {
                log::warn!("check_validation reported {} issue(s) at shutdown", issues.len());
            }
            println!("Average plan() time: {:.2?}", timing.average_plan_time());
            println!("Total plan() calls: {}", timing.total_calls());
        }
        stats
    }

    fn report_step(&self, iteration: usize, stats: &Statistics) {
        println!(
            "step {iteration} | moves {} | agent {:?} | goal {:?}",
            stats.total_moves,
            self.agent,
            self.env.with_grid(|g| g.goal)
        );
        self.env.with_grid(|g| g.print(Some(self.agent)));
    }
}
