use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Statistics {
    pub total_moves: usize,
    pub num_obstacles: usize,
    pub num_walls: usize,
    pub route_efficiency: f64,
    pub optimal_path_length: usize,
    pub replans: usize,
}

impl Statistics {
    pub fn new(num_walls: usize, num_obstacles: usize, optimal_path_length: usize) -> Self {
        Statistics {
            total_moves: 0,
            num_obstacles,
            num_walls,
            route_efficiency: 0.0,
            optimal_path_length,
            replans: 0,
        }
    }

    /// Fraction of the pre-obstacle optimal length the agent actually
    /// walked off: 1.0 means it never detoured, 0.5 means it took twice
    /// the shortest route. Undefined (reported as 0.0) until the agent
    /// has taken at least one step.
    pub fn calculate_efficiency(&mut self) {
        self.route_efficiency = if self.total_moves > 0 && self.optimal_path_length > 0 {
            self.optimal_path_length as f64 / self.total_moves as f64
        } else {
            0.0
        };
    }

    fn detour_moves(&self) -> i64 {
        self.total_moves as i64 - self.optimal_path_length as i64
    }

    fn replans_per_move(&self) -> f64 {
        if self.total_moves == 0 {
            0.0
        } else {
            self.replans as f64 / self.total_moves as f64
        }
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: [(&str, String); 7] = [
            ("moves taken", self.total_moves.to_string()),
            ("shortest possible", self.optimal_path_length.to_string()),
            ("detour", format!("{:+}", self.detour_moves())),
            ("walls", self.num_walls.to_string()),
            ("obstacles per cycle", self.num_obstacles.to_string()),
            ("replans", format!("{} ({:.2} per move)", self.replans, self.replans_per_move())),
            ("efficiency", format!("{:.1}%", self.route_efficiency * 100.0)),
        ];
        let label_width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
        for (i, (label, value)) in rows.iter().enumerate() {
            if i + 1 == rows.len() {
                write!(f, "{label:>label_width$}: {value}")?;
            } else {
                writeln!(f, "{label:>label_width$}: {value}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimingData {
    pub plan_times: Vec<Duration>,
}

impl TimingData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn average_plan_time(&self) -> Duration {
        if self.plan_times.is_empty() {
            Duration::from_nanos(0)
        } else {
            self.plan_times.iter().sum::<Duration>() / self.plan_times.len() as u32
        }
    }

    pub fn total_calls(&self) -> usize {
        self.plan_times.len()
    }
}
