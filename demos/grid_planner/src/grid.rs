//! The toy domain the demo plans over: a bounded 4-connected grid with
//! walls (fixed) and obstacles (appear and clear on a timeline). This is
//! demonstration glue, not a model of real robot dynamics — every edge
//! costs 1.0 and `dt` is always 1.0.

use std::cell::RefCell;
use std::fmt::Write as _;

use mpl_core::{Environment, Key, SuccessorSet};
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Wall,
    Obstacle,
}

/// A single grid-world move: `from` and `to` are positions, `blocked`
/// reflects the state of the destination cell at the moment the move was
/// re-derived (walls never move; obstacles do).
#[derive(Debug, Clone, Copy)]
pub struct Move {
    pub from: Position,
    pub to: Position,
    pub blocked: bool,
}

pub struct Grid {
    pub size: usize,
    pub cells: Vec<Vec<Cell>>,
    pub start: Position,
    pub goal: Position,
}

impl Grid {
    /// Shuffles the whole board into a random permutation and reads a
    /// layout off the front of it, rather than rejection-sampling
    /// individual cells: a permutation of `size * size` distinct
    /// coordinates can't collide, so there's no attempt cap to tune.
    pub fn new(size: usize, num_walls: usize, rng: &mut impl Rng) -> Self {
        let half = (size / 2).max(1);
        let mut near_quadrant: Vec<Position> = (0..half)
            .flat_map(|x| (0..half).map(move |y| Position { x, y }))
            .collect();
        let mut far_quadrant: Vec<Position> = (size / 2..size)
            .flat_map(|x| (size / 2..size).map(move |y| Position { x, y }))
            .collect();
        near_quadrant.shuffle(rng);
        far_quadrant.shuffle(rng);

        let start = *near_quadrant.first().unwrap_or(&Position { x: 0, y: 0 });
        let goal = far_quadrant
            .iter()
            .find(|p| **p != start)
            .copied()
            .unwrap_or(Position { x: size - 1, y: size - 1 });

        let mut order: Vec<Position> = (0..size)
            .flat_map(|x| (0..size).map(move |y| Position { x, y }))
            .collect();
        order.shuffle(rng);

        let mut cells = vec![vec![Cell::Empty; size]; size];
        let walls = order
            .into_iter()
            .filter(|p| *p != start && *p != goal)
            .take(num_walls);
        for pos in walls {
            cells[pos.x][pos.y] = Cell::Wall;
        }

        Grid { size, cells, start, goal }
    }

    pub fn key_of(&self, pos: Position) -> Key {
        Key::new((pos.y * self.size + pos.x) as i64)
    }

    fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && (x as usize) < self.size && y >= 0 && (y as usize) < self.size
    }

    fn glyph_at(&self, pos: Position, agent: Option<Position>) -> char {
        if Some(pos) == agent {
            'A'
        } else if pos == self.start {
            'S'
        } else if pos == self.goal {
            'G'
        } else {
            match self.cells[pos.x][pos.y] {
                Cell::Wall => '#',
                Cell::Obstacle => 'O',
                Cell::Empty => '.',
            }
        }
    }

    pub fn print(&self, agent: Option<Position>) {
        let header = (0..self.size).fold(String::from("   "), |mut acc, x| {
            let _ = write!(acc, "{:2}", x % 10);
            acc
        });

        let body = (0..self.size)
            .map(|y| {
                (0..self.size).fold(format!("{y:2} "), |mut row, x| {
                    row.push(self.glyph_at(Position { x, y }, agent));
                    row.push(' ');
                    row
                })
            })
            .collect::<Vec<_>>()
            .join("\n");

        println!("Legend: S=Start, G=Goal, A=Agent, #=Wall, O=Obstacle, .=Empty");
        println!("{header}");
        println!("{body}\n");
    }
}

/// The fixed 4-action set every cell expands against: N, S, E, W.
const ACTIONS: [(i64, i64); 4] = [(0, -1), (0, 1), (1, 0), (-1, 0)];

/// Wraps a [`Grid`] behind [`mpl_core::Environment`]. The grid is kept in
/// a `RefCell` because the obstacle lifecycle mutates it between planning
/// calls while the search drivers only ever borrow it immutably.
pub struct GridEnvironment {
    grid: RefCell<Grid>,
    w: f64,
}

impl GridEnvironment {
    pub fn new(grid: Grid) -> Self {
        GridEnvironment { grid: RefCell::new(grid), w: 1.0 }
    }

    pub fn with_grid<R>(&self, f: impl FnOnce(&Grid) -> R) -> R {
        f(&self.grid.borrow())
    }

    pub fn with_grid_mut<R>(&self, f: impl FnOnce(&mut Grid) -> R) -> R {
        f(&mut self.grid.borrow_mut())
    }

    fn neighbor(&self, pos: Position, action_id: usize) -> Option<Position> {
        let (dx, dy) = ACTIONS[action_id];
        let nx = pos.x as i64 + dx;
        let ny = pos.y as i64 + dy;
        let grid = self.grid.borrow();
        if !grid.in_bounds(nx, ny) {
            return None;
        }
        Some(Position { x: nx as usize, y: ny as usize })
    }

    fn cell_free(&self, pos: Position) -> bool {
        let grid = self.grid.borrow();
        grid.cells[pos.x][pos.y] == Cell::Empty || pos == grid.goal || pos == grid.start
    }
}

impl Environment for GridEnvironment {
    type Waypoint = Position;
    type Primitive = Move;

    fn is_goal(&self, wp: &Position) -> bool {
        *wp == self.grid.borrow().goal
    }

    fn get_heur(&self, wp: &Position, _t: f64) -> f64 {
        let goal = self.grid.borrow().goal;
        let dx = (goal.x as i64 - wp.x as i64).unsigned_abs() as f64;
        let dy = (goal.y as i64 - wp.y as i64).unsigned_abs() as f64;
        (dx + dy) * self.w
    }

    fn get_succ(&self, wp: &Position) -> SuccessorSet<Position> {
        let mut out = SuccessorSet::new();
        for action_id in 0..ACTIONS.len() {
            let Some(next) = self.neighbor(*wp, action_id) else { continue };
            if !self.cell_free(next) {
                continue;
            }
            let grid = self.grid.borrow();
            out.push(next, grid.key_of(next), self.w, action_id);
        }
        out
    }

    fn forward_action(&self, wp: &Position, action_id: usize) -> Move {
        let to = self.neighbor(*wp, action_id).unwrap_or(*wp);
        Move { from: *wp, to, blocked: !self.cell_free(to) }
    }

    fn is_free(&self, pr: &Move) -> bool {
        !pr.blocked
    }

    fn action_cost(&self, _pr: &Move) -> f64 {
        self.w
    }

    fn num_actions(&self) -> usize {
        ACTIONS.len()
    }

    fn dt(&self) -> f64 {
        1.0
    }

    fn w(&self) -> f64 {
        self.w
    }

    fn wi(&self) -> usize {
        0
    }
}
