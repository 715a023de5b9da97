//! The Safest-Path Pathfinder - A* over the 8-connected cell grid.
//!
//! Edge cost into a cell is the step length (1 orthogonal, sqrt(2) diagonal)
//! times a crowd penalty tiered on that cell's occupancy. Full cells cost
//! 1000x an empty one, which steers routes around them while still letting
//! the search cross one as a last resort.
//!
//! The Euclidean heuristic is not strictly admissible once penalties are in
//! play, so routes are good rather than provably optimal. Search is capped;
//! when the cap is hit the route degrades to a straight line.

use crate::density::OccupancyMap;
use crate::grid::{CellId, GeoPoint};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use tracing::warn;

/// Default cap on node expansions per search.
pub const MAX_ITERATIONS: usize = 500;

/// Penalty for entering an empty cell.
pub const PENALTY_EMPTY: f64 = 1.0;

/// Penalty for entering an occupied cell below the crowd limit.
pub const PENALTY_BUSY: f64 = 50.0;

/// Penalty for entering a cell at or above the crowd limit.
pub const PENALTY_FULL: f64 = 1000.0;

/// Crowd penalty for stepping into a cell with `occupancy` people.
#[inline]
pub fn penalty(occupancy: usize, crowd_limit: usize) -> f64 {
    if occupancy == 0 {
        PENALTY_EMPTY
    } else if occupancy < crowd_limit {
        PENALTY_BUSY
    } else {
        PENALTY_FULL
    }
}

/// How a path was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathOutcome {
    /// Start and goal share a cell; no search ran
    SameCell,
    /// A* reached the goal
    Found,
    /// Expansion cap reached; straight line from start to goal
    Fallback,
}

/// A route from the request's start point to its goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafePath {
    /// Polyline; first and last points are the literal start and goal
    pub points: Vec<GeoPoint>,

    /// Cells visited, start to goal (empty for same-cell and fallback routes)
    pub cells: Vec<CellId>,

    /// Accumulated penalty-weighted cost (0 unless `Found`)
    pub cost: f64,

    pub outcome: PathOutcome,

    /// Nodes expanded during the search
    pub expansions: usize,
}

impl SafePath {
    fn straight(start: GeoPoint, goal: GeoPoint, outcome: PathOutcome, expansions: usize) -> Self {
        Self {
            points: vec![start, goal],
            cells: Vec::new(),
            cost: 0.0,
            outcome,
            expansions,
        }
    }

    /// True if the route passes through `cell`.
    pub fn visits(&self, cell: CellId) -> bool {
        self.cells.contains(&cell)
    }
}

/// Entry in the open set, ordered so that `BinaryHeap` pops the lowest f first.
#[derive(Debug, Clone, Copy)]
struct OpenNode {
    f: f64,
    cell: CellId,
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.cell.cmp(&self.cell))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

/// Weighted-grid A* biased away from dense cells.
#[derive(Debug, Clone)]
pub struct SafestPathFinder {
    max_iterations: usize,
}

impl Default for SafestPathFinder {
    fn default() -> Self {
        Self::new(MAX_ITERATIONS)
    }
}

impl SafestPathFinder {
    pub fn new(max_iterations: usize) -> Self {
        Self { max_iterations }
    }

    /// Compute the safest route from `start` to `goal`.
    ///
    /// Never fails: same-cell requests return the two endpoints, and an
    /// exhausted search returns a straight line (logged as a warning).
    pub fn find_path(
        &self,
        start: GeoPoint,
        goal: GeoPoint,
        occupancy: &OccupancyMap,
        crowd_limit: usize,
    ) -> SafePath {
        let start_cell = start.cell();
        let goal_cell = goal.cell();

        if start_cell == goal_cell {
            return SafePath::straight(start, goal, PathOutcome::SameCell, 0);
        }

        let mut g_score: HashMap<CellId, f64> = HashMap::new();
        let mut came_from: HashMap<CellId, CellId> = HashMap::new();
        let mut closed: HashSet<CellId> = HashSet::new();
        let mut open: BinaryHeap<OpenNode> = BinaryHeap::new();

        g_score.insert(start_cell, 0.0);
        open.push(OpenNode {
            f: start_cell.grid_distance(&goal_cell),
            cell: start_cell,
        });

        let mut expansions = 0;

        while let Some(OpenNode { cell: current, .. }) = open.pop() {
            if !closed.insert(current) {
                continue;
            }

            if current == goal_cell {
                let cost = g_score.get(&goal_cell).copied().unwrap_or(0.0);
                return Self::reconstruct(start, goal, start_cell, goal_cell, &came_from, cost, expansions);
            }

            if expansions >= self.max_iterations {
                break;
            }
            expansions += 1;

            let current_g = g_score.get(&current).copied().unwrap_or(f64::INFINITY);

            for (neighbor, step) in current.neighbors8() {
                if closed.contains(&neighbor) {
                    continue;
                }

                let tentative = current_g + step * penalty(occupancy.get(neighbor), crowd_limit);
                if tentative < g_score.get(&neighbor).copied().unwrap_or(f64::INFINITY) {
                    g_score.insert(neighbor, tentative);
                    came_from.insert(neighbor, current);
                    open.push(OpenNode {
                        f: tentative + neighbor.grid_distance(&goal_cell),
                        cell: neighbor,
                    });
                }
            }
        }

        warn!(
            "No path from {} to {} within {} expansions; falling back to a straight line",
            start_cell, goal_cell, self.max_iterations
        );
        SafePath::straight(start, goal, PathOutcome::Fallback, expansions)
    }

    /// Walk predecessors back from the goal and pin the literal endpoints.
    fn reconstruct(
        start: GeoPoint,
        goal: GeoPoint,
        start_cell: CellId,
        goal_cell: CellId,
        came_from: &HashMap<CellId, CellId>,
        cost: f64,
        expansions: usize,
    ) -> SafePath {
        let mut cells = vec![goal_cell];
        let mut cursor = goal_cell;
        while cursor != start_cell {
            match came_from.get(&cursor) {
                Some(prev) => {
                    cells.push(*prev);
                    cursor = *prev;
                }
                None => break,
            }
        }
        cells.reverse();

        let mut points: Vec<GeoPoint> = cells.iter().map(|c| c.center()).collect();
        if let Some(first) = points.first_mut() {
            *first = start;
        }
        if let Some(last) = points.last_mut() {
            *last = goal;
        }

        SafePath {
            points,
            cells,
            cost,
            outcome: PathOutcome::Found,
            expansions,
        }
    }
}
