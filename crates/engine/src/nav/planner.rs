use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::grid::GridModel;
use crate::geometry::CellCoord;

pub const ORTHOGONAL_STEP_COST: u32 = 10;
pub const DIAGONAL_STEP_COST: u32 = 14;

/// When a diagonal step between two cells is refused because of the two
/// orthogonal cells it squeezes past.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CornerCutting {
    #[default]
    RejectIfBothBlocked,
    RejectIfEitherBlocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PathPlannerConfig {
    pub allow_diagonal: bool,
    pub corner_cutting: CornerCutting,
    pub max_expanded_nodes: usize,
    pub max_path_length: usize,
}

impl Default for PathPlannerConfig {
    fn default() -> Self {
        Self {
            allow_diagonal: false,
            corner_cutting: CornerCutting::RejectIfBothBlocked,
            max_expanded_nodes: 20_000,
            max_path_length: 512,
        }
    }
}

/// Cells from the start (exclusive) to the goal (inclusive).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    cells: Vec<CellCoord>,
}

impl Path {
    pub fn cells(&self) -> &[CellCoord] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn goal(&self) -> Option<CellCoord> {
        self.cells.last().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NoPath {
    #[error("start cell ({}, {}) is not walkable", .0.x, .0.y)]
    StartBlocked(CellCoord),
    #[error("goal cell ({}, {}) is not walkable", .0.x, .0.y)]
    GoalBlocked(CellCoord),
    #[error("search exhausted every reachable cell without reaching the goal")]
    Exhausted,
    #[error("search gave up after expanding more than {limit} nodes")]
    ExpansionLimit { limit: usize },
    #[error("path of {length} steps exceeds the limit of {limit}")]
    TooLong { length: usize, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSearch {
    pub outcome: Result<Path, NoPath>,
    pub expanded_nodes: usize,
}

impl PathSearch {
    fn failed(reason: NoPath, expanded_nodes: usize) -> Self {
        Self {
            outcome: Err(reason),
            expanded_nodes,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathPlanner {
    config: PathPlannerConfig,
}

impl PathPlanner {
    pub fn new(config: PathPlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PathPlannerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: PathPlannerConfig) {
        self.config = config;
    }

    pub fn find_path(&self, grid: &GridModel, start: CellCoord, goal: CellCoord) -> Option<Path> {
        self.search(grid, start, goal).outcome.ok()
    }

    pub fn search(&self, grid: &GridModel, start: CellCoord, goal: CellCoord) -> PathSearch {
        let (Some(start_index), true) = (
            grid.index_of(start.x, start.y),
            grid.is_cell_walkable(start),
        ) else {
            return PathSearch::failed(NoPath::StartBlocked(start), 0);
        };
        let (Some(goal_index), true) =
            (grid.index_of(goal.x, goal.y), grid.is_cell_walkable(goal))
        else {
            return PathSearch::failed(NoPath::GoalBlocked(goal), 0);
        };

        if start == goal {
            return PathSearch {
                outcome: Ok(Path::default()),
                expanded_nodes: 0,
            };
        }

        let node_count = grid.cell_count();
        let mut closed = vec![false; node_count];
        let mut best_g = vec![u32::MAX; node_count];
        let mut parent = vec![None::<usize>; node_count];
        let mut open = BinaryHeap::new();
        let mut next_insertion = 0u64;
        let mut expanded = 0usize;

        let start_h = self.heuristic(start, goal);
        open.push(Reverse(OpenNode {
            cell: start,
            h_cost: start_h,
            f_cost: start_h,
            insertion_order: next_insertion,
        }));
        next_insertion = next_insertion.saturating_add(1);
        best_g[start_index] = 0;

        while let Some(Reverse(current)) = open.pop() {
            let Some(current_index) = grid.index_of(current.cell.x, current.cell.y) else {
                continue;
            };
            if closed[current_index] {
                continue;
            }

            if current_index == goal_index {
                let path = reconstruct_path(grid, &parent, start_index, goal_index);
                return self.finish(path, expanded);
            }

            closed[current_index] = true;
            expanded += 1;
            if expanded > self.config.max_expanded_nodes {
                debug!(
                    limit = self.config.max_expanded_nodes,
                    "path_search_expansion_limit"
                );
                return PathSearch::failed(
                    NoPath::ExpansionLimit {
                        limit: self.config.max_expanded_nodes,
                    },
                    expanded,
                );
            }

            let current_g = best_g[current_index];
            for (neighbor, step_cost) in self.neighbors(grid, current.cell).into_iter().flatten() {
                let Some(neighbor_index) = grid.index_of(neighbor.x, neighbor.y) else {
                    continue;
                };
                if closed[neighbor_index] {
                    continue;
                }

                let tentative_g = current_g.saturating_add(step_cost);
                if tentative_g >= best_g[neighbor_index] {
                    continue;
                }

                best_g[neighbor_index] = tentative_g;
                parent[neighbor_index] = Some(current_index);
                let h_cost = self.heuristic(neighbor, goal);
                open.push(Reverse(OpenNode {
                    cell: neighbor,
                    h_cost,
                    f_cost: tentative_g.saturating_add(h_cost),
                    insertion_order: next_insertion,
                }));
                next_insertion = next_insertion.saturating_add(1);
            }
        }

        PathSearch::failed(NoPath::Exhausted, expanded)
    }

    fn finish(&self, path: Option<Path>, expanded: usize) -> PathSearch {
        let Some(path) = path else {
            return PathSearch::failed(NoPath::Exhausted, expanded);
        };
        if path.len() > self.config.max_path_length {
            return PathSearch::failed(
                NoPath::TooLong {
                    length: path.len(),
                    limit: self.config.max_path_length,
                },
                expanded,
            );
        }
        PathSearch {
            outcome: Ok(path),
            expanded_nodes: expanded,
        }
    }

    fn heuristic(&self, from: CellCoord, to: CellCoord) -> u32 {
        let dx = from.x.abs_diff(to.x);
        let dy = from.y.abs_diff(to.y);
        if self.config.allow_diagonal {
            let (low, high) = if dx < dy { (dx, dy) } else { (dy, dx) };
            ORTHOGONAL_STEP_COST
                .saturating_mul(high)
                .saturating_add((DIAGONAL_STEP_COST - ORTHOGONAL_STEP_COST).saturating_mul(low))
        } else {
            ORTHOGONAL_STEP_COST.saturating_mul(dx.saturating_add(dy))
        }
    }

    fn neighbors(&self, grid: &GridModel, cell: CellCoord) -> [Option<(CellCoord, u32)>; 8] {
        let mut out = [None; 8];
        for (slot, (dx, dy)) in out.iter_mut().zip(ORTHOGONAL_OFFSETS) {
            let next = cell.offset(dx, dy);
            if grid.is_cell_walkable(next) {
                *slot = Some((next, ORTHOGONAL_STEP_COST));
            }
        }

        if !self.config.allow_diagonal {
            return out;
        }

        for (slot, (dx, dy)) in out[4..].iter_mut().zip(DIAGONAL_OFFSETS) {
            let next = cell.offset(dx, dy);
            if !grid.is_cell_walkable(next) {
                continue;
            }
            let side_a_blocked = !grid.is_cell_walkable(cell.offset(dx, 0));
            let side_b_blocked = !grid.is_cell_walkable(cell.offset(0, dy));
            let cuts_corner = match self.config.corner_cutting {
                CornerCutting::RejectIfBothBlocked => side_a_blocked && side_b_blocked,
                CornerCutting::RejectIfEitherBlocked => side_a_blocked || side_b_blocked,
            };
            if !cuts_corner {
                *slot = Some((next, DIAGONAL_STEP_COST));
            }
        }
        out
    }
}

const ORTHOGONAL_OFFSETS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];
const DIAGONAL_OFFSETS: [(i32, i32); 4] = [(1, -1), (1, 1), (-1, 1), (-1, -1)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenNode {
    cell: CellCoord,
    h_cost: u32,
    f_cost: u32,
    insertion_order: u64,
}

impl OpenNode {
    fn order_key(&self) -> (u32, u32, i32, i32, u64) {
        (
            self.f_cost,
            self.h_cost,
            self.cell.y,
            self.cell.x,
            self.insertion_order,
        )
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn reconstruct_path(
    grid: &GridModel,
    parent: &[Option<usize>],
    start_index: usize,
    goal_index: usize,
) -> Option<Path> {
    let mut cursor = goal_index;
    let mut indices = vec![cursor];

    while cursor != start_index {
        cursor = parent.get(cursor).and_then(|value| *value)?;
        indices.push(cursor);
    }
    indices.pop();
    indices.reverse();
    Some(Path {
        cells: indices
            .into_iter()
            .map(|index| grid.cell_of_index(index))
            .collect(),
    })
}
