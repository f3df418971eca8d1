mod grid;
mod planner;

pub use grid::{GridError, GridModel, TileCategory, TileData};
pub use planner::{
    CornerCutting, NoPath, Path, PathPlanner, PathPlannerConfig, PathSearch, DIAGONAL_STEP_COST,
    ORTHOGONAL_STEP_COST,
};
