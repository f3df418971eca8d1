mod geometry;
mod ids;
mod motion;
mod nav;
mod overlay;
mod parcels;
mod view;
mod world;
mod zones;

pub use geometry::{CellCoord, Vec2, WorldRect};
pub use ids::{AvatarId, ZoneId};
pub use motion::{
    Arrival, Avatar, AvatarSnapshot, Easing, MotionKind, MoveRejection, MovementConfig,
    MovementController, PlannerStats, SpeedBands, StepDirection,
};
pub use nav::{
    CornerCutting, GridError, GridModel, NoPath, Path, PathPlanner, PathPlannerConfig, PathSearch,
    TileCategory, TileData, DIAGONAL_STEP_COST, ORTHOGONAL_STEP_COST,
};
pub use overlay::{EphemeralOverlays, OverlayItem, OverlayRemoval, RemovalReason};
pub use parcels::{
    expected_parcel_count, parcel_at, BuildingType, CategoryWeights, Parcel, ParcelCategory,
    ParcelError, ParcelGridGenerator, ParcelRegion,
};
pub use view::{
    CameraConfig, CameraController, CameraError, Viewport, CAMERA_ZOOM_DEFAULT, CAMERA_ZOOM_MAX,
    CAMERA_ZOOM_MIN, CAMERA_ZOOM_STEP,
};
pub use world::{
    BubbleRemoval, BubbleSnapshot, ChatBubble, DebugFacade, DebugInfoSnapshot, SimulationWorld,
    StandardDebug, TickReport, WorldConfig, WorldError, WorldSnapshot,
};
pub use zones::{
    Zone, ZoneBounds, ZoneIndex, ZoneLoadReport, ZoneRejection, ZoneTracker, ZoneTransition,
};
