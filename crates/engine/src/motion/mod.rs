mod easing;
mod movement;

pub use easing::Easing;
pub use movement::{
    Arrival, Avatar, AvatarSnapshot, MotionKind, MoveRejection, MovementConfig,
    MovementController, PlannerStats, SpeedBands, StepDirection,
};
