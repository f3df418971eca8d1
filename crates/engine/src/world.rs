use std::collections::BTreeSet;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::geometry::{CellCoord, Vec2, WorldRect};
use crate::ids::AvatarId;
use crate::motion::{
    Arrival, Avatar, AvatarSnapshot, MoveRejection, MovementConfig, MovementController,
    StepDirection,
};
use crate::nav::{GridModel, PathPlannerConfig, TileData};
use crate::overlay::{EphemeralOverlays, OverlayRemoval};
use crate::view::{CameraConfig, CameraController, CameraError};
use crate::zones::{Zone, ZoneIndex, ZoneLoadReport, ZoneTransition};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorldConfig {
    pub planner: PathPlannerConfig,
    pub movement: MovementConfig,
    pub camera: CameraConfig,
    /// Zero re-evaluates zones every tick.
    pub zone_check_interval_seconds: f32,
    pub bubble_duration_seconds: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            planner: PathPlannerConfig::default(),
            movement: MovementConfig::default(),
            camera: CameraConfig::default(),
            zone_check_interval_seconds: 0.0,
            bubble_duration_seconds: 5.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("invalid camera configuration")]
    Camera(#[from] CameraError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatBubble {
    pub text: String,
}

pub type BubbleRemoval = OverlayRemoval<AvatarId, ChatBubble>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub clock_seconds: f64,
    pub arrivals: Vec<Arrival>,
    pub zone_transitions: Vec<ZoneTransition>,
    pub expired_overlays: Vec<BubbleRemoval>,
}

impl TickReport {
    pub fn is_quiet(&self) -> bool {
        self.arrivals.is_empty()
            && self.zone_transitions.is_empty()
            && self.expired_overlays.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BubbleSnapshot {
    pub owner: AvatarId,
    pub text: String,
    pub remaining_seconds: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub clock_seconds: f64,
    pub avatars: Vec<AvatarSnapshot>,
    pub camera_center: Vec2,
    pub camera_zoom: f32,
    pub visible_bounds: WorldRect,
    pub bubbles: Vec<BubbleSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugInfoSnapshot {
    pub tick: u64,
    pub clock_seconds: f64,
    pub avatar_count: usize,
    pub moving_count: usize,
    pub tracked_count: usize,
    pub zone_count: usize,
    pub overlay_count: usize,
    pub camera_center: Vec2,
    pub camera_zoom: f32,
    pub path_searches: u64,
    pub path_failures: u64,
    pub expanded_nodes: u64,
    pub forced_visible: Vec<AvatarId>,
    pub extra_debug_lines: Option<Vec<String>>,
}

/// Debug hooks handed to whoever drives the world. Implementations receive
/// the world explicitly instead of reaching for shared state.
pub trait DebugFacade<A> {
    fn debug_info(&self, world: &SimulationWorld<A>) -> DebugInfoSnapshot {
        let mut snapshot = world.debug_info_snapshot();
        snapshot.extra_debug_lines = self.extra_lines(world);
        snapshot
    }

    fn force_visible(
        &mut self,
        world: &mut SimulationWorld<A>,
        avatar: &AvatarId,
        on: bool,
    ) -> bool {
        world.set_force_visible(avatar, on)
    }

    fn extra_lines(&self, _world: &SimulationWorld<A>) -> Option<Vec<String>> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDebug;

impl<A> DebugFacade<A> for StandardDebug {}

/// One instance of every spatial component, advanced together by `tick`.
///
/// Each tick runs movement, then zone re-evaluation for tracked avatars,
/// then the camera (pan animation or follow), then overlay expiry against
/// the world clock.
#[derive(Debug)]
pub struct SimulationWorld<A = ()> {
    config: WorldConfig,
    grid: GridModel,
    movement: MovementController,
    camera: CameraController,
    zones: ZoneIndex<A>,
    overlays: EphemeralOverlays<AvatarId, ChatBubble>,
    followed: Option<AvatarId>,
    forced_visible: BTreeSet<AvatarId>,
    clock_seconds: f64,
    tick: u64,
    zone_accumulator_seconds: f32,
}

impl<A> SimulationWorld<A> {
    pub fn new(config: WorldConfig, grid: GridModel) -> Result<Self, WorldError> {
        let camera = CameraController::new(config.camera, grid.world_bounds())?;
        info!(
            width = grid.width(),
            height = grid.height(),
            tile_size = grid.tile_size(),
            "world_created"
        );
        Ok(Self {
            config,
            movement: MovementController::new(config.movement, config.planner),
            camera,
            grid,
            zones: ZoneIndex::new(),
            overlays: EphemeralOverlays::new(),
            followed: None,
            forced_visible: BTreeSet::new(),
            clock_seconds: 0.0,
            tick: 0,
            zone_accumulator_seconds: 0.0,
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn grid(&self) -> &GridModel {
        &self.grid
    }

    pub fn movement(&self) -> &MovementController {
        &self.movement
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    pub fn zones(&self) -> &ZoneIndex<A> {
        &self.zones
    }

    pub fn overlays(&self) -> &EphemeralOverlays<AvatarId, ChatBubble> {
        &self.overlays
    }

    pub fn followed(&self) -> Option<&AvatarId> {
        self.followed.as_ref()
    }

    pub fn clock_seconds(&self) -> f64 {
        self.clock_seconds
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn add_avatar(&mut self, id: AvatarId, position: Vec2, speed: Option<f32>) -> bool {
        self.movement.add_avatar(id, position, speed)
    }

    pub fn add_avatar_at_cell(&mut self, id: AvatarId, cell: CellCoord, speed: Option<f32>) -> bool {
        let position = self.grid.cell_center(cell);
        self.add_avatar(id, position, speed)
    }

    /// Drops the avatar along with its zone tracking, bubble, follow and
    /// forced-visibility state. No zone transition or expiry is reported.
    pub fn remove_avatar(&mut self, id: &AvatarId) -> Option<Avatar> {
        let removed = self.movement.remove_avatar(id)?;
        self.zones.stop_tracking(id);
        self.overlays.clear(id);
        self.forced_visible.remove(id);
        if self.followed.as_ref() == Some(id) {
            self.followed = None;
        }
        Some(removed)
    }

    pub fn request_move(&mut self, id: &AvatarId, goal: CellCoord) -> Result<(), MoveRejection> {
        self.movement.move_to_cell(&self.grid, id, goal)
    }

    pub fn request_direct_move(&mut self, id: &AvatarId, target: Vec2) -> Result<(), MoveRejection> {
        self.movement.move_direct(&self.grid, id, target)
    }

    pub fn request_step(
        &mut self,
        id: &AvatarId,
        direction: StepDirection,
    ) -> Result<(), MoveRejection> {
        self.movement.step(&self.grid, id, direction)
    }

    pub fn stop_avatar(&mut self, id: &AvatarId) -> Result<(), MoveRejection> {
        self.movement.stop(id)
    }

    /// Motions already in flight react on their next tick: they replan
    /// around a new wall, or stop when the goal itself is walled off.
    pub fn set_tile(&mut self, x: i32, y: i32, data: TileData) -> bool {
        let changed = self.grid.set_tile(x, y, data);
        if changed {
            debug!(x, y, walkable = data.walkable, "tile_updated");
        }
        changed
    }

    pub fn load_zones(&mut self, zones: impl IntoIterator<Item = Zone<A>>) -> ZoneLoadReport {
        self.zones.load(zones)
    }

    /// Only known avatars can be tracked.
    pub fn track_zones(&mut self, id: &AvatarId) -> bool {
        if self.movement.avatar(id).is_none() {
            return false;
        }
        self.zones.start_tracking(id.clone())
    }

    pub fn untrack_zones(&mut self, id: &AvatarId) -> bool {
        self.zones.stop_tracking(id)
    }

    /// Zone containing the avatar right now, regardless of tracking.
    pub fn avatar_zone(&self, id: &AvatarId) -> Option<&Zone<A>> {
        let avatar = self.movement.avatar(id)?;
        let grid_position = self.grid.world_to_grid(avatar.position());
        self.zones.zone_at(grid_position.x, grid_position.y)
    }

    pub fn show_bubble(&mut self, id: &AvatarId, text: impl Into<String>) -> Option<BubbleRemoval> {
        let duration = self.config.bubble_duration_seconds;
        self.show_bubble_for(id, text, duration)
    }

    pub fn show_bubble_for(
        &mut self,
        id: &AvatarId,
        text: impl Into<String>,
        duration_seconds: f32,
    ) -> Option<BubbleRemoval> {
        self.overlays.show(
            id.clone(),
            ChatBubble { text: text.into() },
            duration_seconds,
            self.clock_seconds,
        )
    }

    pub fn clear_bubble(&mut self, id: &AvatarId) -> Option<BubbleRemoval> {
        self.overlays.clear(id)
    }

    /// Follows a known avatar, or stops following with `None`.
    pub fn follow_avatar(&mut self, id: Option<AvatarId>) -> bool {
        match id {
            Some(id) if self.movement.avatar(&id).is_none() => false,
            id => {
                self.followed = id;
                true
            }
        }
    }

    pub fn set_force_visible(&mut self, id: &AvatarId, on: bool) -> bool {
        if on {
            if self.movement.avatar(id).is_none() {
                return false;
            }
            self.forced_visible.insert(id.clone());
            true
        } else {
            self.forced_visible.remove(id)
        }
    }

    pub fn set_screen_size(&mut self, width: u32, height: u32) {
        self.camera.set_screen_size(width, height);
    }

    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        self.camera.set_zoom(zoom)
    }

    pub fn apply_zoom_steps(&mut self, steps: i32) -> f32 {
        self.camera.apply_zoom_steps(steps)
    }

    /// Explicit camera moves stop following.
    pub fn move_camera(&mut self, position: Vec2, immediate: bool) -> bool {
        self.followed = None;
        self.camera.move_to(position, immediate)
    }

    pub fn pan_camera(&mut self, delta: Vec2) {
        self.followed = None;
        self.camera.pan_by(delta);
    }

    pub fn tick(&mut self, dt_seconds: f32) -> TickReport {
        let dt_seconds = if dt_seconds.is_finite() {
            dt_seconds.max(0.0)
        } else {
            0.0
        };
        self.tick += 1;
        self.clock_seconds += f64::from(dt_seconds);

        let arrivals = self.movement.tick(&self.grid, dt_seconds);
        let zone_transitions = if self.zone_check_due(dt_seconds) {
            self.evaluate_zones()
        } else {
            Vec::new()
        };
        self.update_camera(dt_seconds);
        let expired_overlays = self.overlays.tick(self.clock_seconds);

        TickReport {
            tick: self.tick,
            clock_seconds: self.clock_seconds,
            arrivals,
            zone_transitions,
            expired_overlays,
        }
    }

    /// Re-evaluates every tracked avatar now.
    pub fn evaluate_zones(&mut self) -> Vec<ZoneTransition> {
        let tile_size = self.grid.tile_size();
        let mut transitions = Vec::new();
        for avatar in self.movement.avatars() {
            if !self.zones.is_tracking(avatar.id()) {
                continue;
            }
            let position = avatar.position().scale(tile_size.recip());
            if let Some(transition) = self.zones.evaluate(avatar.id(), position.x, position.y) {
                info!(
                    avatar = %transition.avatar,
                    previous = ?transition.previous,
                    current = ?transition.current,
                    "zone_transition"
                );
                transitions.push(transition);
            }
        }
        transitions
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: self.tick,
            clock_seconds: self.clock_seconds,
            avatars: self.movement.snapshot(),
            camera_center: self.camera.center(),
            camera_zoom: self.camera.zoom(),
            visible_bounds: self.camera.visible_bounds(),
            bubbles: self
                .overlays
                .iter()
                .map(|item| BubbleSnapshot {
                    owner: item.owner.clone(),
                    text: item.payload.text.clone(),
                    remaining_seconds: item.remaining_seconds(self.clock_seconds),
                })
                .collect(),
        }
    }

    /// Avatars inside the camera's visible bounds, plus any forced visible.
    pub fn visible_avatars(&self) -> Vec<AvatarId> {
        self.movement
            .avatars()
            .filter(|avatar| {
                self.forced_visible.contains(avatar.id())
                    || self.camera.is_point_visible(avatar.position())
            })
            .map(|avatar| avatar.id().clone())
            .collect()
    }

    pub fn debug_info_snapshot(&self) -> DebugInfoSnapshot {
        let stats = self.movement.stats();
        DebugInfoSnapshot {
            tick: self.tick,
            clock_seconds: self.clock_seconds,
            avatar_count: self.movement.len(),
            moving_count: self
                .movement
                .avatars()
                .filter(|avatar| avatar.is_moving())
                .count(),
            tracked_count: self.zones.tracker().len(),
            zone_count: self.zones.len(),
            overlay_count: self.overlays.len(),
            camera_center: self.camera.center(),
            camera_zoom: self.camera.zoom(),
            path_searches: stats.searches,
            path_failures: stats.failures,
            expanded_nodes: stats.expanded_nodes,
            forced_visible: self.forced_visible.iter().cloned().collect(),
            extra_debug_lines: None,
        }
    }

    /// True when nothing is left to animate, move or expire.
    pub fn is_settled(&self) -> bool {
        !self.movement.any_moving() && !self.camera.is_animating() && self.overlays.is_empty()
    }

    fn zone_check_due(&mut self, dt_seconds: f32) -> bool {
        let interval = self.config.zone_check_interval_seconds;
        if !interval.is_finite() || interval <= 0.0 {
            return true;
        }
        self.zone_accumulator_seconds += dt_seconds;
        if self.zone_accumulator_seconds < interval {
            return false;
        }
        self.zone_accumulator_seconds %= interval;
        true
    }

    fn update_camera(&mut self, dt_seconds: f32) {
        let target = self
            .followed
            .as_ref()
            .and_then(|id| self.movement.avatar(id))
            .map(Avatar::position);
        match target {
            Some(position) => {
                self.camera.move_to(position, true);
            }
            None => {
                self.camera.tick(dt_seconds);
            }
        }
    }
}
