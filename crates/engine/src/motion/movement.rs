use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::easing::Easing;
use crate::geometry::{CellCoord, Vec2};
use crate::ids::AvatarId;
use crate::nav::{GridModel, NoPath, Path, PathPlanner, PathPlannerConfig};

/// Speed multipliers keyed by the length of a move request, in tiles.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpeedBands {
    pub short_distance_tiles: f32,
    pub long_distance_tiles: f32,
    pub short_multiplier: f32,
    pub medium_multiplier: f32,
    pub long_multiplier: f32,
}

impl Default for SpeedBands {
    fn default() -> Self {
        Self {
            short_distance_tiles: 3.0,
            long_distance_tiles: 12.0,
            short_multiplier: 0.85,
            medium_multiplier: 1.0,
            long_multiplier: 1.35,
        }
    }
}

impl SpeedBands {
    pub fn multiplier(&self, distance_tiles: f32) -> f32 {
        if distance_tiles <= self.short_distance_tiles {
            self.short_multiplier
        } else if distance_tiles >= self.long_distance_tiles {
            self.long_multiplier
        } else {
            self.medium_multiplier
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MovementConfig {
    /// Tiles per second.
    pub default_speed: f32,
    /// Tiles.
    pub arrival_tolerance: f32,
    pub path_easing: Easing,
    pub keyboard_easing: Easing,
    pub speed_bands: SpeedBands,
    pub fallback_to_direct: bool,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            default_speed: 4.0,
            arrival_tolerance: 0.1,
            path_easing: Easing::EaseOutQuad,
            keyboard_easing: Easing::Linear,
            speed_bands: SpeedBands::default(),
            fallback_to_direct: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDirection {
    North,
    East,
    South,
    West,
}

impl StepDirection {
    pub const fn offset(self) -> (i32, i32) {
        match self {
            StepDirection::North => (0, -1),
            StepDirection::East => (1, 0),
            StepDirection::South => (0, 1),
            StepDirection::West => (-1, 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MoveRejection {
    #[error("unknown avatar {0}")]
    UnknownAvatar(AvatarId),
    #[error("target ({}, {}) is not a finite position", .0.x, .0.y)]
    NonFiniteTarget(Vec2),
    #[error("target cell ({}, {}) is not walkable", .0.x, .0.y)]
    TargetBlocked(CellCoord),
    #[error("speed must be finite and positive, got {0}")]
    InvalidSpeed(f32),
    #[error("no path to goal")]
    NoPath(#[source] NoPath),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionKind {
    Idle,
    FollowingPath,
    Direct,
}

/// Polyline the avatar travels along. Position is a pure function of
/// `elapsed`: the eased fraction of `duration` picks an arc length.
#[derive(Debug, Clone, PartialEq)]
struct Track {
    origin: Vec2,
    points: Vec<Vec2>,
    cumulative: Vec<f32>,
    total: f32,
    duration: f32,
    elapsed: f32,
    easing: Easing,
    tolerance: f32,
}

impl Track {
    fn new(origin: Vec2, points: Vec<Vec2>, speed: f32, easing: Easing, tolerance: f32) -> Self {
        let mut cumulative = Vec::with_capacity(points.len());
        let mut previous = origin;
        let mut total = 0.0;
        for point in &points {
            total += previous.distance(*point);
            cumulative.push(total);
            previous = *point;
        }
        let duration = if speed > 0.0 { total / speed } else { 0.0 };
        Self {
            origin,
            points,
            cumulative,
            total,
            duration,
            elapsed: 0.0,
            easing,
            tolerance,
        }
    }

    fn progress(&self) -> f32 {
        self.progress_at(self.elapsed)
    }

    fn progress_at(&self, elapsed: f32) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (elapsed / self.duration).min(1.0)
    }

    fn travelled(&self) -> f32 {
        self.travelled_at(self.elapsed)
    }

    fn travelled_at(&self, elapsed: f32) -> f32 {
        self.easing.apply(self.progress_at(elapsed)) * self.total
    }

    fn point_at(&self, travelled: f32) -> Vec2 {
        let segment = self.cumulative.partition_point(|mark| *mark < travelled);
        let Some(end) = self.points.get(segment).copied() else {
            return self.destination();
        };
        let (start, start_mark) = match segment {
            0 => (self.origin, 0.0),
            _ => (self.points[segment - 1], self.cumulative[segment - 1]),
        };
        let length = self.cumulative[segment] - start_mark;
        if length <= f32::EPSILON {
            return end;
        }
        start.lerp(end, ((travelled - start_mark) / length).clamp(0.0, 1.0))
    }

    /// Number of points already passed at `travelled`.
    fn passed_points(&self, travelled: f32) -> usize {
        self.cumulative
            .partition_point(|mark| *mark <= travelled + self.tolerance)
    }

    fn destination(&self) -> Vec2 {
        self.points.last().copied().unwrap_or(self.origin)
    }

    /// First cell the avatar would enter while moving from arc length `from`
    /// to `to` that is no longer walkable. The cell it already stands in is
    /// never reported.
    fn blocked_cell_ahead(
        &self,
        grid: &GridModel,
        current: CellCoord,
        from: f32,
        to: f32,
    ) -> Option<CellCoord> {
        let first = self.cumulative.partition_point(|mark| *mark <= from);
        let last = self
            .cumulative
            .partition_point(|mark| *mark < to)
            .min(self.points.len().saturating_sub(1));
        let upcoming = self.points.get(first..=last).unwrap_or(&[]);
        upcoming
            .iter()
            .copied()
            .chain(std::iter::once(self.point_at(to)))
            .map(|point| cell_containing(grid, point))
            .find(|cell| *cell != current && !grid.is_cell_walkable(*cell))
    }

    fn is_finished(&self, travelled: f32) -> bool {
        self.progress() >= 1.0 || self.total - travelled <= self.tolerance
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Motion {
    Idle,
    FollowingPath {
        path: Path,
        next_waypoint: usize,
        track: Track,
    },
    Direct {
        track: Track,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Avatar {
    id: AvatarId,
    position: Vec2,
    speed: f32,
    motion: Motion,
}

impl Avatar {
    pub fn id(&self) -> &AvatarId {
        &self.id
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Tiles per second.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn is_moving(&self) -> bool {
        !matches!(self.motion, Motion::Idle)
    }

    pub fn motion_kind(&self) -> MotionKind {
        match self.motion {
            Motion::Idle => MotionKind::Idle,
            Motion::FollowingPath { .. } => MotionKind::FollowingPath,
            Motion::Direct { .. } => MotionKind::Direct,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.motion {
            Motion::FollowingPath { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn next_waypoint(&self) -> Option<usize> {
        match &self.motion {
            Motion::FollowingPath { next_waypoint, .. } => Some(*next_waypoint),
            _ => None,
        }
    }

    pub fn destination(&self) -> Option<Vec2> {
        match &self.motion {
            Motion::Idle => None,
            Motion::FollowingPath { track, .. } | Motion::Direct { track } => {
                Some(track.destination())
            }
        }
    }

    fn track(&self) -> Option<&Track> {
        match &self.motion {
            Motion::Idle => None,
            Motion::FollowingPath { track, .. } | Motion::Direct { track } => Some(track),
        }
    }

    /// Path motion checks every cell it is about to enter. Direct motion
    /// ignores walls on the way and only checks its destination.
    fn advance(&mut self, grid: &GridModel, dt_seconds: f32) -> Advance {
        let current = cell_containing(grid, self.position);
        let (elapsed, travelled, blocked) = match &self.motion {
            Motion::Idle => return Advance::Idle,
            Motion::FollowingPath { track, .. } => {
                let elapsed = track.elapsed + dt_seconds;
                let travelled = track.travelled_at(elapsed);
                let blocked = track.blocked_cell_ahead(grid, current, track.travelled(), travelled);
                (elapsed, travelled, blocked)
            }
            Motion::Direct { track } => {
                let elapsed = track.elapsed + dt_seconds;
                let target = cell_containing(grid, track.destination());
                let blocked =
                    (target != current && !grid.is_cell_walkable(target)).then_some(target);
                (elapsed, track.travelled_at(elapsed), blocked)
            }
        };
        if let Some(cell) = blocked {
            return Advance::Blocked(cell);
        }

        let track = match &mut self.motion {
            Motion::Idle => return Advance::Idle,
            Motion::FollowingPath { track, .. } | Motion::Direct { track } => track,
        };
        track.elapsed = elapsed;
        if track.is_finished(travelled) {
            self.position = track.destination();
            self.motion = Motion::Idle;
            return Advance::Arrived;
        }

        self.position = track.point_at(travelled);
        if let Motion::FollowingPath {
            next_waypoint,
            track,
            ..
        } = &mut self.motion
        {
            *next_waypoint = track.passed_points(travelled);
        }
        Advance::Moving
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Advance {
    Idle,
    Moving,
    Arrived,
    /// The next cell on the way was walled off after the move was accepted.
    Blocked(CellCoord),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AvatarSnapshot {
    pub id: AvatarId,
    pub position: Vec2,
    pub speed: f32,
    pub moving: bool,
    pub motion: MotionKind,
    pub next_waypoint: Option<usize>,
    pub remaining_waypoints: usize,
    pub destination: Option<Vec2>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arrival {
    pub avatar: AvatarId,
    pub position: Vec2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlannerStats {
    pub searches: u64,
    pub failures: u64,
    pub expanded_nodes: u64,
}

#[derive(Debug, Clone, Default)]
pub struct MovementController {
    config: MovementConfig,
    planner: PathPlanner,
    avatars: BTreeMap<AvatarId, Avatar>,
    stats: PlannerStats,
}

impl MovementController {
    pub fn new(config: MovementConfig, planner_config: PathPlannerConfig) -> Self {
        Self {
            config,
            planner: PathPlanner::new(planner_config),
            avatars: BTreeMap::new(),
            stats: PlannerStats::default(),
        }
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    pub fn planner(&self) -> &PathPlanner {
        &self.planner
    }

    pub fn stats(&self) -> PlannerStats {
        self.stats
    }

    /// Returns `false` when `position` is not finite, or when the id is
    /// already present. The existing avatar is left alone.
    pub fn add_avatar(&mut self, id: AvatarId, position: Vec2, speed: Option<f32>) -> bool {
        if !position.is_finite() {
            warn!(avatar = %id, x = position.x, y = position.y, "avatar_rejected_non_finite");
            return false;
        }
        if self.avatars.contains_key(&id) {
            return false;
        }
        let speed = speed
            .filter(|value| value.is_finite() && *value > 0.0)
            .unwrap_or(self.config.default_speed);
        info!(avatar = %id, x = position.x, y = position.y, "avatar_added");
        self.avatars.insert(
            id.clone(),
            Avatar {
                id,
                position,
                speed,
                motion: Motion::Idle,
            },
        );
        true
    }

    pub fn remove_avatar(&mut self, id: &AvatarId) -> Option<Avatar> {
        let removed = self.avatars.remove(id);
        if removed.is_some() {
            info!(avatar = %id, "avatar_removed");
        }
        removed
    }

    pub fn avatar(&self, id: &AvatarId) -> Option<&Avatar> {
        self.avatars.get(id)
    }

    pub fn avatars(&self) -> impl Iterator<Item = &Avatar> {
        self.avatars.values()
    }

    pub fn len(&self) -> usize {
        self.avatars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.avatars.is_empty()
    }

    pub fn any_moving(&self) -> bool {
        self.avatars.values().any(Avatar::is_moving)
    }

    /// Teleports the avatar and cancels any motion.
    pub fn set_position(&mut self, id: &AvatarId, position: Vec2) -> Result<(), MoveRejection> {
        if !position.is_finite() {
            return Err(MoveRejection::NonFiniteTarget(position));
        }
        let avatar = self.avatar_mut(id)?;
        avatar.position = position;
        avatar.motion = Motion::Idle;
        Ok(())
    }

    /// Takes effect from the next accepted request.
    pub fn set_speed(&mut self, id: &AvatarId, speed: f32) -> Result<(), MoveRejection> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(MoveRejection::InvalidSpeed(speed));
        }
        self.avatar_mut(id)?.speed = speed;
        Ok(())
    }

    pub fn stop(&mut self, id: &AvatarId) -> Result<(), MoveRejection> {
        self.avatar_mut(id)?.motion = Motion::Idle;
        Ok(())
    }

    pub fn move_to_cell(
        &mut self,
        grid: &GridModel,
        id: &AvatarId,
        goal: CellCoord,
    ) -> Result<(), MoveRejection> {
        let avatar = self
            .avatars
            .get(id)
            .ok_or_else(|| MoveRejection::UnknownAvatar(id.clone()))?;
        if !grid.is_cell_walkable(goal) {
            debug!(avatar = %id, x = goal.x, y = goal.y, "move_rejected_target_blocked");
            return Err(MoveRejection::TargetBlocked(goal));
        }

        let start = cell_containing(grid, avatar.position);
        let origin = avatar.position;
        let base_speed = avatar.speed;
        let search = self.planner.search(grid, start, goal);
        self.stats.searches += 1;
        self.stats.expanded_nodes += search.expanded_nodes as u64;

        let path = match search.outcome {
            Ok(path) => path,
            Err(reason) => {
                self.stats.failures += 1;
                debug!(
                    avatar = %id,
                    reason = %reason,
                    expanded = search.expanded_nodes,
                    "path_not_found"
                );
                if !self.config.fallback_to_direct {
                    return Err(MoveRejection::NoPath(reason));
                }
                let target = grid.cell_center(goal);
                let track = self.direct_track(grid, origin, target, base_speed, true);
                self.set_motion(id, Motion::Direct { track })?;
                return Ok(());
            }
        };

        debug!(
            avatar = %id,
            steps = path.len(),
            expanded = search.expanded_nodes,
            "path_planned"
        );
        let points = if path.is_empty() {
            vec![grid.cell_center(goal)]
        } else {
            path.cells()
                .iter()
                .map(|cell| grid.cell_center(*cell))
                .collect()
        };
        let track = self.banded_track(grid, origin, points, base_speed, self.config.path_easing);
        self.set_motion(
            id,
            Motion::FollowingPath {
                path,
                next_waypoint: 0,
                track,
            },
        )
    }

    pub fn move_direct(
        &mut self,
        grid: &GridModel,
        id: &AvatarId,
        target: Vec2,
    ) -> Result<(), MoveRejection> {
        let avatar = self
            .avatars
            .get(id)
            .ok_or_else(|| MoveRejection::UnknownAvatar(id.clone()))?;
        if !target.is_finite() {
            return Err(MoveRejection::NonFiniteTarget(target));
        }
        let cell = cell_containing(grid, target);
        if !grid.is_cell_walkable(cell) {
            debug!(avatar = %id, x = cell.x, y = cell.y, "move_rejected_target_blocked");
            return Err(MoveRejection::TargetBlocked(cell));
        }
        let track = self.direct_track(grid, avatar.position, target, avatar.speed, true);
        self.set_motion(id, Motion::Direct { track })
    }

    /// Keyboard step: one tile from the avatar's current cell, linear easing,
    /// no speed band.
    pub fn step(
        &mut self,
        grid: &GridModel,
        id: &AvatarId,
        direction: StepDirection,
    ) -> Result<(), MoveRejection> {
        let avatar = self
            .avatars
            .get(id)
            .ok_or_else(|| MoveRejection::UnknownAvatar(id.clone()))?;
        let (dx, dy) = direction.offset();
        let target_cell = cell_containing(grid, avatar.position).offset(dx, dy);
        if !grid.is_cell_walkable(target_cell) {
            return Err(MoveRejection::TargetBlocked(target_cell));
        }
        let track = self.direct_track(
            grid,
            avatar.position,
            grid.cell_center(target_cell),
            avatar.speed,
            false,
        );
        self.set_motion(id, Motion::Direct { track })
    }

    /// Advances every moving avatar by `dt_seconds` and reports the ones
    /// that arrived during this tick. Walkability is read from `grid` as it
    /// is now, so walls placed after a move was accepted still stop it.
    pub fn tick(&mut self, grid: &GridModel, dt_seconds: f32) -> Vec<Arrival> {
        let dt_seconds = if dt_seconds.is_finite() {
            dt_seconds.max(0.0)
        } else {
            0.0
        };
        let mut arrivals = Vec::new();
        let mut blocked = Vec::new();
        for avatar in self.avatars.values_mut() {
            match avatar.advance(grid, dt_seconds) {
                Advance::Arrived => {
                    debug!(avatar = %avatar.id, "avatar_arrived");
                    arrivals.push(Arrival {
                        avatar: avatar.id.clone(),
                        position: avatar.position,
                    });
                }
                Advance::Blocked(cell) => blocked.push((avatar.id.clone(), cell)),
                Advance::Idle | Advance::Moving => {}
            }
        }
        for (id, cell) in blocked {
            self.reroute(grid, &id, cell);
        }
        arrivals
    }

    /// Plans again from where the avatar stands. Falls back to stopping in
    /// place when the goal itself is gone or no longer reachable.
    fn reroute(&mut self, grid: &GridModel, id: &AvatarId, blocked: CellCoord) {
        let goal = self
            .avatars
            .get(id)
            .and_then(Avatar::path)
            .and_then(Path::goal);
        let replanned = match goal {
            Some(goal) => self.move_to_cell(grid, id, goal).is_ok(),
            None => false,
        };
        if !replanned {
            if let Some(avatar) = self.avatars.get_mut(id) {
                avatar.motion = Motion::Idle;
            }
        }
        info!(avatar = %id, x = blocked.x, y = blocked.y, replanned, "route_blocked");
    }

    pub fn snapshot(&self) -> Vec<AvatarSnapshot> {
        self.avatars
            .values()
            .map(|avatar| AvatarSnapshot {
                id: avatar.id.clone(),
                position: avatar.position,
                speed: avatar.speed,
                moving: avatar.is_moving(),
                motion: avatar.motion_kind(),
                next_waypoint: avatar.next_waypoint(),
                remaining_waypoints: avatar.track().map_or(0, |track| {
                    let passed = avatar.next_waypoint().unwrap_or(0);
                    track.points.len().saturating_sub(passed)
                }),
                destination: avatar.destination(),
            })
            .collect()
    }

    fn avatar_mut(&mut self, id: &AvatarId) -> Result<&mut Avatar, MoveRejection> {
        self.avatars
            .get_mut(id)
            .ok_or_else(|| MoveRejection::UnknownAvatar(id.clone()))
    }

    fn set_motion(&mut self, id: &AvatarId, motion: Motion) -> Result<(), MoveRejection> {
        self.avatar_mut(id)?.motion = motion;
        Ok(())
    }

    fn banded_track(
        &self,
        grid: &GridModel,
        origin: Vec2,
        points: Vec<Vec2>,
        speed_tiles: f32,
        easing: Easing,
    ) -> Track {
        let tile_size = grid.tile_size();
        let tolerance = self.config.arrival_tolerance * tile_size;
        let probe = Track::new(origin, points, 1.0, easing, tolerance);
        let multiplier = self.config.speed_bands.multiplier(probe.total / tile_size);
        Track::new(
            probe.origin,
            probe.points,
            speed_tiles * multiplier * tile_size,
            easing,
            tolerance,
        )
    }

    fn direct_track(
        &self,
        grid: &GridModel,
        origin: Vec2,
        target: Vec2,
        speed_tiles: f32,
        banded: bool,
    ) -> Track {
        if banded {
            return self.banded_track(grid, origin, vec![target], speed_tiles, self.config.path_easing);
        }
        let tile_size = grid.tile_size();
        Track::new(
            origin,
            vec![target],
            speed_tiles * tile_size,
            self.config.keyboard_easing,
            self.config.arrival_tolerance * tile_size,
        )
    }
}

/// Cell under a world position, even when it lies outside the grid.
fn cell_containing(grid: &GridModel, position: Vec2) -> CellCoord {
    let tile_size = grid.tile_size();
    CellCoord::new(
        (position.x / tile_size).floor() as i32,
        (position.y / tile_size).floor() as i32,
    )
}
