use serde::Deserialize;
use thiserror::Error;

use crate::geometry::{Vec2, WorldRect};
use crate::motion::Easing;

pub const CAMERA_ZOOM_DEFAULT: f32 = 1.0;
pub const CAMERA_ZOOM_MIN: f32 = 0.5;
pub const CAMERA_ZOOM_MAX: f32 = 2.0;
pub const CAMERA_ZOOM_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraConfig {
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub default_zoom: f32,
    pub zoom_step: f32,
    pub pan_duration_seconds: f32,
    pub pixels_per_world: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            min_zoom: CAMERA_ZOOM_MIN,
            max_zoom: CAMERA_ZOOM_MAX,
            default_zoom: CAMERA_ZOOM_DEFAULT,
            zoom_step: CAMERA_ZOOM_STEP,
            pan_duration_seconds: 0.3,
            pixels_per_world: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CameraError {
    #[error("zoom limits must be finite, positive and ordered, got [{min}, {max}]")]
    InvalidZoomLimits { min: f32, max: f32 },
    #[error("pixels per world unit must be finite and positive, got {0}")]
    InvalidScale(f32),
}

impl CameraConfig {
    pub fn validate(&self) -> Result<(), CameraError> {
        let limits_ok = self.min_zoom.is_finite()
            && self.max_zoom.is_finite()
            && self.min_zoom > 0.0
            && self.min_zoom <= self.max_zoom;
        if !limits_ok {
            return Err(CameraError::InvalidZoomLimits {
                min: self.min_zoom,
                max: self.max_zoom,
            });
        }
        if !self.pixels_per_world.is_finite() || self.pixels_per_world <= 0.0 {
            return Err(CameraError::InvalidScale(self.pixels_per_world));
        }
        Ok(())
    }

    fn clamp_zoom(&self, zoom: f32) -> f32 {
        let zoom = if zoom.is_finite() {
            zoom
        } else {
            self.default_zoom
        };
        if !zoom.is_finite() {
            return self.min_zoom;
        }
        zoom.clamp(self.min_zoom, self.max_zoom)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PanAnimation {
    from: Vec2,
    to: Vec2,
    elapsed: f32,
    duration: f32,
}

/// Center, zoom and viewport of the 2D view. Screen space has its origin at
/// the top-left corner and y growing downwards, like world space.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraController {
    config: CameraConfig,
    center: Vec2,
    zoom: f32,
    world_bounds: WorldRect,
    viewport: Viewport,
    animation: Option<PanAnimation>,
}

impl CameraController {
    pub fn new(config: CameraConfig, world_bounds: WorldRect) -> Result<Self, CameraError> {
        config.validate()?;
        let zoom = config.clamp_zoom(config.default_zoom);
        Ok(Self {
            config,
            center: world_bounds.center(),
            zoom,
            world_bounds,
            viewport: Viewport::default(),
            animation: None,
        })
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn world_bounds(&self) -> WorldRect {
        self.world_bounds
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Screen pixels per world unit at the current zoom.
    pub fn scale(&self) -> f32 {
        self.config.pixels_per_world * self.zoom
    }

    /// Returns the zoom actually applied.
    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        self.zoom = self.config.clamp_zoom(zoom);
        self.center = self.clamp_center(self.center);
        self.zoom
    }

    pub fn apply_zoom_steps(&mut self, steps: i32) -> f32 {
        if steps == 0 {
            return self.zoom;
        }
        self.set_zoom(self.zoom + steps as f32 * self.config.zoom_step)
    }

    /// Snaps to `position` or starts an ease-out pan toward it, replacing any
    /// pan already in flight. Non-finite targets are ignored.
    pub fn move_to(&mut self, position: Vec2, immediate: bool) -> bool {
        if !position.is_finite() {
            return false;
        }
        let duration = self.config.pan_duration_seconds;
        if immediate || !duration.is_finite() || duration <= 0.0 {
            self.animation = None;
            self.center = self.clamp_center(position);
            return true;
        }
        self.animation = Some(PanAnimation {
            from: self.center,
            to: position,
            elapsed: 0.0,
            duration,
        });
        true
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        if !delta.is_finite() {
            return;
        }
        self.animation = None;
        self.center = self.clamp_center(self.center + delta);
    }

    /// Advances the pan animation. Returns `true` while still animating.
    pub fn tick(&mut self, dt_seconds: f32) -> bool {
        let Some(mut animation) = self.animation.take() else {
            return false;
        };
        if dt_seconds.is_finite() && dt_seconds > 0.0 {
            animation.elapsed += dt_seconds;
        }
        let t = animation.elapsed / animation.duration;
        let eased = Easing::EaseOutQuad.apply(t);
        self.center = self.clamp_center(animation.from.lerp(animation.to, eased));
        if t < 1.0 {
            self.animation = Some(animation);
        }
        self.animation.is_some()
    }

    pub fn set_screen_size(&mut self, width: u32, height: u32) {
        self.viewport = Viewport { width, height };
        self.center = self.clamp_center(self.center);
    }

    pub fn set_world_bounds(&mut self, bounds: WorldRect) {
        self.world_bounds = bounds;
        self.center = self.clamp_center(self.center);
    }

    pub fn visible_bounds(&self) -> WorldRect {
        let (width, height) = self.visible_extent();
        WorldRect::from_center(self.center, width, height)
    }

    pub fn is_point_visible(&self, point: Vec2) -> bool {
        self.visible_bounds().contains(point)
    }

    pub fn is_rect_visible(&self, rect: &WorldRect) -> bool {
        self.visible_bounds().intersects(rect)
    }

    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        let scale = self.scale();
        Vec2 {
            x: (world.x - self.center.x) * scale + self.viewport.width as f32 * 0.5,
            y: (world.y - self.center.y) * scale + self.viewport.height as f32 * 0.5,
        }
    }

    pub fn world_to_screen_px(&self, world: Vec2) -> (i32, i32) {
        let screen = self.world_to_screen(world);
        (screen.x.round() as i32, screen.y.round() as i32)
    }

    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        let inv_scale = self.scale().recip();
        Vec2 {
            x: (screen.x - self.viewport.width as f32 * 0.5) * inv_scale + self.center.x,
            y: (screen.y - self.viewport.height as f32 * 0.5) * inv_scale + self.center.y,
        }
    }

    fn visible_extent(&self) -> (f32, f32) {
        let inv_scale = self.scale().recip();
        (
            self.viewport.width as f32 * inv_scale,
            self.viewport.height as f32 * inv_scale,
        )
    }

    fn clamp_center(&self, center: Vec2) -> Vec2 {
        let (visible_width, visible_height) = self.visible_extent();
        let bounds = self.world_bounds;
        Vec2 {
            x: clamp_axis(center.x, bounds.x, bounds.max_x(), visible_width),
            y: clamp_axis(center.y, bounds.y, bounds.max_y(), visible_height),
        }
    }
}

fn clamp_axis(value: f32, min: f32, max: f32, visible: f32) -> f32 {
    if max - min <= visible {
        return (min + max) * 0.5;
    }
    let half = visible * 0.5;
    value.clamp(min + half, max - half)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> CameraController {
        let mut camera = CameraController::new(
            CameraConfig::default(),
            WorldRect::new(0.0, 0.0, 1000.0, 1000.0),
        )
        .expect("camera");
        camera.set_screen_size(200, 100);
        camera
    }

    #[test]
    fn zoom_outside_limits_clamps_to_nearest_bound() {
        let mut camera = camera();
        assert_eq!(camera.set_zoom(10.0), CAMERA_ZOOM_MAX);
        assert_eq!(camera.set_zoom(0.01), CAMERA_ZOOM_MIN);
        assert_eq!(camera.set_zoom(f32::NAN), CAMERA_ZOOM_DEFAULT);
        assert_eq!(camera.set_zoom(f32::INFINITY), CAMERA_ZOOM_DEFAULT);
    }

    #[test]
    fn zoom_steps_clamp_at_bounds() {
        let mut camera = camera();
        camera.apply_zoom_steps(200);
        assert!((camera.zoom() - CAMERA_ZOOM_MAX).abs() < 0.0001);
        camera.apply_zoom_steps(-400);
        assert!((camera.zoom() - CAMERA_ZOOM_MIN).abs() < 0.0001);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = CameraConfig {
            min_zoom: 3.0,
            max_zoom: 1.0,
            ..CameraConfig::default()
        };
        assert!(matches!(
            CameraController::new(config, WorldRect::default()),
            Err(CameraError::InvalidZoomLimits { .. })
        ));
        let config = CameraConfig {
            pixels_per_world: 0.0,
            ..CameraConfig::default()
        };
        assert_eq!(
            CameraController::new(config, WorldRect::default()),
            Err(CameraError::InvalidScale(0.0))
        );
    }

    #[test]
    fn visible_bounds_follow_zoom_and_screen() {
        let mut camera = camera();
        camera.move_to(Vec2::new(500.0, 500.0), true);
        assert_eq!(
            camera.visible_bounds(),
            WorldRect::new(400.0, 450.0, 200.0, 100.0)
        );
        camera.set_zoom(2.0);
        assert_eq!(
            camera.visible_bounds(),
            WorldRect::new(450.0, 475.0, 100.0, 50.0)
        );
        assert!(camera.is_point_visible(Vec2::new(450.0, 475.0)));
        assert!(!camera.is_point_visible(Vec2::new(449.0, 475.0)));
        assert!(camera.is_rect_visible(&WorldRect::new(440.0, 470.0, 20.0, 20.0)));
    }

    #[test]
    fn zoom_keeps_pan() {
        let mut camera = camera();
        camera.move_to(Vec2::new(300.0, 700.0), true);
        camera.set_zoom(1.5);
        assert_eq!(camera.center(), Vec2::new(300.0, 700.0));
    }

    #[test]
    fn center_stays_inside_world() {
        let mut camera = camera();
        camera.move_to(Vec2::new(-50.0, 2000.0), true);
        assert_eq!(camera.center(), Vec2::new(100.0, 950.0));
    }

    #[test]
    fn small_world_axis_centers() {
        let mut camera = CameraController::new(
            CameraConfig::default(),
            WorldRect::new(0.0, 0.0, 100.0, 1000.0),
        )
        .expect("camera");
        camera.set_screen_size(200, 100);
        camera.move_to(Vec2::new(90.0, 10.0), true);
        assert_eq!(camera.center(), Vec2::new(50.0, 50.0));
    }

    #[test]
    fn pan_animation_eases_out_and_can_be_superseded() {
        let mut camera = camera();
        camera.move_to(Vec2::new(500.0, 500.0), true);
        camera.move_to(Vec2::new(800.0, 500.0), false);
        assert!(camera.tick(0.15));
        // half the duration with ease-out quad covers three quarters
        assert!((camera.center().x - 725.0).abs() < 0.01);

        camera.move_to(Vec2::new(500.0, 500.0), false);
        assert!(camera.tick(0.15));
        assert!(!camera.tick(0.2));
        assert_eq!(camera.center(), Vec2::new(500.0, 500.0));
        assert!(!camera.is_animating());
    }

    #[test]
    fn screen_transform_round_trips() {
        let mut camera = camera();
        camera.move_to(Vec2::new(300.0, 400.0), true);
        camera.set_zoom(2.0);
        assert_eq!(camera.world_to_screen_px(Vec2::new(300.0, 400.0)), (100, 50));
        assert_eq!(camera.world_to_screen_px(Vec2::new(310.0, 405.0)), (120, 60));
        let world = camera.screen_to_world(Vec2::new(120.0, 60.0));
        assert!((world.x - 310.0).abs() < 0.001);
        assert!((world.y - 405.0).abs() < 0.001);
    }
}
