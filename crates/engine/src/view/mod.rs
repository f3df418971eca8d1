mod camera;

pub use camera::{
    CameraConfig, CameraController, CameraError, Viewport, CAMERA_ZOOM_DEFAULT, CAMERA_ZOOM_MAX,
    CAMERA_ZOOM_MIN, CAMERA_ZOOM_STEP,
};
