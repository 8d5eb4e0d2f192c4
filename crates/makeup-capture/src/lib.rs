//! makeup-capture — still-photo capture from V4L2 webcams.
//!
//! Negotiates a color format, discards warm-up and dark frames, and hands
//! back an RGB image ready for the analysis pipeline.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CaptureSession, DeviceInfo, PixelFormat};
pub use frame::{Frame, FrameError};
