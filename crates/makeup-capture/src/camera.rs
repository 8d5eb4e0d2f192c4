//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, Frame};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const REQUEST_WIDTH: u32 = 1280;
const REQUEST_HEIGHT: u32 = 720;
const DARK_THRESHOLD: f32 = 0.95;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("device does not support video capture")]
    StreamingNotSupported,
    #[error("no usable frame after {attempts} attempts ({dark} dark)")]
    NoUsableFrame { attempts: usize, dark: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed, 2 bytes/pixel.
    Yuyv,
    /// 8-bit grayscale.
    Grey,
    /// 16-bit little-endian grayscale.
    Y16,
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        if fourcc == FourCC::new(b"YUYV") {
            Some(PixelFormat::Yuyv)
        } else if fourcc == FourCC::new(b"GREY") {
            Some(PixelFormat::Grey)
        } else if fourcc == FourCC::new(b"Y16 ") || fourcc == FourCC::new(b"Y16\0") {
            Some(PixelFormat::Y16)
        } else {
            None
        }
    }

    /// Convert a raw buffer in this format to packed RGB.
    pub fn to_rgb(self, buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, frame::FrameError> {
        match self {
            PixelFormat::Yuyv => frame::yuyv_to_rgb(buf, width, height),
            PixelFormat::Grey => frame::grey_to_rgb(buf, width, height),
            PixelFormat::Y16 => frame::y16_to_rgb(buf, width, height),
        }
    }
}

/// V4L2 camera device handle.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0").
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            let msg = e.to_string();
            if msg.contains("busy") || msg.contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {msg}"))
            }
        })?;

        let caps = device
            .query_caps()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to query capabilities: {e}")))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }
        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        let mut fmt = device
            .format()
            .map_err(|e| {
                CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
            })?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = REQUEST_WIDTH;
        fmt.height = REQUEST_HEIGHT;

        let negotiated = device
            .set_format(&fmt)
            .map_err(|e| {
                CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
            })?;
        let pixel_format = PixelFormat::from_fourcc(negotiated.fourcc).ok_or_else(|| {
            CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {:?} (need YUYV, GREY, or Y16)",
                negotiated.fourcc
            ))
        })?;

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "negotiated format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            pixel_format,
        })
    }

    /// Start streaming. The stream stops when the session is stopped or dropped.
    pub fn start(&self) -> Result<CaptureSession<'_>, CameraError> {
        let stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4)
            .map_err(|e| CameraError::CaptureFailed(format!("failed to create mmap stream: {e}")))?;
        tracing::debug!(device = %self.device_path, "capture session started");
        Ok(CaptureSession {
            camera: self,
            stream: Some(stream),
        })
    }

    /// Take one still photo.
    ///
    /// The first `warmup` frames are discarded while auto-exposure settles,
    /// then dark frames are skipped. The session is stopped before
    /// returning, whether or not a frame was found.
    pub fn capture_still(&self, warmup: usize) -> Result<Frame, CameraError> {
        let mut session = self.start()?;
        let result = session.still(warmup);
        session.stop();
        result
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        (0..16)
            .filter_map(|i| {
                let path = format!("/dev/video{i}");
                if !Path::new(&path).exists() {
                    return None;
                }
                let caps = Device::with_path(&path).ok()?.query_caps().ok()?;
                caps.capabilities
                    .contains(v4l::capability::Flags::VIDEO_CAPTURE)
                    .then(|| DeviceInfo {
                        path,
                        name: caps.card.clone(),
                        driver: caps.driver.clone(),
                        bus: caps.bus.clone(),
                    })
            })
            .collect()
    }
}

/// An active stream on a [`Camera`].
pub struct CaptureSession<'a> {
    camera: &'a Camera,
    stream: Option<MmapStream<'a>>,
}

impl CaptureSession<'_> {
    /// Dequeue one frame and convert it to RGB.
    pub fn next_frame(&mut self) -> Result<Frame, CameraError> {
        let cam = self.camera;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CameraError::CaptureFailed("capture session already stopped".into()))?;
        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;
        let rgb = cam
            .pixel_format
            .to_rgb(buf, cam.width, cam.height)
            .map_err(|e| {
                CameraError::CaptureFailed(format!("{:?} conversion failed: {e}", cam.pixel_format))
            })?;
        let is_dark = frame::is_dark_frame(&rgb, DARK_THRESHOLD);

        Ok(Frame {
            data: rgb,
            width: cam.width,
            height: cam.height,
            timestamp: std::time::Instant::now(),
            sequence: meta.sequence,
            is_dark,
        })
    }

    /// Skip `warmup` frames, then return the first non-dark frame.
    ///
    /// Gives up after `warmup + 10` dequeues.
    pub fn still(&mut self, warmup: usize) -> Result<Frame, CameraError> {
        let max_attempts = warmup + 10;
        let mut dark = 0usize;
        for attempt in 0..max_attempts {
            let frame = self.next_frame()?;
            if attempt < warmup {
                continue;
            }
            if frame.is_dark {
                dark += 1;
                tracing::debug!(seq = frame.sequence, "skipping dark frame");
                continue;
            }
            return Ok(frame);
        }
        Err(CameraError::NoUsableFrame {
            attempts: max_attempts,
            dark,
        })
    }

    /// Stop streaming. Idempotent.
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!(device = %self.camera.device_path, "capture session stopped");
        }
    }
}

impl Drop for CaptureSession<'_> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_from_fourcc() {
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"YUYV")), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"GREY")), Some(PixelFormat::Grey));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"Y16 ")), Some(PixelFormat::Y16));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"MJPG")), None);
    }

    #[test]
    fn test_pixel_format_dispatch() {
        let rgb = PixelFormat::Grey.to_rgb(&[5, 6], 2, 1).unwrap();
        assert_eq!(rgb, vec![5, 5, 5, 6, 6, 6]);
        assert!(PixelFormat::Yuyv.to_rgb(&[0; 3], 2, 1).is_err());
    }

    #[test]
    fn test_open_missing_device() {
        let err = Camera::open("/dev/video-does-not-exist").err().unwrap();
        assert!(matches!(err, CameraError::DeviceNotFound(_)));
    }
}
