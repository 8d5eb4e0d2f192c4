//! Captured frames and pixel-format conversion to RGB.

use image::RgbImage;

/// A captured color frame, packed RGB8.
#[derive(Clone)]
pub struct Frame {
    /// RGB pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
    pub is_dark: bool,
}

impl Frame {
    /// Average luma (0.0–255.0).
    pub fn avg_brightness(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let pixels = self.data.len() / 3;
        let sum: f32 = self.data.chunks_exact(3).map(|p| luma(p[0], p[1], p[2]) as f32).sum();
        sum / pixels.max(1) as f32
    }

    pub fn into_rgb_image(self) -> Result<RgbImage, FrameError> {
        let expected = self.width as usize * self.height as usize * 3;
        let actual = self.data.len();
        RgbImage::from_raw(self.width, self.height, self.data)
            .ok_or(FrameError::InvalidLength { expected, actual })
    }
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// BT.601 limited-range YCbCr → RGB, fixed point.
fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let c = (y as i32 - 16).max(0) * 298;
    let d = cb as i32 - 128;
    let e = cr as i32 - 128;
    [
        clamp_u8((c + 409 * e + 128) >> 8),
        clamp_u8((c - 100 * d - 208 * e + 128) >> 8),
        clamp_u8((c + 516 * d + 128) >> 8),
    ]
}

fn check_len(buf: &[u8], expected: usize) -> Result<(), FrameError> {
    if buf.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

/// Convert packed YUYV (4:2:2) to RGB.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share
/// the chroma pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = width as usize * height as usize;
    check_len(yuyv, pixels * 2)?;
    let mut rgb = Vec::with_capacity(pixels * 3);
    for quad in yuyv[..pixels * 2].chunks_exact(4) {
        let (y0, u, y1, v) = (quad[0], quad[1], quad[2], quad[3]);
        rgb.extend_from_slice(&ycbcr_to_rgb(y0, u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(y1, u, v));
    }
    // Odd pixel count leaves a trailing half-quad.
    if pixels % 2 == 1 {
        let tail = &yuyv[(pixels - 1) * 2..];
        let (y, u) = (tail[0], tail[1]);
        rgb.extend_from_slice(&ycbcr_to_rgb(y, u, 128));
    }
    Ok(rgb)
}

/// Replicate 8-bit grayscale into three channels.
pub fn grey_to_rgb(gray: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = width as usize * height as usize;
    check_len(gray, pixels)?;
    Ok(gray[..pixels].iter().flat_map(|&g| [g, g, g]).collect())
}

/// 16-bit little-endian grayscale, keeping the high byte.
pub fn y16_to_rgb(buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = width as usize * height as usize;
    check_len(buf, pixels * 2)?;
    Ok(buf[..pixels * 2]
        .chunks_exact(2)
        .flat_map(|px| {
            let g = (u16::from_le_bytes([px[0], px[1]]) >> 8) as u8;
            [g, g, g]
        })
        .collect())
}

/// True if more than `threshold_pct` of pixels have luma below 32.
pub fn is_dark_frame(rgb: &[u8], threshold_pct: f32) -> bool {
    let pixels = rgb.len() / 3;
    if pixels == 0 {
        return true;
    }
    let dark = rgb.chunks_exact(3).filter(|p| luma(p[0], p[1], p[2]) < 32).count();
    (dark as f32 / pixels as f32) > threshold_pct
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
