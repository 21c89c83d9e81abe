use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use tracing::debug;

use crate::classifier::Screenshot;

/// Screenshots wider than this are scaled down before upload.
pub const MAX_CAPTURE_WIDTH: u32 = 1280;

/// Grabs the visible screen. Runs on a blocking thread.
///
/// Failure degrades to `None`; classification then proceeds on title and url.
pub trait ScreenCapture: Send + Sync {
    fn capture(&self) -> Option<Screenshot>;
}

/// Used when capture is disabled or unsupported.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapture;

impl ScreenCapture for NoCapture {
    fn capture(&self) -> Option<Screenshot> {
        None
    }
}

/// Encode raw RGBA pixels as PNG, downscaling to `max_width` if wider.
pub fn encode_png(width: u32, height: u32, rgba: Vec<u8>, max_width: u32) -> Option<Screenshot> {
    let buffer = RgbaImage::from_raw(width, height, rgba)?;
    let mut img = DynamicImage::ImageRgba8(buffer);

    if width > max_width && max_width > 0 {
        let scaled_height = ((height as u64 * max_width as u64) / width as u64).max(1) as u32;
        img = img.resize_exact(max_width, scaled_height, FilterType::Triangle);
    }

    let mut bytes = Cursor::new(Vec::new());
    if let Err(e) = img.write_to(&mut bytes, ImageFormat::Png) {
        debug!("png encoding failed: {}", e);
        return None;
    }
    Some(Screenshot::png(bytes.into_inner()))
}

/// Primary-monitor capture via the platform screen API.
#[cfg(feature = "screen-capture")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MonitorCapture;

#[cfg(feature = "screen-capture")]
impl ScreenCapture for MonitorCapture {
    fn capture(&self) -> Option<Screenshot> {
        let monitors = match xcap::Monitor::all() {
            Ok(monitors) => monitors,
            Err(e) => {
                debug!("no monitors available: {}", e);
                return None;
            }
        };
        let monitor = monitors
            .iter()
            .find(|m| m.is_primary())
            .or_else(|| monitors.first())?;

        let frame = match monitor.capture_image() {
            Ok(frame) => frame,
            Err(e) => {
                debug!("screen capture failed: {}", e);
                return None;
            }
        };
        let (width, height) = (frame.width(), frame.height());
        encode_png(width, height, frame.into_raw(), MAX_CAPTURE_WIDTH)
    }
}
