//! Monitor enumeration and frame grabbing via the `screenshots` crate.

use image::{DynamicImage, RgbaImage};
use screenshots::Screen;

/// One grabbed frame plus the monitor it came from.
pub struct Frame {
    pub monitor_index: u32,
    pub image: DynamicImage,
    pub width: u32,
    pub height: u32,
}

/// List available screens, numbered 1-based to match the original system's
/// monitor indexing (index 0 is reserved for "all monitors combined").
pub fn list_screens() -> Vec<Screen> {
    Screen::all().unwrap_or_default()
}

pub fn grab(monitor_index: u32) -> Option<Frame> {
    let screens = list_screens();
    let screen = screens.get(monitor_index.checked_sub(1)? as usize)?;
    let image = screen.capture().ok()?;
    let (width, height) = (image.width(), image.height());
    Some(Frame {
        monitor_index,
        image: DynamicImage::ImageRgba8(image),
        width,
        height,
    })
}

pub fn grab_primary() -> Option<Frame> {
    let screens = list_screens();
    let index = screens
        .iter()
        .position(|s| s.display_info.is_primary)
        .unwrap_or(0);
    let screen = screens.get(index)?;
    let image = screen.capture().ok()?;
    let (width, height) = (image.width(), image.height());
    Some(Frame {
        monitor_index: (index + 1) as u32,
        image: DynamicImage::ImageRgba8(image),
        width,
        height,
    })
}

pub fn grab_all() -> Vec<Frame> {
    list_screens()
        .iter()
        .enumerate()
        .filter_map(|(i, screen)| {
            let image = screen.capture().ok()?;
            let (width, height) = (image.width(), image.height());
            Some(Frame {
                monitor_index: (i + 1) as u32,
                image: DynamicImage::ImageRgba8(image),
                width,
                height,
            })
        })
        .collect()
}

/// Stitch every monitor's frame into one combined image, positioned by each
/// screen's reported offset (spec §4.5: "combined stitched").
pub fn grab_combined() -> Option<Frame> {
    let screens = list_screens();
    if screens.is_empty() {
        return None;
    }

    let grabbed: Vec<(RgbaImage, &Screen)> = screens
        .iter()
        .filter_map(|s| s.capture().ok().map(|img| (img, s)))
        .collect();
    if grabbed.is_empty() {
        return None;
    }

    let min_left = grabbed.iter().map(|(_, s)| s.display_info.x).min().unwrap_or(0);
    let min_top = grabbed.iter().map(|(_, s)| s.display_info.y).min().unwrap_or(0);
    let max_right = grabbed
        .iter()
        .map(|(_, s)| s.display_info.x + s.display_info.width as i32)
        .max()
        .unwrap_or(0);
    let max_bottom = grabbed
        .iter()
        .map(|(_, s)| s.display_info.y + s.display_info.height as i32)
        .max()
        .unwrap_or(0);

    let width = (max_right - min_left).max(1) as u32;
    let height = (max_bottom - min_top).max(1) as u32;
    let mut combined = RgbaImage::new(width, height);

    for (img, screen) in &grabbed {
        let x = (screen.display_info.x - min_left).max(0) as i64;
        let y = (screen.display_info.y - min_top).max(0) as i64;
        image::imageops::overlay(&mut combined, img, x, y);
    }

    Some(Frame {
        monitor_index: 0,
        image: DynamicImage::ImageRgba8(combined),
        width,
        height,
    })
}
