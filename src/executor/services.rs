//! OS-facing collaborators used by leaf commands.
//!
//! The executor only sees the [`InputDriver`] and [`ScreenSearch`] traits.
//! Desktop implementations use enigo for input and xcap + imageproc for
//! screen search; tests plug in recording fakes.

use super::automation::EnigoInput;
use super::image_matching::find_template;
use crate::settings::{ImageQuery, MouseButton};
use enigo::Key;
use image::RgbaImage;
use std::collections::HashMap;
use xcap::Monitor;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

pub trait InputDriver {
    fn click(&mut self, x: i32, y: i32, button: MouseButton, count: u32) -> anyhow::Result<()>;
    /// Presses `keys` in order, then releases them in reverse.
    fn press_keys(&mut self, keys: &[Key]) -> anyhow::Result<()>;
}

pub trait ScreenSearch {
    /// Centre of the best match in logical pixels, or None when the image is
    /// not on screen.
    fn find_image(&mut self, query: &ImageQuery) -> anyhow::Result<Option<Point>>;
}

pub struct Services {
    pub input: Box<dyn InputDriver>,
    pub screen: Box<dyn ScreenSearch>,
}

impl Services {
    pub fn new(input: Box<dyn InputDriver>, screen: Box<dyn ScreenSearch>) -> Self {
        Self { input, screen }
    }

    /// enigo input and primary-monitor screen search.
    pub fn desktop() -> Self {
        Self::new(Box::new(EnigoInput::new()), Box::new(XcapScreen::new()))
    }
}

/// Screen search over the primary monitor. Templates are cached by path.
#[derive(Default)]
pub struct XcapScreen {
    templates: HashMap<String, RgbaImage>,
}

impl XcapScreen {
    pub fn new() -> Self {
        Self::default()
    }

    fn template(&mut self, path: &str) -> anyhow::Result<&RgbaImage> {
        if !self.templates.contains_key(path) {
            let template = image::open(path)
                .map_err(|e| anyhow::anyhow!("Template load error for {}: {}", path, e))?
                .to_rgba8();
            self.templates.insert(path.to_string(), template);
        }
        self.templates
            .get(path)
            .ok_or_else(|| anyhow::anyhow!("Template {} missing from cache", path))
    }
}

impl ScreenSearch for XcapScreen {
    fn find_image(&mut self, query: &ImageQuery) -> anyhow::Result<Option<Point>> {
        let monitors = Monitor::all()?;
        let monitor = monitors
            .first()
            .ok_or_else(|| anyhow::anyhow!("No monitor available for capture"))?;
        let scale_factor = monitor.scale_factor().unwrap_or(1.0);
        let screen = monitor.capture_image()?;
        let screen = RgbaImage::from_raw(screen.width(), screen.height(), screen.into_raw())
            .ok_or_else(|| anyhow::anyhow!("Screen capture returned a malformed buffer"))?;

        let template = self.template(&query.path)?;
        Ok(find_template(
            &screen,
            template,
            query.threshold,
            query.region,
            scale_factor,
            query.algorithm,
        ))
    }
}
