#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use serde::{Deserialize, Serialize};

/// A point in viewport space: image width maps to `1.0` on both axes.
///
/// All annotation geometry is stored in this space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A point in image space (source pixels).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImagePoint {
    pub x: f64,
    pub y: f64,
}

impl ImagePoint {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A point in screen space (device pixels of the visible container).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pan/zoom state of the viewer plus the image and container dimensions.
///
/// Image ↔ viewport is a fixed affine map set by `image_width`.
/// Screen ↔ viewport depends on `zoom` and `pan`: `screen = viewport * scale + pan`.
/// `pan` is the screen position of the viewport origin, in pixels.
/// At `zoom == 1.0` the image width fills the container width.
#[derive(Debug, Clone, Copy)]
pub struct ViewTransform {
    pub image_width: f64,
    pub image_height: f64,
    pub container_width: f64,
    pub container_height: f64,
    pub zoom: f64,
    pub pan: ScreenPoint,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            image_width: 1.0,
            image_height: 1.0,
            container_width: 1.0,
            container_height: 1.0,
            zoom: 1.0,
            pan: ScreenPoint::default(),
        }
    }
}

impl ViewTransform {
    /// Create a transform for an image shown in a container at zoom 1 with no pan.
    #[must_use]
    pub fn new(
        image_width: f64,
        image_height: f64,
        container_width: f64,
        container_height: f64,
    ) -> Self {
        Self { image_width, image_height, container_width, container_height, ..Self::default() }
    }

    /// Screen pixels per viewport unit: container width times zoom.
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.container_width * self.zoom
    }

    /// Height of the image in viewport units (its width is always `1.0`).
    #[must_use]
    pub fn aspect_height(&self) -> f64 {
        self.image_height / self.image_width
    }

    #[must_use]
    pub fn image_to_viewport(&self, p: ImagePoint) -> Point {
        Point { x: p.x / self.image_width, y: p.y / self.image_width }
    }

    #[must_use]
    pub fn viewport_to_image(&self, p: Point) -> ImagePoint {
        ImagePoint { x: p.x * self.image_width, y: p.y * self.image_width }
    }

    #[must_use]
    pub fn screen_to_viewport(&self, p: ScreenPoint) -> Point {
        let scale = self.scale();
        Point { x: (p.x - self.pan.x) / scale, y: (p.y - self.pan.y) / scale }
    }

    #[must_use]
    pub fn viewport_to_screen(&self, p: Point) -> ScreenPoint {
        let scale = self.scale();
        ScreenPoint { x: p.x * scale + self.pan.x, y: p.y * scale + self.pan.y }
    }

    /// Convert a screen-space distance (pixels) to viewport units.
    #[must_use]
    pub fn screen_dist_to_viewport(&self, screen_dist: f64) -> f64 {
        screen_dist / self.scale()
    }

    /// Whether a viewport point lies on the image (edges inclusive).
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        (0.0..=1.0).contains(&p.x) && (0.0..=self.aspect_height()).contains(&p.y)
    }

    /// Map a batch of image points to viewport space.
    #[must_use]
    pub fn image_to_viewport_all(&self, points: &[ImagePoint]) -> Vec<Point> {
        points.iter().map(|p| self.image_to_viewport(*p)).collect()
    }

    /// Map a batch of viewport points to image space.
    #[must_use]
    pub fn viewport_to_image_all(&self, points: &[Point]) -> Vec<ImagePoint> {
        points.iter().map(|p| self.viewport_to_image(*p)).collect()
    }
}
