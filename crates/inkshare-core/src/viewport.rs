//! Viewport transform for pan, zoom and rotation.
//!
//! Pointer positions are converted to canvas space with
//! [`Viewport::screen_to_canvas`] before they are sent to peers, so every
//! peer shares one coordinate frame regardless of its own view.

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

/// Rotation step for the rotate-left/right actions.
pub const ROTATION_STEP: f64 = FRAC_PI_2;

/// Screen pixels of horizontal drag per doubling of zoom.
const SCRUBBY_ZOOM_PIXELS: f64 = 200.0;

/// Screen pixels of horizontal drag per radian of rotation.
const SCRUBBY_ROTATE_PIXELS: f64 = 300.0;

/// View transform of one client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    /// Translation offset (pan) in screen units.
    pub offset: Vec2,
    /// Zoom level (1.0 = 100%).
    pub zoom: f64,
    /// Rotation in radians around the canvas origin.
    pub rotation: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            rotation: 0.0,
            min_zoom: 0.1,
            max_zoom: 10.0,
        }
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canvas-to-screen transform.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::rotate(self.rotation) * Affine::scale(self.zoom)
    }

    /// Screen-to-canvas transform.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom)
            * Affine::rotate(-self.rotation)
            * Affine::translate(-self.offset)
    }

    pub fn screen_to_canvas(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn canvas_to_screen(&self, canvas_point: Point) -> Point {
        self.transform() * canvas_point
    }

    /// Pan by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Zoom, keeping the given screen point fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }
        let anchor = self.screen_to_canvas(screen_point);
        self.zoom = new_zoom;
        self.keep_fixed(anchor, screen_point);
    }

    /// Rotate by `angle` radians around a screen point.
    pub fn rotate_at(&mut self, screen_point: Point, angle: f64) {
        let anchor = self.screen_to_canvas(screen_point);
        self.rotation = (self.rotation + angle).rem_euclid(std::f64::consts::TAU);
        self.keep_fixed(anchor, screen_point);
    }

    pub fn rotate_left(&mut self, screen_center: Point) {
        self.rotate_at(screen_center, -ROTATION_STEP);
    }

    pub fn rotate_right(&mut self, screen_center: Point) {
        self.rotate_at(screen_center, ROTATION_STEP);
    }

    /// Drag-to-zoom: horizontal screen movement zooms around `anchor`.
    pub fn scrubby_zoom(&mut self, anchor: Point, movement_x: f64) {
        self.zoom_at(anchor, 2f64.powf(movement_x / SCRUBBY_ZOOM_PIXELS));
    }

    /// Drag-to-rotate: horizontal screen movement rotates around `anchor`.
    pub fn scrubby_rotate(&mut self, anchor: Point, movement_x: f64) {
        self.rotate_at(anchor, movement_x / SCRUBBY_ROTATE_PIXELS);
    }

    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.zoom = 1.0;
        self.rotation = 0.0;
    }

    /// Adjust the offset so `canvas_point` maps back onto `screen_point`.
    fn keep_fixed(&mut self, canvas_point: Point, screen_point: Point) {
        let moved = self.canvas_to_screen(canvas_point);
        self.offset += Vec2::new(screen_point.x - moved.x, screen_point.y - moved.y);
    }
}
