//! Rendering seam for the simulator.
//!
//! The core never owns a window. Anything that can draw circles and lines in
//! world coordinates implements [`Canvas`] and is handed to [`render_frame`] or
//! [`run_renderer`]. [`RobotFigure`] holds the shapes for one robot: a body
//! circle and one indicator segment per wheel whose length and color track
//! that wheel's speed.

use core::{convert::Infallible, fmt::Debug};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Timer};
use smart_leds_trait::RGB8;

use crate::utils::{
    controllers::{RobotSnapshot, SnapshotSlot},
    math::{color::speed_to_color, kinematics::RobotConfig},
};

/// Outline color of the robot body.
pub const BODY_COLOR: RGB8 = RGB8 {
    r: 255,
    g: 255,
    b: 255,
};

/// Point in world coordinates (inches).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(
        x: f64,
        y: f64,
    ) -> Self {
        Self { x, y }
    }
}

/// Drawing surface in world coordinates.
pub trait Canvas {
    type Error: Debug;

    fn clear(&mut self) -> Result<(), Self::Error>;

    fn circle(
        &mut self,
        center: Point,
        radius: f64,
        color: RGB8,
    ) -> Result<(), Self::Error>;

    fn line(
        &mut self,
        from: Point,
        to: Point,
        color: RGB8,
    ) -> Result<(), Self::Error>;

    /// Flush everything drawn since the last `clear`.
    fn present(&mut self) -> Result<(), Self::Error>;
}

/// Visible world rectangle, mapped onto a grid of cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub min: Point,
    pub max: Point,
}

impl Viewport {
    /// Square viewport `[-half_extent, half_extent]` on both axes.
    pub fn centered(half_extent: f64) -> Self {
        Self {
            min: Point::new(-half_extent, -half_extent),
            max: Point::new(half_extent, half_extent),
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Cell `(column, row)` for `p` on a `cols × rows` grid, row 0 at the top.
    ///
    /// `None` when `p` lies outside the viewport.
    pub fn to_cell(
        &self,
        p: Point,
        cols: usize,
        rows: usize,
    ) -> Option<(usize, usize)> {
        if cols == 0 || rows == 0 {
            return None;
        }
        let u = (p.x - self.min.x) / self.width();
        let v = (self.max.y - p.y) / self.height();
        if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
            return None;
        }
        let col = libm::floor(u * cols as f64) as usize;
        let row = libm::floor(v * rows as f64) as usize;
        Some((col.min(cols - 1), row.min(rows - 1)))
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::centered(72.0)
    }
}

/// Wheel indicator: starts at the contact point, points along travel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelIndicator {
    pub from: Point,
    pub to: Point,
    pub color: RGB8,
}

/// Shapes for one robot at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotFigure {
    pub center: Point,
    pub radius: f64,
    pub left: WheelIndicator,
    pub right: WheelIndicator,
}

impl RobotFigure {
    pub fn new(
        snapshot: &RobotSnapshot,
        config: &RobotConfig,
    ) -> Self {
        let pose = snapshot.pose;
        let half = config.track_width() / 2.0;
        let (fx, fy) = pose.forward();
        // Left of forward is forward rotated +90°.
        let (lx, ly) = (-fy, fx);
        let center = Point::new(pose.x, pose.y);

        let wheel = |side: f64, speed: f64| {
            let from = Point::new(center.x + side * half * lx, center.y + side * half * ly);
            let length = speed / config.max_speed() * config.track_width();
            WheelIndicator {
                from,
                to: Point::new(from.x + length * fx, from.y + length * fy),
                color: speed_to_color(speed, config.max_speed()),
            }
        };

        Self {
            center,
            radius: half,
            left: wheel(1.0, snapshot.command.left),
            right: wheel(-1.0, snapshot.command.right),
        }
    }

    pub fn draw<C: Canvas>(
        &self,
        canvas: &mut C,
    ) -> Result<(), C::Error> {
        canvas.circle(self.center, self.radius, BODY_COLOR)?;
        canvas.line(self.left.from, self.left.to, self.left.color)?;
        canvas.line(self.right.from, self.right.to, self.right.color)
    }
}

/// Draw the latest snapshot as one complete frame.
pub fn render_frame<C: Canvas, M: RawMutex>(
    canvas: &mut C,
    snapshots: &SnapshotSlot<M>,
    config: &RobotConfig,
) -> Result<(), C::Error> {
    let figure = RobotFigure::new(&snapshots.latest(), config);
    canvas.clear()?;
    figure.draw(canvas)?;
    canvas.present()
}

/// Redraw every `frame_interval` until the canvas fails.
pub async fn run_renderer<C: Canvas, M: RawMutex>(
    canvas: &mut C,
    snapshots: &SnapshotSlot<M>,
    config: RobotConfig,
    frame_interval: Duration,
) -> Result<Infallible, C::Error> {
    loop {
        render_frame(canvas, snapshots, &config)?;
        Timer::after(frame_interval).await;
    }
}
