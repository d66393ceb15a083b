//! Kinematics utilities for two-wheeled differential-drive robots.
//!
//! `DifferentialKinematics` advances a [`Pose`] by one measured interval using
//! the exact-arc solution: the robot travels along a circular arc, and the
//! position update uses the chord of that arc taken at the midpoint heading.
//!
//! Heading 0 faces +Y and positive heading turns counter-clockwise, so the
//! forward unit vector is `(-sin h, cos h)`.
//!
//! # Example
//! ```rust
//! use dds_core::utils::math::kinematics::{DifferentialKinematics, Pose, RobotConfig, WheelCommand};
//! let config = RobotConfig::new(10.0, 10.0).unwrap();
//! let kin = DifferentialKinematics::new(config);
//! let pose = kin
//!     .integrate(Pose::default(), WheelCommand::new(10.0, 10.0), 1.0)
//!     .unwrap();
//! assert!((pose.y - 10.0).abs() < 1e-9);
//! ```
use core::{f64::consts::TAU, fmt};

use serde::{Deserialize, Serialize};

/// Heading change (rad) below which a tick is treated as a straight segment.
pub const EPSILON: f64 = 1e-9;

/// Position (inches) and heading (rad) of the robot center.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    /// Unbounded; accumulates every turn the robot makes.
    pub heading: f64,
}

impl Pose {
    pub const fn new(
        x: f64,
        y: f64,
        heading: f64,
    ) -> Self {
        Self { x, y, heading }
    }

    /// Heading wrapped into `[0, 2π)`, for display and logs only.
    pub fn normalized_heading(&self) -> f64 {
        let h = libm::fmod(self.heading, TAU);
        if h < 0.0 {
            h + TAU
        } else {
            h
        }
    }

    /// Unit vector the robot is facing.
    pub fn forward(&self) -> (f64, f64) {
        (-libm::sin(self.heading), libm::cos(self.heading))
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.heading.is_finite()
    }
}

/// Commanded wheel surface speeds (inches/sec).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelCommand {
    pub left: f64,
    pub right: f64,
}

impl WheelCommand {
    pub const STOP: Self = Self::new(0.0, 0.0);

    pub const fn new(
        left: f64,
        right: f64,
    ) -> Self {
        Self { left, right }
    }

    /// Wheel speeds that realize a body twist.
    ///
    /// `linear` is forward speed (inches/sec) and `angular` is yaw rate
    /// (rad/sec, counter-clockwise positive).
    pub fn from_twist(
        linear: f64,
        angular: f64,
        track_width: f64,
    ) -> Self {
        let half = angular * track_width / 2.0;
        Self::new(linear - half, linear + half)
    }

    /// Both speeds clamped into `[-max_speed, max_speed]`.
    ///
    /// NaN passes through unchanged; the next integration rejects it.
    pub fn clamped(
        self,
        max_speed: f64,
    ) -> Self {
        Self::new(
            clamp(self.left, -max_speed, max_speed),
            clamp(self.right, -max_speed, max_speed),
        )
    }

    pub fn is_finite(&self) -> bool {
        self.left.is_finite() && self.right.is_finite()
    }
}

/// Clamp `value` into `[min, max]`.
pub fn clamp(
    value: f64,
    min: f64,
    max: f64,
) -> f64 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Configuration rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// Track width must be finite and strictly positive.
    TrackWidth(f64),
    /// Max speed must be finite and strictly positive.
    MaxSpeed(f64),
    /// Viewport half extent must be finite and strictly positive.
    ViewportExtent(f64),
}

impl fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ConfigError::TrackWidth(v) => write!(f, "track width must be > 0, got {v}"),
            ConfigError::MaxSpeed(v) => write!(f, "max speed must be > 0, got {v}"),
            ConfigError::ViewportExtent(v) => write!(f, "viewport half extent must be > 0, got {v}"),
        }
    }
}

/// A tick that would corrupt the pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickError {
    /// `now` is earlier than the previous tick.
    ClockWentBackwards,
    /// Elapsed time, command, or resulting pose is NaN or infinite.
    NonFinite,
}

impl fmt::Display for TickError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            TickError::ClockWentBackwards => f.write_str("tick clock went backwards"),
            TickError::NonFinite => f.write_str("non-finite value in tick"),
        }
    }
}

/// Immutable robot geometry and speed limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RobotConfig {
    /// Distance between the wheel contact points (inches).
    track_width: f64,
    /// Maximum wheel speed magnitude (inches/sec).
    max_speed: f64,
}

impl RobotConfig {
    pub fn new(
        track_width: f64,
        max_speed: f64,
    ) -> Result<Self, ConfigError> {
        if !(track_width.is_finite() && track_width > 0.0) {
            return Err(ConfigError::TrackWidth(track_width));
        }
        if !(max_speed.is_finite() && max_speed > 0.0) {
            return Err(ConfigError::MaxSpeed(max_speed));
        }
        Ok(Self {
            track_width,
            max_speed,
        })
    }

    pub fn track_width(&self) -> f64 {
        self.track_width
    }

    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }
}

/// Exact-arc integrator for a differential-drive base.
#[derive(Debug, Clone, Copy)]
pub struct DifferentialKinematics {
    config: RobotConfig,
}

impl DifferentialKinematics {
    pub fn new(config: RobotConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    /// Advance `pose` by `dt` seconds of constant wheel speeds.
    ///
    /// # Errors
    ///
    /// [`TickError::ClockWentBackwards`] for negative `dt`, and
    /// [`TickError::NonFinite`] if any input or the result is not finite.
    pub fn integrate(
        &self,
        pose: Pose,
        command: WheelCommand,
        dt: f64,
    ) -> Result<Pose, TickError> {
        if !dt.is_finite() || !command.is_finite() {
            return Err(TickError::NonFinite);
        }
        if dt < 0.0 {
            return Err(TickError::ClockWentBackwards);
        }

        let track = self.config.track_width;
        let d_left = dt * command.left;
        let d_right = dt * command.right;
        let d_theta = (d_right - d_left) / track;

        let chord = if libm::fabs(d_theta) < EPSILON {
            (d_left + d_right) / 2.0
        } else {
            2.0 * libm::sin(d_theta / 2.0) * (d_right / d_theta - track / 2.0)
        };

        let avg_theta = pose.heading + d_theta / 2.0;
        let next = Pose {
            x: pose.x + chord * -libm::sin(avg_theta),
            y: pose.y + chord * libm::cos(avg_theta),
            heading: pose.heading + d_theta,
        };

        if next.is_finite() {
            Ok(next)
        } else {
            Err(TickError::NonFinite)
        }
    }

    /// Recover `(linear, angular)` body velocity from wheel speeds.
    pub fn body_velocity(
        &self,
        command: WheelCommand,
    ) -> (f64, f64) {
        let linear = (command.left + command.right) / 2.0;
        let angular = (command.right - command.left) / self.config.track_width;
        (linear, angular)
    }
}
