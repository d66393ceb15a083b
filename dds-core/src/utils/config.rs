//! Simulation settings.
//!
//! `SimSettings` is the deserializable, unvalidated form of everything needed to
//! start a simulation. Missing fields fall back to the defaults below; the
//! robot geometry only becomes a [`RobotConfig`] after validation.

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::utils::{
    math::kinematics::{ConfigError, Pose, RobotConfig, WheelCommand},
    render::Viewport,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    /// Distance between wheel contact points (inches).
    pub track_width: f64,
    /// Wheel speed limit (inches/sec).
    pub max_speed: f64,
    /// Initial pose.
    pub start: Pose,
    /// Wheel command in effect before any command arrives.
    pub initial: WheelCommand,
    /// Pause between integrator ticks (ms).
    pub tick_ms: u64,
    /// Pause between rendered frames (ms).
    pub frame_ms: u64,
    /// Half-width of the square world window (inches).
    pub viewport_half_extent: f64,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            track_width: 10.0,
            max_speed: 10.0,
            start: Pose::default(),
            initial: WheelCommand::STOP,
            tick_ms: 10,
            frame_ms: 50,
            viewport_half_extent: 72.0,
        }
    }
}

impl SimSettings {
    /// Validate the robot geometry.
    pub fn robot_config(&self) -> Result<RobotConfig, ConfigError> {
        RobotConfig::new(self.track_width, self.max_speed)
    }

    /// Validate the world window shown by the renderer.
    pub fn viewport(&self) -> Result<Viewport, ConfigError> {
        let extent = self.viewport_half_extent;
        if !(extent.is_finite() && extent > 0.0) {
            return Err(ConfigError::ViewportExtent(extent));
        }
        Ok(Viewport::centered(extent))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }
}
