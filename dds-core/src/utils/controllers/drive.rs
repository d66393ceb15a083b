//! Drive state for a simulated differential-drive robot.
//!
//! [`Robot`] owns the pose and tick clock and is stepped by exactly one task.
//! Wheel commands live in a [`CommandLatch`] that any context may write to; the
//! pair is read and written inside one critical section, so a tick sees either
//! the old or the new command, never half of each.

use core::cell::Cell;

use embassy_sync::{blocking_mutex::raw::RawMutex, blocking_mutex::Mutex, channel::Channel};
use embassy_time::Instant;
use serde::{Deserialize, Serialize};

use crate::utils::math::kinematics::{
    DifferentialKinematics, Pose, RobotConfig, TickError, WheelCommand,
};

/// Capacity of a [`CommandChannel`].
pub const COMMAND_QUEUE_DEPTH: usize = 16;

/// Queue carrying [`DriveCommand`]s from a command source to the dispatcher.
pub type CommandChannel<M> = Channel<M, DriveCommand, COMMAND_QUEUE_DEPTH>;

/// Drive command variants.
///
/// Serialized as JSON with tag `"dc"`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "dc", rename_all = "snake_case")]
pub enum DriveCommand {
    /// Set left and right wheel speeds (inches/sec).
    S { l: f64, r: f64 },
    /// Drive with forward speed `v` (inches/sec) and yaw rate `w` (rad/sec).
    T { v: f64, w: f64 },
    /// Stop both wheels.
    Stop,
}

/// Latest wheel command, clamped to the robot's speed limit.
pub struct CommandLatch<M: RawMutex> {
    config: RobotConfig,
    active: Mutex<M, Cell<WheelCommand>>,
}

impl<M: RawMutex> CommandLatch<M> {
    /// Create a latch for `config` with both wheels stopped.
    pub fn new(config: RobotConfig) -> Self {
        Self {
            config,
            active: Mutex::new(Cell::new(WheelCommand::STOP)),
        }
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    /// Store new wheel speeds, each clamped to `[-max_speed, max_speed]`.
    ///
    /// Takes effect on the next tick. NaN is stored as given, so that tick
    /// fails with [`TickError::NonFinite`].
    pub fn set_speed(
        &self,
        left: f64,
        right: f64,
    ) {
        let command = WheelCommand::new(left, right).clamped(self.config.max_speed());
        if !command.is_finite() {
            tracing::warn!(left, right, "non-finite wheel command stored");
        }
        self.active.lock(|c| c.set(command));
    }

    /// Copy of the active command.
    pub fn current(&self) -> WheelCommand {
        self.active.lock(|c| c.get())
    }

    /// Apply a decoded [`DriveCommand`].
    pub fn apply(
        &self,
        command: DriveCommand,
    ) {
        match command {
            DriveCommand::S { l, r } => self.set_speed(l, r),
            DriveCommand::T { v, w } => {
                let wheels = WheelCommand::from_twist(v, w, self.config.track_width());
                self.set_speed(wheels.left, wheels.right);
            }
            DriveCommand::Stop => self.set_speed(0.0, 0.0),
        }
    }
}

/// Pose and command as seen by the renderer after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotSnapshot {
    pub pose: Pose,
    pub command: WheelCommand,
}

/// Single-value mailbox holding the most recent [`RobotSnapshot`].
pub struct SnapshotSlot<M: RawMutex> {
    latest: Mutex<M, Cell<RobotSnapshot>>,
}

impl<M: RawMutex> SnapshotSlot<M> {
    pub const fn new(initial: RobotSnapshot) -> Self {
        Self {
            latest: Mutex::new(Cell::new(initial)),
        }
    }

    pub fn publish(
        &self,
        snapshot: RobotSnapshot,
    ) {
        self.latest.lock(|c| c.set(snapshot));
    }

    pub fn latest(&self) -> RobotSnapshot {
        self.latest.lock(|c| c.get())
    }
}

/// Monotonic timestamp of the last accepted tick.
#[derive(Debug, Clone, Copy)]
pub struct TickClock {
    last: Instant,
}

impl TickClock {
    pub fn new(start: Instant) -> Self {
        Self { last: start }
    }

    pub fn last(&self) -> Instant {
        self.last
    }

    /// Seconds since the last tick, or an error if `now` precedes it.
    pub fn elapsed_secs(
        &self,
        now: Instant,
    ) -> Result<f64, TickError> {
        let dt = now
            .checked_duration_since(self.last)
            .ok_or(TickError::ClockWentBackwards)?;
        Ok(dt.as_micros() as f64 / 1_000_000.0)
    }

    fn advance(
        &mut self,
        now: Instant,
    ) {
        self.last = now;
    }
}

/// Kinematic state of one simulated robot.
pub struct Robot<'a, M: RawMutex> {
    kinematics: DifferentialKinematics,
    pose: Pose,
    clock: TickClock,
    commands: &'a CommandLatch<M>,
    /// Command used by the last accepted tick.
    applied: WheelCommand,
}

impl<'a, M: RawMutex> Robot<'a, M> {
    /// Place a robot at `start`, reading wheel commands from `commands`.
    ///
    /// `now` seeds the tick clock; the first tick integrates from it.
    pub fn new(
        commands: &'a CommandLatch<M>,
        start: Pose,
        now: Instant,
    ) -> Self {
        let config = *commands.config();
        tracing::info!(
            track_width = config.track_width(),
            max_speed = config.max_speed(),
            x = start.x,
            y = start.y,
            heading = start.heading,
            "robot created"
        );
        Self {
            kinematics: DifferentialKinematics::new(config),
            pose: start,
            clock: TickClock::new(now),
            commands,
            applied: commands.current(),
        }
    }

    /// Advance the pose to `now` using the active wheel command.
    ///
    /// On error the pose and clock are left as they were.
    pub fn tick(
        &mut self,
        now: Instant,
    ) -> Result<Pose, TickError> {
        let dt = self.clock.elapsed_secs(now)?;
        let command = self.commands.current();
        let pose = self.kinematics.integrate(self.pose, command, dt)?;
        self.pose = pose;
        self.applied = command;
        self.clock.advance(now);
        tracing::trace!(dt, x = pose.x, y = pose.y, heading = pose.heading, "tick");
        Ok(pose)
    }

    pub fn set_speed(
        &self,
        left: f64,
        right: f64,
    ) {
        self.commands.set_speed(left, right);
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn command(&self) -> WheelCommand {
        self.commands.current()
    }

    pub fn config(&self) -> &RobotConfig {
        self.kinematics.config()
    }

    pub fn clock(&self) -> &TickClock {
        &self.clock
    }

    /// Command integrated by the last accepted tick.
    pub fn applied(&self) -> WheelCommand {
        self.applied
    }

    /// Pose together with the command that produced it.
    pub fn snapshot(&self) -> RobotSnapshot {
        RobotSnapshot {
            pose: self.pose,
            command: self.applied,
        }
    }
}
