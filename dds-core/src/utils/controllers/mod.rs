//! Module Exports
//!
//! This file exports the drive state and the tasks that host it.
//!
//! - `drive`: robot pose, tick clock, command latch and drive commands.
//!
//! [`SimController`] is the one scheduler that steps a [`Robot`]. Ticks are
//! serialized by ownership: the controller holds the robot mutably and
//! nothing else can reach it.

/// Module for the robot's kinematic state and command interface.
pub mod drive;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Instant, Timer};

pub use drive::{
    CommandChannel, CommandLatch, DriveCommand, Robot, RobotSnapshot, SnapshotSlot, TickClock,
};

use crate::utils::math::kinematics::TickError;

/// Default pause between ticks. Elapsed time is measured, so this is a hint.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

pub struct SimController<'a, M: RawMutex> {
    pub robot: Robot<'a, M>,
    snapshots: &'a SnapshotSlot<M>,
    tick_interval: Duration,
}

impl<'a, M: RawMutex> SimController<'a, M> {
    pub fn new(
        robot: Robot<'a, M>,
        snapshots: &'a SnapshotSlot<M>,
        tick_interval: Option<Duration>,
    ) -> Self {
        snapshots.publish(robot.snapshot());
        SimController {
            robot,
            snapshots,
            tick_interval: tick_interval.unwrap_or(DEFAULT_TICK_INTERVAL),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Step the robot to `now` and publish the resulting snapshot.
    pub fn tick_once(
        &mut self,
        now: Instant,
    ) -> Result<RobotSnapshot, TickError> {
        self.robot.tick(now)?;
        let snapshot = self.robot.snapshot();
        self.snapshots.publish(snapshot);
        Ok(snapshot)
    }

    /// Tick until `deadline` passes, or forever when it is `None`.
    ///
    /// Returns the last published snapshot, or the first rejected tick.
    pub async fn run(
        &mut self,
        deadline: Option<Instant>,
    ) -> Result<RobotSnapshot, TickError> {
        tracing::info!(
            interval_ms = self.tick_interval.as_millis(),
            "integrator loop started"
        );
        loop {
            let now = Instant::now();
            let snapshot = self.tick_once(now).inspect_err(|error| {
                tracing::error!(%error, pose = ?self.robot.pose(), "tick rejected, stopping");
            })?;

            if deadline.is_some_and(|d| now >= d) {
                let pose = snapshot.pose;
                tracing::info!(
                    x = pose.x,
                    y = pose.y,
                    heading = pose.normalized_heading(),
                    "integrator loop finished"
                );
                return Ok(snapshot);
            }

            Timer::after(self.tick_interval).await;
        }
    }

    /// Forward commands from `channel` into `commands` forever.
    pub async fn command_ch(
        commands: &CommandLatch<M>,
        channel: &CommandChannel<M>,
    ) -> ! {
        loop {
            let command = channel.receive().await;
            tracing::info!("Received drive command: {:?}", command);
            commands.apply(command);
            let active = commands.current();
            tracing::debug!(left = active.left, right = active.right, "wheel command active");
        }
    }
}
