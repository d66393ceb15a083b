use std::convert::Infallible;

use dds_core::utils::connection::stream::{decode_command, encode_snapshot};
use dds_core::utils::controllers::{
    CommandChannel, CommandLatch, DriveCommand, Robot, RobotSnapshot, SimController, SnapshotSlot,
};
use dds_core::utils::math::kinematics::{Pose, RobotConfig, TickError, WheelCommand};
use dds_core::utils::render::{render_frame, run_renderer, Canvas, Point};
use dds_core::utils::{Duration, Instant};
use embassy_futures::{block_on, select::select, yield_now};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use smart_leds_trait::RGB8;

type Latch = CommandLatch<CriticalSectionRawMutex>;
type Slot = SnapshotSlot<CriticalSectionRawMutex>;

/// Default geometry used by the demo robot.
pub fn config() -> RobotConfig {
    RobotConfig::new(10.0, 10.0).unwrap()
}

/// Timestamp `secs` seconds after boot.
pub fn at(secs: f64) -> Instant {
    Instant::from_micros((secs * 1_000_000.0).round() as u64)
}

fn assert_pose(
    pose: Pose,
    x: f64,
    y: f64,
    heading: f64,
) {
    assert!((pose.x - x).abs() < 1e-6, "x: {} != {}", pose.x, x);
    assert!((pose.y - y).abs() < 1e-6, "y: {} != {}", pose.y, y);
    assert!(
        (pose.heading - heading).abs() < 1e-6,
        "heading: {} != {}",
        pose.heading,
        heading
    );
}

#[derive(Debug, PartialEq)]
enum Shape {
    Clear,
    Circle(Point, f64, RGB8),
    Line(Point, Point, RGB8),
    Present,
}

/// Canvas that records draw calls instead of drawing.
#[derive(Default)]
struct RecordingCanvas {
    calls: Vec<Shape>,
}

impl Canvas for RecordingCanvas {
    type Error = Infallible;

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.calls.push(Shape::Clear);
        Ok(())
    }

    fn circle(
        &mut self,
        center: Point,
        radius: f64,
        color: RGB8,
    ) -> Result<(), Self::Error> {
        self.calls.push(Shape::Circle(center, radius, color));
        Ok(())
    }

    fn line(
        &mut self,
        from: Point,
        to: Point,
        color: RGB8,
    ) -> Result<(), Self::Error> {
        self.calls.push(Shape::Line(from, to, color));
        Ok(())
    }

    fn present(&mut self) -> Result<(), Self::Error> {
        self.calls.push(Shape::Present);
        Ok(())
    }
}

#[test]
fn test_controller_drives_straight_and_publishes() {
    let latch = Latch::new(config());
    let slot = Slot::new(RobotSnapshot::default());
    let robot = Robot::new(&latch, Pose::default(), at(0.0));
    let mut ctrl = SimController::new(robot, &slot, None);
    assert_eq!(ctrl.tick_interval(), Duration::from_millis(10));

    latch.set_speed(10.0, 10.0);
    let snap = ctrl.tick_once(at(1.0)).unwrap();
    assert_pose(snap.pose, 0.0, 10.0, 0.0);
    assert_eq!(snap.command, WheelCommand::new(10.0, 10.0));
    assert_eq!(slot.latest(), snap);
}

#[test]
fn test_controller_spins_in_place() {
    let latch = Latch::new(config());
    let slot = Slot::new(RobotSnapshot::default());
    let mut ctrl = SimController::new(Robot::new(&latch, Pose::default(), at(0.0)), &slot, None);

    latch.set_speed(10.0, -10.0);
    let snap = ctrl.tick_once(at(1.0)).unwrap();
    assert_pose(snap.pose, 0.0, 0.0, -2.0);
}

#[test]
fn test_irregular_ticks_match_one_long_tick() {
    let latch = Latch::new(config());
    latch.set_speed(10.0, -2.0);

    let mut many = Robot::new(&latch, Pose::default(), at(0.0));
    for t in [0.013, 0.02, 0.41, 0.5, 1.137, 2.0] {
        many.tick(at(t)).unwrap();
    }
    let mut once = Robot::new(&latch, Pose::default(), at(0.0));
    once.tick(at(2.0)).unwrap();

    let (a, b) = (many.pose(), once.pose());
    assert_pose(a, b.x, b.y, b.heading);
}

#[test]
fn test_same_sign_turn_keeps_growing_heading() {
    let latch = Latch::new(config());
    latch.set_speed(2.0, 6.0);
    let mut robot = Robot::new(&latch, Pose::default(), at(0.0));
    let mut last = 0.0_f64;
    for i in 1..=20 {
        let pose = robot.tick(at(i as f64 * 0.05)).unwrap();
        assert!(pose.heading.abs() >= last);
        last = pose.heading.abs();
    }
    assert!((last - 0.4).abs() < 1e-9);
}

#[test]
fn test_rest_state_is_stable() {
    let latch = Latch::new(config());
    let start = Pose::new(-3.0, 7.0, 4.0);
    let mut robot = Robot::new(&latch, start, at(0.0));
    for t in [0.5, 10.0, 1000.0] {
        assert_eq!(robot.tick(at(t)).unwrap(), start);
    }
}

#[test]
fn test_rejected_tick_reports_and_keeps_pose() {
    let latch = Latch::new(config());
    let slot = Slot::new(RobotSnapshot::default());
    let mut ctrl = SimController::new(Robot::new(&latch, Pose::default(), at(5.0)), &slot, None);
    latch.set_speed(3.0, 3.0);

    assert_eq!(ctrl.tick_once(at(4.0)), Err(TickError::ClockWentBackwards));
    assert_eq!(ctrl.robot.pose(), Pose::default());
    assert_eq!(slot.latest().pose, Pose::default());

    let snap = ctrl.tick_once(at(6.0)).unwrap();
    assert_pose(snap.pose, 0.0, 3.0, 0.0);
}

#[test]
fn test_concurrent_commands_are_never_torn() {
    let latch = Latch::new(config());
    let mut robot = Robot::new(&latch, Pose::default(), at(0.0));

    std::thread::scope(|s| {
        s.spawn(|| {
            for i in 0..20_000 {
                let v = if i % 2 == 0 { 4.0 } else { -7.0 };
                latch.set_speed(v, v);
            }
        });
        for i in 1..=20_000u64 {
            let pose = robot.tick(Instant::from_micros(i)).unwrap();
            let used = robot.snapshot().command;
            assert_eq!(used.left, used.right, "torn command {:?}", used);
            // Equal wheel speeds only ever drive straight.
            assert_eq!(pose.x, 0.0, "drifted at tick {}", i);
            assert_eq!(pose.heading, 0.0, "turned at tick {}", i);
        }
    });
}

#[test]
fn test_channel_commands_reach_the_latch() {
    let latch = Latch::new(config());
    let channel = CommandChannel::<CriticalSectionRawMutex>::new();

    for line in [
        r#"{"dc":"s","l":25,"r":-4}"#,
        "not json",
        r#"{"dc":"t","v":2,"w":0.4}"#,
    ] {
        if let Ok(cmd) = decode_command(line) {
            channel.try_send(cmd).unwrap();
        }
    }

    latch.apply(channel.try_receive().unwrap());
    assert_eq!(latch.current(), WheelCommand::new(10.0, -4.0));
    latch.apply(channel.try_receive().unwrap());
    assert_eq!(latch.current(), WheelCommand::new(0.0, 4.0));
    assert!(channel.try_receive().is_err());

    latch.apply(DriveCommand::Stop);
    assert_eq!(latch.current(), WheelCommand::STOP);
}

#[test]
fn test_command_dispatcher_drains_the_channel() {
    let latch = Latch::new(config());
    let channel = CommandChannel::<CriticalSectionRawMutex>::new();
    for line in [
        r#"{"dc":"s","l":-25,"r":3}"#,
        "{\"dc\":",
        r#"{"dc":"t","v":2,"w":0.4}"#,
    ] {
        if let Ok(cmd) = decode_command(line) {
            channel.try_send(cmd).unwrap();
        }
    }
    assert_eq!(channel.len(), 2);

    let _ = block_on(select(SimController::command_ch(&latch, &channel), async {
        while !channel.is_empty() {
            yield_now().await;
        }
    }));
    assert_eq!(latch.current(), WheelCommand::new(0.0, 4.0));
}

#[test]
fn test_run_stops_at_deadline_with_last_snapshot() {
    let latch = Latch::new(config());
    latch.set_speed(10.0, 10.0);
    let slot = Slot::new(RobotSnapshot::default());
    let start = Instant::now();
    let robot = Robot::new(&latch, Pose::default(), start);
    let mut ctrl = SimController::new(robot, &slot, Some(Duration::from_millis(5)));
    let deadline = start + Duration::from_millis(40);

    let snap = block_on(ctrl.run(Some(deadline))).unwrap();
    assert!(Instant::now() >= deadline);
    assert_eq!(slot.latest(), snap);
    assert_eq!(snap.pose, ctrl.robot.pose());
    assert_eq!(snap.command, WheelCommand::new(10.0, 10.0));
    assert_eq!(snap.pose.x, 0.0);
    // At least 40 ms at 10 inches/sec.
    assert!(snap.pose.y >= 0.4 - 1e-9, "y = {}", snap.pose.y);
}

#[test]
fn test_run_stops_on_first_rejected_tick() {
    let latch = Latch::new(config());
    latch.set_speed(5.0, 5.0);
    let slot = Slot::new(RobotSnapshot::default());
    let start = Pose::new(1.0, 2.0, 0.3);
    let robot = Robot::new(&latch, start, Instant::now() + Duration::from_secs(60));
    let mut ctrl = SimController::new(robot, &slot, None);

    assert_eq!(block_on(ctrl.run(None)), Err(TickError::ClockWentBackwards));
    assert_eq!(ctrl.robot.pose(), start);
    assert_eq!(slot.latest().pose, start);
}

#[test]
fn test_run_stops_on_non_finite_command() {
    let latch = Latch::new(config());
    let slot = Slot::new(RobotSnapshot::default());
    let mut ctrl = SimController::new(Robot::new(&latch, Pose::default(), Instant::now()), &slot, None);
    latch.set_speed(f64::NAN, 2.0);

    assert_eq!(block_on(ctrl.run(None)), Err(TickError::NonFinite));
    assert_eq!(ctrl.robot.pose(), Pose::default());
}

/// Canvas whose display goes away after a few frames.
struct FlakyCanvas {
    frames: usize,
}

impl Canvas for FlakyCanvas {
    type Error = &'static str;

    fn clear(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn circle(
        &mut self,
        _center: Point,
        _radius: f64,
        _color: RGB8,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    fn line(
        &mut self,
        _from: Point,
        _to: Point,
        _color: RGB8,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    fn present(&mut self) -> Result<(), Self::Error> {
        self.frames += 1;
        if self.frames == 3 {
            Err("display lost")
        } else {
            Ok(())
        }
    }
}

#[test]
fn test_renderer_runs_until_canvas_fails() {
    let slot = Slot::new(RobotSnapshot::default());
    let mut canvas = FlakyCanvas { frames: 0 };
    let err = block_on(run_renderer(&mut canvas, &slot, config(), Duration::from_millis(1))).unwrap_err();
    assert_eq!(err, "display lost");
    assert_eq!(canvas.frames, 3);
}

#[test]
fn test_mk_static_resolves_through_the_crate() {
    let latch: &'static Latch = dds_core::mk_static!(Latch, Latch::new(config()));
    latch.set_speed(1.0, 2.0);
    assert_eq!(latch.current(), WheelCommand::new(1.0, 2.0));
}

#[test]
fn test_render_frame_draws_body_then_wheels() {
    let cfg = config();
    let latch = Latch::new(cfg);
    let slot = Slot::new(RobotSnapshot::default());
    let mut ctrl = SimController::new(Robot::new(&latch, Pose::default(), at(0.0)), &slot, None);
    latch.set_speed(10.0, 0.0);
    ctrl.tick_once(at(0.0)).unwrap();

    let mut canvas = RecordingCanvas::default();
    render_frame(&mut canvas, &slot, &cfg).unwrap();

    assert_eq!(canvas.calls.len(), 5);
    assert_eq!(canvas.calls[0], Shape::Clear);
    assert_eq!(
        canvas.calls[1],
        Shape::Circle(Point::new(0.0, 0.0), 5.0, RGB8 { r: 255, g: 255, b: 255 })
    );
    match &canvas.calls[2] {
        Shape::Line(from, to, color) => {
            assert!((from.x + 5.0).abs() < 1e-9 && from.y.abs() < 1e-9);
            assert!((to.x + 5.0).abs() < 1e-9 && (to.y - 10.0).abs() < 1e-9);
            assert_eq!(*color, RGB8 { r: 128, g: 255, b: 255 });
        }
        other => panic!("expected left wheel line, got {:?}", other),
    }
    match &canvas.calls[3] {
        Shape::Line(from, to, color) => {
            assert_eq!(from, to);
            assert_eq!(*color, RGB8 { r: 255, g: 128, b: 128 });
        }
        other => panic!("expected right wheel line, got {:?}", other),
    }
    assert_eq!(canvas.calls[4], Shape::Present);
}

#[test]
fn test_telemetry_line_round_trips_through_serde() {
    let snap = RobotSnapshot {
        pose: Pose::new(0.5, 1.0, -0.75),
        command: WheelCommand::new(3.0, 4.0),
    };
    let line = encode_snapshot(&snap).unwrap();
    let back: RobotSnapshot = serde_json::from_str(&line).unwrap();
    assert_eq!(back, snap);
}
