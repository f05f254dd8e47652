//! End-to-end policy scenarios against a real file-backed channel.

use std::time::{Duration, Instant};

use ball_follower::{
    Command, CommandReader, CommandWriter, ControlPolicy, ControllerState, DistanceSample,
    PolicySettings, Pose, TargetObservation,
};

const FRAME_WIDTH: u32 = 640;

fn centered(distance: DistanceSample) -> TargetObservation {
    TargetObservation {
        center_x: FRAME_WIDTH as f32 / 2.0,
        frame_width: FRAME_WIDTH,
        distance,
    }
}

/// Drive one policy decision into the channel the way the daemon does:
/// `None` decisions leave the slot untouched.
fn apply(
    policy: &mut ControlPolicy,
    writer: &CommandWriter,
    now: Instant,
    observation: Option<&TargetObservation>,
) -> ControllerState {
    let decision = policy.step(now, observation);
    if let Some(command) = decision.command {
        writer.write(&command).expect("channel write");
    }
    decision.state
}

#[test]
fn scenario_a_loss_timeout_emits_the_scan_command() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("velocities.txt");
    let writer = CommandWriter::new(&path);
    let mut reader = CommandReader::new(&path);
    let mut policy = ControlPolicy::new(PolicySettings::default());

    let t0 = Instant::now();
    apply(&mut policy, &writer, t0, Some(&centered(DistanceSample::Valid(2.0))));

    // Target lost for longer than the 0.5 s timeout.
    let state = apply(&mut policy, &writer, t0 + Duration::from_millis(700), None);
    assert_eq!(state, ControllerState::Searching);

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "0.000,0.000,0.400"
    );
    assert_eq!(reader.read(), Command::velocity(0.0, 0.0, 0.4));
}

#[test]
fn scenario_b_insufficient_depth_leaves_the_channel_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("velocities.txt");
    let writer = CommandWriter::new(&path);
    let mut policy = ControlPolicy::new(PolicySettings::default());

    let t0 = Instant::now();
    apply(&mut policy, &writer, t0, Some(&centered(DistanceSample::Valid(2.0))));
    let before = std::fs::read_to_string(&path).unwrap();

    // The depth window came back with 3 valid pixels (< minimum of 5): the
    // estimator reports TooFewSamples and the cycle must not update.
    let state = apply(
        &mut policy,
        &writer,
        t0 + Duration::from_millis(50),
        Some(&centered(DistanceSample::TooFewSamples)),
    );
    assert_eq!(state, ControllerState::Searching);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn scenario_c_garbage_slot_content_keeps_last_good_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("velocities.txt");
    let writer = CommandWriter::new(&path);
    let mut reader = CommandReader::new(&path);

    let good = Command::velocity(0.30, 0.0, -0.12);
    writer.write(&good).unwrap();
    assert_eq!(reader.read(), good);

    // Something scribbled over the slot.
    std::fs::write(&path, "garbage").unwrap();
    assert_eq!(reader.read(), good);

    // And recovery works once a valid value lands again.
    writer.write(&Command::Pose(Pose::Sit)).unwrap();
    assert_eq!(reader.read(), Command::Pose(Pose::Sit));
}

#[test]
fn scenario_d_sticky_sit_survives_loss_and_clears_on_renewed_fix() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("velocities.txt");
    let writer = CommandWriter::new(&path);
    let mut reader = CommandReader::new(&path);
    let mut policy = ControlPolicy::new(PolicySettings::default());

    let t0 = Instant::now();

    // Close approach trips the sit override.
    let state = apply(&mut policy, &writer, t0, Some(&centered(DistanceSample::Valid(0.3))));
    assert_eq!(state, ControllerState::Sitting);
    assert_eq!(reader.read(), Command::Pose(Pose::Sit));

    // Ball removed: the sit is sticky, even long past the loss timeout.
    let state = apply(&mut policy, &writer, t0 + Duration::from_secs(2), None);
    assert_eq!(state, ControllerState::Sitting);
    assert_eq!(reader.read(), Command::Pose(Pose::Sit));

    // Ball shown again at range: velocity control resumes.
    let state = apply(
        &mut policy,
        &writer,
        t0 + Duration::from_secs(3),
        Some(&centered(DistanceSample::Valid(1.5))),
    );
    assert_eq!(state, ControllerState::Approaching);
    assert!(matches!(reader.read(), Command::Velocity { .. }));
}

#[test]
fn near_distances_never_command_forward_motion() {
    for sit_override in [true, false] {
        let mut policy = ControlPolicy::new(PolicySettings {
            sit_override,
            ..PolicySettings::default()
        });
        for raw in 1..15u32 {
            let distance = raw as f32 / 100.0;
            let decision = policy.step(
                Instant::now(),
                Some(&centered(DistanceSample::Valid(distance))),
            );
            match decision.command.expect("near fix always decides") {
                Command::Velocity { vx, .. } => assert!(vx <= 0.0, "vx {vx} at {distance} m"),
                Command::Pose(pose) => assert_eq!(pose, Pose::Sit),
            }
            assert!(matches!(
                decision.state,
                ControllerState::TooClose | ControllerState::Sitting
            ));
        }
    }
}

#[test]
fn hold_band_pins_forward_speed_to_zero() {
    let mut policy = ControlPolicy::new(PolicySettings {
        sit_override: false,
        ..PolicySettings::default()
    });
    for distance in [0.41, 0.45, 0.49] {
        let decision = policy.step(
            Instant::now(),
            Some(&centered(DistanceSample::Valid(distance))),
        );
        assert_eq!(decision.state, ControllerState::Holding, "at {distance} m");
        match decision.command.unwrap() {
            Command::Velocity { vx, .. } => assert_eq!(vx, 0.0),
            other => panic!("expected velocity, got {other:?}"),
        }
    }
}
