//! followerd - ball follower control daemon
//!
//! This daemon:
//! 1. Brings up the frame source and detector (failure here is fatal)
//! 2. Writes the neutral command so the actuator starts from a safe state
//! 3. Runs the perception-to-command cycle on a fixed tick
//! 4. Publishes annotated preview frames for the streaming collaborator
//! 5. On shutdown (normal or Ctrl-C) writes the neutral command again
//!
//! The actuation process is a separate program reading the command file on
//! its own clock; nothing here blocks on it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use ball_follower::{
    target, Command, CommandWriter, ControlPolicy, DepthEstimator, Detector, DistanceSample,
    FollowerdConfig, PreviewSlot, TargetObservation, TargetSelector, TickScheduler,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = FollowerdConfig::load()?;

    // Initialization failures abort before the control loop starts.
    let mut source = ball_follower::open_source(&cfg.source)
        .and_then(|mut source| {
            source.connect()?;
            Ok(source)
        })
        .context("frame source initialization failed")?;

    let mut detector =
        Detector::from_settings(&cfg.detector).context("detector initialization failed")?;
    detector.warm_up().context("detector warm-up failed")?;

    let estimator = DepthEstimator::new(cfg.depth);
    let mut policy = ControlPolicy::new(cfg.policy);
    let writer = CommandWriter::new(cfg.command_path.clone());
    let preview = PreviewSlot::new();

    // Safe starting state: the actuator must never pick up a stale command
    // from a previous run.
    writer
        .write(&Command::neutral())
        .context("initial neutral command write failed")?;

    target::ensure_target_file(&cfg.target_path)
        .context("target side-channel initialization failed")?;
    let selector = TargetSelector::spawn(cfg.target_path.clone(), cfg.target_poll_interval);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            running.store(false, Ordering::Relaxed);
        })
        .expect("error setting Ctrl-C handler");
    }

    log::info!(
        "followerd running: source={} detector={} ({:?}) command={} target={}",
        cfg.source.url,
        detector.name(),
        detector.variant(),
        cfg.command_path.display(),
        cfg.target_path.display()
    );

    let mut scheduler = TickScheduler::new(cfg.tick);
    let mut frames_processed: u64 = 0;
    let mut decisions_emitted: u64 = 0;
    let mut last_health_log = Instant::now();

    while running.load(Ordering::Relaxed) {
        let report = scheduler.wait();
        if report.overrun {
            log::debug!("cycle overran its tick by {:?}", report.lag);
        }

        // Non-blocking poll: no frame is a normal outcome, retry next tick.
        let pair = match source.poll_pair() {
            Ok(Some(pair)) => pair,
            Ok(None) => continue,
            Err(e) => {
                log::warn!("frame poll failed: {e}");
                continue;
            }
        };
        frames_processed += 1;

        let target_spec = selector.current();

        // Per-cycle inference faults degrade to "no detection this cycle".
        let detections = match detector.detect(&pair, target_spec) {
            Ok(detections) => detections,
            Err(e) => {
                log::warn!("detection failed: {e}");
                Vec::new()
            }
        };

        let best = detections.first();
        let observation = best.map(|det| {
            let (center_x, center_y) = det.center();
            let distance = estimator.estimate(
                &pair,
                center_x.max(0.0) as u32,
                center_y.max(0.0) as u32,
            );
            TargetObservation {
                center_x,
                frame_width: pair.width,
                distance,
            }
        });

        let decision = policy.step(Instant::now(), observation.as_ref());

        if let Some(command) = decision.command {
            // Write failures are logged and retried next cycle; the reader
            // keeps acting on the last good value meanwhile.
            if let Err(e) = writer.write(&command) {
                log::warn!("command channel write failed: {e}");
            } else {
                decisions_emitted += 1;
                if decisions_emitted % cfg.status_log_every == 0 {
                    match &observation {
                        Some(obs) => log::info!(
                            "{:11} | target={:6} | dist={} | cmd={}",
                            decision.state.to_string(),
                            target_spec.token(),
                            match obs.distance {
                                DistanceSample::Valid(m) => format!("{m:5.2}m"),
                                other => format!("{other:?}"),
                            },
                            command.encode()
                        ),
                        None => log::info!(
                            "{:11} | target={:6} | cmd={}",
                            decision.state.to_string(),
                            target_spec.token(),
                            command.encode()
                        ),
                    }
                }
            }
        }

        if frames_processed % cfg.preview_every == 0 {
            match ball_follower::render_preview(
                &pair,
                best,
                decision.state,
                target_spec,
                detector.variant(),
            ) {
                Ok(jpeg) => {
                    if let Some(path) = &cfg.preview_path {
                        if let Err(e) = ball_follower::command::write_atomic(path, &jpeg) {
                            log::warn!("preview mirror write failed: {e}");
                        }
                    }
                    preview.publish(jpeg);
                }
                Err(e) => log::warn!("preview encode failed: {e}"),
            }
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let stats = source.stats();
            let ticks = scheduler.stats();
            log::info!(
                "health: frames={} decisions={} overruns={}/{} source={}",
                stats.frames_delivered,
                decisions_emitted,
                ticks.overruns,
                ticks.ticks,
                stats.url
            );
            last_health_log = Instant::now();
        }
    }

    log::info!("shutdown requested, writing neutral command");
    // Mandatory cleanup contract: the actuator must never be left holding a
    // stale non-zero command. Best effort, failures logged inside.
    writer.write_neutral_best_effort();
    selector.stop();
    log::info!("followerd stopped");
    Ok(())
}
