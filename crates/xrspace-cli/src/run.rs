//! The `run` subcommand: drives a simulated session and prints what the
//! application would see each tick.

use std::f32::consts::TAU;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use colored::Colorize;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};
use xrspace_geometry::{Quaternion, RigidTransform, Vec3};
use xrspace_runtime::{DevicePose, XrSession};
use xrspace_tracking::{FixedFloorSelector, SimPlatform, SimTrackingSource};
use xrspace_types::{
    FrameError, FrameId, FrameOfReferenceOptions, Handedness, ParseError, ResetEvent, SessionMode,
    TrackingQuality,
};

use crate::config::Config;

/// One `--frame` argument: a primary option and its fallbacks, comma
/// separated (`unbounded,stationary/eye-level`).
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRequest {
    pub primary: FrameOfReferenceOptions,
    pub fallbacks: Vec<FrameOfReferenceOptions>,
}

impl FromStr for FrameRequest {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut options = s
            .split(',')
            .map(FrameOfReferenceOptions::from_str)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter();
        let primary = options.next().ok_or_else(|| ParseError {
            kind: "frame of reference",
            value: s.to_string(),
            expected: "at least one option",
        })?;
        Ok(Self {
            primary,
            fallbacks: options.collect(),
        })
    }
}

/// Everything `run` needs besides the config file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: SessionMode,
    pub quality: TrackingQuality,
    pub frames: Vec<FrameRequest>,
    pub require: Option<FrameOfReferenceOptions>,
    /// `0` runs until Ctrl-C.
    pub ticks: u64,
    pub recenter: Vec<u64>,
    pub stage_half_extent_m: Option<f32>,
    pub controller: bool,
    pub floor_y: Option<f32>,
    /// Radius of the walked circle; `0` stands still.
    pub walk_radius_m: f32,
    /// Print poses every this many ticks; `0` prints resets only.
    pub print_every: u64,
}

/// What happened during a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub frames: usize,
    pub resets: Vec<ResetEvent>,
}

/// Viewer walking a circle of `radius` at `eye_height`, one lap (and one
/// full turn of the head) every ten seconds.
pub fn circle_walk(radius: f32, eye_height: f32, tick_hz: u32) -> impl Fn(u64) -> RigidTransform {
    let per_tick = TAU / (10.0 * tick_hz.max(1) as f32);
    move |tick| {
        let angle = per_tick * tick as f32;
        let position = Vec3::new(radius * angle.sin(), eye_height, radius * (angle.cos() - 1.0));
        RigidTransform::new(position, Quaternion::from_yaw(angle))
    }
}

/// Build the simulated source described by `cfg` and `opts`.
pub fn build_source(cfg: &Config, opts: &RunOptions) -> SimTrackingSource {
    let eye_height = cfg.session.emulated_eye_height_m;
    let mut builder = SimTrackingSource::builder(opts.quality)
        .with_motion(circle_walk(opts.walk_radius_m, eye_height, cfg.tick_hz))
        .with_neck_model(cfg.neck.model(eye_height));
    if let Some(half) = opts.stage_half_extent_m.or(cfg.stage_half_extent_m) {
        builder = builder.with_room_scale_stage(half);
    }
    for tick in &opts.recenter {
        builder = builder.recenter_at(*tick);
    }
    if opts.controller {
        builder = builder.with_controller(
            "right_hand",
            Handedness::Right,
            RigidTransform::from_translation(Vec3::new(0.2, -0.35, -0.3)),
        );
    }
    builder.build()
}

/// Run a simulated session until `opts.ticks` ticks have passed or `stop`
/// is raised.
///
/// # Errors
///
/// Session start failures (including a required frame that cannot be
/// granted) and sampling failures.  Individual `--frame` requests that fail
/// are reported and skipped.
pub async fn run(
    cfg: &Config,
    opts: &RunOptions,
    stop: Arc<AtomicBool>,
) -> Result<RunSummary, FrameError> {
    let mut builder = XrSession::builder(opts.mode)
        .source(build_source(cfg, opts))
        .platform(Arc::new(SimPlatform::new(opts.quality)))
        .config(cfg.session);
    if let Some(floor_y) = opts.floor_y {
        builder = builder.floor_selector(Arc::new(FixedFloorSelector { floor_y }));
    }
    if let Some(required) = opts.require {
        builder = builder.require(required);
    }
    let mut session = builder.start().await?;
    println!(
        "  Session {} ({} / {})",
        session.id().to_string().dimmed(),
        opts.mode.to_string().bold(),
        opts.quality
    );

    let mut frames: Vec<(String, FrameId)> = Vec::new();
    if let Some(id) = session.required_frame() {
        frames.push((format!("{} (required)", session.frame(id)?.options()), id));
    }
    for request in &opts.frames {
        match session
            .request_frame_of_reference(request.primary, &request.fallbacks)
            .await
        {
            Ok(id) => {
                let granted = session.frame(id)?.options();
                println!("  {} {} → {}", "✓".green().bold(), request.primary, granted.to_string().bold());
                frames.push((granted.to_string(), id));
            }
            Err(e) => {
                println!("  {} {}: {}", "✗".red().bold(), request.primary, e);
                warn!(option = %request.primary, error = %e, "frame request failed");
            }
        }
    }
    for (label, id) in &frames {
        if let Ok(Some(bounds)) = session.bounds_geometry(*id) {
            println!("    {} bounds: {} points, {:.2} m²", label, bounds.points().len(), bounds.area());
        }
    }

    let mut summary = RunSummary {
        frames: frames.len(),
        ..RunSummary::default()
    };
    let mut ticker = interval(Duration::from_secs_f64(1.0 / f64::from(cfg.tick_hz.max(1))));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while !stop.load(Ordering::SeqCst) && (opts.ticks == 0 || summary.ticks < opts.ticks) {
        ticker.tick().await;
        let report = session.tick()?;
        summary.ticks = report.tick;

        for event in &report.resets {
            let label = frames
                .iter()
                .find(|(_, id)| *id == event.frame)
                .map_or("?", |(label, _)| label.as_str());
            println!(
                "  {} tick {:>5}  {} reset (#{})",
                "↺".yellow().bold(),
                event.tick,
                label.bold(),
                event.sequence
            );
        }
        summary.resets.extend(report.resets);

        if opts.print_every > 0 && report.tick % opts.print_every == 0 {
            print_poses(&session, &frames, report.tick);
        }
    }

    session.end();
    info!(ticks = summary.ticks, resets = summary.resets.len(), "simulation finished");
    Ok(summary)
}

fn print_poses(session: &XrSession, frames: &[(String, FrameId)], tick: u64) {
    for (label, id) in frames {
        let line = match session.device_pose(Some(*id)) {
            Ok(Some(pose)) => describe(&pose),
            Ok(None) => "viewer not tracked".dimmed().to_string(),
            Err(e) => e.to_string().red().to_string(),
        };
        println!("  tick {tick:>5}  {label:<30} {line}");
    }
    for input in session.input_sources() {
        if let Some((_, id)) = frames.first()
            && let Ok(Some(pose)) = session.input_pose(&input, Some(*id))
        {
            let p = pose.target_ray.translation;
            println!(
                "  tick {tick:>5}  {:<30} ray ({:+.3}, {:+.3}, {:+.3})",
                input.to_string(),
                p.x,
                p.y,
                p.z
            );
        }
    }
}

fn describe(pose: &DevicePose) -> String {
    let p = pose.transform.translation;
    let yaw = pose.transform.rotation.yaw().to_degrees();
    let text = format!("({:+.3}, {:+.3}, {:+.3}) yaw {:+6.1}°", p.x, p.y, p.z, yaw);
    if pose.emulated_position {
        format!("{} {}", text, "[emulated]".dimmed())
    } else {
        text
    }
}
