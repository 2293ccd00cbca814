//! Turret assembly from config and the `rotate` / `goto` / `run` / `self-check` commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

use eyre::WrapErr;
use serde_json::json;
use turret_config::Config;
use turret_core::error::{Result, TurretError};
use turret_core::{
    Calibration, MotionHandle, MotionInfo, RotationSchedule, SchedulerCfg, TaskStats,
    TuningParams, Turret, UnwrapStrategy,
};
use turret_traits::{Clock, ManualClock, MonotonicClock};

/// Telemetry depth; drained at least once a second.
const TELEMETRY_CAPACITY: usize = 64;
/// How often `run` wakes up to drain telemetry and poll the settings file.
const POLL: Duration = Duration::from_secs(1);

pub fn backend_name() -> &'static str {
    if cfg!(all(feature = "hardware", target_os = "linux")) {
        "hardware"
    } else {
        "sim"
    }
}

pub fn clock_for(virtual_time: bool) -> Result<Arc<dyn Clock + Send + Sync>> {
    if !virtual_time {
        return Ok(Arc::new(MonotonicClock::new()));
    }
    if backend_name() == "hardware" {
        return Err(eyre::Report::new(TurretError::Config(
            "--virtual-time is only available with the simulated backend".into(),
        )));
    }
    Ok(Arc::new(ManualClock::new()))
}

/// Wire a turret from the config: hardware pins when built with the
/// `hardware` feature on Linux, the simulated plant otherwise.
pub fn assemble(cfg: &Config, clock: Arc<dyn Clock + Send + Sync>) -> Result<Turret> {
    let builder = Turret::builder()
        .with_tuning(TuningParams::from(&cfg.motion))
        .with_calibration(Calibration::from(&cfg.calibration))
        .with_rotation(RotationSchedule::from(&cfg.rotation))
        .with_schedule(SchedulerCfg::from(&cfg.scheduler))
        .with_unwrap(UnwrapStrategy::from(cfg.motion.unwrap))
        .with_telemetry_capacity(TELEMETRY_CAPACITY)
        .with_clock(clock.clone());

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        use turret_core::hw_error::map_hw_error;
        use turret_hardware::{GpioIndicator, PwmMotor, QuadratureEncoder};

        let encoder = QuadratureEncoder::new(cfg.pins.encoder_a, cfg.pins.encoder_b)
            .map_err(|e| eyre::Report::new(map_hw_error(&e)))
            .wrap_err("open encoder pins")?;
        let motor = PwmMotor::new(cfg.pins.pwm_frequency_hz)
            .map_err(|e| eyre::Report::new(map_hw_error(&e)))
            .wrap_err("open motor PWM")?;
        let mut builder = builder.with_encoder(encoder).with_motor(motor);
        if let Some(pin) = cfg.pins.status_led {
            let led = GpioIndicator::new(pin)
                .map_err(|e| eyre::Report::new(map_hw_error(&e)))
                .wrap_err("open status LED pin")?;
            builder = builder.with_indicator(led);
        }
        builder.build()
    }

    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        use turret_hardware::{LogIndicator, PlantParams, SimulatedPlant};

        let plant = SimulatedPlant::new(
            PlantParams {
                free_speed: cfg.simulation.free_speed,
                time_constant_s: cfg.simulation.time_constant_s,
                initial_count: cfg.simulation.initial_count,
            },
            clock,
        );
        builder
            .with_encoder(plant.encoder())
            .with_motor(plant.motor())
            .with_indicator(LogIndicator::new())
            .build()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum MoveCmd {
    Angle(u16),
    Position(i64),
}

/// Issue one move and drive the executor on this thread until it finishes.
pub fn run_move(
    mut turret: Turret,
    cmd: MoveCmd,
    timeout: Duration,
    shutdown: &AtomicBool,
    json: bool,
) -> Result<()> {
    let h = turret.handle();
    let clock = turret.clock().clone();
    let start = clock.now();
    match cmd {
        MoveCmd::Angle(angle) => h.rotate_to_angle(angle).wrap_err("rotate")?,
        MoveCmd::Position(position) => h.move_to(position).wrap_err("goto")?,
    }

    let deadline = start + timeout;
    turret.run_until(|| !h.is_active() || shutdown.load(Ordering::Relaxed) || clock.now() >= deadline);
    let elapsed = clock.now().saturating_duration_since(start);

    if h.is_active() {
        if shutdown.load(Ordering::Relaxed) {
            return Err(eyre::Report::new(TurretError::State(
                "interrupted before arrival".into(),
            )));
        }
        return Err(eyre::Report::new(TurretError::State(format!(
            "move did not finish within {}s",
            timeout.as_secs()
        ))));
    }
    if let Some(control) = find_task(&turret.stats(), "control")
        && control.failures > 0
    {
        return Err(eyre::Report::new(TurretError::Hardware(
            "motion aborted by a motor driver error (see log)".into(),
        )));
    }

    let info = h.motion_info();
    let angle = h.current_angle();
    if json {
        println!(
            "{}",
            json!({
                "type": "result",
                "status": "complete",
                "target": info.target,
                "position": info.position,
                "angle": angle,
                "elapsed_ms": elapsed.as_millis(),
            })
        );
    } else {
        println!(
            "Move complete: position {} (target {}), angle {angle} deg, {:.2}s",
            info.position,
            info.target,
            elapsed.as_secs_f32()
        );
    }
    Ok(())
}

/// Polls a partial settings file and pushes changes into a running turret.
pub struct SettingsWatcher {
    path: PathBuf,
    modified: Option<SystemTime>,
    cfg: Config,
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl SettingsWatcher {
    /// `cfg` must already contain the file's current contents.
    pub fn new(path: PathBuf, cfg: Config) -> Self {
        let modified = modified_at(&path);
        Self {
            path,
            modified,
            cfg,
        }
    }

    /// Apply the file if it changed since the last poll. An invalid update is
    /// logged and skipped; the running settings stay as they were.
    pub fn poll(&mut self, h: &MotionHandle) -> bool {
        let modified = modified_at(&self.path);
        if modified.is_none() || modified == self.modified {
            return false;
        }
        self.modified = modified;
        match self.reload(h) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "settings reloaded");
                true
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %format!("{e:#}"), "settings reload rejected");
                false
            }
        }
    }

    fn reload(&mut self, h: &MotionHandle) -> Result<()> {
        let update = crate::read_settings(&self.path)?;
        let mut next = self.cfg.clone();
        next.apply(&update)?;
        if update.touches_motion() {
            h.set_tuning(TuningParams::from(&next.motion))?;
        }
        if update.touches_calibration() {
            h.set_calibration(Calibration::from(&next.calibration))?;
        }
        if update.touches_rotation() {
            h.set_rotation_schedule(RotationSchedule::from(&next.rotation));
        }
        self.cfg = next;
        Ok(())
    }
}

pub struct RunOpts {
    pub seconds: Option<u64>,
    pub auto: bool,
    pub stats: bool,
    pub json: bool,
    pub virtual_time: bool,
}

/// Run until `seconds` elapse or a shutdown is requested. In real time the
/// executor moves to a background thread; in virtual time it is stepped here.
pub fn run_loop(
    mut turret: Turret,
    opts: &RunOpts,
    mut watcher: Option<SettingsWatcher>,
    shutdown: &AtomicBool,
) -> Result<()> {
    let h = turret.handle();
    if opts.auto {
        h.set_rotation_schedule(RotationSchedule {
            enabled: true,
            ..h.rotation_schedule()
        });
    }
    let clock = turret.clock().clone();
    let start = clock.now();
    let end = opts.seconds.map(|s| start + Duration::from_secs(s));
    if opts.virtual_time && end.is_none() {
        return Err(eyre::Report::new(TurretError::Config(
            "--virtual-time needs --seconds".into(),
        )));
    }
    let done = |now: Instant| shutdown.load(Ordering::Relaxed) || end.is_some_and(|e| now >= e);

    let mut report = Reporter::new(opts.json, start, h.last_angle());
    tracing::info!(seconds = ?opts.seconds, schedule = ?h.rotation_schedule(), "run start");

    let stats = if opts.virtual_time {
        let rx = turret.telemetry();
        while !done(clock.now()) {
            let step = end.map_or(POLL, |e| e.saturating_duration_since(clock.now()).min(POLL));
            turret.run_for(step);
            report.drain(&h, clock.now(), rx.try_iter());
            if let Some(w) = watcher.as_mut() {
                w.poll(&h);
            }
        }
        turret.stats()
    } else {
        let rt = turret.spawn();
        while !done(clock.now()) && rt.is_running() {
            let wait = end.map_or(POLL, |e| e.saturating_duration_since(clock.now()).min(POLL));
            clock.sleep(wait);
            report.drain(&h, clock.now(), rt.telemetry().try_iter());
            if let Some(w) = watcher.as_mut() {
                w.poll(&h);
            }
        }
        rt.shutdown()
    };

    report.finish(&h, clock.now());
    if opts.stats {
        print_stats(&stats, opts.json);
    }
    Ok(())
}

/// Prints telemetry (JSON mode) and rotations as they happen.
struct Reporter {
    json: bool,
    start: Instant,
    last_angle: Option<u16>,
    rotations: u64,
}

impl Reporter {
    fn new(json: bool, start: Instant, last_angle: Option<u16>) -> Self {
        Self {
            json,
            start,
            last_angle,
            rotations: 0,
        }
    }

    fn drain(&mut self, h: &MotionHandle, now: Instant, samples: impl Iterator<Item = MotionInfo>) {
        if self.json {
            for s in samples {
                println!(
                    "{}",
                    json!({
                        "type": "telemetry",
                        "active": s.active,
                        "target": s.target,
                        "position": s.position,
                        "velocity": s.velocity,
                        "error": s.error,
                        "drive": s.drive,
                    })
                );
            }
        } else {
            samples.for_each(drop);
        }
        let angle = h.last_angle();
        if angle != self.last_angle {
            self.last_angle = angle;
            self.rotations += 1;
            let t_ms = now.saturating_duration_since(self.start).as_millis();
            if let Some(angle) = angle {
                if self.json {
                    println!("{}", json!({ "type": "rotation", "t_ms": t_ms, "angle": angle }));
                } else {
                    println!("[{:>8.1}s] rotating to {angle} deg", t_ms as f64 / 1000.0);
                }
            }
        }
    }

    fn finish(&self, h: &MotionHandle, now: Instant) {
        let info = h.motion_info();
        let elapsed = now.saturating_duration_since(self.start);
        if self.json {
            println!(
                "{}",
                json!({
                    "type": "summary",
                    "status": "stopped",
                    "position": info.position,
                    "angle": h.current_angle(),
                    "active": info.active,
                    "rotations": self.rotations,
                    "elapsed_ms": elapsed.as_millis(),
                })
            );
        } else {
            println!(
                "Stopped after {:.1}s: position {}, angle {} deg, {} rotation(s)",
                elapsed.as_secs_f32(),
                info.position,
                h.current_angle(),
                self.rotations
            );
        }
    }
}

fn find_task<'a>(stats: &'a [TaskStats], name: &str) -> Option<&'a TaskStats> {
    stats.iter().find(|s| s.name == name)
}

fn print_stats(stats: &[TaskStats], json: bool) {
    if json {
        let tasks: Vec<_> = stats
            .iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "period_ms": s.period.as_millis(),
                    "runs": s.runs,
                    "overruns": s.overruns,
                    "failures": s.failures,
                })
            })
            .collect();
        println!("{}", json!({ "type": "stats", "tasks": tasks }));
        return;
    }
    eprintln!("\n--- Turret Stats ---");
    for s in stats {
        eprintln!(
            "{:<14} period {:>5} ms  runs {:>8}  overruns {:>5}  failures {:>5}",
            s.name,
            s.period.as_millis(),
            s.runs,
            s.overruns,
            s.failures
        );
    }
    eprintln!("--------------------\n");
}

/// Build the backend, run one pass of every task and report what was seen.
pub fn self_check(cfg: &Config, clock: Arc<dyn Clock + Send + Sync>, json: bool) -> Result<()> {
    let mut turret = assemble(cfg, clock).wrap_err("self-check")?;
    let ran = turret.run_pending();
    let h = turret.handle();
    let frc = cfg.calibration.full_rotation_count;
    if json {
        println!(
            "{}",
            json!({
                "type": "self_check",
                "status": "ok",
                "backend": backend_name(),
                "position": h.current_position(),
                "angle": h.current_angle(),
                "full_rotation_count": frc,
                "calibrated": frc > 0,
                "tasks": ran,
            })
        );
    } else {
        println!(
            "OK: backend={} position={} angle={} full_rotation_count={frc} tasks={ran}",
            backend_name(),
            h.current_position(),
            h.current_angle()
        );
    }
    Ok(())
}
