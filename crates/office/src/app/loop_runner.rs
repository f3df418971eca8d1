use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use office_engine::{DebugFacade, TickReport};
use tracing::{error, info, warn};

use super::bootstrap::AppWiring;
use super::metrics::MetricsAccumulator;
use super::script::apply_intent;

#[derive(Debug, Clone)]
pub(crate) struct LoopConfig {
    pub(crate) target_tps: u32,
    pub(crate) max_frame_delta: Duration,
    pub(crate) max_ticks_per_frame: u32,
    pub(crate) metrics_log_interval: Duration,
    /// Hard stop even if the world never settles.
    pub(crate) max_ticks: u64,
    /// Pace ticks against the wall clock instead of running flat out.
    pub(crate) realtime: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            max_ticks: 36_000,
            realtime: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopReason {
    Settled,
    TickLimit,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RunSummary {
    pub(crate) ticks: u64,
    pub(crate) clock_seconds: f64,
    pub(crate) arrivals: usize,
    pub(crate) zone_transitions: usize,
    pub(crate) expired_bubbles: usize,
}

impl RunSummary {
    fn absorb(&mut self, report: &TickReport) {
        self.ticks = report.tick;
        self.clock_seconds = report.clock_seconds;
        self.arrivals += report.arrivals.len();
        self.zone_transitions += report.zone_transitions.len();
        self.expired_bubbles += report.expired_overlays.len();
    }
}

pub(crate) fn run(mut app: AppWiring) -> ExitCode {
    let (summary, reason) = run_simulation(&mut app);
    info!(
        ?reason,
        ticks = summary.ticks,
        clock_seconds = summary.clock_seconds,
        arrivals = summary.arrivals,
        zone_transitions = summary.zone_transitions,
        expired_bubbles = summary.expired_bubbles,
        "run_finished"
    );

    let debug_info = app.debug.debug_info(&app.world);
    info!(
        avatars = debug_info.avatar_count,
        tracked = debug_info.tracked_count,
        zones = debug_info.zone_count,
        path_searches = debug_info.path_searches,
        path_failures = debug_info.path_failures,
        expanded_nodes = debug_info.expanded_nodes,
        camera_x = debug_info.camera_center.x,
        camera_y = debug_info.camera_center.y,
        camera_zoom = debug_info.camera_zoom,
        parcels = app.parcels.len(),
        "world_summary"
    );
    let metrics = app.metrics.snapshot();
    info!(
        tps = metrics.tps,
        tick_time_ms = metrics.tick_time_ms,
        "last_sim_metrics"
    );
    for line in debug_info.extra_debug_lines.unwrap_or_default() {
        info!(line = %line, "debug_line");
    }

    if reason == StopReason::TickLimit && !app.script.is_finished() {
        error!(remaining = app.script.remaining(), "script_not_finished");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

pub(crate) fn run_simulation(app: &mut AppWiring) -> (RunSummary, StopReason) {
    let target_tps = app.config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(app.config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = app.config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(app.config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        max_ticks = app.config.max_ticks,
        realtime = app.config.realtime,
        "loop_config"
    );

    let mut summary = RunSummary::default();
    let mut metrics = MetricsAccumulator::new(metrics_log_interval, Instant::now());

    if !app.config.realtime {
        loop {
            if let Some(reason) = stop_reason(app, &summary) {
                return (summary, reason);
            }
            run_tick(app, fixed_dt, &mut summary, &mut metrics);
        }
    }

    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    loop {
        let now = Instant::now();
        let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
        last_frame_instant = now;
        accumulator = accumulator.saturating_add(clamp_frame_delta(raw_frame_dt, max_frame_delta));

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            if let Some(reason) = stop_reason(app, &summary) {
                return (summary, reason);
            }
            run_tick(app, fixed_dt, &mut summary, &mut metrics);
        }
        accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        thread::sleep(fixed_dt.saturating_sub(now.elapsed()));
    }
}

fn run_tick(
    app: &mut AppWiring,
    fixed_dt: Duration,
    summary: &mut RunSummary,
    metrics: &mut MetricsAccumulator,
) {
    let tick_started = Instant::now();
    for entry in app.script.take_due(app.world.clock_seconds()) {
        apply_intent(&mut app.world, app.debug.as_mut(), &entry.intent);
    }
    let report = app.world.tick(fixed_dt.as_secs_f32());
    app.router.dispatch(&report, &app.world);
    summary.absorb(&report);
    metrics.record_tick(tick_started.elapsed());

    let world_info = app.world.debug_info_snapshot();
    if let Some(snapshot) = metrics.maybe_snapshot(Instant::now(), &world_info) {
        app.metrics.publish(snapshot);
        info!(
            tps = snapshot.tps,
            tick_time_ms = snapshot.tick_time_ms,
            moving = snapshot.moving_avatars,
            path_searches = snapshot.path_searches,
            path_failures = snapshot.path_failures,
            "sim_metrics"
        );
    }
}

fn stop_reason(app: &AppWiring, summary: &RunSummary) -> Option<StopReason> {
    if summary.ticks >= app.config.max_ticks {
        return Some(StopReason::TickLimit);
    }
    (summary.ticks > 0 && app.script.is_finished() && app.world.is_settled())
        .then_some(StopReason::Settled)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use office_engine::{AvatarId, CellCoord, GridModel, StandardDebug, WorldConfig};

    use super::super::metrics::MetricsHandle;
    use super::super::records::OfficeWorld;
    use super::super::script::{Intent, ScriptEntry, ScriptPlayer};
    use super::super::sinks::EventRouter;
    use super::*;
    use crate::app::records::CellRecord;

    fn wiring(script: Vec<ScriptEntry>, max_ticks: u64) -> AppWiring {
        let grid = GridModel::new(8, 8, 16.0).expect("grid");
        let mut world = OfficeWorld::new(WorldConfig::default(), grid).expect("world");
        world.add_avatar_at_cell(AvatarId::new("ada"), CellCoord::new(0, 0), None);
        AppWiring {
            config: LoopConfig {
                max_ticks,
                ..LoopConfig::default()
            },
            world,
            script: ScriptPlayer::new(script),
            router: EventRouter::default(),
            debug: Box::new(StandardDebug),
            parcels: Vec::new(),
            metrics: MetricsHandle::default(),
        }
    }

    fn move_at(at: f64, x: i32, y: i32) -> ScriptEntry {
        ScriptEntry {
            at,
            intent: Intent::MoveTo {
                avatar: "ada".into(),
                cell: CellRecord { x, y },
            },
        }
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(600), max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let result = plan_sim_steps(Duration::from_millis(50), Duration::from_millis(16), 5);
        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::from_millis(2));
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let result = plan_sim_steps(Duration::from_millis(120), Duration::from_millis(16), 3);
        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn headless_run_plays_script_until_settled() {
        let mut app = wiring(vec![move_at(0.0, 3, 0), move_at(0.5, 3, 3)], 10_000);
        let (summary, reason) = run_simulation(&mut app);

        assert_eq!(reason, StopReason::Settled);
        assert!(app.script.is_finished());
        assert!(summary.arrivals >= 1);
        let ada = app
            .world
            .movement()
            .avatar(&AvatarId::new("ada"))
            .expect("ada");
        assert_eq!(ada.position(), app.world.grid().cell_center(CellCoord::new(3, 3)));
    }

    #[test]
    fn tick_limit_stops_unfinished_script() {
        let mut app = wiring(vec![move_at(100.0, 1, 1)], 30);
        let (summary, reason) = run_simulation(&mut app);
        assert_eq!(reason, StopReason::TickLimit);
        assert_eq!(summary.ticks, 30);
        assert_eq!(app.script.remaining(), 1);
    }

    #[test]
    fn run_exit_code_reflects_script_completion() {
        assert_eq!(run(wiring(vec![move_at(0.0, 2, 2)], 10_000)), ExitCode::SUCCESS);
        assert_eq!(run(wiring(vec![move_at(100.0, 1, 1)], 30)), ExitCode::FAILURE);
    }
}
