pub mod collision;
pub mod force;
pub mod phase;
pub mod tween;

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, info, trace, warn};

use crate::{
    config::{EngineConfig, TweenConfig},
    data::RegionRecord,
    error::{ConfigError, DataError, EngineError, ScheduleError},
    geo::{compute_foci, FociLayout, Mercator, RadiusScale},
    render::{LayoutChange, Renderer},
    schedule::{Scheduler, Task, Timeline},
    types::{CoverState, EngineStats, Focus, PeriodKey, Point, Vec2},
};

use self::{
    force::{ForceSimulation, TickOutcome},
    phase::{CycleScript, PhaseController, PhaseKind},
    tween::Tween,
};

/// Sole owner of the point set, the foci and every driver that moves points.
///
/// All mutation happens inside [`SimulationEngine::dispatch`], one task at a
/// time. Phase entry stops whichever driver was moving points before the next
/// one starts, so at most one driver writes positions at any moment.
pub struct SimulationEngine<S: Scheduler = Timeline> {
    config: EngineConfig,
    scheduler: S,
    points: Vec<Point>,
    foci: Vec<Focus>,
    targets: Vec<Vec2>,
    projection: Mercator,
    scale: RadiusScale,
    periods: Vec<PeriodKey>,
    period: Option<PeriodKey>,
    cover_point: Vec2,
    cover: CoverState,
    simulation: ForceSimulation,
    tween: Tween,
    phases: PhaseController,
    renderer: Option<Box<dyn Renderer>>,
    data_issues: Vec<DataError>,
    config_issues: Vec<ConfigError>,
    coincident_pairs: u64,
}

impl SimulationEngine<Timeline> {
    pub fn new(records: Vec<RegionRecord>, config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_scheduler(records, config, Timeline::new())
    }
}

impl<S: Scheduler> SimulationEngine<S> {
    pub fn with_scheduler(
        records: Vec<RegionRecord>,
        config: EngineConfig,
        scheduler: S,
    ) -> Result<Self, EngineError> {
        let projection = Mercator::new(config.mercator_scale, config.mercator_translate);

        let mut seen = HashSet::new();
        let mut data_issues = Vec::new();
        let mut points = Vec::with_capacity(records.len());
        for record in records {
            if !seen.insert(record.id.clone()) {
                return Err(EngineError::DuplicatePoint { id: record.id });
            }
            if record.series.is_empty() {
                let issue = DataError::EmptySeries {
                    id: record.id.clone(),
                };
                warn!(target: "casecycle::data", %issue, "point.scaled_as_zero");
                data_issues.push(issue);
            }
            let home = projection.project(record.lat, record.lon);
            points.push(Point {
                id: record.id,
                position: home,
                home,
                radius: 0.0,
                group_key: record.group_key,
                series: record.series,
            });
        }

        let periods: Vec<PeriodKey> = points
            .iter()
            .flat_map(|p| p.series.iter().map(|s| s.period))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let domain_max = points.iter().filter_map(Point::max_value).fold(0.0, f64::max);
        let scale = RadiusScale::new(domain_max, config.effective_radius_max());

        let cover_point = config
            .cover_point
            .unwrap_or_else(|| bounds_center(&points).unwrap_or(config.canvas * 0.5));
        for point in &mut points {
            point.position = cover_point;
        }

        let mut engine = Self {
            simulation: ForceSimulation::new(&config),
            cover: CoverState {
                center: cover_point,
                radius: config.cover_radius,
            },
            config,
            scheduler,
            points,
            foci: Vec::new(),
            targets: Vec::new(),
            projection,
            scale,
            period: periods.last().copied(),
            periods,
            cover_point,
            tween: Tween::new(),
            phases: PhaseController::new(CycleScript::regional()),
            renderer: None,
            data_issues,
            config_issues: Vec::new(),
            coincident_pairs: 0,
        };
        engine.apply_radii();
        engine.recompute_foci();
        info!(
            target: "casecycle::engine",
            points = engine.points.len(),
            foci = engine.foci.len(),
            period = ?engine.period,
            "engine.ready"
        );
        Ok(engine)
    }

    pub fn set_renderer(&mut self, renderer: Box<dyn Renderer>) {
        self.renderer = Some(renderer);
    }

    /// Used from the next cycle on.
    pub fn set_script(&mut self, script: CycleScript) {
        self.phases.set_script(script);
    }

    pub fn script(&self) -> &CycleScript {
        self.phases.script()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn foci(&self) -> &[Focus] {
        &self.foci
    }

    pub fn cover(&self) -> CoverState {
        self.cover
    }

    pub fn current_phase(&self) -> Option<PhaseKind> {
        self.phases.current()
    }

    pub fn cycle(&self) -> u64 {
        self.phases.cycle()
    }

    pub fn simulation(&self) -> &ForceSimulation {
        &self.simulation
    }

    pub fn tween(&self) -> &Tween {
        &self.tween
    }

    pub fn projection(&self) -> &Mercator {
        &self.projection
    }

    pub fn periods(&self) -> &[PeriodKey] {
        &self.periods
    }

    pub fn selected_period(&self) -> Option<PeriodKey> {
        self.period
    }

    pub fn data_issues(&self) -> &[DataError] {
        &self.data_issues
    }

    pub fn config_issues(&self) -> &[ConfigError] {
        &self.config_issues
    }

    /// Magnitude of `id` at the selected period, as shown in a tooltip.
    pub fn magnitude(&self, id: &str) -> Option<f64> {
        let period = self.period?;
        self.points.iter().find(|p| p.id == id)?.value_at(period)
    }

    pub fn stats(&self) -> EngineStats {
        let pass = self.simulation.last_pass();
        EngineStats {
            ticks: self.simulation.ticks(),
            alpha: self.simulation.alpha(),
            simulation_running: self.simulation.is_running(),
            collision_candidates_avg: if self.points.is_empty() {
                0.0
            } else {
                pass.candidates as f32 / self.points.len() as f32
            },
            coincident_pairs: self.coincident_pairs,
        }
    }

    /// Rescales every radius for `period`. Points without a usable value at
    /// that period are drawn with radius zero.
    pub fn select_period(&mut self, period: PeriodKey) {
        self.period = Some(period);
        self.apply_radii();
        info!(target: "casecycle::engine", period, "period.selected");
        self.emit_frame();
    }

    /// Recomputes foci for a new canvas size.
    pub fn resize(&mut self, canvas: Vec2) {
        self.config.canvas = canvas;
        self.simulation.set_center(canvas * 0.5);
        self.recompute_foci();
        self.notify_layout();
    }

    /// Reassigns every group key and recomputes foci.
    pub fn regroup<F>(&mut self, key_fn: F)
    where
        F: Fn(&Point) -> String,
    {
        for point in &mut self.points {
            point.group_key = key_fn(point);
        }
        self.recompute_foci();
        self.notify_layout();
    }

    /// Installs externally computed foci. Points whose group has no focus are
    /// pinned to the canvas centre.
    pub fn set_foci(&mut self, foci: Vec<Focus>) {
        self.foci = foci;
        self.resolve_targets();
        self.notify_layout();
    }

    /// Starts a fresh cycle now, revoking every pending transition of the
    /// previous one. An empty point set makes this a no-op.
    pub fn start_cycle(&mut self) -> Result<(), EngineError> {
        if self.points.is_empty() {
            debug!(target: "casecycle::engine", "cycle.skipped_empty");
            return Ok(());
        }
        match self.phases.begin(&mut self.scheduler) {
            Ok(cycle) => {
                info!(
                    target: "casecycle::engine",
                    cycle,
                    at_ms = self.scheduler.now_ms(),
                    "cycle.start"
                );
                Ok(())
            }
            Err(err) => Err(self.abort(err)),
        }
    }

    /// Stops both drivers and revokes every pending transition.
    pub fn stop(&mut self) {
        self.halt_drivers();
        self.phases.reset(&mut self.scheduler);
        debug!(target: "casecycle::engine", "engine.stopped");
    }

    /// Runs every task due up to `now_ms`, in order. Returns how many ran.
    pub fn advance_to(&mut self, now_ms: u64) -> Result<usize, EngineError> {
        let mut ran = 0;
        while let Some(task) = self.scheduler.pop_due(now_ms) {
            self.dispatch(task)?;
            ran += 1;
        }
        Ok(ran)
    }

    /// Callback entry for a fired task. Tasks issued under a generation or
    /// cycle that has since been cancelled do nothing.
    pub fn dispatch(&mut self, task: Task) -> Result<(), EngineError> {
        match task {
            Task::Tick { generation } => {
                if !self.simulation.accepts(generation) {
                    trace!(target: "casecycle::engine", generation, "tick.stale");
                    return Ok(());
                }
                self.tick();
            }
            Task::TweenFrame { generation } => {
                if !self.tween.accepts(generation) {
                    trace!(target: "casecycle::engine", generation, "tween.stale");
                    return Ok(());
                }
                let now = self.scheduler.now_ms();
                if self.tween.frame(now, &mut self.points) {
                    self.tween.stop(&mut self.scheduler);
                }
                self.emit_frame();
            }
            Task::EnterPhase { cycle, step } => {
                if let Some(kind) = self.phases.accept_phase(cycle, step) {
                    if let Err(err) = self.enter_phase(kind) {
                        return Err(self.abort(err));
                    }
                }
            }
            Task::RestartCycle { cycle } => {
                if self.phases.accepts_restart(cycle) {
                    self.start_cycle()?;
                }
            }
        }
        Ok(())
    }

    fn tick(&mut self) {
        match self.simulation.step(&mut self.points, &self.targets) {
            TickOutcome::Moved(pass) => {
                self.coincident_pairs += pass.coincident as u64;
                self.emit_frame();
            }
            TickOutcome::Cooled => {
                self.simulation.stop(&mut self.scheduler);
                debug!(target: "casecycle::engine", ticks = self.simulation.ticks(), "force.cooled");
            }
        }
    }

    fn enter_phase(&mut self, kind: PhaseKind) -> Result<(), ScheduleError> {
        self.halt_drivers();
        info!(
            target: "casecycle::engine",
            phase = kind.name(),
            cycle = self.phases.cycle(),
            at_ms = self.scheduler.now_ms(),
            "phase.enter"
        );
        match kind {
            PhaseKind::Dispersed => {
                self.cover.radius = 0.0;
                let homes = self.points.iter().map(|p| p.home).collect();
                self.move_points(homes, self.config.disperse)?;
            }
            PhaseKind::Clustering => {
                self.cover.radius = 0.0;
                self.simulation.start(&mut self.scheduler)?;
            }
            PhaseKind::Centered => {
                self.cover.radius = self.config.cover_radius;
                let gathered = vec![self.cover_point; self.points.len()];
                self.move_points(gathered, self.config.center)?;
            }
        }
        self.notify_layout();
        Ok(())
    }

    fn move_points(&mut self, to: Vec<Vec2>, timing: TweenConfig) -> Result<(), ScheduleError> {
        if timing.duration_ms == 0 && timing.stagger_ms == 0 {
            for (point, target) in self.points.iter_mut().zip(to) {
                point.position = target;
            }
            self.emit_frame();
            return Ok(());
        }
        self.tween.start(
            &mut self.scheduler,
            &self.points,
            to,
            timing,
            self.config.tick_interval_ms,
        )
    }

    fn halt_drivers(&mut self) {
        self.simulation.stop(&mut self.scheduler);
        self.tween.stop(&mut self.scheduler);
    }

    /// Tears the animation down after a scheduler failure.
    fn abort(&mut self, err: ScheduleError) -> EngineError {
        self.stop();
        tracing::error!(target: "casecycle::engine", error = %err, "engine.aborted");
        EngineError::Schedule(err)
    }

    fn apply_radii(&mut self) {
        let Some(period) = self.period else {
            for point in &mut self.points {
                point.radius = 0.0;
            }
            return;
        };
        for point in &mut self.points {
            point.radius = match point.value_at(period) {
                Some(value) => self.scale.radius(value),
                None => {
                    if !point.series.is_empty() {
                        let issue = DataError::MissingPeriod {
                            id: point.id.clone(),
                            period,
                        };
                        if !self.data_issues.contains(&issue) {
                            warn!(target: "casecycle::data", %issue, "point.scaled_as_zero");
                            self.data_issues.push(issue);
                        }
                    }
                    0.0
                }
            };
        }
    }

    fn recompute_foci(&mut self) {
        let layout = FociLayout {
            height_stretch: self.config.foci_height_stretch,
            offset: self.config.foci_offset,
            label_offset_y: self.config.label_offset_y,
        };
        self.foci = compute_foci(&self.points, |p| p.group_key.clone(), self.config.canvas, &layout);
        self.resolve_targets();
    }

    fn resolve_targets(&mut self) {
        let by_key: HashMap<&str, Vec2> = self
            .foci
            .iter()
            .map(|f| (f.key.as_str(), f.target))
            .collect();
        let fallback = self.config.canvas * 0.5;
        self.targets.clear();
        for point in &self.points {
            match by_key.get(point.group_key.as_str()) {
                Some(&target) => self.targets.push(target),
                None => {
                    let issue = ConfigError::UnknownGroup {
                        id: point.id.clone(),
                        group: point.group_key.clone(),
                    };
                    warn!(target: "casecycle::engine", %issue, "point.fallback_focus");
                    if !self.config_issues.contains(&issue) {
                        self.config_issues.push(issue);
                    }
                    self.targets.push(fallback);
                }
            }
        }
    }

    fn emit_frame(&mut self) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.frame(&self.points);
        }
    }

    fn notify_layout(&mut self) {
        let Some(phase) = self.phases.current() else {
            return;
        };
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.layout_changed(LayoutChange {
                phase,
                foci: &self.foci,
                cover: self.cover,
            });
        }
    }

    pub fn point(&self, id: &str) -> Option<&Point> {
        self.points.iter().find(|p| p.id == id)
    }

    pub fn target_of(&self, id: &str) -> Option<Vec2> {
        let idx = self.points.iter().position(|p| p.id == id)?;
        self.targets.get(idx).copied()
    }
}

fn bounds_center(points: &[Point]) -> Option<Vec2> {
    let first = points.first()?.home;
    let (mut min, mut max) = (first, first);
    for p in points {
        min.x = min.x.min(p.home.x);
        min.y = min.y.min(p.home.y);
        max.x = max.x.max(p.home.x);
        max.y = max.y.max(p.home.y);
    }
    Some(Vec2::new((min.x + max.x) * 0.5, (min.y + max.y) * 0.5))
}
