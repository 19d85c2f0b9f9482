use tracing::{debug, trace};

use crate::{
    config::{Cooling, CollisionDamping, EngineConfig},
    core::collision::{CollisionResolver, ResolvePass},
    error::ScheduleError,
    schedule::{Scheduler, Task, TimerId},
    types::{Point, Vec2},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Moved(ResolvePass),
    /// Alpha fell below the floor; nothing moved and the simulation should stop.
    Cooled,
}

/// Focus-seeking integrator with per-tick collision resolution.
///
/// `start` registers one repeating tick; `stop` cancels it and bumps the
/// generation so a tick that was already handed out is refused by
/// [`ForceSimulation::accepts`].
#[derive(Debug)]
pub struct ForceSimulation {
    cooling: Cooling,
    collision: CollisionDamping,
    gravity: f32,
    center: Vec2,
    interval_ms: u64,
    alpha: f32,
    running: bool,
    generation: u64,
    timer: Option<TimerId>,
    resolver: CollisionResolver,
    ticks: u64,
    last_pass: ResolvePass,
}

impl ForceSimulation {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            cooling: config.cooling,
            collision: config.collision_damping,
            gravity: config.gravity,
            center: config.canvas * 0.5,
            interval_ms: config.tick_interval_ms,
            alpha: 0.0,
            running: false,
            generation: 0,
            timer: None,
            resolver: CollisionResolver::new(),
            ticks: 0,
            last_pass: ResolvePass::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn last_pass(&self) -> ResolvePass {
        self.last_pass
    }

    /// Gravity pulls toward this point, normally the canvas centre.
    pub fn set_center(&mut self, center: Vec2) {
        self.center = center;
    }

    /// Returns `Ok(false)` when already running; no second tick is scheduled.
    pub fn start<S>(&mut self, scheduler: &mut S) -> Result<bool, ScheduleError>
    where
        S: Scheduler + ?Sized,
    {
        if self.running {
            return Ok(false);
        }
        self.generation += 1;
        let timer = scheduler.schedule_repeating(
            self.interval_ms,
            Task::Tick {
                generation: self.generation,
            },
        )?;
        self.timer = Some(timer);
        self.alpha = match self.cooling {
            Cooling::Fixed { alpha } => alpha,
            Cooling::Decay { start, .. } => start,
        };
        self.running = true;
        debug!(target: "casecycle::engine", generation = self.generation, alpha = self.alpha, "force.start");
        Ok(true)
    }

    /// Safe to call when stopped. Returns whether a running simulation was stopped.
    pub fn stop<S>(&mut self, scheduler: &mut S) -> bool
    where
        S: Scheduler + ?Sized,
    {
        if !self.running {
            return false;
        }
        self.running = false;
        self.generation += 1;
        if let Some(timer) = self.timer.take() {
            scheduler.cancel(timer);
        }
        debug!(target: "casecycle::engine", generation = self.generation, ticks = self.ticks, "force.stop");
        true
    }

    /// Whether a tick issued under `generation` may still mutate positions.
    pub fn accepts(&self, generation: u64) -> bool {
        self.running && generation == self.generation
    }

    /// One integration step: cool alpha, pull each point toward its target,
    /// apply centre gravity, then resolve collisions.
    pub fn step(&mut self, points: &mut [Point], targets: &[Vec2]) -> TickOutcome {
        let alpha = match self.cooling {
            Cooling::Fixed { alpha } => alpha,
            Cooling::Decay { decay, min, .. } => {
                let next = self.alpha * decay;
                if next < min {
                    self.alpha = next;
                    return TickOutcome::Cooled;
                }
                next
            }
        };
        let alpha = alpha.clamp(0.0, 1.0);
        self.alpha = alpha;

        let pull = self.gravity * alpha;
        for (point, &target) in points.iter_mut().zip(targets) {
            point.position += (target - point.position) * alpha;
            if pull > 0.0 {
                point.position += (self.center - point.position) * pull;
            }
        }

        let damping = match self.collision {
            CollisionDamping::TickAlpha => alpha,
            CollisionDamping::Fixed { alpha } => alpha,
        };
        let pass = self.resolver.resolve(points, damping);

        for (point, &target) in points.iter_mut().zip(targets) {
            if !point.position.is_finite() {
                point.position = target;
            }
        }

        self.ticks += 1;
        self.last_pass = pass;
        trace!(target: "casecycle::engine", tick = self.ticks, alpha, overlaps = pass.overlaps, "force.tick");
        TickOutcome::Moved(pass)
    }
}
