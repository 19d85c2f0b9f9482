use tracing::debug;

use crate::{
    config,
    error::ScheduleError,
    schedule::{Scheduler, Task, TimerId},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Points at their true geographic positions.
    Dispersed,
    /// Points pulled toward their group focus by the force simulation.
    Clustering,
    /// Points gathered at the cover point.
    Centered,
}

impl PhaseKind {
    pub fn name(self) -> &'static str {
        match self {
            PhaseKind::Dispersed => "dispersed",
            PhaseKind::Clustering => "clustering",
            PhaseKind::Centered => "centered",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseStep {
    pub kind: PhaseKind,
    pub entry_delay_ms: u64,
}

impl PhaseStep {
    pub fn new(kind: PhaseKind, entry_delay_ms: u64) -> Self {
        Self {
            kind,
            entry_delay_ms,
        }
    }
}

/// Ordered phase entries of one cycle, optionally repeating every `period_ms`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleScript {
    steps: Vec<PhaseStep>,
    period_ms: Option<u64>,
}

impl CycleScript {
    /// Steps are ordered by entry delay; equal delays keep declaration order.
    pub fn new(mut steps: Vec<PhaseStep>, period_ms: Option<u64>) -> Self {
        steps.sort_by_key(|step| step.entry_delay_ms);
        Self { steps, period_ms }
    }

    /// Dispersed, then clustered by region, then back to centre.
    pub fn regional() -> Self {
        Self::new(
            vec![
                PhaseStep::new(PhaseKind::Dispersed, 0),
                PhaseStep::new(PhaseKind::Clustering, config::CLUSTER_DELAY_MS),
                PhaseStep::new(PhaseKind::Centered, config::CENTER_DELAY_MS),
            ],
            Some(config::CYCLE_PERIOD_MS),
        )
    }

    /// Dispersed, then straight back to centre.
    pub fn direct() -> Self {
        Self::new(
            vec![
                PhaseStep::new(PhaseKind::Dispersed, 0),
                PhaseStep::new(PhaseKind::Centered, config::DIRECT_CENTER_DELAY_MS),
            ],
            Some(config::DIRECT_PERIOD_MS),
        )
    }

    pub fn steps(&self) -> &[PhaseStep] {
        &self.steps
    }

    pub fn period_ms(&self) -> Option<u64> {
        self.period_ms
    }
}

/// Owns the current phase and the timers of the one live cycle.
///
/// Every cycle gets a new number; `begin` and `cancel` revoke the timers of
/// the previous cycle and a task carrying an old number is refused.
#[derive(Debug)]
pub struct PhaseController {
    script: CycleScript,
    active: Option<CycleScript>,
    cycle: u64,
    pending: Vec<TimerId>,
    current: Option<PhaseKind>,
}

impl PhaseController {
    pub fn new(script: CycleScript) -> Self {
        Self {
            script,
            active: None,
            cycle: 0,
            pending: Vec::new(),
            current: None,
        }
    }

    pub fn script(&self) -> &CycleScript {
        &self.script
    }

    /// Takes effect at the next `begin`.
    pub fn set_script(&mut self, script: CycleScript) {
        self.script = script;
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn current(&self) -> Option<PhaseKind> {
        self.current
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Cancels any live cycle and schedules every step of a new one.
    /// On failure nothing from the new cycle stays scheduled.
    pub fn begin<S>(&mut self, scheduler: &mut S) -> Result<u64, ScheduleError>
    where
        S: Scheduler + ?Sized,
    {
        self.cancel(scheduler);
        let cycle = self.cycle;
        let script = self.script.clone();
        for (step, entry) in script.steps().iter().enumerate() {
            match scheduler.schedule_once(entry.entry_delay_ms, Task::EnterPhase { cycle, step }) {
                Ok(id) => self.pending.push(id),
                Err(err) => {
                    self.cancel(scheduler);
                    return Err(err);
                }
            }
        }
        if let Some(period) = script.period_ms() {
            match scheduler.schedule_once(period, Task::RestartCycle { cycle }) {
                Ok(id) => self.pending.push(id),
                Err(err) => {
                    self.cancel(scheduler);
                    return Err(err);
                }
            }
        }
        debug!(target: "casecycle::engine", cycle, timers = self.pending.len(), "cycle.scheduled");
        self.active = Some(script);
        Ok(cycle)
    }

    /// Revokes every pending transition of the live cycle.
    pub fn cancel<S>(&mut self, scheduler: &mut S)
    where
        S: Scheduler + ?Sized,
    {
        for id in self.pending.drain(..) {
            scheduler.cancel(id);
        }
        self.active = None;
        self.cycle += 1;
    }

    /// Cancels and forgets the current phase.
    pub fn reset<S>(&mut self, scheduler: &mut S)
    where
        S: Scheduler + ?Sized,
    {
        self.cancel(scheduler);
        self.current = None;
    }

    /// Validates a fired phase entry and makes it current.
    pub fn accept_phase(&mut self, cycle: u64, step: usize) -> Option<PhaseKind> {
        if cycle != self.cycle {
            return None;
        }
        let kind = self.active.as_ref()?.steps().get(step)?.kind;
        self.current = Some(kind);
        Some(kind)
    }

    pub fn accepts_restart(&self, cycle: u64) -> bool {
        cycle == self.cycle && self.active.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Timeline;

    fn fired(t: &mut Timeline, until: u64) -> Vec<Task> {
        let mut out = Vec::new();
        while let Some(task) = t.pop_due(until) {
            out.push(task);
        }
        out
    }

    mod cycle_script {
        use super::*;

        #[test]
        fn regional_cycle_has_three_phases() {
            let script = CycleScript::regional();
            let kinds: Vec<PhaseKind> = script.steps().iter().map(|s| s.kind).collect();
            assert_eq!(kinds, vec![PhaseKind::Dispersed, PhaseKind::Clustering, PhaseKind::Centered]);
            assert_eq!(script.period_ms(), Some(15_000));
        }

        #[test]
        fn direct_cycle_skips_clustering() {
            let script = CycleScript::direct();
            assert!(script.steps().iter().all(|s| s.kind != PhaseKind::Clustering));
        }

        #[test]
        fn steps_sort_by_delay_and_keep_ties_in_order() {
            let script = CycleScript::new(
                vec![
                    PhaseStep::new(PhaseKind::Centered, 500),
                    PhaseStep::new(PhaseKind::Dispersed, 100),
                    PhaseStep::new(PhaseKind::Clustering, 100),
                ],
                None,
            );
            let kinds: Vec<PhaseKind> = script.steps().iter().map(|s| s.kind).collect();
            assert_eq!(kinds, vec![PhaseKind::Dispersed, PhaseKind::Clustering, PhaseKind::Centered]);
        }
    }

    mod begin {
        use super::*;

        #[test]
        fn schedules_every_step_and_the_restart() {
            let mut t = Timeline::new();
            let mut phases = PhaseController::new(CycleScript::regional());
            let cycle = phases.begin(&mut t).unwrap();
            assert_eq!(t.pending(), 4);
            assert_eq!(
                fired(&mut t, 15_000),
                vec![
                    Task::EnterPhase { cycle, step: 0 },
                    Task::EnterPhase { cycle, step: 1 },
                    Task::EnterPhase { cycle, step: 2 },
                    Task::RestartCycle { cycle },
                ]
            );
        }

        #[test]
        fn second_begin_revokes_the_first_cycle() {
            let mut t = Timeline::new();
            let mut phases = PhaseController::new(CycleScript::regional());
            let first = phases.begin(&mut t).unwrap();
            let second = phases.begin(&mut t).unwrap();
            assert_ne!(first, second);
            assert_eq!(t.pending(), 4);
            assert!(phases.accept_phase(first, 1).is_none());
            assert!(!phases.accepts_restart(first));
        }

        #[test]
        fn failure_leaves_nothing_scheduled() {
            let mut t = Timeline::with_capacity_limit(2);
            let mut phases = PhaseController::new(CycleScript::regional());
            assert_eq!(phases.begin(&mut t), Err(ScheduleError::Exhausted));
            assert_eq!(t.pending(), 0);
            assert!(!phases.is_active());
        }

        #[test]
        fn script_change_applies_to_next_cycle() {
            let mut t = Timeline::new();
            let mut phases = PhaseController::new(CycleScript::regional());
            let cycle = phases.begin(&mut t).unwrap();
            phases.set_script(CycleScript::direct());
            assert_eq!(phases.accept_phase(cycle, 1), Some(PhaseKind::Clustering));
        }
    }

    mod accept_phase {
        use super::*;

        #[test]
        fn updates_current_phase() {
            let mut t = Timeline::new();
            let mut phases = PhaseController::new(CycleScript::regional());
            let cycle = phases.begin(&mut t).unwrap();
            assert_eq!(phases.accept_phase(cycle, 2), Some(PhaseKind::Centered));
            assert_eq!(phases.current(), Some(PhaseKind::Centered));
        }

        #[test]
        fn unknown_step_is_refused() {
            let mut t = Timeline::new();
            let mut phases = PhaseController::new(CycleScript::direct());
            let cycle = phases.begin(&mut t).unwrap();
            assert!(phases.accept_phase(cycle, 9).is_none());
        }

        #[test]
        fn reset_forgets_current_phase() {
            let mut t = Timeline::new();
            let mut phases = PhaseController::new(CycleScript::regional());
            let cycle = phases.begin(&mut t).unwrap();
            phases.accept_phase(cycle, 0);
            phases.reset(&mut t);
            assert!(phases.current().is_none());
            assert_eq!(t.pending(), 0);
        }
    }
}
