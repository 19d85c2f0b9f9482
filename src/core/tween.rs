use tracing::debug;

use crate::{
    config::TweenConfig,
    error::ScheduleError,
    schedule::{Scheduler, Task, TimerId},
    types::{Point, Vec2},
};

/// Direct, time-boxed interpolation of every point toward a fixed layout.
/// Point `i` starts `i * stagger_ms` after the tween and eases over `duration_ms`.
#[derive(Debug, Default)]
pub struct Tween {
    running: bool,
    generation: u64,
    timer: Option<TimerId>,
    from: Vec<Vec2>,
    to: Vec<Vec2>,
    started_at_ms: u64,
    timing: Option<TweenConfig>,
}

impl Tween {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn accepts(&self, generation: u64) -> bool {
        self.running && generation == self.generation
    }

    /// Total time until the last point arrives.
    pub fn span_ms(timing: TweenConfig, count: usize) -> u64 {
        timing.duration_ms + timing.stagger_ms * count.saturating_sub(1) as u64
    }

    pub fn start<S>(
        &mut self,
        scheduler: &mut S,
        points: &[Point],
        to: Vec<Vec2>,
        timing: TweenConfig,
        interval_ms: u64,
    ) -> Result<(), ScheduleError>
    where
        S: Scheduler + ?Sized,
    {
        self.stop(scheduler);
        self.generation += 1;
        let timer = scheduler.schedule_repeating(
            interval_ms,
            Task::TweenFrame {
                generation: self.generation,
            },
        )?;
        self.timer = Some(timer);
        self.from = points.iter().map(|p| p.position).collect();
        self.to = to;
        self.started_at_ms = scheduler.now_ms();
        self.timing = Some(timing);
        self.running = true;
        debug!(target: "casecycle::engine", generation = self.generation, points = points.len(), "tween.start");
        Ok(())
    }

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
        true
    }

    /// Writes interpolated positions for `now_ms`. Returns true once every
    /// point has arrived.
    pub fn frame(&mut self, now_ms: u64, points: &mut [Point]) -> bool {
        let Some(timing) = self.timing else {
            return true;
        };
        let elapsed = now_ms.saturating_sub(self.started_at_ms);
        let mut done = true;
        for (i, ((point, &from), &to)) in points.iter_mut().zip(&self.from).zip(&self.to).enumerate() {
            let delay = timing.stagger_ms * i as u64;
            let t = if timing.duration_ms == 0 {
                1.0
            } else {
                (elapsed.saturating_sub(delay) as f32 / timing.duration_ms as f32).min(1.0)
            };
            if t < 1.0 {
                done = false;
            }
            point.position = from.lerp(to, cubic_in_out(t));
        }
        done
    }
}

pub fn cubic_in_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0) * 2.0;
    if t <= 1.0 {
        t * t * t / 2.0
    } else {
        let t = t - 2.0;
        (t * t * t + 2.0) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Timeline;

    fn points(n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| Point {
                id: format!("p{i}"),
                position: Vec2::ZERO,
                home: Vec2::new(100.0, 0.0),
                radius: 1.0,
                group_key: "g".to_string(),
                series: Vec::new(),
            })
            .collect()
    }

    mod cubic_in_out_fn {
        use super::*;

        #[test]
        fn endpoints_and_midpoint() {
            assert_eq!(cubic_in_out(0.0), 0.0);
            assert_eq!(cubic_in_out(1.0), 1.0);
            assert!((cubic_in_out(0.5) - 0.5).abs() < 1e-6);
        }

        #[test]
        fn is_monotonic() {
            let mut last = 0.0;
            for i in 0..=100 {
                let v = cubic_in_out(i as f32 / 100.0);
                assert!(v >= last);
                last = v;
            }
        }
    }

    mod frame {
        use super::*;

        #[test]
        fn staggered_points_arrive_in_order() {
            let mut t = Timeline::new();
            let mut pts = points(3);
            let mut tween = Tween::new();
            let timing = TweenConfig { duration_ms: 100, stagger_ms: 50 };
            tween.start(&mut t, &pts, vec![Vec2::new(100.0, 0.0); 3], timing, 16).unwrap();

            assert!(!tween.frame(100, &mut pts));
            assert_eq!(pts[0].position, Vec2::new(100.0, 0.0));
            assert!(pts[1].position.x < 100.0);
            assert_eq!(pts[2].position, Vec2::ZERO);

            assert!(tween.frame(Tween::span_ms(timing, 3), &mut pts));
            for p in &pts {
                assert_eq!(p.position, Vec2::new(100.0, 0.0));
            }
        }

        #[test]
        fn zero_duration_arrives_immediately() {
            let mut t = Timeline::new();
            let mut pts = points(2);
            let mut tween = Tween::new();
            tween
                .start(&mut t, &pts, vec![Vec2::new(5.0, 5.0); 2], TweenConfig::INSTANT, 16)
                .unwrap();
            assert!(tween.frame(0, &mut pts));
            assert_eq!(pts[1].position, Vec2::new(5.0, 5.0));
        }
    }

    mod start_stop {
        use super::*;

        #[test]
        fn restart_invalidates_previous_generation() {
            let mut t = Timeline::new();
            let pts = points(1);
            let mut tween = Tween::new();
            let timing = TweenConfig::default();
            tween.start(&mut t, &pts, vec![Vec2::ZERO], timing, 16).unwrap();
            let first = tween.generation();
            tween.start(&mut t, &pts, vec![Vec2::ZERO], timing, 16).unwrap();
            assert!(!tween.accepts(first));
            assert_eq!(t.pending(), 1);
        }

        #[test]
        fn stop_is_idempotent() {
            let mut t = Timeline::new();
            let mut tween = Tween::new();
            assert!(!tween.stop(&mut t));
            tween.start(&mut t, &points(1), vec![Vec2::ZERO], TweenConfig::default(), 16).unwrap();
            assert!(tween.stop(&mut t));
            assert!(!tween.stop(&mut t));
            assert_eq!(t.pending(), 0);
        }
    }
}
