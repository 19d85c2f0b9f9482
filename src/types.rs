use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use serde::Deserialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length_sq(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (other - self).length()
    }

    pub fn lerp(self, to: Vec2, t: f32) -> Vec2 {
        self + (to - self) * t
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Mul<Vec2> for f32 {
    type Output = Vec2;

    fn mul(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self * rhs.x, self * rhs.y)
    }
}

pub type PointId = String;

/// Period key of a magnitude series (a year in the case-count datasets).
pub type PeriodKey = i32;

/// One entry of a point's history. `value` is `None` when the source entry was
/// unusable (non-numeric or negative).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MagnitudeSample {
    pub period: PeriodKey,
    pub value: Option<f64>,
}

/// One region/subdivision being animated.
#[derive(Clone, Debug)]
pub struct Point {
    pub id: PointId,
    pub position: Vec2,
    pub home: Vec2,
    pub radius: f32,
    pub group_key: String,
    pub series: Vec<MagnitudeSample>,
}

impl Point {
    pub fn value_at(&self, period: PeriodKey) -> Option<f64> {
        self.series
            .iter()
            .find(|sample| sample.period == period)
            .and_then(|sample| sample.value)
    }

    pub fn max_value(&self) -> Option<f64> {
        self.series
            .iter()
            .filter_map(|sample| sample.value)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
    }
}

/// Aggregation target for every point sharing `key`.
#[derive(Clone, Debug, PartialEq)]
pub struct Focus {
    pub key: String,
    pub target: Vec2,
    pub label_position: Vec2,
}

/// The circle hiding the gathered points while the cycle is centred.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoverState {
    pub center: Vec2,
    pub radius: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EngineStats {
    pub ticks: u64,
    pub alpha: f32,
    pub simulation_running: bool,
    pub collision_candidates_avg: f32,
    pub coincident_pairs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    mod vec2_length {
        use super::*;

        #[test]
        fn calculates_length_squared() {
            let v = Vec2::new(3.0, 4.0);
            assert_eq!(v.length_sq(), 25.0);
        }

        #[test]
        fn calculates_length() {
            let v = Vec2::new(3.0, 4.0);
            assert_eq!(v.length(), 5.0);
        }

        #[test]
        fn distance_is_symmetric() {
            let a = Vec2::new(1.0, 1.0);
            let b = Vec2::new(4.0, 5.0);
            assert_eq!(a.distance(b), 5.0);
            assert_eq!(b.distance(a), 5.0);
        }
    }

    mod vec2_lerp {
        use super::*;

        #[test]
        fn endpoints_are_exact() {
            let a = Vec2::new(0.0, 10.0);
            let b = Vec2::new(10.0, 0.0);
            assert_eq!(a.lerp(b, 0.0), a);
            assert_eq!(a.lerp(b, 1.0), b);
        }

        #[test]
        fn midpoint_is_halfway() {
            let mid = Vec2::ZERO.lerp(Vec2::new(8.0, -4.0), 0.5);
            assert_eq!(mid, Vec2::new(4.0, -2.0));
        }
    }

    mod vec2_ops {
        use super::*;

        #[test]
        fn add_and_sub_assign_modify_in_place() {
            let mut a = Vec2::new(1.0, 2.0);
            a += Vec2::new(3.0, 4.0);
            assert_eq!(a, Vec2::new(4.0, 6.0));
            a -= Vec2::new(1.0, 1.0);
            assert_eq!(a, Vec2::new(3.0, 5.0));
        }

        #[test]
        fn scalar_multiplication_commutes() {
            let v = Vec2::new(2.0, 3.0);
            assert_eq!(v * 2.0, 2.0 * v);
        }

        #[test]
        fn non_finite_components_are_detected() {
            assert!(Vec2::new(1.0, 2.0).is_finite());
            assert!(!Vec2::new(f32::NAN, 2.0).is_finite());
            assert!(!Vec2::new(0.0, f32::INFINITY).is_finite());
        }
    }

    mod point_values {
        use super::*;

        fn point(series: Vec<MagnitudeSample>) -> Point {
            Point {
                id: "SP".to_string(),
                position: Vec2::ZERO,
                home: Vec2::ZERO,
                radius: 0.0,
                group_key: "Sudeste".to_string(),
                series,
            }
        }

        #[test]
        fn value_at_finds_matching_period() {
            let p = point(vec![
                MagnitudeSample { period: 2014, value: Some(10.0) },
                MagnitudeSample { period: 2015, value: Some(40.0) },
            ]);
            assert_eq!(p.value_at(2015), Some(40.0));
            assert_eq!(p.value_at(2013), None);
        }

        #[test]
        fn max_value_skips_unusable_samples() {
            let p = point(vec![
                MagnitudeSample { period: 2014, value: None },
                MagnitudeSample { period: 2015, value: Some(7.0) },
                MagnitudeSample { period: 2016, value: Some(3.0) },
            ]);
            assert_eq!(p.max_value(), Some(7.0));
        }

        #[test]
        fn empty_series_has_no_max() {
            assert_eq!(point(Vec::new()).max_value(), None);
        }
    }
}
