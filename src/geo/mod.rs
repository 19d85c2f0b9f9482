use std::collections::BTreeSet;
use std::f64::consts::FRAC_PI_4;

use crate::types::{Focus, Point, Vec2};

/// Latitude limit where the Mercator y coordinate is still finite in practice.
const MAX_LATITUDE: f64 = 85.051_128_78;
const PACK_EPSILON: f32 = 1e-3;

/// Spherical Mercator projection onto canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mercator {
    pub scale: f32,
    pub translate: Vec2,
}

impl Mercator {
    pub fn new(scale: f32, translate: Vec2) -> Self {
        Self { scale, translate }
    }

    /// Pure and deterministic. Non-finite input maps to the translate origin so
    /// positions stay finite.
    pub fn project(&self, lat: f64, lon: f64) -> Vec2 {
        if !lat.is_finite() || !lon.is_finite() {
            return self.translate;
        }
        let lambda = lon.to_radians();
        let phi = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let scale = f64::from(self.scale);
        let x = lambda * scale + f64::from(self.translate.x);
        let y = -(FRAC_PI_4 + phi / 2.0).tan().ln() * scale + f64::from(self.translate.y);
        Vec2::new(x as f32, y as f32)
    }
}

/// Square-root scale mapping `[0, domain_max]` onto `[0, range_max]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RadiusScale {
    pub domain_max: f64,
    pub range_max: f32,
}

impl RadiusScale {
    pub fn new(domain_max: f64, range_max: f32) -> Self {
        Self {
            domain_max,
            range_max,
        }
    }

    /// Values outside the domain are clamped; unusable values map to zero.
    pub fn radius(&self, value: f64) -> f32 {
        if !(self.domain_max > 0.0) || !value.is_finite() || value <= 0.0 {
            return 0.0;
        }
        let t = (value / self.domain_max).min(1.0);
        self.range_max * t.sqrt() as f32
    }
}

/// Where packed foci land on the canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FociLayout {
    /// The packing area is `canvas.y / height_stretch` tall.
    pub height_stretch: f32,
    pub offset: Vec2,
    pub label_offset_y: f32,
}

/// Groups `points` by `key_fn` and packs one focus per group across `canvas`.
///
/// Groups are laid out in key order as equal circles packed tightly around the
/// origin, then scaled so the enclosing circle fits the packing area. Foci may
/// sit close together; they are targets, not bodies.
pub fn compute_foci<F>(points: &[Point], key_fn: F, canvas: Vec2, layout: &FociLayout) -> Vec<Focus>
where
    F: Fn(&Point) -> String,
{
    let keys: BTreeSet<String> = points.iter().map(key_fn).collect();
    if keys.is_empty() {
        return Vec::new();
    }

    let radii = vec![1.0_f32; keys.len()];
    let centers = pack_siblings(&radii);
    let (enclosing_center, enclosing_radius) = enclose(&centers, &radii);

    let area = Vec2::new(canvas.x, canvas.y / layout.height_stretch.max(PACK_EPSILON));
    let k = if enclosing_radius > 0.0 {
        (area.x.min(area.y) / (2.0 * enclosing_radius)).max(0.0)
    } else {
        0.0
    };
    let middle = area * 0.5;

    keys.into_iter()
        .zip(centers)
        .map(|(key, c)| {
            let target = middle + (c - enclosing_center) * k + layout.offset;
            Focus {
                key,
                target,
                label_position: target + Vec2::new(0.0, layout.label_offset_y),
            }
        })
        .collect()
}

/// Places circles one by one, each tangent to two already-placed circles,
/// choosing the free spot nearest the origin.
fn pack_siblings(radii: &[f32]) -> Vec<Vec2> {
    let mut centers: Vec<Vec2> = Vec::with_capacity(radii.len());
    for (k, &r) in radii.iter().enumerate() {
        match k {
            0 => centers.push(Vec2::ZERO),
            1 => {
                let a = radii[0];
                centers[0] = Vec2::new(-r, 0.0);
                centers.push(Vec2::new(a, 0.0));
            }
            _ => {
                let mut best: Option<Vec2> = None;
                for i in 0..k {
                    for j in (i + 1)..k {
                        for candidate in tangent_positions(centers[i], radii[i], centers[j], radii[j], r) {
                            let free = (0..k).all(|m| {
                                candidate.distance(centers[m]) >= radii[m] + r - PACK_EPSILON
                            });
                            let closer = best.is_none_or(|b| candidate.length_sq() < b.length_sq());
                            if free && closer {
                                best = Some(candidate);
                            }
                        }
                    }
                }
                // Tangent spots always exist for k >= 2; stack to the right as a fallback.
                let fallback = Vec2::new(
                    centers.iter().zip(radii).map(|(c, r)| c.x + r).fold(0.0, f32::max) + r,
                    0.0,
                );
                centers.push(best.unwrap_or(fallback));
            }
        }
    }
    centers
}

fn tangent_positions(a: Vec2, ra: f32, b: Vec2, rb: f32, r: f32) -> Vec<Vec2> {
    let da = ra + r;
    let db = rb + r;
    let delta = b - a;
    let d = delta.length();
    if d <= 0.0 || d > da + db || d < (da - db).abs() {
        return Vec::new();
    }
    let along = (da * da - db * db + d * d) / (2.0 * d);
    let h = (da * da - along * along).max(0.0).sqrt();
    let base = a + delta * (along / d);
    let perp = Vec2::new(-delta.y / d, delta.x / d);
    vec![base + perp * h, base - perp * h]
}

fn enclose(centers: &[Vec2], radii: &[f32]) -> (Vec2, f32) {
    let mut min = Vec2::new(f32::INFINITY, f32::INFINITY);
    let mut max = Vec2::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
    for (c, &r) in centers.iter().zip(radii) {
        min.x = min.x.min(c.x - r);
        min.y = min.y.min(c.y - r);
        max.x = max.x.max(c.x + r);
        max.y = max.y.max(c.y + r);
    }
    let center = Vec2::new((min.x + max.x) * 0.5, (min.y + max.y) * 0.5);
    let radius = centers
        .iter()
        .zip(radii)
        .map(|(c, &r)| c.distance(center) + r)
        .fold(0.0, f32::max);
    (center, radius)
}
