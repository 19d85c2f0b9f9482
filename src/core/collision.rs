use crate::{
    config,
    spatial::QuadTree,
    types::{Point, Vec2},
};

/// Golden angle in radians; spreads successive fallback directions evenly.
const GOLDEN_ANGLE: f32 = 2.399_963_2;

/// Counters from one resolution pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolvePass {
    pub candidates: usize,
    pub overlaps: usize,
    pub coincident: usize,
}

/// Pushes overlapping circles apart, using a quadtree to find candidates.
#[derive(Debug, Default)]
pub struct CollisionResolver {
    tree: QuadTree,
    positions: Vec<Vec2>,
}

impl CollisionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// One damped separation pass. Each overlapping pair moves apart along the
    /// line between centres by `overlap * damping`, half applied to each point.
    /// A single pass does not guarantee a fully resolved layout.
    pub fn resolve(&mut self, points: &mut [Point], damping: f32) -> ResolvePass {
        let mut pass = ResolvePass::default();
        if points.len() < 2 {
            return pass;
        }
        let damping = damping.clamp(0.0, 1.0);

        self.positions.clear();
        self.positions.extend(points.iter().map(|p| p.position));
        self.tree.rebuild(&self.positions);

        let max_radius = points.iter().map(|p| p.radius).fold(0.0, f32::max);
        let tree = &self.tree;
        for i in 0..points.len() {
            let reach = points[i].radius + max_radius;
            tree.visit_neighbors(i, reach, |j| {
                pass.candidates += 1;
                if j <= i {
                    return;
                }
                match separate(points, i, j, damping) {
                    Separation::Clear => {}
                    Separation::Pushed => pass.overlaps += 1,
                    Separation::Coincident => {
                        pass.overlaps += 1;
                        pass.coincident += 1;
                    }
                }
            });
        }
        pass
    }
}

enum Separation {
    Clear,
    Pushed,
    Coincident,
}

fn separate(points: &mut [Point], i: usize, j: usize, damping: f32) -> Separation {
    debug_assert!(i < j, "pairs are visited once with i < j");
    let (left, right) = points.split_at_mut(j);
    let a = &mut left[i];
    let b = &mut right[0];

    let required = a.radius + b.radius;
    let delta = b.position - a.position;
    let dist = delta.length();
    if dist >= required {
        return Separation::Clear;
    }

    let (normal, outcome) = if dist > config::COINCIDENT_EPSILON {
        (delta * (1.0 / dist), Separation::Pushed)
    } else {
        (fallback_direction(j), Separation::Coincident)
    };
    let correction = (required - dist) * damping * 0.5;
    a.position -= normal * correction;
    b.position += normal * correction;
    outcome
}

/// Deterministic unit vector for separating coincident points.
fn fallback_direction(j: usize) -> Vec2 {
    let angle = GOLDEN_ANGLE * j as f32;
    Vec2::new(angle.cos(), angle.sin())
}
