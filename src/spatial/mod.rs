use crate::types::Vec2;

const LEAF_CAPACITY: usize = 4;
const MAX_DEPTH: u32 = 16;
const BOUNDS_PADDING: f32 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    fn around(positions: &[Vec2]) -> Option<Self> {
        let mut finite = positions.iter().filter(|p| p.is_finite());
        let first = *finite.next()?;
        let (mut min, mut max) = (first, first);
        for p in finite {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        // Square cells keep the subdivision balanced on both axes.
        let side = (max.x - min.x).max(max.y - min.y) + BOUNDS_PADDING * 2.0;
        let min = Vec2::new(min.x - BOUNDS_PADDING, min.y - BOUNDS_PADDING);
        Some(Self {
            min,
            max: Vec2::new(min.x + side, min.y + side),
        })
    }

    fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
        )
    }

    fn quadrant(&self, pos: Vec2) -> usize {
        let c = self.center();
        let east = usize::from(pos.x >= c.x);
        let south = usize::from(pos.y >= c.y);
        south * 2 + east
    }

    fn child(&self, quadrant: usize) -> Bounds {
        let c = self.center();
        let (min_x, max_x) = if quadrant % 2 == 0 {
            (self.min.x, c.x)
        } else {
            (c.x, self.max.x)
        };
        let (min_y, max_y) = if quadrant < 2 {
            (self.min.y, c.y)
        } else {
            (c.y, self.max.y)
        };
        Bounds {
            min: Vec2::new(min_x, min_y),
            max: Vec2::new(max_x, max_y),
        }
    }

    /// True when some part of the box lies within `radius` of `center`.
    pub fn intersects_circle(&self, center: Vec2, radius: f32) -> bool {
        let nearest = Vec2::new(
            center.x.clamp(self.min.x, self.max.x),
            center.y.clamp(self.min.y, self.max.y),
        );
        (nearest - center).length_sq() <= radius * radius
    }
}

#[derive(Debug)]
enum NodeKind {
    Leaf(Vec<usize>),
    Branch([usize; 4]),
}

#[derive(Debug)]
struct Node {
    bounds: Bounds,
    depth: u32,
    kind: NodeKind,
}

/// Point quadtree over a snapshot of positions, rebuilt once per tick.
///
/// Items are the indices of the slice passed to [`QuadTree::rebuild`]. Leaves
/// hold up to a few items and split on overflow; coincident points stop
/// splitting at a fixed depth and share a leaf.
#[derive(Debug)]
pub struct QuadTree {
    leaf_capacity: usize,
    nodes: Vec<Node>,
    positions: Vec<Vec2>,
    len: usize,
}

impl Default for QuadTree {
    fn default() -> Self {
        Self::new()
    }
}

impl QuadTree {
    pub fn new() -> Self {
        Self::with_leaf_capacity(LEAF_CAPACITY)
    }

    pub fn with_leaf_capacity(leaf_capacity: usize) -> Self {
        assert!(leaf_capacity > 0, "leaf_capacity must be positive");
        Self {
            leaf_capacity,
            nodes: Vec::new(),
            positions: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.nodes.first().map(|root| root.bounds)
    }

    pub fn depth(&self) -> u32 {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.positions.clear();
        self.len = 0;
    }

    /// Indexes `positions`; non-finite entries are left out.
    pub fn rebuild(&mut self, positions: &[Vec2]) {
        self.clear();
        self.positions.extend_from_slice(positions);
        let Some(bounds) = Bounds::around(positions) else {
            return;
        };
        self.nodes.push(Node {
            bounds,
            depth: 0,
            kind: NodeKind::Leaf(Vec::new()),
        });
        for idx in 0..positions.len() {
            if positions[idx].is_finite() {
                self.insert(idx);
            }
        }
    }

    /// Calls `visitor` with every other indexed item stored in a cell that
    /// reaches within `max_distance` of item `index`. Cells that cannot
    /// intersect the circle are pruned with their whole subtree.
    pub fn visit_neighbors<F>(&self, index: usize, max_distance: f32, mut visitor: F)
    where
        F: FnMut(usize),
    {
        let Some(&center) = self.positions.get(index) else {
            return;
        };
        if self.nodes.is_empty() || !center.is_finite() {
            return;
        }
        self.visit_node(0, index, center, max_distance, &mut visitor);
    }

    fn visit_node<F>(&self, node: usize, skip: usize, center: Vec2, max_distance: f32, visitor: &mut F)
    where
        F: FnMut(usize),
    {
        let node = &self.nodes[node];
        if !node.bounds.intersects_circle(center, max_distance) {
            return;
        }
        match &node.kind {
            NodeKind::Leaf(items) => {
                for &item in items {
                    if item != skip {
                        visitor(item);
                    }
                }
            }
            NodeKind::Branch(children) => {
                for &child in children {
                    self.visit_node(child, skip, center, max_distance, visitor);
                }
            }
        }
    }

    fn insert(&mut self, idx: usize) {
        let pos = self.positions[idx];
        let mut node = 0;
        while let NodeKind::Branch(children) = &self.nodes[node].kind {
            node = children[self.nodes[node].bounds.quadrant(pos)];
        }
        if let NodeKind::Leaf(items) = &mut self.nodes[node].kind {
            items.push(idx);
        }
        self.len += 1;
        self.split_if_full(node);
    }

    fn split_if_full(&mut self, node: usize) {
        let depth = self.nodes[node].depth;
        let full = match &self.nodes[node].kind {
            NodeKind::Leaf(items) => items.len() > self.leaf_capacity,
            NodeKind::Branch(_) => false,
        };
        if !full || depth >= MAX_DEPTH {
            return;
        }

        let bounds = self.nodes[node].bounds;
        let first_child = self.nodes.len();
        for quadrant in 0..4 {
            self.nodes.push(Node {
                bounds: bounds.child(quadrant),
                depth: depth + 1,
                kind: NodeKind::Leaf(Vec::new()),
            });
        }
        let children = [first_child, first_child + 1, first_child + 2, first_child + 3];
        let items = match std::mem::replace(&mut self.nodes[node].kind, NodeKind::Branch(children)) {
            NodeKind::Leaf(items) => items,
            NodeKind::Branch(_) => Vec::new(),
        };
        for idx in items {
            let child = children[bounds.quadrant(self.positions[idx])];
            if let NodeKind::Leaf(child_items) = &mut self.nodes[child].kind {
                child_items.push(idx);
            }
        }
        for child in children {
            self.split_if_full(child);
        }
    }
}
