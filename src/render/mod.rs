use std::{cell::RefCell, rc::Rc};

use crate::{
    core::phase::PhaseKind,
    types::{CoverState, Focus, Point, Vec2},
};

/// Layout-change notification sent once per phase entry.
#[derive(Clone, Copy, Debug)]
pub struct LayoutChange<'a> {
    pub phase: PhaseKind,
    pub foci: &'a [Focus],
    pub cover: CoverState,
}

/// Receives everything the engine wants drawn. Implementations own all
/// presentation; the engine never draws.
pub trait Renderer {
    /// Called once per tick or interpolation frame with every point.
    fn frame(&mut self, points: &[Point]);

    fn layout_changed(&mut self, change: LayoutChange<'_>);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiscView {
    pub position: Vec2,
    pub radius: f32,
    pub group: usize,
}

/// Latest state reported to a [`SceneRecorder`].
#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub discs: Vec<DiscView>,
    pub foci: Vec<Focus>,
    pub phase: Option<PhaseKind>,
    pub cover: Option<CoverState>,
    pub frames: u64,
    groups: Vec<String>,
}

impl Scene {
    fn group_index(&mut self, key: &str) -> usize {
        if let Some(idx) = self.groups.iter().position(|g| g == key) {
            return idx;
        }
        self.groups.push(key.to_string());
        self.groups.len() - 1
    }
}

/// Renderer that keeps the latest frame in shared memory for a host UI to draw.
#[derive(Clone, Debug, Default)]
pub struct SceneRecorder {
    scene: Rc<RefCell<Scene>>,
}

impl SceneRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scene(&self) -> std::cell::Ref<'_, Scene> {
        self.scene.borrow()
    }
}

impl Renderer for SceneRecorder {
    fn frame(&mut self, points: &[Point]) {
        let mut scene = self.scene.borrow_mut();
        scene.discs.clear();
        for point in points {
            let group = scene.group_index(&point.group_key);
            scene.discs.push(DiscView {
                position: point.position,
                radius: point.radius,
                group,
            });
        }
        scene.frames += 1;
    }

    fn layout_changed(&mut self, change: LayoutChange<'_>) {
        let mut scene = self.scene.borrow_mut();
        scene.phase = Some(change.phase);
        scene.foci = change.foci.to_vec();
        scene.cover = Some(change.cover);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorId {
    White,
    Cyan,
    Blue,
    Yellow,
    Magenta,
    Red,
    Green,
    Gray,
}

const GROUP_COLORS: [ColorId; 6] = [
    ColorId::Red,
    ColorId::Yellow,
    ColorId::Cyan,
    ColorId::Magenta,
    ColorId::Green,
    ColorId::Blue,
];

/// Maps canvas coordinates onto terminal cells. Cells are about twice as tall
/// as they are wide, so the vertical scale is halved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub scale_x: f32,
    pub scale_y: f32,
    pub offset: Vec2,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 0.5,
            offset: Vec2::ZERO,
        }
    }
}

impl Camera {
    pub fn fit(canvas: Vec2, viewport: Viewport) -> Self {
        if canvas.x <= 0.0 || canvas.y <= 0.0 {
            return Self::default();
        }
        let scale = (viewport.width as f32 / canvas.x).min(2.0 * viewport.height as f32 / canvas.y);
        let used = Vec2::new(canvas.x * scale, canvas.y * scale * 0.5);
        Self {
            scale_x: scale,
            scale_y: scale * 0.5,
            offset: Vec2::new(
                (viewport.width as f32 - used.x) * 0.5,
                (viewport.height as f32 - used.y) * 0.5,
            ),
        }
    }

    fn to_cell(&self, p: Vec2) -> (i32, i32) {
        (
            (p.x * self.scale_x + self.offset.x).floor() as i32,
            (p.y * self.scale_y + self.offset.y).floor() as i32,
        )
    }

    fn cell_center(&self, col: i32, row: i32) -> Vec2 {
        Vec2::new(
            (col as f32 + 0.5 - self.offset.x) / self.scale_x,
            (row as f32 + 0.5 - self.offset.y) / self.scale_y,
        )
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Viewport {
    pub width: u16,
    pub height: u16,
}

#[derive(Clone, Copy, Debug)]
pub struct RenderCell {
    pub ch: char,
    pub depth: f32,
    pub color: ColorId,
}

#[derive(Debug)]
pub struct FrameBuffer {
    width: u16,
    height: u16,
    cells: Vec<RenderCell>,
}

impl FrameBuffer {
    pub fn new(width: u16, height: u16) -> Self {
        let mut buffer = Self {
            width,
            height,
            cells: Vec::new(),
        };
        buffer.resize(width, height);
        buffer
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let len = (width as usize).saturating_mul(height as usize);
        self.cells.resize(
            len,
            RenderCell {
                ch: ' ',
                depth: f32::NEG_INFINITY,
                color: ColorId::White,
            },
        );
        self.clear();
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.ch = ' ';
            cell.depth = f32::NEG_INFINITY;
            cell.color = ColorId::White;
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn get(&self, x: u16, y: u16) -> RenderCell {
        debug_assert!(x < self.width && y < self.height, "get() out of bounds");
        let idx = (y as usize) * (self.width as usize) + (x as usize);
        self.cells[idx]
    }

    /// Higher depth wins; ties go to the later write.
    fn set(&mut self, x: i32, y: i32, ch: char, depth: f32, color: ColorId) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = (y as usize) * (self.width as usize) + (x as usize);
        let cell = &mut self.cells[idx];
        if depth >= cell.depth {
            cell.depth = depth;
            cell.ch = ch;
            cell.color = color;
        }
    }
}

const COVER_DEPTH: f32 = 1.0e6;
const LABEL_DEPTH: f32 = 1.0e9;

pub fn draw(scene: &Scene, camera: &Camera, viewport: Viewport, frame: &mut FrameBuffer) {
    if frame.width() != viewport.width || frame.height() != viewport.height {
        frame.resize(viewport.width, viewport.height);
    } else {
        frame.clear();
    }

    for disc in &scene.discs {
        let color = GROUP_COLORS[disc.group % GROUP_COLORS.len()];
        // Smaller discs sit on top so they stay visible inside larger ones.
        let depth = -disc.radius;
        fill_disc(frame, camera, disc.position, disc.radius, '█', depth, color);
        let (cx, cy) = camera.to_cell(disc.position);
        frame.set(cx, cy, '●', depth, color);
    }

    if let Some(cover) = scene.cover.filter(|c| c.radius > 0.0) {
        fill_disc(frame, camera, cover.center, cover.radius, '▓', COVER_DEPTH, ColorId::Gray);
    }

    if scene.phase == Some(PhaseKind::Clustering) {
        for focus in &scene.foci {
            let (cx, cy) = camera.to_cell(focus.label_position);
            let start = cx - focus.key.chars().count() as i32 / 2;
            for (i, ch) in focus.key.chars().enumerate() {
                frame.set(start + i as i32, cy, ch, LABEL_DEPTH, ColorId::White);
            }
        }
    }
}

fn fill_disc(
    frame: &mut FrameBuffer,
    camera: &Camera,
    center: Vec2,
    radius: f32,
    ch: char,
    depth: f32,
    color: ColorId,
) {
    let (min_x, min_y) = camera.to_cell(center - Vec2::new(radius, radius));
    let (max_x, max_y) = camera.to_cell(center + Vec2::new(radius, radius));
    let r_sq = radius * radius;
    for row in min_y..=max_y {
        for col in min_x..=max_x {
            if (camera.cell_center(col, row) - center).length_sq() <= r_sq {
                frame.set(col, row, ch, depth, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_with(discs: Vec<DiscView>) -> Scene {
        Scene {
            discs,
            ..Scene::default()
        }
    }

    mod camera_fit {
        use super::*;

        #[test]
        fn canvas_fills_limiting_axis() {
            let camera = Camera::fit(Vec2::new(1300.0, 800.0), Viewport { width: 130, height: 40 });
            assert!((camera.scale_x - 0.1).abs() < 1e-6);
            assert!((camera.scale_y - 0.05).abs() < 1e-6);
        }

        #[test]
        fn canvas_is_centered() {
            let camera = Camera::fit(Vec2::new(100.0, 100.0), Viewport { width: 100, height: 25 });
            let (cx, cy) = camera.to_cell(Vec2::new(50.0, 50.0));
            assert_eq!((cx, cy), (50, 12));
        }

        #[test]
        fn empty_canvas_uses_default() {
            assert_eq!(Camera::fit(Vec2::ZERO, Viewport { width: 10, height: 10 }), Camera::default());
        }
    }

    mod framebuffer {
        use super::*;

        #[test]
        fn creates_with_correct_dimensions() {
            let fb = FrameBuffer::new(80, 24);
            assert_eq!(fb.width(), 80);
            assert_eq!(fb.height(), 24);
        }

        #[test]
        fn does_not_overwrite_with_lower_depth() {
            let mut fb = FrameBuffer::new(10, 10);
            fb.set(5, 5, 'A', 10.0, ColorId::Blue);
            fb.set(5, 5, 'B', 5.0, ColorId::Red);
            assert_eq!(fb.get(5, 5).ch, 'A');
        }

        #[test]
        fn out_of_bounds_is_ignored() {
            let mut fb = FrameBuffer::new(10, 10);
            fb.set(-1, 3, 'X', 10.0, ColorId::Blue);
            fb.set(100, 100, 'X', 10.0, ColorId::Blue);
        }
    }

    mod draw_fn {
        use super::*;

        fn camera() -> Camera {
            Camera {
                scale_x: 1.0,
                scale_y: 1.0,
                offset: Vec2::ZERO,
            }
        }

        #[test]
        fn empty_scene_produces_empty_frame() {
            let mut frame = FrameBuffer::new(20, 10);
            draw(&Scene::default(), &camera(), Viewport { width: 20, height: 10 }, &mut frame);
            for y in 0..10 {
                for x in 0..20 {
                    assert_eq!(frame.get(x, y).ch, ' ');
                }
            }
        }

        #[test]
        fn disc_covers_cells_within_radius() {
            let scene = scene_with(vec![DiscView {
                position: Vec2::new(10.0, 5.0),
                radius: 3.0,
                group: 0,
            }]);
            let mut frame = FrameBuffer::new(20, 10);
            draw(&scene, &camera(), Viewport { width: 20, height: 10 }, &mut frame);
            assert_eq!(frame.get(10, 5).ch, '●');
            assert_eq!(frame.get(11, 5).ch, '█');
            assert_eq!(frame.get(0, 0).ch, ' ');
        }

        #[test]
        fn cover_hides_points() {
            let mut scene = scene_with(vec![DiscView {
                position: Vec2::new(10.0, 5.0),
                radius: 1.0,
                group: 1,
            }]);
            scene.cover = Some(CoverState {
                center: Vec2::new(10.0, 5.0),
                radius: 4.0,
            });
            let mut frame = FrameBuffer::new(20, 10);
            draw(&scene, &camera(), Viewport { width: 20, height: 10 }, &mut frame);
            assert_eq!(frame.get(10, 5).color, ColorId::Gray);
        }

        #[test]
        fn labels_show_only_while_clustering() {
            let mut scene = Scene::default();
            scene.foci = vec![Focus {
                key: "Sul".to_string(),
                target: Vec2::new(10.0, 8.0),
                label_position: Vec2::new(10.0, 2.0),
            }];
            let mut frame = FrameBuffer::new(20, 10);
            scene.phase = Some(PhaseKind::Dispersed);
            draw(&scene, &camera(), Viewport { width: 20, height: 10 }, &mut frame);
            assert_eq!(frame.get(9, 2).ch, ' ');
            scene.phase = Some(PhaseKind::Clustering);
            draw(&scene, &camera(), Viewport { width: 20, height: 10 }, &mut frame);
            assert_eq!(frame.get(9, 2).ch, 'S');
        }
    }

    mod scene_recorder {
        use super::*;

        fn point(id: &str, group: &str) -> Point {
            Point {
                id: id.to_string(),
                position: Vec2::new(1.0, 2.0),
                home: Vec2::ZERO,
                radius: 3.0,
                group_key: group.to_string(),
                series: Vec::new(),
            }
        }

        #[test]
        fn keeps_latest_frame_and_stable_group_indices() {
            let mut recorder = SceneRecorder::new();
            let reader = recorder.clone();
            recorder.frame(&[point("a", "Sul"), point("b", "Norte"), point("c", "Sul")]);
            let scene = reader.scene();
            assert_eq!(scene.frames, 1);
            let groups: Vec<usize> = scene.discs.iter().map(|d| d.group).collect();
            assert_eq!(groups, vec![0, 1, 0]);
        }

        #[test]
        fn records_layout_changes() {
            let mut recorder = SceneRecorder::new();
            let cover = CoverState {
                center: Vec2::ZERO,
                radius: 40.0,
            };
            recorder.layout_changed(LayoutChange {
                phase: PhaseKind::Centered,
                foci: &[],
                cover,
            });
            assert_eq!(recorder.scene().phase, Some(PhaseKind::Centered));
            assert_eq!(recorder.scene().cover, Some(cover));
        }
    }
}
