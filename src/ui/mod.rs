use std::{
    env,
    error::Error,
    io,
    path::Path,
    time::{Duration, Instant},
};

use crossterm::{
    event::{self, Event as CrosstermEvent, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};
use tracing::{info, warn};

use casecycle::{
    config::EngineConfig,
    core::{phase::CycleScript, SimulationEngine},
    data::Dataset,
    render::{self, ColorId, SceneRecorder},
};

const RENDER_HZ: f32 = 30.0;
const DEMO_SEED: u64 = 2015;

pub fn run() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let dataset = match args.next() {
        Some(path) => Dataset::from_file(Path::new(&path))?,
        None => Dataset::demo(DEMO_SEED),
    };
    let config = match args.next() {
        Some(path) => EngineConfig::from_file(Path::new(&path))?,
        None => EngineConfig::default(),
    };

    let recorder = SceneRecorder::new();
    let mut engine = SimulationEngine::new(dataset.records, config)?;
    engine.set_renderer(Box::new(recorder.clone()));
    engine.start_cycle()?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut engine, &recorder);
    shutdown_terminal(&mut terminal)?;
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    engine: &mut SimulationEngine,
    recorder: &SceneRecorder,
) -> Result<(), Box<dyn Error>> {
    let mut ui_state = UiState::new();
    let started = Instant::now();
    let mut last_render = Instant::now();
    let render_interval = Duration::from_secs_f32(1.0 / RENDER_HZ);

    loop {
        let now_ms = started.elapsed().as_millis() as u64;
        if let Err(err) = engine.advance_to(now_ms) {
            warn!(target: "casecycle::engine", error = %err, "viewer.cycle_aborted");
            ui_state.status = format!("animation stopped: {err} (r to restart)");
        }

        while event::poll(Duration::from_millis(0))? {
            if let CrosstermEvent::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Left => step_period(engine, -1),
                    KeyCode::Right => step_period(engine, 1),
                    KeyCode::Char('r') => restart(engine, &mut ui_state),
                    KeyCode::Char('g') => {
                        ui_state.direct = !ui_state.direct;
                        engine.set_script(if ui_state.direct {
                            CycleScript::direct()
                        } else {
                            CycleScript::regional()
                        });
                        restart(engine, &mut ui_state);
                    }
                    _ => {}
                }
            }
        }

        if last_render.elapsed() >= render_interval {
            let stats = engine.stats();
            let phase = engine.current_phase().map_or("idle", |p| p.name());
            let period = engine
                .selected_period()
                .map_or_else(|| "-".to_string(), |p| p.to_string());
            let family = if ui_state.direct { "direct" } else { "regional" };
            let canvas = engine.config().canvas;

            terminal.draw(|frame| {
                let size = frame.size();
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Length(3),
                        Constraint::Min(3),
                        Constraint::Length(3),
                    ])
                    .split(size);

                let header = Paragraph::new(format!(
                    "period: {} | phase: {} | cycle: {} ({}) | ticks: {} | alpha: {:.3} | cCand: {:.1}",
                    period,
                    phase,
                    engine.cycle(),
                    family,
                    stats.ticks,
                    stats.alpha,
                    stats.collision_candidates_avg,
                ))
                .block(Block::default().borders(Borders::ALL).title("casecycle"));
                frame.render_widget(header, chunks[0]);

                let inner = render::Viewport {
                    width: chunks[1].width.saturating_sub(2),
                    height: chunks[1].height.saturating_sub(2),
                };
                let camera = render::Camera::fit(canvas, inner);
                render::draw(&recorder.scene(), &camera, inner, &mut ui_state.framebuf);

                let framebuf = &ui_state.framebuf;
                let lines: Vec<Line> = (0..framebuf.height())
                    .map(|y| {
                        let spans: Vec<Span> = (0..framebuf.width())
                            .map(|x| {
                                let cell = framebuf.get(x, y);
                                Span::styled(cell.ch.to_string(), Style::default().fg(color_for(cell.color)))
                            })
                            .collect();
                        Line::from(spans)
                    })
                    .collect();
                let viewport = Paragraph::new(lines)
                    .block(Block::default().borders(Borders::ALL).title("Cases"));
                frame.render_widget(viewport, chunks[1]);

                let footer = Paragraph::new(format!(
                    "←→: period | r: restart | g: cycle family | q: quit {}",
                    ui_state.status
                ))
                .block(Block::default().borders(Borders::ALL).title("Controls"));
                frame.render_widget(footer, chunks[2]);
            })?;

            last_render = Instant::now();
        }

        std::thread::sleep(Duration::from_millis(1));
    }
}

fn step_period(engine: &mut SimulationEngine, delta: isize) {
    let periods = engine.periods();
    if periods.is_empty() {
        return;
    }
    let current = engine
        .selected_period()
        .and_then(|p| periods.iter().position(|&k| k == p))
        .unwrap_or(periods.len() - 1);
    let next = (current as isize + delta).clamp(0, periods.len() as isize - 1) as usize;
    let period = periods[next];
    engine.select_period(period);
}

fn restart(engine: &mut SimulationEngine, ui_state: &mut UiState) {
    match engine.start_cycle() {
        Ok(()) => {
            info!(target: "casecycle::engine", cycle = engine.cycle(), "viewer.restart");
            ui_state.status.clear();
        }
        Err(err) => ui_state.status = format!("restart failed: {err}"),
    }
}

fn shutdown_terminal(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> Result<(), Box<dyn Error>> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

struct UiState {
    framebuf: render::FrameBuffer,
    direct: bool,
    status: String,
}

impl UiState {
    fn new() -> Self {
        Self {
            framebuf: render::FrameBuffer::new(0, 0),
            direct: false,
            status: String::new(),
        }
    }
}

fn color_for(color: ColorId) -> Color {
    match color {
        ColorId::White => Color::White,
        ColorId::Cyan => Color::Cyan,
        ColorId::Blue => Color::Blue,
        ColorId::Yellow => Color::Yellow,
        ColorId::Magenta => Color::Magenta,
        ColorId::Red => Color::Red,
        ColorId::Green => Color::Green,
        ColorId::Gray => Color::DarkGray,
    }
}
