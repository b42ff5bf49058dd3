//! warpsim dashboard. Watches a simulation from a second terminal:
//!
//!   cargo run --bin viz
//!
//! The simulator must be started with `--live` so it publishes snapshots
//! to /tmp/warpsim_live.json; this binary re-reads that file on every
//! redraw and never touches the simulation itself. Layout:
//!
//!   ┌ header: status / cycle / launch shape ─────────────────────────┐
//!   │ Core pipelines (stage, block, pc) │ Stats: blocks, retired …   │
//!   │ Memory channels (state, consumer)                              │
//!   │ q/esc: quit  …footer…                                          │
//!
//! Quit with q or Esc.

use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame, Terminal,
};
use std::{io, time::Duration};
use warpsim::metrics::{read_metrics, LiveMetrics, METRICS_PATH};

/// Redraw cadence; also the upper bound on how long a quit keypress waits.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

fn main() -> io::Result<()> {
    let mut ui = Ui::enter()?;
    loop {
        let metrics = read_metrics();
        ui.terminal.draw(|f| render(f, metrics.as_ref()))?;
        if quit_requested(POLL_INTERVAL)? {
            return Ok(());
        }
    }
}

/// Raw-mode alternate-screen terminal, torn down on drop so the user's
/// shell is restored even when the render path errors out mid-frame.
struct Ui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl Ui {
    fn enter() -> io::Result<Ui> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        Ok(Ui { terminal })
    }
}

impl Drop for Ui {
    fn drop(&mut self) {
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = disable_raw_mode();
        let _ = self.terminal.show_cursor();
    }
}

/// Block up to `timeout` for input; true when the user asked to leave.
/// Returning within the timeout either way keeps the dashboard refreshing.
fn quit_requested(timeout: Duration) -> io::Result<bool> {
    if !event::poll(timeout)? {
        return Ok(false);
    }
    match event::read()? {
        Event::Key(key) => Ok(matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)),
        _ => Ok(false),
    }
}

// ---------------------------------------------------------------------------
// Top-level layout
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, metrics: Option<&LiveMetrics>) {
    let area = f.area();

    // Channel panel height: 2 borders + one row per channel.
    let channel_height = metrics
        .map(|m| m.channels.len() as u16 + 2)
        .unwrap_or(4)
        .clamp(4, 10);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),              // header
            Constraint::Min(6),                 // cores + stats
            Constraint::Length(channel_height), // memory channels
            Constraint::Length(1),              // footer
        ])
        .split(area);

    render_header(f, rows[0], metrics);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(rows[1]);

    render_cores(f, cols[0], metrics);
    render_stats(f, cols[1], metrics);
    render_channels(f, rows[2], metrics);
    render_footer(f, rows[3]);
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

fn render_header(f: &mut Frame, area: Rect, metrics: Option<&LiveMetrics>) {
    let block = Block::default()
        .title(Span::styled(
            " ⚡ warpsim live monitor ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let (status, cycle, shape) = metrics
        .map(|m| {
            (
                m.status.as_str(),
                m.cycle.to_string(),
                format!(
                    "{} threads / {} per block / {} cores",
                    m.thread_count, m.threads_per_block, m.num_cores
                ),
            )
        })
        .unwrap_or(("idle", "—".to_string(), "—".to_string()));

    let status_color = match status {
        "running" => Color::Green,
        "done" => Color::Cyan,
        "timeout" => Color::Red,
        _ => Color::DarkGray,
    };

    let spans = vec![
        Span::styled("  status: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            status.to_uppercase(),
            Style::default().fg(status_color).add_modifier(Modifier::BOLD),
        ),
        Span::styled("   cycle: ", Style::default().fg(Color::DarkGray)),
        Span::styled(cycle, Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        Span::styled("   launch: ", Style::default().fg(Color::DarkGray)),
        Span::styled(shape, Style::default().fg(Color::Cyan)),
    ];

    f.render_widget(Paragraph::new(Line::from(spans)), inner);
}

// ---------------------------------------------------------------------------
// Core pipeline panel
// ---------------------------------------------------------------------------

fn stage_color(stage: &str) -> Color {
    match stage {
        "FETCH" => Color::Blue,
        "DECODE" => Color::Cyan,
        "REQUEST" => Color::Magenta,
        "EXECUTE" => Color::Green,
        "UPDATE" => Color::Yellow,
        _ => Color::DarkGray,
    }
}

const STAGES: [&str; 5] = ["FETCH", "DECODE", "REQUEST", "EXECUTE", "UPDATE"];

fn render_cores(f: &mut Frame, area: Rect, metrics: Option<&LiveMetrics>) {
    let block = Block::default().title(" Core Pipelines ").borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(m) = metrics else {
        let msg = Paragraph::new(vec![
            Line::raw(""),
            Line::from(Span::styled(
                "  No simulation running.",
                Style::default().fg(Color::DarkGray),
            )),
            Line::from(Span::styled(
                "  Start warpsim with --live to see data.",
                Style::default().fg(Color::DarkGray),
            )),
        ]);
        f.render_widget(msg, inner);
        return;
    };

    let mut lines: Vec<Line> = Vec::new();
    for (i, core) in m.cores.iter().enumerate() {
        // one row per core: the five stages, the active one highlighted
        let mut spans: Vec<Span> = vec![Span::styled(
            format!("  core {i}  "),
            Style::default().fg(Color::DarkGray),
        )];
        for stage in STAGES {
            let style = if core.stage == stage {
                Style::default()
                    .fg(Color::Black)
                    .bg(stage_color(stage))
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            spans.push(Span::styled(format!(" {stage} "), style));
            spans.push(Span::raw(" "));
        }
        lines.push(Line::from(spans));

        let detail = if core.stage == "IDLE" && !core.done {
            "  waiting for a block".to_string()
        } else {
            format!(
                "  block {}   pc {:#04x}   {} lsu busy{}",
                core.block_id,
                core.pc,
                core.lsus_busy,
                if core.done { "   done" } else { "" },
            )
        };
        lines.push(Line::from(Span::styled(
            detail,
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::raw(""));
    }

    f.render_widget(Paragraph::new(lines), inner);
}

// ---------------------------------------------------------------------------
// Stats panel
// ---------------------------------------------------------------------------

fn render_stats(f: &mut Frame, area: Rect, metrics: Option<&LiveMetrics>) {
    let block = Block::default().title(" Stats ").borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(m) = metrics else {
        return;
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // block progress gauge
            Constraint::Length(1), // spacer
            Constraint::Min(0),    // text stats
        ])
        .split(inner);

    let blk_pct = if m.total_blocks > 0 {
        ((m.blocks_done as f32 / m.total_blocks as f32) * 100.0) as u16
    } else {
        0
    };
    let blk_gauge = Gauge::default()
        .block(Block::default().title("Blocks"))
        .gauge_style(Style::default().fg(Color::Blue))
        .percent(blk_pct)
        .label(format!("{} / {}", m.blocks_done, m.total_blocks));
    f.render_widget(blk_gauge, rows[0]);

    let text = vec![
        Line::from(vec![
            Span::styled("Dispatched: ", Style::default().fg(Color::DarkGray)),
            Span::raw(m.blocks_dispatched.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Retired:    ", Style::default().fg(Color::DarkGray)),
            Span::raw(m.instructions_retired.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Mem reads:  ", Style::default().fg(Color::DarkGray)),
            Span::raw(m.mem_reads.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Mem writes: ", Style::default().fg(Color::DarkGray)),
            Span::raw(m.mem_writes.to_string()),
        ]),
    ];
    f.render_widget(Paragraph::new(text), rows[2]);
}

// ---------------------------------------------------------------------------
// Memory channel panel
// ---------------------------------------------------------------------------

fn render_channels(f: &mut Frame, area: Rect, metrics: Option<&LiveMetrics>) {
    let block = Block::default().title(" Memory Channels ").borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(m) = metrics else {
        return;
    };

    let mut lines: Vec<Line> = Vec::new();
    for (i, ch) in m.channels.iter().enumerate() {
        let state_color = match ch.state.as_str() {
            "PROCESSING" => Color::Green,
            "WAITING" => Color::Yellow,
            "COMPLETION" => Color::Cyan,
            _ => Color::DarkGray,
        };
        let consumer = ch
            .consumer
            .map(|j| format!("lsu {j}"))
            .unwrap_or_else(|| "—".to_string());
        lines.push(Line::from(vec![
            Span::styled(format!("  channel {i}  "), Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("{:<10}", ch.state),
                Style::default().fg(state_color).add_modifier(Modifier::BOLD),
            ),
            Span::styled("  serving ", Style::default().fg(Color::DarkGray)),
            Span::styled(consumer, Style::default().fg(Color::Cyan)),
        ]));
    }

    f.render_widget(Paragraph::new(lines), inner);
}

// ---------------------------------------------------------------------------
// Footer
// ---------------------------------------------------------------------------

fn render_footer(f: &mut Frame, area: Rect) {
    let hint = format!(
        "  q / esc: quit    refresh {}ms    source {METRICS_PATH}",
        POLL_INTERVAL.as_millis()
    );
    f.render_widget(
        Paragraph::new(Span::styled(hint, Style::default().fg(Color::DarkGray))),
        area,
    );
}
