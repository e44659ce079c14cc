//! Full-screen terminal plot of the reflow curve.
use std::io::{stdout, Stdout};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::style::{Color, Style};
use ratatui::symbols;
use ratatui::text::Span;
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType};
use ratatui::{Frame, Terminal};

use super::{DisplayError, DisplaySink, FeedPoll, Result, SampleFeed, POLL_INTERVAL, TEMPERATURE_AXIS_MAX, TIME_AXIS_MAX};
use crate::session::TelemetrySample;

const TITLE: &str = "Reflow Oven Controller";
const HINT: &str = "press q to close";

pub struct ChartDisplay {
    points: Vec<(f64, f64)>,
}

impl ChartDisplay {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    fn push(&mut self, sample: &TelemetrySample) {
        match plot_point(sample) {
            Some(point) => self.points.push(point),
            None => log::debug!("Skipping non-numeric reading {:?} at {}", sample.raw, sample.time_index),
        }
    }

    fn render_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>, feed: &mut SampleFeed) -> Result<()> {
        loop {
            terminal.draw(|frame| self.draw(frame))?;

            if event::poll(POLL_INTERVAL)? {
                if let Event::Key(key) = event::read()? {
                    if is_close_key(&key) {
                        feed.request_close();
                        return Ok(());
                    }
                }
            }

            match feed.poll() {
                FeedPoll::Sample(sample) => self.push(&sample),
                FeedPoll::Idle => {}
                FeedPoll::Finished(reason) => {
                    log::debug!("Chart display finished ({:?})", reason);
                    return Ok(());
                }
            }
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let dataset = Dataset::default()
            .name("Temperature")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Red))
            .data(&self.points);

        let chart = Chart::new(vec![dataset])
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("{} ({})", TITLE, HINT)),
            )
            .x_axis(
                Axis::default()
                    .title("Cycle time (s)")
                    .bounds([0.0, TIME_AXIS_MAX])
                    .labels(axis_labels(TIME_AXIS_MAX, 4)),
            )
            .y_axis(
                Axis::default()
                    .title("Temperature (C)")
                    .bounds([0.0, TEMPERATURE_AXIS_MAX])
                    .labels(axis_labels(TEMPERATURE_AXIS_MAX, 5)),
            );

        frame.render_widget(chart, frame.area());
    }
}

impl Default for ChartDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySink for ChartDisplay {
    fn run(mut self: Box<Self>, mut feed: SampleFeed) -> Result<()> {
        enable_raw_mode()?;
        let mut out = stdout();
        if let Err(e) = execute!(out, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e.into());
        }

        let result = Terminal::new(CrosstermBackend::new(out))
            .map_err(DisplayError::from)
            .and_then(|mut terminal| {
                let result = self.render_loop(&mut terminal, &mut feed);
                let _ = terminal.show_cursor();
                result
            });

        let _ = disable_raw_mode();
        let _ = execute!(stdout(), LeaveAlternateScreen);
        result
    }
}

/// Map a sample to chart coordinates; non-numeric readings are not plotted.
pub(crate) fn plot_point(sample: &TelemetrySample) -> Option<(f64, f64)> {
    sample.temperature().map(|t| (sample.time_index as f64, t))
}

pub(crate) fn is_close_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

fn axis_labels(max: f64, steps: u32) -> Vec<Span<'static>> {
    (0..=steps)
        .map(|i| Span::raw(format!("{:.0}", max * i as f64 / steps as f64)))
        .collect()
}
