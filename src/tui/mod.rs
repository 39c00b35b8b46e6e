//! Ratatui-based case/death viewer.
//!
//! Two Plotters charts (cases and deaths per 100k with their 7-day averages)
//! and the list of policy records for the selected location. Arrow keys move
//! through counties, `l` cycles the aggregation level, `q` quits.

use std::io;
use std::time::Duration;

use chrono::NaiveDate;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};

use crate::data::Dataset;
use crate::data::query::{Level, Location, get_cases, get_policies, list_counties};
use crate::domain::{CaseRecord, StartStop};
use crate::error::AppError;
use crate::plot::Measure;

mod plotters_chart;

use plotters_chart::SeriesChart;

/// Start the viewer at `start` (falls back to the first county if unknown).
pub fn run(dataset: Dataset, start: Location) -> Result<(), AppError> {
    let mut app = App::new(dataset, start)?;

    let _guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal =
        Terminal::new(backend).map_err(|e| AppError::runtime(format!("Failed to initialize terminal: {e}")))?;
    app.event_loop(&mut terminal)
}

/// Restores raw mode and the main screen on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::runtime(format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::runtime(format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// Chart-ready series for one measure.
#[derive(Debug, Clone, PartialEq)]
struct Series {
    daily: Vec<(f64, f64)>,
    average: Vec<(f64, f64)>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

fn build_series(rows: &[CaseRecord], measure: Measure) -> Option<Series> {
    let first = rows.first()?.date;
    let mut daily = Vec::with_capacity(rows.len());
    let mut average = Vec::with_capacity(rows.len());
    let (mut y_max, mut x_max) = (0.0_f64, 1.0_f64);
    for r in rows {
        let x = (r.date - first).num_days() as f64;
        let (d, a) = measure.values(r);
        daily.push((x, d));
        average.push((x, a));
        y_max = y_max.max(d).max(a);
        x_max = x_max.max(x);
    }
    if !(y_max.is_finite() && y_max > 0.0) {
        y_max = 1.0;
    }
    Some(Series {
        daily,
        average,
        x_bounds: [0.0, x_max],
        y_bounds: [0.0, y_max * 1.05],
    })
}

struct App {
    dataset: Dataset,
    counties: Vec<(String, String)>,
    selected: usize,
    level: Level,
    rows: Vec<CaseRecord>,
    status: String,
}

impl App {
    fn new(dataset: Dataset, start: Location) -> Result<Self, AppError> {
        let counties = list_counties(&dataset.cases);
        if counties.is_empty() {
            return Err(AppError::data("No counties in the case table."));
        }
        let selected = counties
            .iter()
            .position(|(s, c)| *s == start.state && (start.level != Level::County || *c == start.county))
            .unwrap_or(0);
        let mut app = Self {
            dataset,
            counties,
            selected,
            level: start.level,
            rows: Vec::new(),
            status: String::new(),
        };
        app.reload();
        Ok(app)
    }

    fn location(&self) -> Location {
        let (state, county) = &self.counties[self.selected];
        Location::new(self.level, state, county)
    }

    fn reload(&mut self) {
        let loc = self.location();
        match get_cases(&self.dataset.cases, &loc) {
            Ok(rows) => {
                self.status = format!("{} rows", rows.len());
                self.rows = rows;
            }
            Err(err) => {
                self.status = err.to_string();
                self.rows.clear();
            }
        }
    }

    fn step(&mut self, delta: isize) {
        let n = self.counties.len() as isize;
        self.selected = (self.selected as isize + delta).rem_euclid(n) as usize;
        self.reload();
    }

    /// Returns `true` when the viewer should exit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Right | KeyCode::Down => self.step(1),
            KeyCode::Left | KeyCode::Up => self.step(-1),
            KeyCode::Char('l') => {
                self.level = self.level.next();
                self.reload();
            }
            _ => {}
        }
        false
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::runtime(format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100)).map_err(|e| AppError::runtime(format!("Event poll error: {e}")))? {
                continue;
            }

            match event::read().map_err(|e| AppError::runtime(format!("Event read error: {e}")))? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => needs_redraw = true,
                _ => {}
            }
        }
        Ok(())
    }

    fn draw(&self, frame: &mut ratatui::Frame<'_>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)])
            .split(frame.area());

        self.draw_header(frame, chunks[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(44)])
            .split(chunks[1]);
        let charts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(body[0]);
        self.draw_chart(frame, charts[0], Measure::Cases);
        self.draw_chart(frame, charts[1], Measure::Deaths);
        self.draw_policies(frame, body[1]);

        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let loc = self.location();
        let line = Line::from(vec![
            Span::styled("pim", Style::default().fg(Color::Cyan)),
            Span::raw(format!(" | {} | level: {}", loc.title(), self.level)),
        ]);
        frame.render_widget(Paragraph::new(line).block(Block::default().borders(Borders::ALL)), area);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect, measure: Measure) {
        let block = Block::default()
            .title(format!("new {} per 100,000", measure.label()))
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(series) = build_series(&self.rows, measure) else {
            frame.render_widget(Paragraph::new("No data.").style(Style::default().fg(Color::Yellow)), inner);
            return;
        };
        let first = self.rows.first().map(|r| r.date).unwrap_or(NaiveDate::MIN);
        let markers = self.markers(first);
        let fmt_x = move |v: f64| (first + chrono::Duration::days(v.round() as i64)).format("%Y-%m").to_string();

        frame.render_widget(
            SeriesChart {
                daily: &series.daily,
                average: &series.average,
                markers: &markers,
                x_bounds: series.x_bounds,
                y_bounds: series.y_bounds,
                y_label: measure.label(),
                fmt_x: &fmt_x,
            },
            inner,
        );
    }

    fn markers(&self, first: NaiveDate) -> Vec<(f64, bool)> {
        get_policies(&self.dataset.policies, &self.location(), &[])
            .into_iter()
            .filter(|p| p.date >= first)
            .map(|p| ((p.date - first).num_days() as f64, p.start_stop == StartStop::Start))
            .collect()
    }

    fn draw_policies(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let items: Vec<ListItem> = get_policies(&self.dataset.policies, &self.location(), &[])
            .into_iter()
            .map(|p| {
                let color = match p.start_stop {
                    StartStop::Start => Color::Green,
                    StartStop::Stop => Color::Red,
                };
                ListItem::new(Text::from(Line::from(vec![
                    Span::styled(p.date.to_string(), Style::default().fg(color)),
                    Span::raw(format!(" {}", p.policy_type)),
                ])))
            })
            .collect();
        let title = if items.is_empty() { "Policies (none)" } else { "Policies" };
        frame.render_widget(List::new(items).block(Block::default().title(title).borders(Borders::ALL)), area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let line = Line::from(vec![
            Span::styled("←/→ county  l level  q quit", Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        frame.render_widget(Paragraph::new(line).block(Block::default().borders(Borders::ALL)), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::{SynthOptions, generate_synthetic};

    fn app() -> App {
        let synth = generate_synthetic(&SynthOptions {
            n_states: 2,
            counties_per_state: 2,
            n_days: 25,
            ..SynthOptions::default()
        })
        .unwrap();
        let dataset = Dataset {
            cases: synth.cases,
            policies: synth.policies,
        };
        App::new(dataset, Location::new(Level::County, "Alaska", "baker")).unwrap()
    }

    #[test]
    fn starts_at_requested_county_and_wraps() {
        let mut app = app();
        assert_eq!(app.location().county, "baker");
        assert_eq!(app.rows.len(), 25);

        app.handle_key(KeyCode::Right);
        assert_eq!(app.location().state, "Alabama");
        app.handle_key(KeyCode::Left);
        app.handle_key(KeyCode::Left);
        assert_eq!(app.location().county, "adams");
        assert_eq!(app.location().state, "Alaska");
    }

    #[test]
    fn level_cycles_and_quit() {
        let mut app = app();
        app.handle_key(KeyCode::Char('l'));
        assert_eq!(app.level, Level::State);
        assert_eq!(app.rows.len(), 25);
        app.handle_key(KeyCode::Char('l'));
        assert_eq!(app.level, Level::National);
        assert!(app.markers(app.rows[0].date).is_empty());
        assert!(app.handle_key(KeyCode::Char('q')));
    }

    #[test]
    fn series_bounds_cover_data() {
        let app = app();
        let s = build_series(&app.rows, Measure::Cases).unwrap();
        assert_eq!(s.daily.len(), 25);
        assert_eq!(s.x_bounds, [0.0, 24.0]);
        assert!(s.daily.iter().all(|&(_, y)| y <= s.y_bounds[1]));
        assert!(build_series(&[], Measure::Cases).is_none());
    }
}
