use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table};

use aquario_core::io::Notice;
use aquario_core::types::Sample;

use crate::tui::{App, Field, NOTICE_LINES};

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Fixed chart scale in °C.
const CHART_Y: [f64; 2] = [15.0, 35.0];

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(14),
            Constraint::Min(4),
            Constraint::Length(NOTICE_LINES as u16 + 2),
            Constraint::Length(1),
        ])
        .split(f.area());

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(20)])
        .split(chunks[0]);

    draw_editor(f, app, top[0]);
    draw_chart(f, app, top[1]);
    draw_table(f, app, chunks[1]);
    draw_notices(f, app, chunks[2]);
    draw_status(f, app, chunks[3]);
}

fn draw_editor(f: &mut Frame, app: &App, area: Rect) {
    const LABEL: &str = " min °C  ";

    let field_line = |field: Field, label: &'static str| {
        let text = app.input(field);
        let mut style = Style::default();
        if app.focus == field {
            style = style.add_modifier(Modifier::REVERSED);
        }
        if app.parsed(field).is_none() {
            style = style.fg(Color::Red);
        }
        Line::from(vec![Span::raw(label), Span::styled(format!("{text:<8}"), style)])
    };

    let mut lines = vec![
        Line::default(),
        field_line(Field::Min, LABEL),
        field_line(Field::Max, " max °C  "),
        Line::default(),
    ];
    if !app.bounds.is_ordered() {
        lines.push(Line::from(Span::styled(" min is above max", Style::default().fg(Color::Yellow))));
    }
    if app.saving() > 0 {
        let frame = SPINNER[app.anim_frame % SPINNER.len()];
        lines.push(Line::from(Span::styled(format!(" {frame} saving..."), Style::default().dim())));
    }
    lines.push(Line::default());
    for hint in ["tab  switch field", "enter  apply", "s  save", "q  quit"] {
        lines.push(Line::from(Span::styled(format!(" {hint}"), Style::default().fg(Color::DarkGray))));
    }

    let block = Block::default().borders(Borders::ALL).title(" bounds ");
    f.render_widget(Paragraph::new(lines).block(block), area);

    // cursor sits after the focused input
    let row = match app.focus {
        Field::Min => 2,
        Field::Max => 3,
    };
    let col = LABEL.chars().count() + app.input(app.focus).chars().count();
    f.set_cursor_position(Position::new(area.x + 1 + col as u16, area.y + row));
}

fn draw_chart(f: &mut Frame, app: &App, area: Rect) {
    let samples = &app.feed.samples;
    let points: Vec<(f64, f64)> = samples
        .iter()
        .enumerate()
        .map(|(i, s)| (i as f64, s.temperature))
        .collect();

    let xmax = app.capacity.saturating_sub(1).max(1) as f64;
    let min_line = [(0.0, app.bounds.min), (xmax, app.bounds.min)];
    let max_line = [(0.0, app.bounds.max), (xmax, app.bounds.max)];

    let datasets = vec![
        Dataset::default()
            .name("temperature")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&points),
        Dataset::default()
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Blue))
            .data(&min_line),
        Dataset::default()
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Red))
            .data(&max_line),
    ];

    let first = samples.first().map(|s| s.row().time).unwrap_or_default();
    let last = samples.last().map(|s| s.row().time).unwrap_or_default();

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(" temperature "))
        .x_axis(Axis::default().bounds([0.0, xmax]).labels(vec![first, last]))
        .y_axis(Axis::default().bounds(CHART_Y).labels(vec!["15", "25", "35"]));
    f.render_widget(chart, area);
}

fn sample_row(s: &Sample) -> Row<'static> {
    let row = s.row();
    let heater = if row.status_aquecedor {
        Cell::from("on").style(Style::default().fg(Color::Green))
    } else {
        Cell::from("off").style(Style::default().fg(Color::Red))
    };
    Row::new(vec![
        Cell::from(row.time),
        Cell::from(format!("{:.1} °C", row.temperature)),
        heater,
    ])
}

fn draw_table(f: &mut Frame, app: &App, area: Rect) {
    // newest rows win when the table is short
    let visible = area.height.saturating_sub(3) as usize;
    let samples = &app.feed.samples;
    let rows: Vec<Row> = samples[samples.len().saturating_sub(visible)..]
        .iter()
        .map(sample_row)
        .collect();

    let header = Row::new(vec!["time", "temperature", "heater"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let widths = [Constraint::Length(10), Constraint::Length(14), Constraint::Length(8)];
    let title = format!(" history {}/{} ", samples.len(), app.capacity);
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(table, area);
}

fn notice_line(n: &Notice) -> Line<'_> {
    let (mark, color) = if n.is_error() { ("!", Color::Red) } else { ("✓", Color::Green) };
    Line::from(Span::styled(format!(" {mark} {}", n.content), Style::default().fg(color)))
}

fn draw_notices(f: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = app.notices.iter().map(notice_line).collect();
    let block = Block::default().borders(Borders::ALL).title(" notices ");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let feed = &app.feed;
    let state = if feed.ticks == 0 { "starting" } else { "polling" };
    let text = format!(
        " {state} {}  |  ticks {}  failures {}  |  bounds {}",
        app.endpoint, feed.ticks, feed.failures, app.bounds
    );

    let para = Paragraph::new(Line::from(Span::styled(
        text,
        Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(para, area);
}
