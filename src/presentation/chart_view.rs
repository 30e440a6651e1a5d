// Chart view - Draws the rolling moisture chart and link status
use crate::domain::link::{ConnectionState, LinkStatus};
use crate::domain::sample::Sample;
use crate::infrastructure::config::DisplayConfig;
use ratatui::prelude::*;
use ratatui::symbols;
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph};

/// Everything one frame needs, captured once per redraw.
pub struct FrameData<'a> {
    pub display: &'a DisplayConfig,
    pub status: &'a LinkStatus,
    pub samples: &'a [Sample],
    pub capacity: usize,
}

/// Axis ranges covering the data, widened when the data has no spread.
pub fn axis_bounds(samples: &[Sample]) -> Option<([f64; 2], [f64; 2])> {
    let first = samples.first()?;
    let last = samples.last()?;

    let mut x = [first.index as f64, last.index as f64];
    if x[0] == x[1] {
        x[1] += 1.0;
    }

    let (lo, hi) = samples
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.value), hi.max(s.value))
        });
    let y = if lo == hi { [lo - 1.0, hi + 1.0] } else { [lo, hi] };

    Some((x, y))
}

fn state_style(state: ConnectionState) -> Style {
    match state {
        ConnectionState::Subscribed => Style::default().fg(Color::Green),
        ConnectionState::Connected | ConnectionState::Connecting => Style::default().fg(Color::Yellow),
        ConnectionState::Failed => Style::default().fg(Color::Red),
        ConnectionState::Disconnected => Style::default().fg(Color::DarkGray),
    }
}

pub fn draw(f: &mut Frame, data: &FrameData) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // status
            Constraint::Min(5),    // chart
            Constraint::Length(1), // keys
        ])
        .split(f.area());

    draw_status(f, rows[0], data);
    draw_chart(f, rows[1], data);

    let keys = Paragraph::new(" q / Esc: close and analyse").style(Style::default().fg(Color::DarkGray));
    f.render_widget(keys, rows[2]);
}

fn draw_status(f: &mut Frame, area: Rect, data: &FrameData) {
    let status = data.status;
    let mut spans = vec![
        Span::styled(status.state.to_string(), state_style(status.state).add_modifier(Modifier::BOLD)),
        Span::raw(format!("  attempt {}", status.attempts)),
        Span::raw(format!("  samples {}/{}", data.samples.len(), data.capacity)),
    ];

    match &status.last_reading {
        Some(reading) => spans.push(Span::raw(format!(
            "  last #{} {:.2} @ {}",
            reading.index,
            reading.value,
            reading.at.format("%H:%M:%S")
        ))),
        None => spans.push(Span::raw("  no readings yet")),
    }

    if status.state == ConnectionState::Failed {
        if let Some(err) = &status.last_error {
            spans.push(Span::styled(format!("  {err}"), Style::default().fg(Color::Red)));
        }
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", data.display.title));
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn draw_chart(f: &mut Frame, area: Rect, data: &FrameData) {
    let Some((x, y)) = axis_bounds(data.samples) else {
        let block = Block::default().borders(Borders::ALL).title(" Soil Moisture (%) ");
        let placeholder = Paragraph::new("Waiting for data...")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(placeholder, area);
        return;
    };

    let points: Vec<(f64, f64)> = data
        .samples
        .iter()
        .map(|s| (s.index as f64, s.value))
        .collect();

    let dataset = Dataset::default()
        .name("Soil Moisture (%)")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Blue))
        .data(&points);

    let chart = Chart::new(vec![dataset])
        .block(Block::default().borders(Borders::ALL))
        .x_axis(
            Axis::default()
                .title("Time".dark_gray())
                .bounds(x)
                .labels(vec![
                    Line::from(format!("{}", x[0])),
                    Line::from(format!("{}", x[1])),
                ]),
        )
        .y_axis(
            Axis::default()
                .title(Span::styled(
                    data.display.y_label.as_str(),
                    Style::default().fg(Color::DarkGray),
                ))
                .bounds(y)
                .labels(vec![
                    Line::from(format!("{:.1}", y[0])),
                    Line::from(format!("{:.1}", y[1])),
                ]),
        );

    f.render_widget(chart, area);
}
