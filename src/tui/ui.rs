use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
};
use strum::IntoEnumIterator;

use super::{
    app::{App, TableModel},
    SlaveStatus,
};
use crate::{
    core::{LogEntry, LogLevel},
    protocol::RegisterMode,
};

pub fn render(f: &mut Frame, app: &App, status: &SlaveStatus, logs: &[LogEntry]) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(logs.len().max(1) as u16 + 2),
        ])
        .split(area);

    render_status(f, chunks[0], app, status);
    render_tables(f, chunks[1], app);
    render_logs(f, chunks[2], logs);
}

fn render_status(f: &mut Frame, area: Rect, app: &App, status: &SlaveStatus) {
    let secs = status.uptime.seconds();
    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", status.listen),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            "| unit {} | clients {}/{} | up {:02}:{:02}:{:02} | simulator ",
            status.unit_id,
            status.clients.active(),
            status.clients.limit(),
            secs / 3600,
            secs / 60 % 60,
            secs % 60,
        )),
        if app.simulating {
            Span::styled("on", Style::default().fg(Color::Green))
        } else {
            Span::styled("off", Style::default().fg(Color::DarkGray))
        },
        Span::styled(
            "  [Tab] table  [Up/Down] scroll  [s] simulate  [q] quit",
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    let block = Block::default().borders(Borders::ALL).title(" mbsim slave ");
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn render_tables(f: &mut Frame, area: Rect, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(area);

    for (mode, column) in RegisterMode::iter().zip(columns.iter()) {
        if let Some(table) = app.table(mode) {
            render_table(f, *column, table, app.focus == mode);
        }
    }
}

fn render_table(f: &mut Frame, area: Rect, table: &TableModel, focused: bool) {
    let rows = table.rows.iter().skip(table.offset).map(|(address, value)| {
        let shown = match (table.mode.is_bit(), *value) {
            (true, 0) => "OFF".to_string(),
            (true, _) => "ON".to_string(),
            (false, word) => word.to_string(),
        };
        let row = Row::new(vec![Cell::from(address.to_string()), Cell::from(shown)]);
        if table.last_changed == Some(*address) {
            row.style(Style::default().fg(Color::Yellow))
        } else {
            row
        }
    });

    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(format!(" {} ({}) ", table.mode.title(), table.rows.len()));
    let widget = Table::new(rows, [Constraint::Length(7), Constraint::Min(5)])
        .header(
            Row::new(vec!["Addr", "Value"]).style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(block);
    f.render_widget(widget, area);
}

fn render_logs(f: &mut Frame, area: Rect, logs: &[LogEntry]) {
    let lines: Vec<Line> = logs
        .iter()
        .map(|entry| {
            let color = match entry.level {
                LogLevel::Error => Color::Red,
                LogLevel::Warning => Color::Yellow,
                LogLevel::Info => Color::Reset,
                LogLevel::Debug | LogLevel::Trace => Color::DarkGray,
            };
            Line::from(vec![
                Span::raw(format!("{} ", entry.timestamp.format("%H:%M:%S"))),
                Span::styled(format!("{:<5} ", entry.level), Style::default().fg(color)),
                Span::raw(entry.message.clone()),
            ])
        })
        .collect();
    let block = Block::default().borders(Borders::ALL).title(" Log ");
    f.render_widget(Paragraph::new(lines).block(block), area);
}
