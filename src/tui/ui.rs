//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::MachineState;
use super::app::DebuggerApp;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(60),
            Constraint::Percentage(40),
        ])
        .split(frame.area());

    // Left side: code, registers and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(6),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_disassembly(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: memory, output and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(6),
            Constraint::Length(5),
        ])
        .split(chunks[1]);

    draw_memory(frame, right_chunks[0], app);
    draw_output(frame, right_chunks[1], app);
    draw_help(frame, right_chunks[2]);
}

/// Draw disassembly around the PC.
fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let disasm = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(addr, instr, is_current)| {
            let has_bp = app.breakpoints.contains(&(*addr as i64));
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if has_bp { "●" } else { " " };
            let text = format!("{}{:04}: {}", prefix, addr, instr);

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if has_bp {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}", bp, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Disassembly ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw register state.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let machine = &app.machine;

    let content = vec![
        Line::from(vec![
            Span::raw("PC: "),
            Span::styled(format!("{:<8}", machine.pc()), Style::default().fg(Color::Yellow)),
            Span::raw("  RB: "),
            Span::styled(format!("{}", machine.relative_base()), Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::raw("Steps: "),
            Span::styled(format!("{:<8}", machine.steps()), Style::default().fg(Color::Cyan)),
            Span::raw("  State: "),
            Span::styled(format!("{:?}", machine.state()), state_style(machine.state())),
        ]),
        Line::from(vec![
            Span::raw("Input queue: "),
            Span::styled(
                format!("{:?}", machine.pending_input().iter().collect::<Vec<_>>()),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::raw("Memory cells: "),
            Span::styled(format!("{}", machine.memory().len()), Style::default().fg(Color::DarkGray)),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw memory view.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let pc = app.machine.pc();

    let items: Vec<ListItem> = app.machine.memory()
        .iter()
        .copied()
        .enumerate()
        .skip(app.mem_scroll)
        .take(visible_rows)
        .map(|(addr, value)| {
            let is_pc = addr as i64 == pc;
            let text = format!("{:04}: {}", addr, value);

            let style = if is_pc {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if value != 0 {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };

            ListItem::new(text).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Memory ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw the most recent output values.
fn draw_output(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let width = (area.width as usize).saturating_sub(2).max(1);
    let mut text = String::new();
    for value in app.output_log.iter().rev() {
        let item = format!("{} ", value);
        if text.len() + item.len() > width * 4 {
            break;
        }
        text.insert_str(0, &item);
    }

    let output = Paragraph::new(text)
        .wrap(ratatui::widgets::Wrap { trim: true })
        .block(Block::default()
            .title(format!(" Output ({}) ", app.output_log.len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)));

    frame.render_widget(output, area);
}

/// Draw status bar, or the input line while typing.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let (title, text) = if app.input_mode {
        (" Input ", format!("> {}_", app.input_buffer))
    } else {
        (" Status ", app.status.clone())
    };

    let status = Paragraph::new(text)
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(title)
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  r: Run  p: Pause  b: Breakpoint"),
        Line::from("i: Input  x: Reset  q: Quit"),
        Line::from("↑↓/PgUp/PgDn: Scroll memory"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}

/// Get color style for a machine state.
fn state_style(state: MachineState) -> Style {
    match state {
        MachineState::Ready | MachineState::Running => Style::default().fg(Color::Green),
        MachineState::Blocked => Style::default().fg(Color::Yellow),
        MachineState::Halted => Style::default().fg(Color::Gray),
        MachineState::Errored => Style::default().fg(Color::Red),
    }
}
