//! Terminal front-end for the pickers.
//!
//! Left the image, right the profiles, status and key help below. Mouse
//! clicks are translated into image pixels or profile coordinates depending
//! on where the picker expects them.

use std::io::{self, IsTerminal};
use std::time::Duration;

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
        MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};

use super::chart::{cell_to_pixel, Heatmap, ProfileChart};
use super::{ClickArea, Key, MouseButton, Picker, PickerEvent, StepButton, StepTarget};
use crate::error::Result;

/// Run `picker` until it is closed.
pub fn run(picker: &mut dyn Picker) -> Result<()> {
    if !io::stdout().is_terminal() {
        return Err(io::Error::other("stdout is not a terminal").into());
    }
    let _guard = TerminalGuard::new()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let mut areas = Areas::default();
    let mut needs_redraw = true;
    loop {
        if needs_redraw {
            terminal.draw(|f| areas = draw(f, picker))?;
            needs_redraw = false;
        }
        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let picker_event = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => map_key(key),
            Event::Mouse(mouse) => map_mouse(mouse, &areas, picker.view().clicks),
            Event::Resize(_, _) => {
                needs_redraw = true;
                None
            }
            _ => None,
        };
        let Some(picker_event) = picker_event else { continue };
        if !picker.handle(picker_event)? {
            break;
        }
        needs_redraw = true;
    }
    Ok(())
}

/// Restores the terminal (raw mode, alternate screen, mouse capture) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture) {
            let _ = disable_raw_mode();
            return Err(e.into());
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
    }
}

/// Screen areas of the last frame with what is drawn in them.
#[derive(Debug, Default, Clone, Copy)]
struct Areas {
    image: Rect,
    shape: (usize, usize),
    profiles: Rect,
    bounds: Option<([f64; 2], [f64; 2])>,
}

fn map_key(key: KeyEvent) -> Option<PickerEvent> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let step = |button, increase| Some(PickerEvent::Step { button, increase });
    let key_event = |key| Some(PickerEvent::Key { key, ctrl });
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Some(PickerEvent::Close),
        KeyCode::Char('c') if ctrl => Some(PickerEvent::Close),
        KeyCode::Up => key_event(Key::Up),
        KeyCode::Down => key_event(Key::Down),
        KeyCode::Left => key_event(Key::Left),
        KeyCode::Right => key_event(Key::Right),
        KeyCode::Char('+') => key_event(Key::Plus),
        KeyCode::Char('-') => key_event(Key::Minus),
        KeyCode::Char('1') => Some(PickerEvent::CycleStep(StepTarget::Center)),
        KeyCode::Char('2') => Some(PickerEvent::CycleStep(StepTarget::Distance)),
        KeyCode::Char('3') => Some(PickerEvent::CycleStep(StepTarget::Angle)),
        KeyCode::Char(c) => {
            let button = match c.to_ascii_lowercase() {
                'r' => StepButton::CenterRow,
                'c' => StepButton::CenterCol,
                'd' => StepButton::Distance,
                'a' => StepButton::Alpha,
                'b' => StepButton::Beta,
                'g' => StepButton::Gamma,
                _ => return None,
            };
            step(button, c.is_ascii_uppercase())
        }
        _ => None,
    }
}

/// Inner plotting rectangle of a [`ProfileChart`] drawn into `area`.
fn plot_area(area: Rect) -> Rect {
    let (left, bottom, margin) = (8u16, 3u16, 1u16);
    Rect::new(
        area.x + left + margin,
        area.y + margin,
        area.width.saturating_sub(left + 2 * margin),
        area.height.saturating_sub(bottom + 2 * margin),
    )
}

fn map_mouse(mouse: MouseEvent, areas: &Areas, clicks: ClickArea) -> Option<PickerEvent> {
    let button = match mouse.kind {
        MouseEventKind::Down(event::MouseButton::Left) => MouseButton::Left,
        MouseEventKind::Down(event::MouseButton::Right) => MouseButton::Right,
        MouseEventKind::Down(event::MouseButton::Middle) => MouseButton::Middle,
        MouseEventKind::ScrollUp => return Some(PickerEvent::Scroll { up: true }),
        MouseEventKind::ScrollDown => return Some(PickerEvent::Scroll { up: false }),
        _ => return None,
    };
    let (x, y) = match clicks {
        ClickArea::Image => cell_to_pixel(areas.image, areas.shape.0, areas.shape.1, mouse.column, mouse.row)?,
        ClickArea::Profiles => {
            let ([x0, x1], [y0, y1]) = areas.bounds?;
            let plot = plot_area(areas.profiles);
            let (fi, fj) = cell_to_pixel(plot, 1, 1, mouse.column, mouse.row)?;
            (x0 + (fj + 0.5) * (x1 - x0), y1 - (fi + 0.5) * (y1 - y0))
        }
    };
    Some(PickerEvent::Click { button, x, y })
}

fn draw(f: &mut Frame<'_>, picker: &dyn Picker) -> Areas {
    let view = picker.view();
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(10), Constraint::Length(view.status.len() as u16 + 3)])
        .split(f.area());

    let header = Paragraph::new(Line::from(vec![
        Span::styled("sas ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(view.title),
        Span::styled(
            view.image.filename.as_ref().map(|p| format!("  {}", p.display())).unwrap_or_default(),
            Style::default().fg(Color::DarkGray),
        ),
    ]));
    f.render_widget(header, outer[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(outer[1]);

    let image_block = Block::default().borders(Borders::ALL).title("image");
    let image_area = image_block.inner(body[0]);
    f.render_widget(image_block, body[0]);
    let (rows, cols) = view.image.shape();
    f.render_widget(
        Heatmap {
            rows,
            cols,
            data: view.image.data(),
            mask: view.image.mask(),
            highlight: view.highlight,
            circle: view.circle,
            levels: view.color_levels,
        },
        image_area,
    );

    let chart_block = Block::default().borders(Borders::ALL).title("profiles");
    let chart_area = chart_block.inner(body[1]);
    f.render_widget(chart_block, body[1]);
    let chart = ProfileChart { curves: &view.curves, levels: &view.levels, x_label: view.x_label, y_label: view.y_label };
    let bounds = chart.bounds();
    f.render_widget(chart, chart_area);

    let mut lines: Vec<Line> = view.status.iter().map(|s| Line::from(s.as_str())).collect();
    lines.push(Line::from(Span::styled(view.help, Style::default().fg(Color::DarkGray))));
    f.render_widget(Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::TOP)), outer[2]);

    Areas { image: image_area, shape: (rows, cols), profiles: chart_area, bounds }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> Option<PickerEvent> {
        map_key(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn step_keys_follow_case() {
        assert_eq!(
            press(KeyCode::Char('D'), KeyModifiers::SHIFT),
            Some(PickerEvent::Step { button: StepButton::Distance, increase: true })
        );
        assert_eq!(
            press(KeyCode::Char('g'), KeyModifiers::NONE),
            Some(PickerEvent::Step { button: StepButton::Gamma, increase: false })
        );
        assert_eq!(press(KeyCode::Char('2'), KeyModifiers::NONE), Some(PickerEvent::CycleStep(StepTarget::Distance)));
        assert_eq!(press(KeyCode::Char('x'), KeyModifiers::NONE), None);
    }

    #[test]
    fn close_and_arrows() {
        assert_eq!(press(KeyCode::Esc, KeyModifiers::NONE), Some(PickerEvent::Close));
        assert_eq!(press(KeyCode::Char('c'), KeyModifiers::CONTROL), Some(PickerEvent::Close));
        assert_eq!(
            press(KeyCode::Left, KeyModifiers::CONTROL),
            Some(PickerEvent::Key { key: Key::Left, ctrl: true })
        );
    }

    #[test]
    fn clicks_map_to_pixels_and_profile_values() {
        let areas = Areas {
            image: Rect::new(0, 0, 10, 10),
            shape: (100, 100),
            profiles: Rect::new(20, 0, 30, 14),
            bounds: Some(([0.0, 2.0], [0.0, 10.0])),
        };
        let click = |column, row| MouseEvent {
            kind: MouseEventKind::Down(event::MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(
            map_mouse(click(0, 9), &areas, ClickArea::Image),
            Some(PickerEvent::Click { button: MouseButton::Left, x: 94.5, y: 4.5 })
        );
        let Some(PickerEvent::Click { x, y, .. }) = map_mouse(click(29, 1), &areas, ClickArea::Profiles) else {
            panic!("click outside the plot");
        };
        assert!(x > 0.0 && x < 0.2, "{x}");
        assert!(y > 9.0 && y <= 10.0, "{y}");
        assert_eq!(map_mouse(click(25, 1), &areas, ClickArea::Profiles), None);
    }
}
