//! TUI rendering for the woeplanet map page
//!
//! This module lays the page out (side map, main map, status line) and draws
//! each map with the `ratatui` canvas: the world base layer, GeoJSON layers,
//! control panels, the popup and an in-progress box zoom.

use crate::app::App;
use crate::config::MapsConfig;
use crate::controller::{Pane, PaneAreas};
use crate::location::Navigator;
use crate::map::{Map as SlippyMap, Popup};
use ratatui::{
    prelude::*,
    widgets::{canvas::*, *},
};

use ratatui::text::Line;

/// Splits the terminal into the side and main map containers. The bottom row
/// is kept for the status line.
///
/// # Arguments
///
/// * `area` - The full terminal area.
/// * `maps` - Which containers the page carries and how wide the side one is.
pub fn pane_areas(area: Rect, maps: &MapsConfig) -> PaneAreas {
    let body = Rect {
        height: area.height.saturating_sub(1),
        ..area
    };
    match (maps.side, maps.main) {
        (true, true) => {
            let percent = u32::from(maps.side_width_percent.min(100));
            let side_width = (u32::from(body.width) * percent / 100) as u16;
            PaneAreas {
                side: Some(Rect {
                    width: side_width,
                    ..body
                }),
                main: Some(Rect {
                    x: body.x + side_width,
                    width: body.width - side_width,
                    ..body
                }),
            }
        }
        (true, false) => PaneAreas {
            side: Some(body),
            main: None,
        },
        (false, true) => PaneAreas {
            side: None,
            main: Some(body),
        },
        (false, false) => PaneAreas::default(),
    }
}

/// Renders one frame: both maps (where the page has them) and the status line.
///
/// # Arguments
///
/// * `f` - The ratatui frame to draw into (from `terminal.draw()`).
/// * `app` - Current application state.
pub fn render(f: &mut Frame, app: &App) {
    if let Some(map) = app.controller.map(Pane::Side) {
        render_map(f, map, " Locator ");
    }
    if let Some(map) = app.controller.map(Pane::Main) {
        render_map(f, map, " Map ");
    }

    let area = f.size();
    if area.height > 0 {
        let status = Rect::new(area.x, area.y + area.height - 1, area.width, 1);
        render_status(f, app, status);
    }
}

/// Draws a map inside its container. A map without a view only shows its
/// frame.
fn render_map(f: &mut Frame, map: &SlippyMap, title: &str) {
    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::DarkGray));

    match (map.view(), map.visible_bounds()) {
        (Some(view), Some(bounds)) => {
            let base_color = map.base().color();
            let resolution = map.base().resolution(view.zoom);
            let canvas = Canvas::default()
                .block(block)
                .marker(symbols::Marker::Braille)
                .x_bounds([bounds.west(), bounds.east()])
                .y_bounds([bounds.south(), bounds.north()])
                .paint(|ctx| {
                    ctx.draw(&Map {
                        color: base_color,
                        resolution,
                    });
                    ctx.layer();

                    for layer in map.layers() {
                        let color = layer.style.color;
                        for path in &layer.shape.paths {
                            for pair in path.windows(2) {
                                ctx.draw(&canvas::Line {
                                    x1: pair[0].lng,
                                    y1: pair[0].lat,
                                    x2: pair[1].lng,
                                    y2: pair[1].lat,
                                    color,
                                });
                            }
                        }
                        for point in &layer.shape.points {
                            ctx.print(
                                point.lng,
                                point.lat,
                                Line::from(Span::styled("•", Style::default().fg(color))),
                            );
                        }
                    }
                });
            f.render_widget(canvas, map.area());
        }
        _ => f.render_widget(block, map.area()),
    }

    if let Some(popup) = map.popup() {
        render_popup(f, map, popup);
    }

    for (rect, panel) in map.control_panels() {
        f.render_widget(Clear, rect);
        f.render_widget(
            Paragraph::new(panel.lines.clone()).block(Block::default().borders(Borders::ALL)),
            rect,
        );
    }

    if let Some(zoom_box) = map.zoom_box() {
        let zoom_box = zoom_box.intersection(map.inner());
        if zoom_box.width > 0 && zoom_box.height > 0 {
            f.render_widget(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow)),
                zoom_box,
            );
        }
    }
}

/// Draws the popup above its anchor, with a tip pointing at the anchor.
fn render_popup(f: &mut Frame, map: &SlippyMap, popup: &Popup) {
    let Some((col, row)) = map.latlng_to_screen(popup.latlng) else {
        return;
    };
    let inner = map.inner();
    let lines = popup.text_lines();
    let text_width = lines
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0) as u16;
    let close_width = if popup.options.close_button { 2 } else { 0 };

    let width = (text_width + close_width + 4).min(inner.width);
    let height = (lines.len() as u16 + 2).min(row.saturating_sub(inner.y));
    if width < 3 || height < 3 {
        return;
    }

    let max_x = inner.x + inner.width - width;
    let x = col.saturating_sub(width / 2).clamp(inner.x, max_x);
    let rect = Rect::new(x, row - height, width, height);

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .padding(Padding::horizontal(1));
    if popup.options.close_button {
        block = block.title("×").title_alignment(Alignment::Right);
    }
    let text: Vec<Line> = lines.into_iter().map(Line::from).collect();

    f.render_widget(Clear, rect);
    f.render_widget(Paragraph::new(text).block(block), rect);
    f.render_widget(
        Paragraph::new("▼").style(Style::default().fg(Color::White)),
        Rect::new(col, row, 1, 1),
    );
}

/// Bottom status line: the location prompt while one is showing, otherwise
/// the page URL, the main map's view and key help.
fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let label = Style::default().add_modifier(Modifier::BOLD);

    let mut spans = match &app.prompt {
        Some(prompt) if prompt.panels.asking => vec![Span::styled(
            " Asking where you are... ",
            Style::default().fg(Color::Yellow),
        )],
        Some(prompt) if prompt.panels.success => vec![Span::styled(
            " Found you. Loading the map around you... ",
            Style::default().fg(Color::Green),
        )],
        Some(prompt) if prompt.panels.error => vec![
            Span::styled(
                " Could not find where you are: ",
                Style::default().fg(Color::Red),
            ),
            Span::raw(prompt.panels.status.clone()),
            Span::raw(" "),
        ],
        _ => vec![Span::styled(
            format!(" {} ", app.page.href()),
            Style::default().fg(Color::Cyan),
        )],
    };

    if let Some(view) = app.controller.map(Pane::Main).and_then(|m| m.view()) {
        spans.push(Span::raw("│ "));
        spans.push(Span::styled("CENTER: ", label));
        spans.push(Span::raw(format!(
            "{:.4}, {:.4}  ",
            view.center.lat, view.center.lng
        )));
        spans.push(Span::styled("ZOOM: ", label));
        spans.push(Span::raw(format!("{} ", view.zoom)));
    }
    spans.push(Span::styled(
        "│ ←↑↓→ pan  +/- zoom  q quit",
        Style::default().fg(Color::DarkGray),
    ));

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
