//! Map controls: small fixed panels pinned to a corner of a map.
//!
//! A control is added with [`Map::add_control`](crate::map::Map::add_control),
//! which calls [`Control::on_add`] once and keeps the returned [`Panel`]. The
//! map lays panels out per corner and routes clicks on them back to the
//! control through [`Control::on_click`].

use crate::map::Map;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone, Copy)]
pub struct ControlOptions {
    pub position: ControlPosition,
}

/// What a click on a control asks the owning map to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    ZoomIn,
    ZoomOut,
}

/// Rendered content of a control.
#[derive(Debug, Clone)]
pub struct Panel {
    pub id: &'static str,
    pub class: &'static str,
    pub lines: Vec<Line<'static>>,
}

impl Panel {
    /// Outer size including the one-cell border.
    pub fn size(&self) -> (u16, u16) {
        let width = self.lines.iter().map(Line::width).max().unwrap_or(0) as u16;
        (width.saturating_add(2), (self.lines.len() as u16).saturating_add(2))
    }
}

pub trait Control {
    fn id(&self) -> &'static str;

    fn position(&self) -> ControlPosition;

    fn on_add(&mut self, map: &Map) -> Panel;

    fn on_remove(&mut self, _map: &Map) {}

    /// Called with the index of the clicked panel line.
    fn on_click(&mut self, _line: usize) -> Option<ControlAction> {
        None
    }
}

/// Panel shown when a place has no coordinates and the map falls back to
/// Null Island.
pub struct NullLabel {
    position: ControlPosition,
}

impl Control for NullLabel {
    fn id(&self) -> &'static str {
        "null-island"
    }

    fn position(&self) -> ControlPosition {
        self.position
    }

    fn on_add(&mut self, _map: &Map) -> Panel {
        Panel {
            id: self.id(),
            class: "text-panel",
            lines: vec![
                Line::from(Span::styled("Ahem.", Style::default().add_modifier(Modifier::BOLD))),
                Line::from("We don't seem to have coordinates for this place."),
                Line::from("So here's a map of Null Island instead."),
            ],
        }
    }
}

pub fn null_label(options: ControlOptions) -> Box<dyn Control> {
    Box::new(NullLabel {
        position: options.position,
    })
}

/// Credits line with a link to the attribution page.
pub struct Attribution {
    prefix: String,
    position: ControlPosition,
}

impl Attribution {
    pub fn new(credits_url: &str, options: ControlOptions) -> Self {
        Self {
            prefix: credits_url.to_string(),
            position: options.position,
        }
    }
}

impl Control for Attribution {
    fn id(&self) -> &'static str {
        "attribution"
    }

    fn position(&self) -> ControlPosition {
        self.position
    }

    fn on_add(&mut self, _map: &Map) -> Panel {
        Panel {
            id: self.id(),
            class: "attribution",
            lines: vec![Line::from(vec![
                Span::styled("Map Credits ", Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(self.prefix.clone(), Style::default().fg(Color::DarkGray)),
            ])],
        }
    }
}

pub struct ZoomControl {
    position: ControlPosition,
}

impl ZoomControl {
    pub fn new(options: ControlOptions) -> Self {
        Self {
            position: options.position,
        }
    }
}

impl Control for ZoomControl {
    fn id(&self) -> &'static str {
        "zoom"
    }

    fn position(&self) -> ControlPosition {
        self.position
    }

    fn on_add(&mut self, _map: &Map) -> Panel {
        Panel {
            id: self.id(),
            class: "zoom",
            lines: vec![Line::from(" + "), Line::from(" - ")],
        }
    }

    fn on_click(&mut self, line: usize) -> Option<ControlAction> {
        match line {
            0 => Some(ControlAction::ZoomIn),
            1 => Some(ControlAction::ZoomOut),
            _ => None,
        }
    }
}

/// Places panels inside `area`, stacking them away from their corner in the
/// order given. Panels that do not fit are clipped to the area.
pub fn layout_panels<'a, I>(area: Rect, panels: I) -> Vec<Rect>
where
    I: IntoIterator<Item = (ControlPosition, &'a Panel)>,
{
    let mut top_left = 0u16;
    let mut top_right = 0u16;
    let mut bottom_left = 0u16;
    let mut bottom_right = 0u16;

    panels
        .into_iter()
        .map(|(position, panel)| {
            let (w, h) = panel.size();
            let w = w.min(area.width);
            let h = h.min(area.height);
            let left = area.x;
            let right = area.x + area.width - w;
            let (x, y) = match position {
                ControlPosition::TopLeft => {
                    let y = area.y + top_left;
                    top_left += h;
                    (left, y)
                }
                ControlPosition::TopRight => {
                    let y = area.y + top_right;
                    top_right += h;
                    (right, y)
                }
                ControlPosition::BottomLeft => {
                    bottom_left += h;
                    (left, (area.y + area.height).saturating_sub(bottom_left))
                }
                ControlPosition::BottomRight => {
                    bottom_right += h;
                    (right, (area.y + area.height).saturating_sub(bottom_right))
                }
            };
            Rect::new(x, y.max(area.y), w, h).intersection(area)
        })
        .collect()
}
