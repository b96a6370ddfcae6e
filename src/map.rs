//! A terminal slippy map.
//!
//! [`Map`] is bound to a screen rectangle (its container) and owns everything
//! drawn in it: the base layer, GeoJSON overlays, corner controls and at most
//! one popup. The view is a center plus an integer zoom level. Screen space is
//! measured in braille dots (2 per column, 4 per row) so that one dot covers
//! `360 / (256 * 2^zoom)` degrees on both axes.
//!
//! Views start out unset. A map without a view renders as an empty frame.
//!
//! View changes queue [`MapEvent`]s for the kinds a caller subscribed to;
//! the owner drains them with [`Map::take_events`] after each operation.

use crate::control::{layout_panels, Control, ControlAction, ControlOptions, ControlPosition, Panel, ZoomControl};
use crate::models::{GeoShape, LatLng, LatLngBounds};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{layout::Rect, style::Color, widgets::canvas::MapResolution};
use std::time::{Duration, Instant};

pub const TILE_SIZE: f64 = 256.0;

const DOUBLE_CLICK: Duration = Duration::from_millis(500);

/// Degrees covered by one braille dot at `zoom`.
pub fn degrees_per_dot(zoom: u8) -> f64 {
    360.0 / (TILE_SIZE * 2f64.powi(i32::from(zoom)))
}

/// Which user interactions a map accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapOptions {
    pub zoom_control: bool,
    pub double_click_zoom: bool,
    pub box_zoom: bool,
    pub dragging: bool,
    pub keyboard: bool,
    pub scroll_wheel_zoom: bool,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            zoom_control: true,
            double_click_zoom: true,
            box_zoom: true,
            dragging: true,
            keyboard: true,
            scroll_wheel_zoom: true,
        }
    }
}

impl MapOptions {
    /// Every interaction disabled, for display-only maps.
    pub fn locked() -> Self {
        Self {
            zoom_control: false,
            double_click_zoom: false,
            box_zoom: false,
            dragging: false,
            keyboard: false,
            scroll_wheel_zoom: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseStyle {
    /// High contrast coastlines.
    Toner,
    /// Muted coastlines that leave room for overlays.
    TonerLite,
}

/// The background world outline plus the zoom range it supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseLayer {
    pub style: BaseStyle,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl Default for BaseLayer {
    fn default() -> Self {
        Self::toner_lite()
    }
}

impl BaseLayer {
    pub fn toner() -> Self {
        Self {
            style: BaseStyle::Toner,
            min_zoom: 0,
            max_zoom: 20,
        }
    }

    pub fn toner_lite() -> Self {
        Self {
            style: BaseStyle::TonerLite,
            min_zoom: 0,
            max_zoom: 20,
        }
    }

    pub fn color(&self) -> Color {
        match self.style {
            BaseStyle::Toner => Color::White,
            BaseStyle::TonerLite => Color::Rgb(110, 110, 110),
        }
    }

    pub fn resolution(&self, zoom: u8) -> MapResolution {
        if zoom < 3 {
            MapResolution::Low
        } else {
            MapResolution::High
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStyle {
    pub color: Color,
}

impl Default for PathStyle {
    fn default() -> Self {
        Self {
            color: Color::Rgb(0x33, 0x88, 0xff),
        }
    }
}

impl PathStyle {
    pub fn highlight() -> Self {
        Self {
            color: Color::Rgb(0xff, 0x78, 0x00),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoJsonLayer {
    pub shape: GeoShape,
    pub style: PathStyle,
}

impl GeoJsonLayer {
    pub fn new(shape: GeoShape, style: PathStyle) -> Self {
        Self { shape, style }
    }

    pub fn bounds(&self) -> Option<LatLngBounds> {
        self.shape.bounds()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupOptions {
    /// Close the popup when the map is clicked.
    pub close_on_click: bool,
    /// Draw a close marker in the popup frame.
    pub close_button: bool,
}

impl Default for PopupOptions {
    fn default() -> Self {
        Self {
            close_on_click: true,
            close_button: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub content: String,
    pub latlng: LatLng,
    pub options: PopupOptions,
}

impl Popup {
    /// Popup content as plain text lines. Block-level tags break lines, other
    /// markup is dropped and the common entities are decoded.
    pub fn text_lines(&self) -> Vec<String> {
        html_to_lines(&self.content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    pub center: LatLng,
    pub zoom: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapEvent {
    ZoomEnd,
    MoveEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gesture {
    Drag { col: u16, row: u16 },
    BoxZoom { start: (u16, u16), current: (u16, u16) },
}

pub struct Map {
    area: Rect,
    options: MapOptions,
    base: BaseLayer,
    view: Option<View>,
    layers: Vec<GeoJsonLayer>,
    controls: Vec<(Box<dyn Control>, Panel)>,
    popup: Option<Popup>,
    subscriptions: Vec<MapEvent>,
    events: Vec<MapEvent>,
    gesture: Option<Gesture>,
    last_click: Option<(Instant, u16, u16)>,
}

impl Map {
    pub fn new(area: Rect, options: MapOptions, base: BaseLayer) -> Self {
        let mut map = Self {
            area,
            options,
            base,
            view: None,
            layers: Vec::new(),
            controls: Vec::new(),
            popup: None,
            subscriptions: Vec::new(),
            events: Vec::new(),
            gesture: None,
            last_click: None,
        };
        if options.zoom_control {
            map.add_control(Box::new(ZoomControl::new(ControlOptions {
                position: ControlPosition::TopLeft,
            })));
        }
        map
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    /// Rebinds the map to a resized container. Center and zoom are kept.
    pub fn set_area(&mut self, area: Rect) {
        self.area = area;
    }

    /// Drawable region inside the container's border.
    pub fn inner(&self) -> Rect {
        Rect::new(
            self.area.x.saturating_add(1),
            self.area.y.saturating_add(1),
            self.area.width.saturating_sub(2),
            self.area.height.saturating_sub(2),
        )
    }

    /// Drawable size in braille dots.
    pub fn size(&self) -> (f64, f64) {
        let inner = self.inner();
        (f64::from(inner.width) * 2.0, f64::from(inner.height) * 4.0)
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    pub fn base(&self) -> &BaseLayer {
        &self.base
    }

    pub fn view(&self) -> Option<View> {
        self.view
    }

    pub fn center(&self) -> Option<LatLng> {
        self.view.map(|v| v.center)
    }

    pub fn zoom(&self) -> Option<u8> {
        self.view.map(|v| v.zoom)
    }

    pub fn set_view(&mut self, center: LatLng, zoom: u8) {
        let zoom = zoom.clamp(self.base.min_zoom, self.base.max_zoom);
        let center = LatLng::new(center.lat.clamp(-90.0, 90.0), center.lng);
        let zoom_changed = self.view.map_or(true, |v| v.zoom != zoom);
        self.view = Some(View { center, zoom });
        if zoom_changed {
            self.fire(MapEvent::ZoomEnd);
        }
        self.fire(MapEvent::MoveEnd);
    }

    pub fn fit_bounds(&mut self, bounds: &LatLngBounds) {
        let zoom = self.bounds_zoom(bounds, false);
        self.set_view(bounds.center(), zoom);
    }

    /// Zoom at which `bounds` spans the container. With `inside` unset the
    /// whole rectangle stays visible; with `inside` set the view fits within
    /// the rectangle instead.
    pub fn bounds_zoom(&self, bounds: &LatLngBounds, inside: bool) -> u8 {
        let (w, h) = self.size();
        if w <= 0.0 || h <= 0.0 {
            return self.base.min_zoom;
        }
        let zx = scale_zoom(w, bounds.width());
        let zy = scale_zoom(h, bounds.height());
        let zoom = if inside {
            zx.max(zy).ceil()
        } else {
            zx.min(zy).floor()
        };
        if zoom.is_nan() {
            return self.base.min_zoom;
        }
        zoom.clamp(f64::from(self.base.min_zoom), f64::from(self.base.max_zoom)) as u8
    }

    pub fn visible_bounds(&self) -> Option<LatLngBounds> {
        let view = self.view?;
        let (w, h) = self.size();
        let dpd = degrees_per_dot(view.zoom);
        let (half_w, half_h) = (w * dpd / 2.0, h * dpd / 2.0);
        Some(LatLngBounds::new(
            LatLng::new(view.center.lat - half_h, view.center.lng - half_w),
            LatLng::new(view.center.lat + half_h, view.center.lng + half_w),
        ))
    }

    /// Geographic position under a terminal cell, if the cell is inside the
    /// drawable region and the map has a view.
    pub fn screen_to_latlng(&self, col: u16, row: u16) -> Option<LatLng> {
        let inner = self.inner();
        if !contains(inner, col, row) {
            return None;
        }
        let bounds = self.visible_bounds()?;
        let dpd = degrees_per_dot(self.zoom()?);
        let x = f64::from(col - inner.x) * 2.0 + 1.0;
        let y = f64::from(row - inner.y) * 4.0 + 2.0;
        Some(LatLng::new(bounds.north() - y * dpd, bounds.west() + x * dpd))
    }

    pub fn latlng_to_screen(&self, p: LatLng) -> Option<(u16, u16)> {
        let inner = self.inner();
        let bounds = self.visible_bounds()?;
        let dpd = degrees_per_dot(self.zoom()?);
        let x = (p.lng - bounds.west()) / dpd;
        let y = (bounds.north() - p.lat) / dpd;
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let col = (x / 2.0).floor();
        let row = (y / 4.0).floor();
        if col >= f64::from(inner.width) || row >= f64::from(inner.height) {
            return None;
        }
        Some((inner.x + col as u16, inner.y + row as u16))
    }

    /// Moves the view by a distance in dots. Positive `dx` moves east,
    /// positive `dy` moves south.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let Some(view) = self.view else {
            return;
        };
        let dpd = degrees_per_dot(view.zoom);
        let center = LatLng::new(view.center.lat - dy * dpd, view.center.lng + dx * dpd);
        self.set_view(center, view.zoom);
    }

    pub fn zoom_in(&mut self) {
        if let Some(view) = self.view {
            self.set_view(view.center, view.zoom.saturating_add(1));
        }
    }

    pub fn zoom_out(&mut self) {
        if let Some(view) = self.view {
            self.set_view(view.center, view.zoom.saturating_sub(1));
        }
    }

    pub fn add_layer(&mut self, layer: GeoJsonLayer) {
        self.layers.push(layer);
    }

    pub fn layers(&self) -> &[GeoJsonLayer] {
        &self.layers
    }

    pub fn add_control(&mut self, mut control: Box<dyn Control>) {
        let panel = control.on_add(self);
        self.controls.push((control, panel));
    }

    pub fn remove_control(&mut self, id: &str) -> bool {
        let Some(index) = self.controls.iter().position(|(c, _)| c.id() == id) else {
            return false;
        };
        let (mut control, _) = self.controls.remove(index);
        control.on_remove(self);
        true
    }

    pub fn has_control(&self, id: &str) -> bool {
        self.controls.iter().any(|(c, _)| c.id() == id)
    }

    /// Control panels with the rectangles they occupy.
    pub fn control_panels(&self) -> Vec<(Rect, &Panel)> {
        let rects = layout_panels(
            self.inner(),
            self.controls.iter().map(|(c, p)| (c.position(), p)),
        );
        rects
            .into_iter()
            .zip(self.controls.iter().map(|(_, p)| p))
            .collect()
    }

    pub fn open_popup(&mut self, popup: Popup) {
        self.popup = Some(popup);
    }

    pub fn close_popup(&mut self) {
        self.popup = None;
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    pub fn subscribe(&mut self, kind: MapEvent) {
        if !self.subscriptions.contains(&kind) {
            self.subscriptions.push(kind);
        }
    }

    pub fn take_events(&mut self) -> Vec<MapEvent> {
        std::mem::take(&mut self.events)
    }

    fn fire(&mut self, event: MapEvent) {
        if self.subscriptions.contains(&event) {
            self.events.push(event);
        }
    }

    /// Keyboard navigation. Returns whether the key was used.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if !self.options.keyboard || self.view.is_none() {
            return false;
        }
        let (w, h) = self.size();
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => self.pan_by(-w / 4.0, 0.0),
            KeyCode::Right | KeyCode::Char('l') => self.pan_by(w / 4.0, 0.0),
            KeyCode::Up | KeyCode::Char('k') => self.pan_by(0.0, -h / 4.0),
            KeyCode::Down | KeyCode::Char('j') => self.pan_by(0.0, h / 4.0),
            KeyCode::Char('+') | KeyCode::Char('=') => self.zoom_in(),
            KeyCode::Char('-') | KeyCode::Char('_') => self.zoom_out(),
            _ => return false,
        }
        true
    }

    /// Mouse navigation. Returns whether the event was used.
    pub fn handle_mouse(&mut self, event: MouseEvent) -> bool {
        self.handle_mouse_at(event, Instant::now())
    }

    pub(crate) fn handle_mouse_at(&mut self, event: MouseEvent, now: Instant) -> bool {
        let (col, row) = (event.column, event.row);
        match event.kind {
            MouseEventKind::ScrollUp if self.options.scroll_wheel_zoom => {
                self.zoom_in();
                true
            }
            MouseEventKind::ScrollDown if self.options.scroll_wheel_zoom => {
                self.zoom_out();
                true
            }
            MouseEventKind::Down(MouseButton::Left) => self.on_press(col, row, event.modifiers, now),
            MouseEventKind::Drag(MouseButton::Left) => match self.gesture {
                Some(Gesture::Drag { col: c0, row: r0 }) => {
                    let dx = (f64::from(col) - f64::from(c0)) * 2.0;
                    let dy = (f64::from(row) - f64::from(r0)) * 4.0;
                    self.pan_by(-dx, -dy);
                    self.gesture = Some(Gesture::Drag { col, row });
                    true
                }
                Some(Gesture::BoxZoom { start, .. }) => {
                    self.gesture = Some(Gesture::BoxZoom {
                        start,
                        current: (col, row),
                    });
                    true
                }
                None => false,
            },
            MouseEventKind::Up(MouseButton::Left) => match self.gesture.take() {
                Some(Gesture::BoxZoom { start, .. }) => {
                    let corners = (
                        self.screen_to_latlng(start.0, start.1),
                        self.screen_to_latlng(col, row),
                    );
                    if let (Some(a), Some(b)) = corners {
                        if start != (col, row) {
                            self.fit_bounds(&LatLngBounds::new(a, b));
                        }
                    }
                    true
                }
                Some(Gesture::Drag { .. }) => true,
                None => false,
            },
            _ => false,
        }
    }

    fn on_press(&mut self, col: u16, row: u16, modifiers: KeyModifiers, now: Instant) -> bool {
        if let Some(action) = self.click_control(col, row) {
            match action {
                ControlAction::ZoomIn => self.zoom_in(),
                ControlAction::ZoomOut => self.zoom_out(),
            }
            return true;
        }
        if !contains(self.inner(), col, row) {
            return false;
        }

        if modifiers.contains(KeyModifiers::SHIFT) && self.options.box_zoom {
            self.gesture = Some(Gesture::BoxZoom {
                start: (col, row),
                current: (col, row),
            });
            return true;
        }

        let is_double = self.last_click.is_some_and(|(at, c, r)| {
            c == col && r == row && now.saturating_duration_since(at) <= DOUBLE_CLICK
        });
        if is_double && self.options.double_click_zoom {
            self.last_click = None;
            if let (Some(target), Some(zoom)) = (self.screen_to_latlng(col, row), self.zoom()) {
                self.set_view(target, zoom.saturating_add(1));
            }
            return true;
        }
        // A click only counts as used if something reacted to it.
        let mut handled = false;
        if self.options.double_click_zoom {
            self.last_click = Some((now, col, row));
            handled = true;
        }
        if self.popup.as_ref().is_some_and(|p| p.options.close_on_click) {
            self.popup = None;
            handled = true;
        }
        if self.options.dragging {
            self.gesture = Some(Gesture::Drag { col, row });
            handled = true;
        }
        handled
    }

    fn click_control(&mut self, col: u16, row: u16) -> Option<ControlAction> {
        let rects = layout_panels(
            self.inner(),
            self.controls.iter().map(|(c, p)| (c.position(), p)),
        );
        let (index, rect) = rects
            .into_iter()
            .enumerate()
            .find(|(_, rect)| contains(*rect, col, row))?;
        // Row 0 is the panel border.
        let line = usize::from(row.checked_sub(rect.y + 1)?);
        self.controls[index].0.on_click(line)
    }

    /// Screen rectangle of an in-progress box zoom, for drawing.
    pub fn zoom_box(&self) -> Option<Rect> {
        match self.gesture {
            Some(Gesture::BoxZoom { start, current }) => {
                let x = start.0.min(current.0);
                let y = start.1.min(current.1);
                Some(Rect::new(
                    x,
                    y,
                    start.0.max(current.0) - x + 1,
                    start.1.max(current.1) - y + 1,
                ))
            }
            _ => None,
        }
    }
}

pub(crate) fn contains(rect: Rect, col: u16, row: u16) -> bool {
    col >= rect.x && col < rect.x + rect.width && row >= rect.y && row < rect.y + rect.height
}

// Continuous zoom at which `degrees` span `dots`.
fn scale_zoom(dots: f64, degrees: f64) -> f64 {
    if degrees <= 0.0 {
        return f64::INFINITY;
    }
    (dots * 360.0 / (TILE_SIZE * degrees)).log2()
}

fn html_to_lines(html: &str) -> Vec<String> {
    let mut text = String::new();
    let mut tag = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match (in_tag, ch) {
            (false, '<') => {
                in_tag = true;
                tag.clear();
            }
            (true, '>') => {
                in_tag = false;
                let name = tag
                    .trim_start_matches('/')
                    .split(|c: char| c.is_whitespace() || c == '/')
                    .next()
                    .unwrap_or_default()
                    .to_ascii_lowercase();
                if matches!(
                    name.as_str(),
                    "br" | "p" | "div" | "li" | "tr" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
                ) {
                    text.push('\n');
                }
            }
            (true, c) => tag.push(c),
            (false, c) => text.push(c),
        }
    }
    let text = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");
    text.lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect()
}
