//! The side/main map pair.
//!
//! [`MapController`] builds up to two maps from [`PageData`], picks how each
//! one is positioned, opens the place popup on the main map and keeps the
//! side map centered on the main map while both show a real place.

use crate::control::{null_label, Attribution, ControlOptions, ControlPosition};
use crate::map::{contains, BaseLayer, GeoJsonLayer, Map, MapEvent, MapOptions, PathStyle, Popup, PopupOptions};
use crate::models::{GeoShape, LatLng, LatLngBounds};
use crossterm::event::{KeyEvent, MouseEvent};
use ratatui::layout::Rect;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Side,
    Main,
}

impl Pane {
    /// Extra zoom applied on top of the placeholder's fit zoom.
    pub fn placeholder_zoom_offset(self) -> u8 {
        match self {
            Pane::Side => 3,
            Pane::Main => 4,
        }
    }
}

impl fmt::Display for Pane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pane::Side => f.write_str("side"),
            Pane::Main => f.write_str("main"),
        }
    }
}

/// Everything the page knows about the place being shown.
#[derive(Debug, Clone, PartialEq)]
pub struct PageData {
    pub bounds: Option<LatLngBounds>,
    pub centroid: Option<LatLng>,
    pub zoom: u8,
    /// Popup markup for the main map.
    pub popup: Option<String>,
    pub credits_url: String,
    /// Where to load the Null Island placeholder from.
    pub nullisland_url: String,
    pub scale: Option<u32>,
    pub placetype: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayState {
    Bounds(LatLngBounds),
    Centroid { center: LatLng, zoom: u8 },
    Placeholder,
}

impl DisplayState {
    /// Bounds win over a centroid; with neither, show the placeholder.
    pub fn select(data: &PageData) -> Self {
        if let Some(bounds) = data.bounds {
            DisplayState::Bounds(bounds)
        } else if let Some(center) = data.centroid {
            DisplayState::Centroid {
                center,
                zoom: data.zoom,
            }
        } else {
            DisplayState::Placeholder
        }
    }
}

/// Screen rectangles for the map containers. A missing rectangle means the
/// container is not on the page and that map is not created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaneAreas {
    pub side: Option<Rect>,
    pub main: Option<Rect>,
}

/// A placeholder resource the application should fetch for a pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderRequest {
    pub pane: Pane,
    pub url: String,
}

pub struct MapController {
    data: PageData,
    side: Option<Map>,
    main: Option<Map>,
    synced: bool,
    requests: Vec<PlaceholderRequest>,
}

impl MapController {
    pub fn new(data: PageData, areas: PaneAreas) -> Self {
        if let Some(scale) = data.scale {
            debug!("scale: {}", scale);
        }
        if let Some(placetype) = &data.placetype {
            debug!("placetype: {}", placetype);
        }

        let mut controller = Self {
            data,
            side: None,
            main: None,
            synced: false,
            requests: Vec::new(),
        };
        if let Some(area) = areas.side {
            controller.init_side(area);
        }
        if let Some(area) = areas.main {
            controller.init_main(area);
        }
        controller
    }

    fn init_side(&mut self, area: Rect) {
        let mut map = Map::new(area, MapOptions::locked(), BaseLayer::toner());
        map.add_control(Box::new(Attribution::new(
            &self.data.credits_url,
            ControlOptions {
                position: ControlPosition::BottomLeft,
            },
        )));

        match DisplayState::select(&self.data) {
            DisplayState::Bounds(bounds) => {
                info!("set side map to bounds");
                map.fit_bounds(&bounds);
            }
            DisplayState::Centroid { center, zoom } => {
                info!("set side map to centroid");
                map.set_view(center, zoom);
            }
            DisplayState::Placeholder => {
                info!("set side map to null island");
                map.add_control(null_label(ControlOptions {
                    position: ControlPosition::TopLeft,
                }));
                self.request_placeholder(Pane::Side);
            }
        }
        self.side = Some(map);
    }

    fn init_main(&mut self, area: Rect) {
        let mut map = Map::new(area, MapOptions::default(), BaseLayer::toner_lite());

        let state = DisplayState::select(&self.data);
        match state {
            DisplayState::Bounds(bounds) => {
                info!("set main map to bounds");
                map.fit_bounds(&bounds);
            }
            DisplayState::Centroid { center, zoom } => {
                info!("set main map to centroid");
                map.set_view(center, zoom);
            }
            DisplayState::Placeholder => {
                info!("set main map to null island");
                self.request_placeholder(Pane::Main);
            }
        }
        self.main = Some(map);

        if state != DisplayState::Placeholder {
            self.open_popup();
            self.sync_maps();
        }
    }

    fn request_placeholder(&mut self, pane: Pane) {
        self.requests.push(PlaceholderRequest {
            pane,
            url: self.data.nullisland_url.clone(),
        });
    }

    /// Placeholder fetches queued since the last call.
    pub fn take_placeholder_requests(&mut self) -> Vec<PlaceholderRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Draws the fetched placeholder on `pane` and zooms in on its center.
    pub fn on_placeholder_loaded(&mut self, pane: Pane, shape: GeoShape) {
        let style = match pane {
            Pane::Side => PathStyle::highlight(),
            Pane::Main => PathStyle::default(),
        };
        let Some(map) = self.map_mut(pane) else {
            return;
        };
        let layer = GeoJsonLayer::new(shape, style);
        let Some(bounds) = layer.bounds() else {
            warn!("Null island resource for the {} map has no geometry", pane);
            return;
        };
        map.add_layer(layer);
        let zoom = map
            .bounds_zoom(&bounds, true)
            .saturating_add(pane.placeholder_zoom_offset());
        map.set_view(bounds.center(), zoom);

        if pane == Pane::Main {
            self.open_popup();
        }
    }

    /// The map stays where it is (unpositioned if it never had a view).
    pub fn on_placeholder_failed(&mut self, pane: Pane, error: &str) {
        warn!("Failed to load null island for the {} map: {}", pane, error);
    }

    fn open_popup(&mut self) {
        let (Some(main), Some(content)) = (self.main.as_mut(), self.data.popup.as_ref()) else {
            return;
        };
        let Some(center) = main.center() else {
            return;
        };
        main.open_popup(Popup {
            content: content.clone(),
            latlng: center,
            options: PopupOptions {
                close_on_click: false,
                close_button: false,
            },
        });
    }

    fn sync_maps(&mut self) {
        if let (Some(main), Some(_)) = (self.main.as_mut(), self.side.as_ref()) {
            main.subscribe(MapEvent::ZoomEnd);
            main.subscribe(MapEvent::MoveEnd);
            self.synced = true;
        }
    }

    /// Delivers queued main-map view events to the side map.
    pub fn dispatch_events(&mut self) {
        let Some(main) = self.main.as_mut() else {
            return;
        };
        for _event in main.take_events() {
            if self.synced {
                self.sync_handler();
            }
        }
    }

    fn sync_handler(&mut self) {
        let (Some(main), Some(side)) = (self.main.as_ref(), self.side.as_mut()) else {
            return;
        };
        let Some(center) = main.center() else {
            return;
        };
        let zoom = side.zoom().unwrap_or(side.base().min_zoom);
        side.set_view(center, zoom);
    }

    /// Keys always go to the main map.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        let handled = self.main.as_mut().is_some_and(|m| m.handle_key(key));
        self.dispatch_events();
        handled
    }

    /// Mouse events go to the side map when over it, otherwise to the main map.
    pub fn handle_mouse(&mut self, event: MouseEvent) -> bool {
        let over_side = self
            .side
            .as_ref()
            .is_some_and(|s| contains(s.area(), event.column, event.row));
        let target = if over_side {
            self.side.as_mut()
        } else {
            self.main.as_mut()
        };
        let handled = target.is_some_and(|m| m.handle_mouse(event));
        self.dispatch_events();
        handled
    }

    pub fn set_areas(&mut self, areas: PaneAreas) {
        if let (Some(map), Some(area)) = (self.side.as_mut(), areas.side) {
            map.set_area(area);
        }
        if let (Some(map), Some(area)) = (self.main.as_mut(), areas.main) {
            map.set_area(area);
        }
    }

    pub fn map(&self, pane: Pane) -> Option<&Map> {
        match pane {
            Pane::Side => self.side.as_ref(),
            Pane::Main => self.main.as_ref(),
        }
    }

    pub fn map_mut(&mut self, pane: Pane) -> Option<&mut Map> {
        match pane {
            Pane::Side => self.side.as_mut(),
            Pane::Main => self.main.as_mut(),
        }
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn data(&self) -> &PageData {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyCode;

    fn page() -> PageData {
        PageData {
            bounds: None,
            centroid: None,
            zoom: 10,
            popup: Some("<strong>London</strong>".into()),
            credits_url: "https://example.org/credits/".into(),
            nullisland_url: "assets/null-island.geojson".into(),
            scale: None,
            placetype: None,
        }
    }

    fn london() -> LatLngBounds {
        LatLngBounds::new(LatLng::new(51.28, -0.51), LatLng::new(51.69, 0.33))
    }

    fn both() -> PaneAreas {
        PaneAreas {
            side: Some(Rect::new(0, 0, 30, 40)),
            main: Some(Rect::new(30, 0, 90, 40)),
        }
    }

    fn island() -> GeoShape {
        GeoShape::parse(include_str!("../assets/null-island.geojson")).unwrap()
    }

    #[test]
    fn display_state_honors_priority() {
        let centroid = LatLng::new(51.5, -0.12);

        let data = PageData {
            bounds: Some(london()),
            centroid: Some(centroid),
            ..page()
        };
        assert_eq!(DisplayState::select(&data), DisplayState::Bounds(london()));

        let data = PageData {
            centroid: Some(centroid),
            ..page()
        };
        assert_eq!(
            DisplayState::select(&data),
            DisplayState::Centroid {
                center: centroid,
                zoom: 10
            }
        );

        assert_eq!(DisplayState::select(&page()), DisplayState::Placeholder);
    }

    #[test]
    fn bounds_fit_both_maps_and_link_them() {
        let data = PageData {
            bounds: Some(london()),
            ..page()
        };
        let mut controller = MapController::new(data, both());
        assert!(controller.take_placeholder_requests().is_empty());
        assert!(controller.is_synced());

        let side = controller.map(Pane::Side).unwrap();
        let main = controller.map(Pane::Main).unwrap();
        assert_eq!(side.center(), Some(london().center()));
        assert_eq!(main.center(), Some(london().center()));
        assert!(side.has_control("attribution"));
        assert!(!side.has_control("null-island"));

        let popup = main.popup().unwrap();
        assert_eq!(popup.latlng, london().center());
        assert!(!popup.options.close_on_click);
        assert!(!popup.options.close_button);
    }

    #[test]
    fn centroid_sets_view_at_given_zoom() {
        let center = LatLng::new(48.85, 2.35);
        let data = PageData {
            centroid: Some(center),
            zoom: 12,
            ..page()
        };
        let controller = MapController::new(data, both());
        for pane in [Pane::Side, Pane::Main] {
            let view = controller.map(pane).unwrap().view().unwrap();
            assert_eq!(view.center, center);
            assert_eq!(view.zoom, 12);
        }
        assert!(controller.is_synced());
    }

    #[test]
    fn main_pan_moves_side_center_but_not_its_zoom() {
        let data = PageData {
            bounds: Some(london()),
            ..page()
        };
        let mut controller = MapController::new(data, both());
        let side_zoom = controller.map(Pane::Side).unwrap().zoom();

        assert!(controller.handle_key(KeyEvent::from(KeyCode::Right)));
        assert!(controller.handle_key(KeyEvent::from(KeyCode::Char('+'))));

        let main = controller.map(Pane::Main).unwrap();
        let side = controller.map(Pane::Side).unwrap();
        assert_ne!(main.center(), Some(london().center()));
        assert_eq!(side.center(), main.center());
        assert_eq!(side.zoom(), side_zoom);
    }

    #[test]
    fn side_map_interaction_never_moves_main() {
        let data = PageData {
            bounds: Some(london()),
            ..page()
        };
        let mut controller = MapController::new(data, both());
        let before = controller.map(Pane::Main).unwrap().view();
        let scroll = MouseEvent {
            kind: crossterm::event::MouseEventKind::ScrollUp,
            column: 5,
            row: 5,
            modifiers: crossterm::event::KeyModifiers::NONE,
        };
        assert!(!controller.handle_mouse(scroll));
        let click = MouseEvent {
            kind: crossterm::event::MouseEventKind::Down(crossterm::event::MouseButton::Left),
            ..scroll
        };
        assert!(!controller.handle_mouse(click));
        assert_eq!(controller.map(Pane::Main).unwrap().view(), before);
    }

    #[test]
    fn placeholder_path_requests_fetches_and_labels_side_map() {
        let mut controller = MapController::new(page(), both());
        assert!(controller.map(Pane::Side).unwrap().view().is_none());
        assert!(controller.map(Pane::Main).unwrap().view().is_none());
        assert!(controller.map(Pane::Side).unwrap().has_control("null-island"));
        assert!(!controller.map(Pane::Main).unwrap().has_control("null-island"));
        assert!(!controller.is_synced());

        let requests = controller.take_placeholder_requests();
        let panes: Vec<Pane> = requests.iter().map(|r| r.pane).collect();
        assert_eq!(panes, vec![Pane::Side, Pane::Main]);
        assert!(requests.iter().all(|r| r.url == "assets/null-island.geojson"));
    }

    #[test]
    fn placeholder_zooms_past_fit_and_opens_popup() {
        let mut controller = MapController::new(page(), both());
        let bounds = island().bounds().unwrap();

        controller.on_placeholder_loaded(Pane::Side, island());
        controller.on_placeholder_loaded(Pane::Main, island());

        for pane in [Pane::Side, Pane::Main] {
            let map = controller.map(pane).unwrap();
            let expected = map
                .bounds_zoom(&bounds, true)
                .saturating_add(pane.placeholder_zoom_offset())
                .min(map.base().max_zoom);
            let view = map.view().unwrap();
            assert_eq!(view.center, bounds.center());
            assert_eq!(view.zoom, expected);
            assert_eq!(map.layers().len(), 1);
        }
        assert_eq!(
            controller.map(Pane::Side).unwrap().layers()[0].style,
            PathStyle::highlight()
        );
        assert!(controller.map(Pane::Main).unwrap().popup().is_some());
    }

    #[test]
    fn placeholder_path_does_not_link_maps() {
        let mut controller = MapController::new(page(), both());
        controller.on_placeholder_loaded(Pane::Side, island());
        controller.on_placeholder_loaded(Pane::Main, island());
        let side_before = controller.map(Pane::Side).unwrap().view();

        controller.handle_key(KeyEvent::from(KeyCode::Left));
        controller.handle_key(KeyEvent::from(KeyCode::Char('-')));

        assert_ne!(controller.map(Pane::Main).unwrap().view(), side_before);
        assert_eq!(controller.map(Pane::Side).unwrap().view(), side_before);
        assert!(!controller.is_synced());
    }

    #[test]
    fn failed_placeholder_leaves_map_unpositioned() {
        let mut controller = MapController::new(page(), both());
        controller.on_placeholder_failed(Pane::Main, "connection refused");
        assert!(controller.map(Pane::Main).unwrap().view().is_none());
        assert!(controller.map(Pane::Main).unwrap().popup().is_none());
    }

    #[test]
    fn missing_container_skips_map_and_sync() {
        let data = PageData {
            centroid: Some(LatLng::new(1.0, 2.0)),
            ..page()
        };
        let areas = PaneAreas {
            side: None,
            main: Some(Rect::new(0, 0, 80, 40)),
        };
        let mut controller = MapController::new(data, areas);
        assert!(controller.map(Pane::Side).is_none());
        assert!(!controller.is_synced());
        assert!(controller.handle_key(KeyEvent::from(KeyCode::Up)));
        assert!(controller.map(Pane::Main).unwrap().popup().is_some());
    }

    #[test]
    fn resize_keeps_view() {
        let data = PageData {
            bounds: Some(london()),
            ..page()
        };
        let mut controller = MapController::new(data, both());
        let before = controller.map(Pane::Main).unwrap().view();
        controller.set_areas(PaneAreas {
            side: Some(Rect::new(0, 0, 20, 20)),
            main: Some(Rect::new(20, 0, 60, 20)),
        });
        let main = controller.map(Pane::Main).unwrap();
        assert_eq!(main.area(), Rect::new(20, 0, 60, 20));
        assert_eq!(main.view(), before);
    }
}
