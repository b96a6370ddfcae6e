use crate::config::Config;
use crate::controller::{MapController, Pane};
use crate::events::Event;
use crate::location::{self, Geolocator, LocationPrompt, Navigator, PageLocation, ParamNames};
use crate::models::{Position, PositionError};
use crate::ui;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::Rect;
use reqwest::Url;
use tracing::{debug, info};

/// Background work the main loop should start for the current page.
#[derive(Debug, Clone)]
pub enum Task {
    FetchPlaceholder {
        generation: u64,
        pane: Pane,
        url: String,
    },
    Geolocate {
        generation: u64,
        geolocator: Geolocator,
    },
}

pub struct App {
    pub config: Config,
    pub page: PageLocation,
    pub controller: MapController,
    /// Present when the page shows the location prompt.
    pub prompt: Option<LocationPrompt>,
    pub tick_count: usize,
    pub should_quit: bool,

    geolocator: Option<Geolocator>,
    area: Rect,
    generation: u64,
    tasks: Vec<Task>,
}

impl App {
    pub fn new(config: Config, url: Url, area: Rect, geolocator: Option<Geolocator>) -> Self {
        let page = PageLocation::new(url);
        let controller = build_controller(&config, &page, area);
        let mut app = Self {
            config,
            page,
            controller,
            prompt: None,
            tick_count: 0,
            should_quit: false,
            geolocator,
            area,
            generation: 0,
            tasks: Vec::new(),
        };
        app.start_page();
        app
    }

    /// Page-load work: queue placeholder fetches and, when the URL has no
    /// coordinates, the location prompt.
    fn start_page(&mut self) {
        let generation = self.generation;
        for request in self.controller.take_placeholder_requests() {
            self.tasks.push(Task::FetchPlaceholder {
                generation,
                pane: request.pane,
                url: request.url,
            });
        }

        self.prompt = None;
        let names = ParamNames::from(&self.config.location);
        if !self.config.location.enabled || !location::should_prompt(self.page.href(), &names) {
            return;
        }
        self.prompt = Some(LocationPrompt::new(names));
        match &self.geolocator {
            Some(geolocator) => self.tasks.push(Task::Geolocate {
                generation,
                geolocator: geolocator.clone(),
            }),
            None => info!("No geolocation service available"),
        }
    }

    fn reload(&mut self) {
        self.generation += 1;
        info!("Loading {}", self.page.href());
        self.controller = build_controller(&self.config, &self.page, self.area);
        self.start_page();
    }

    pub fn take_tasks(&mut self) -> Vec<Task> {
        std::mem::take(&mut self.tasks)
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Tick => self.tick_count += 1,
            Event::Input(key) => self.handle_key(key),
            Event::Mouse(mouse) => {
                self.controller.handle_mouse(mouse);
            }
            Event::Resize(cols, rows) => self.on_resize(Rect::new(0, 0, cols, rows)),
            Event::PlaceholderLoaded {
                generation,
                pane,
                result,
            } if generation == self.generation => match result {
                Ok(shape) => self.controller.on_placeholder_loaded(pane, shape),
                Err(e) => self.controller.on_placeholder_failed(pane, &e),
            },
            Event::Geolocated { generation, result } if generation == self.generation => {
                self.on_geolocated(result)
            }
            stale => debug!("Dropping result for an earlier page: {:?}", stale),
        }

        if self.page.take_reload() {
            self.reload();
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            _ => {
                self.controller.handle_key(key);
            }
        }
    }

    fn on_geolocated(&mut self, result: Result<Position, PositionError>) {
        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };
        match result {
            Ok(position) => prompt.on_success(position, &mut self.page),
            Err(e) => prompt.on_error(e),
        }
    }

    pub fn on_resize(&mut self, area: Rect) {
        self.area = area;
        self.controller
            .set_areas(ui::pane_areas(area, &self.config.maps));
    }
}

fn build_controller(config: &Config, page: &PageLocation, area: Rect) -> MapController {
    let names = ParamNames::from(&config.location);
    let coords = location::coordinates(page.href(), &names);
    let data = config.page.page_data(coords);
    MapController::new(data, ui::pane_areas(area, &config.maps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocationConfig;
    use crate::models::{GeoShape, LatLng};

    const AREA: Rect = Rect {
        x: 0,
        y: 0,
        width: 120,
        height: 40,
    };

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn geolocator() -> Option<Geolocator> {
        Geolocator::from_config(&LocationConfig::default())
    }

    fn generation_of(task: &Task) -> u64 {
        match task {
            Task::FetchPlaceholder { generation, .. } | Task::Geolocate { generation, .. } => {
                *generation
            }
        }
    }

    #[test]
    fn page_without_coordinates_queues_placeholders_and_geolocation() {
        let mut app = App::new(
            Config::default(),
            url("https://woeplanet.org/nearby/"),
            AREA,
            geolocator(),
        );
        let tasks = app.take_tasks();
        assert_eq!(tasks.len(), 3);
        assert!(matches!(tasks[0], Task::FetchPlaceholder { pane: Pane::Side, .. }));
        assert!(matches!(tasks[1], Task::FetchPlaceholder { pane: Pane::Main, .. }));
        assert!(matches!(tasks[2], Task::Geolocate { .. }));
        assert!(app.prompt.as_ref().unwrap().panels.asking);
    }

    #[test]
    fn coordinates_in_url_skip_prompt() {
        let mut app = App::new(
            Config::default(),
            url("https://woeplanet.org/nearby/?lat=1&lng=2"),
            AREA,
            geolocator(),
        );
        assert!(app.take_tasks().is_empty());
        assert!(app.prompt.is_none());
        let main = app.controller.map(Pane::Main).unwrap();
        assert_eq!(main.center(), Some(LatLng::new(1.0, 2.0)));
        assert!(app.controller.is_synced());
    }

    #[test]
    fn missing_service_shows_prompt_without_lookup() {
        let mut app = App::new(
            Config::default(),
            url("https://woeplanet.org/nearby/"),
            AREA,
            None,
        );
        let tasks = app.take_tasks();
        assert!(tasks.iter().all(|t| matches!(t, Task::FetchPlaceholder { .. })));
        assert!(app.prompt.is_some());
    }

    #[test]
    fn disabled_prompt_never_asks() {
        let mut config = Config::default();
        config.location.enabled = false;
        let mut app = App::new(config, url("https://woeplanet.org/nearby/"), AREA, geolocator());
        assert!(app
            .take_tasks()
            .iter()
            .all(|t| matches!(t, Task::FetchPlaceholder { .. })));
        assert!(app.prompt.is_none());
    }

    #[test]
    fn geolocation_success_reloads_page_around_fix() {
        let mut app = App::new(
            Config::default(),
            url("https://woeplanet.org/nearby/"),
            AREA,
            geolocator(),
        );
        app.take_tasks();
        app.handle_event(Event::Geolocated {
            generation: 0,
            result: Ok(Position {
                latitude: 10.0,
                longitude: 20.0,
            }),
        });

        assert_eq!(app.page.href().as_str(), "https://woeplanet.org/nearby/?lat=10&lng=20");
        assert!(app.prompt.is_none());
        assert!(app.take_tasks().is_empty());
        let main = app.controller.map(Pane::Main).unwrap();
        assert_eq!(main.center(), Some(LatLng::new(10.0, 20.0)));
    }

    #[test]
    fn geolocation_error_updates_panels() {
        let mut app = App::new(
            Config::default(),
            url("https://woeplanet.org/nearby/"),
            AREA,
            geolocator(),
        );
        app.handle_event(Event::Geolocated {
            generation: 0,
            result: Err(PositionError {
                code: 1,
                message: "User denied Geolocation".into(),
            }),
        });
        let panels = &app.prompt.as_ref().unwrap().panels;
        assert_eq!(panels.status, "1 :User denied Geolocation");
        assert!(panels.error);
        assert!(!panels.asking);
        assert_eq!(app.page.href().as_str(), "https://woeplanet.org/nearby/");
    }

    #[test]
    fn results_for_earlier_pages_are_dropped() {
        let mut app = App::new(
            Config::default(),
            url("https://woeplanet.org/nearby/"),
            AREA,
            geolocator(),
        );
        let first = app.take_tasks();
        assert!(first.iter().all(|t| generation_of(t) == 0));

        app.page.replace(url("https://woeplanet.org/nearby/?lat=5&lng=5"));
        app.handle_event(Event::Tick);
        let island = GeoShape::parse(include_str!("../assets/null-island.geojson")).unwrap();
        app.handle_event(Event::PlaceholderLoaded {
            generation: 0,
            pane: Pane::Main,
            result: Ok(island),
        });
        let main = app.controller.map(Pane::Main).unwrap();
        assert!(main.layers().is_empty());
        assert_eq!(main.center(), Some(LatLng::new(5.0, 5.0)));
    }

    #[test]
    fn placeholder_result_positions_map() {
        let mut app = App::new(
            Config::default(),
            url("https://woeplanet.org/nearby/"),
            AREA,
            None,
        );
        let island = GeoShape::parse(include_str!("../assets/null-island.geojson")).unwrap();
        app.handle_event(Event::PlaceholderLoaded {
            generation: 0,
            pane: Pane::Side,
            result: Ok(island),
        });
        app.handle_event(Event::PlaceholderLoaded {
            generation: 0,
            pane: Pane::Main,
            result: Err("connection refused".into()),
        });
        assert!(app.controller.map(Pane::Side).unwrap().view().is_some());
        assert!(app.controller.map(Pane::Main).unwrap().view().is_none());
    }

    #[test]
    fn quit_keys() {
        let mut app = App::new(
            Config::default(),
            url("https://woeplanet.org/nearby/?lat=1&lng=2"),
            AREA,
            None,
        );
        app.handle_key(KeyEvent::from(KeyCode::Right));
        assert!(!app.should_quit);
        app.handle_key(KeyEvent::from(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn resize_rebinds_maps() {
        let mut app = App::new(
            Config::default(),
            url("https://woeplanet.org/nearby/?lat=1&lng=2"),
            AREA,
            None,
        );
        app.handle_event(Event::Resize(60, 20));
        let side = app.controller.map(Pane::Side).unwrap().area();
        let main = app.controller.map(Pane::Main).unwrap().area();
        assert_eq!(side.height, 19);
        assert_eq!(side.width + main.width, 60);
    }
}
