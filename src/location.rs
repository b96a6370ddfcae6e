//! Asking the visitor where they are.
//!
//! When a page carries the location prompt and its URL has no coordinates,
//! the application asks a [`Geolocator`] for a fix. A fix "redirects" the
//! page: the coordinates are appended to the URL's query and the page
//! location is replaced, which reloads the page around that point. A failure
//! is shown in the status panel and nothing else happens.

use crate::config::LocationConfig;
use crate::models::{LatLng, Position, PositionError};
use ipgeolocate::{Locator, Service};
use reqwest::Url;
use std::time::Duration;
use tracing::{error, info, warn};

/// Names of the query parameters carrying coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamNames {
    pub lat: String,
    pub lng: String,
}

impl Default for ParamNames {
    fn default() -> Self {
        Self {
            lat: "lat".to_string(),
            lng: "lng".to_string(),
        }
    }
}

impl From<&LocationConfig> for ParamNames {
    fn from(config: &LocationConfig) -> Self {
        Self {
            lat: config.lat_param.clone(),
            lng: config.lng_param.clone(),
        }
    }
}

/// Value of the first `name` parameter in the query: `None` when absent,
/// an empty string when present without a value, otherwise the decoded value.
pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// True when neither coordinate parameter carries a value.
pub fn should_prompt(url: &Url, names: &ParamNames) -> bool {
    let has = |name: &str| query_param(url, name).is_some_and(|v| !v.is_empty());
    !has(&names.lat) && !has(&names.lng)
}

/// Coordinates carried by the URL, if both parse.
pub fn coordinates(url: &Url, names: &ParamNames) -> Option<LatLng> {
    let lat = query_param(url, &names.lat)?.trim().parse::<f64>().ok()?;
    let lng = query_param(url, &names.lng)?.trim().parse::<f64>().ok()?;
    Some(LatLng::new(lat, lng))
}

/// The current URL with the fix appended to its query.
pub fn redirect_url(url: &Url, names: &ParamNames, position: &Position) -> Url {
    let mut target = url.clone();
    target
        .query_pairs_mut()
        .append_pair(&names.lat, &position.latitude.to_string())
        .append_pair(&names.lng, &position.longitude.to_string());
    target
}

/// Something that owns the page URL and can replace it.
pub trait Navigator {
    fn href(&self) -> &Url;

    /// Moves to `url` without keeping the current page in history.
    fn replace(&mut self, url: Url);
}

/// The page URL of the running application. A replacement is picked up by
/// the application loop, which reloads the page.
#[derive(Debug, Clone)]
pub struct PageLocation {
    url: Url,
    reload: bool,
}

impl PageLocation {
    pub fn new(url: Url) -> Self {
        Self { url, reload: false }
    }

    /// Whether the URL was replaced since the last call.
    pub fn take_reload(&mut self) -> bool {
        std::mem::take(&mut self.reload)
    }
}

impl Navigator for PageLocation {
    fn href(&self) -> &Url {
        &self.url
    }

    fn replace(&mut self, url: Url) {
        info!("Navigating to {}", url);
        self.url = url;
        self.reload = true;
    }
}

/// Visibility of the prompt's three panels and the status text. The page
/// starts with only "asking" visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationPanels {
    pub asking: bool,
    pub success: bool,
    pub error: bool,
    pub status: String,
}

impl Default for LocationPanels {
    fn default() -> Self {
        Self {
            asking: true,
            success: false,
            error: false,
            status: String::new(),
        }
    }
}

/// State of the location prompt on one page load.
#[derive(Debug, Clone, Default)]
pub struct LocationPrompt {
    pub panels: LocationPanels,
    names: ParamNames,
}

impl LocationPrompt {
    pub fn new(names: ParamNames) -> Self {
        Self {
            panels: LocationPanels::default(),
            names,
        }
    }

    pub fn names(&self) -> &ParamNames {
        &self.names
    }

    pub fn on_success<N: Navigator>(&mut self, position: Position, navigator: &mut N) {
        self.panels.asking = !self.panels.asking;
        self.panels.success = !self.panels.success;
        let target = redirect_url(navigator.href(), &self.names, &position);
        navigator.replace(target);
    }

    pub fn on_error(&mut self, error: PositionError) {
        warn!("Geolocation request failed: {}", error);
        self.panels.status = format!("{} :{}", error.code, error.message);
        self.panels.asking = !self.panels.asking;
        self.panels.error = !self.panels.error;
    }
}

/// IP based geolocation.
#[derive(Debug, Clone)]
pub struct Geolocator {
    service: String,
    ip: String,
    timeout: Duration,
}

impl Geolocator {
    /// Returns `None` when geolocation is switched off or the service name is
    /// unknown.
    pub fn from_config(config: &LocationConfig) -> Option<Self> {
        let service = config.service.trim().to_ascii_lowercase();
        if service_for(&service).is_none() {
            if service != "none" {
                error!("Unknown geolocation service '{}'", config.service);
            }
            return None;
        }
        Some(Self {
            service,
            ip: config.ip.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        })
    }

    pub async fn current_position(&self) -> Result<Position, PositionError> {
        let service = service_for(&self.service)
            .ok_or_else(|| PositionError::unavailable(format!("unknown service {}", self.service)))?;

        let loc = match tokio::time::timeout(self.timeout, Locator::get(&self.ip, service)).await {
            Ok(Ok(loc)) => loc,
            Ok(Err(e)) => return Err(PositionError::unavailable(e.to_string())),
            Err(_) => return Err(PositionError::timeout("Timeout expired")),
        };

        let position = parse_position(&loc.latitude, &loc.longitude)?;
        info!(
            "Geolocation successful - ({}, {})",
            position.latitude, position.longitude
        );
        Ok(position)
    }
}

/// Services report coordinates as strings.
fn parse_position(latitude: &str, longitude: &str) -> Result<Position, PositionError> {
    match (latitude.trim().parse::<f64>(), longitude.trim().parse::<f64>()) {
        (Ok(latitude), Ok(longitude)) => Ok(Position {
            latitude,
            longitude,
        }),
        _ => Err(PositionError::unavailable(format!(
            "unreadable coordinates ({}, {})",
            latitude, longitude
        ))),
    }
}

fn service_for(name: &str) -> Option<Service> {
    match name {
        "ipapi" => Some(Service::IpApi),
        "ipapico" => Some(Service::IpApiCo),
        "ipwhois" => Some(Service::IpWhois),
        "freegeoip" => Some(Service::FreeGeoIp),
        _ => None,
    }
}
