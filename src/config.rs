use crate::controller::PageData;
use crate::models::{deserialize_optional_bounds, LatLng, LatLngBounds};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub page: PageConfig,
    pub location: LocationConfig,
    pub maps: MapsConfig,
}

/// What the page knows about the place it shows.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PageConfig {
    pub url: String,
    pub credits_url: String,
    pub nullisland_url: String, // http(s) URL or local path
    #[serde(
        deserialize_with = "deserialize_optional_bounds",
        skip_serializing_if = "Option::is_none"
    )]
    pub bounds: Option<LatLngBounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub centroid: Option<LatLng>,
    pub zoom: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placetype: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LocationConfig {
    pub enabled: bool,   // Page carries the location prompt
    pub lat_param: String,
    pub lng_param: String,
    pub service: String, // "ipapi", "ipapico", "ipwhois", "freegeoip" or "none"
    pub ip: String,      // Empty string looks up the caller's own address
    pub timeout_seconds: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MapsConfig {
    pub side: bool,
    pub main: bool,
    pub side_width_percent: u16,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            url: "https://woeplanet.org/nearby/".to_string(),
            credits_url: "https://woeplanet.org/credits/".to_string(),
            nullisland_url: "assets/null-island.geojson".to_string(),
            bounds: None,
            centroid: None,
            zoom: 10,
            popup: None,
            scale: None,
            placetype: None,
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lat_param: "lat".to_string(),
            lng_param: "lng".to_string(),
            service: "ipapi".to_string(),
            ip: String::new(),
            timeout_seconds: 10,
        }
    }
}

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            side: true,
            main: true,
            side_width_percent: 30,
        }
    }
}

impl PageConfig {
    /// Page data for one page load. Coordinates carried by the page URL
    /// describe the place being asked about and replace configured geometry.
    pub fn page_data(&self, url_coords: Option<LatLng>) -> PageData {
        let (bounds, centroid) = match url_coords {
            Some(point) => (None, Some(point)),
            None => (self.bounds, self.centroid),
        };
        PageData {
            bounds,
            centroid,
            zoom: self.zoom,
            popup: self.popup.clone(),
            credits_url: self.credits_url.clone(),
            nullisland_url: self.nullisland_url.clone(),
            scale: self.scale,
            placetype: self.placetype.clone(),
        }
    }
}

impl Config {
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Loads the config file at `path`.
    /// If it doesn't exist, creates a default one.
    pub fn load(path: &Path) -> Self {
        if let Ok(content) = fs::read_to_string(path) {
            match Self::parse(&content) {
                Ok(config) => return config,
                Err(e) => {
                    warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    return Self::default();
                }
            }
        }

        let default_config = Self::default();

        // Save default config to disk for the user to edit later
        match toml::to_string_pretty(&default_config) {
            Ok(toml_string) => {
                if fs::write(path, toml_string).is_err() {
                    warn!("Could not write default {} to disk.", path.display());
                }
            }
            Err(e) => warn!("Could not serialize default config: {}", e),
        }

        info!("Loaded default configuration.");
        default_config
    }
}
