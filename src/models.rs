//! Geographic value types shared by the maps, the controller and the
//! geolocation prompt.
//!
//! Coordinates serialize the way page data is usually written by hand:
//! a point is `[lat, lng]` and a rectangle is `[[lat, lng], [lat, lng]]`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// A point in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const NULL_ISLAND: LatLng = LatLng { lat: 0.0, lng: 0.0 };

    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<[f64; 2]> for LatLng {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Self { lat, lng }
    }
}

impl From<LatLng> for [f64; 2] {
    fn from(p: LatLng) -> Self {
        [p.lat, p.lng]
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lng)
    }
}

/// A geographic rectangle. Always normalized so that `south_west` holds the
/// minimum of both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn new(a: LatLng, b: LatLng) -> Self {
        Self {
            south_west: LatLng::new(a.lat.min(b.lat), a.lng.min(b.lng)),
            north_east: LatLng::new(a.lat.max(b.lat), a.lng.max(b.lng)),
        }
    }

    /// Smallest rectangle holding every point, or `None` for no points.
    pub fn from_points<I: IntoIterator<Item = LatLng>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self::new(first, first);
        for p in iter {
            bounds.extend(p);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, p: LatLng) {
        self.south_west.lat = self.south_west.lat.min(p.lat);
        self.south_west.lng = self.south_west.lng.min(p.lng);
        self.north_east.lat = self.north_east.lat.max(p.lat);
        self.north_east.lng = self.north_east.lng.max(p.lng);
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.north_east.lng - self.south_west.lng
    }

    pub fn height(&self) -> f64 {
        self.north_east.lat - self.south_west.lat
    }

    pub fn contains(&self, p: LatLng) -> bool {
        p.lat >= self.south_west.lat
            && p.lat <= self.north_east.lat
            && p.lng >= self.south_west.lng
            && p.lng <= self.north_east.lng
    }

    pub fn west(&self) -> f64 {
        self.south_west.lng
    }

    pub fn east(&self) -> f64 {
        self.north_east.lng
    }

    pub fn south(&self) -> f64 {
        self.south_west.lat
    }

    pub fn north(&self) -> f64 {
        self.north_east.lat
    }
}

impl Serialize for LatLngBounds {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [<[f64; 2]>::from(self.south_west), <[f64; 2]>::from(self.north_east)].serialize(serializer)
    }
}

/// Reads a list of corner points. An empty list means "no bounds", matching
/// pages that emit `[]` when a place has no geometry.
pub fn deserialize_optional_bounds<'de, D>(deserializer: D) -> Result<Option<LatLngBounds>, D::Error>
where
    D: Deserializer<'de>,
{
    let points: Option<Vec<[f64; 2]>> = Option::deserialize(deserializer)?;
    Ok(points.and_then(|pts| LatLngBounds::from_points(pts.into_iter().map(LatLng::from))))
}

/// A fix reported by a geolocation service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// Failure of a geolocation request. Codes follow the browser geolocation
/// API so the status line reads the same as on the web.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code} :{message}")]
pub struct PositionError {
    pub code: u16,
    pub message: String,
}

impl PositionError {
    pub const PERMISSION_DENIED: u16 = 1;
    pub const POSITION_UNAVAILABLE: u16 = 2;
    pub const TIMEOUT: u16 = 3;

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            code: Self::POSITION_UNAVAILABLE,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            code: Self::TIMEOUT,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GeoJsonError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported GeoJSON type: {0}")]
    UnsupportedType(String),
    #[error("malformed coordinates in {0}")]
    Coordinates(&'static str),
}

/// Flattened GeoJSON geometry: every line or polygon ring becomes a path,
/// every point stays a point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoShape {
    pub paths: Vec<Vec<LatLng>>,
    pub points: Vec<LatLng>,
}

impl GeoShape {
    /// Parses a GeoJSON document (geometry, Feature or FeatureCollection).
    pub fn parse(json: &str) -> Result<Self, GeoJsonError> {
        let v: serde_json::Value = serde_json::from_str(json)?;
        let mut shape = GeoShape::default();
        shape.collect(&v)?;
        Ok(shape)
    }

    pub fn bounds(&self) -> Option<LatLngBounds> {
        LatLngBounds::from_points(
            self.paths
                .iter()
                .flatten()
                .chain(self.points.iter())
                .copied(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.points.is_empty()
    }

    fn collect(&mut self, v: &serde_json::Value) -> Result<(), GeoJsonError> {
        let kind = v["type"].as_str().unwrap_or_default();
        let coords = &v["coordinates"];
        match kind {
            "FeatureCollection" => {
                for feature in v["features"].as_array().into_iter().flatten() {
                    self.collect(feature)?;
                }
            }
            "Feature" => {
                // Features with a null geometry are legal and carry nothing to draw.
                if !v["geometry"].is_null() {
                    self.collect(&v["geometry"])?;
                }
            }
            "GeometryCollection" => {
                for geometry in v["geometries"].as_array().into_iter().flatten() {
                    self.collect(geometry)?;
                }
            }
            "Point" => self.points.push(position(coords).ok_or(GeoJsonError::Coordinates("Point"))?),
            "MultiPoint" => {
                let pts = line(coords).ok_or(GeoJsonError::Coordinates("MultiPoint"))?;
                self.points.extend(pts);
            }
            "LineString" => self
                .paths
                .push(line(coords).ok_or(GeoJsonError::Coordinates("LineString"))?),
            "MultiLineString" | "Polygon" => {
                let rings = coords
                    .as_array()
                    .ok_or(GeoJsonError::Coordinates("MultiLineString"))?;
                for ring in rings {
                    self.paths
                        .push(line(ring).ok_or(GeoJsonError::Coordinates("Polygon"))?);
                }
            }
            "MultiPolygon" => {
                let polygons = coords
                    .as_array()
                    .ok_or(GeoJsonError::Coordinates("MultiPolygon"))?;
                for ring in polygons.iter().filter_map(|p| p.as_array()).flatten() {
                    self.paths
                        .push(line(ring).ok_or(GeoJsonError::Coordinates("MultiPolygon"))?);
                }
            }
            other => return Err(GeoJsonError::UnsupportedType(other.to_string())),
        }
        Ok(())
    }
}

// GeoJSON positions are [lng, lat].
fn position(v: &serde_json::Value) -> Option<LatLng> {
    let a = v.as_array()?;
    Some(LatLng::new(a.get(1)?.as_f64()?, a.first()?.as_f64()?))
}

fn line(v: &serde_json::Value) -> Option<Vec<LatLng>> {
    v.as_array()?.iter().map(position).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_normalize_corners() {
        let b = LatLngBounds::new(LatLng::new(10.0, 20.0), LatLng::new(-10.0, -20.0));
        assert_eq!(b.south_west, LatLng::new(-10.0, -20.0));
        assert_eq!(b.north_east, LatLng::new(10.0, 20.0));
        assert_eq!(b.center(), LatLng::NULL_ISLAND);
        assert!(b.contains(LatLng::new(5.0, 5.0)));
        assert!(!b.contains(LatLng::new(11.0, 5.0)));
    }

    #[test]
    fn empty_bounds_list_is_none() {
        #[derive(Deserialize)]
        struct Page {
            #[serde(default, deserialize_with = "deserialize_optional_bounds")]
            bounds: Option<LatLngBounds>,
        }

        let page: Page = toml::from_str("bounds = []").unwrap();
        assert!(page.bounds.is_none());

        let page: Page = toml::from_str("").unwrap();
        assert!(page.bounds.is_none());

        let page: Page = toml::from_str("bounds = [[51.28, -0.51], [51.69, 0.33]]").unwrap();
        let bounds = page.bounds.unwrap();
        assert_eq!(bounds.south_west, LatLng::new(51.28, -0.51));
        assert_eq!(bounds.north_east, LatLng::new(51.69, 0.33));
    }

    #[test]
    fn parses_feature_collection_with_polygon_and_point() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {}, "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-1.0, -2.0], [1.0, -2.0], [1.0, 2.0], [-1.0, 2.0], [-1.0, -2.0]]]
                }},
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [3.0, 4.0]}},
                {"type": "Feature", "properties": {}, "geometry": null}
            ]
        }"#;
        let shape = GeoShape::parse(json).unwrap();
        assert_eq!(shape.paths.len(), 1);
        assert_eq!(shape.paths[0][1], LatLng::new(-2.0, 1.0));
        assert_eq!(shape.points, vec![LatLng::new(4.0, 3.0)]);

        let bounds = shape.bounds().unwrap();
        assert_eq!(bounds.south_west, LatLng::new(-2.0, -1.0));
        assert_eq!(bounds.north_east, LatLng::new(4.0, 3.0));
    }

    #[test]
    fn rejects_unknown_geometry() {
        let err = GeoShape::parse(r#"{"type": "Circle", "coordinates": [0, 0]}"#).unwrap_err();
        assert!(matches!(err, GeoJsonError::UnsupportedType(t) if t == "Circle"));
    }

    #[test]
    fn bundled_null_island_has_bounds_around_origin() {
        let shape = GeoShape::parse(include_str!("../assets/null-island.geojson")).unwrap();
        let bounds = shape.bounds().unwrap();
        assert!(bounds.contains(LatLng::NULL_ISLAND));
    }

    #[test]
    fn position_error_formats_like_status_line() {
        let err = PositionError {
            code: PositionError::PERMISSION_DENIED,
            message: "User denied Geolocation".into(),
        };
        assert_eq!(err.to_string(), "1 :User denied Geolocation");
    }
}
