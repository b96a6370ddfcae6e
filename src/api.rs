use crate::models::GeoShape;
use color_eyre::Result;
use reqwest::Client;
use std::path::Path;

/// Loads GeoJSON resources from the network or from disk.
pub struct ResourceProvider {
    client: Client,
}

impl ResourceProvider {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()?,
        })
    }

    /// `location` is either an http(s) URL or a path on disk.
    pub async fn fetch_geojson(&self, location: &str) -> Result<GeoShape> {
        let body = if is_remote(location) {
            self.client
                .get(location)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?
        } else {
            tokio::fs::read_to_string(Path::new(location)).await?
        };

        Ok(GeoShape::parse(&body)?)
    }
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LatLng;

    #[test]
    fn only_http_locations_are_remote() {
        assert!(is_remote("https://woeplanet.org/static/geojson/null-island.geojson"));
        assert!(is_remote("http://localhost:8000/null-island.geojson"));
        assert!(!is_remote("assets/null-island.geojson"));
        assert!(!is_remote("/srv/static/geojson/null-island.geojson"));
    }

    #[tokio::test]
    async fn reads_local_geojson() {
        let provider = ResourceProvider::new().unwrap();
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/null-island.geojson");
        let shape = provider.fetch_geojson(path).await.unwrap();
        assert!(shape.bounds().unwrap().contains(LatLng::NULL_ISLAND));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let provider = ResourceProvider::new().unwrap();
        assert!(provider
            .fetch_geojson("/nonexistent/null-island.geojson")
            .await
            .is_err());
    }
}
