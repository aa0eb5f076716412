//! OpenStreetMap trail and boundary collection via the Overpass API.
//!
//! Two query shapes per resort:
//! 1. the resort polygon — `landuse=winter_sports` areas, tried with
//!    name-match strategies in concentric fallbacks (exact name, then
//!    case-insensitive regex over a wider box, then the nearest polygon
//!    inside the trail box)
//! 2. every `piste:type` way/relation within a 5 km box around the center
//!
//! Overpass is slow; queries carry a 180 s server-side timeout and the HTTP
//! timeout sits above that.

use serde::Serialize;
use serde_json::Value;

use crate::config::ResortDescriptor;
use crate::errors::CollectError;
use crate::helpers::{haversine_km, round2};
use crate::services::fetcher::{FetchOptions, HttpFetcher};

const OVERPASS_API_URL: &str = "https://overpass-api.de/api/interpreter";

/// Search radius for piste geometry (km).
const TRAIL_SEARCH_RADIUS_KM: f64 = 5.0;
/// Server-side Overpass timeout (seconds).
const OVERPASS_QL_TIMEOUT_SECS: u32 = 180;
/// HTTP timeout; must exceed the QL timeout.
const OVERPASS_HTTP_TIMEOUT_SECS: u64 = 200;

/// Half-widths (degrees) of the boundary-search boxes, narrow to wide.
const BOUNDARY_BBOX_EXACT_DEG: f64 = 0.3;
const BOUNDARY_BBOX_REGEX_DEG: f64 = 0.6;

/// One trail extracted from OSM.
#[derive(Debug, Clone, Serialize)]
pub struct TrailRecord {
    pub osm_id: String,
    pub osm_type: String,
    pub name: String,
    pub difficulty: String,
    pub piste_type: String,
    /// Ordered [lon, lat] polyline.
    pub geometry: Vec<[f64; 2]>,
    pub length_meters: f64,
    pub lit: Option<bool>,
    pub grooming: Option<String>,
    pub width: Option<String>,
    #[serde(rename = "ref")]
    pub trail_ref: Option<String>,
}

/// Result of one trail collection pass.
#[derive(Debug, Clone)]
pub struct TrailCollection {
    /// Resort boundary ring as [lon, lat] pairs, when a polygon was found.
    pub boundary: Option<Vec<[f64; 2]>>,
    pub trails: Vec<TrailRecord>,
}

/// Client for the Overpass interpreter.
#[derive(Debug, Clone)]
pub struct OverpassClient {
    fetcher: HttpFetcher,
    base_url: String,
}

impl OverpassClient {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self {
            fetcher,
            base_url: OVERPASS_API_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    fn options() -> FetchOptions {
        FetchOptions {
            timeout: std::time::Duration::from_secs(OVERPASS_HTTP_TIMEOUT_SECS),
            ..FetchOptions::default()
        }
    }

    async fn run_query(&self, query: &str) -> Result<Value, CollectError> {
        let response = self
            .fetcher
            .post_form(&self.base_url, &[("data", query)], &Self::options())
            .await?;
        response.json()
    }

    /// Collect the boundary polygon and all piste geometry for a resort.
    /// A missing boundary degrades the result; missing piste data fails it.
    pub async fn collect(&self, resort: &ResortDescriptor) -> Result<TrailCollection, CollectError> {
        let boundary = match self.collect_boundary(resort).await {
            Ok(boundary) => boundary,
            Err(e) => {
                tracing::warn!(resort = %resort.name, "Boundary lookup failed: {e}");
                None
            }
        };

        let bbox = bbox_around(resort.lat, resort.lon, TRAIL_SEARCH_RADIUS_KM);
        let query = format!(
            "[out:json][timeout:{OVERPASS_QL_TIMEOUT_SECS}];\n\
             (\n  way[\"piste:type\"]{bbox};\n  relation[\"piste:type\"]{bbox};\n);\n\
             out geom;"
        );

        tracing::debug!(resort = %resort.name, "Querying piste geometry ({TRAIL_SEARCH_RADIUS_KM} km box)");
        let data = self.run_query(&query).await?;
        let elements = data
            .get("elements")
            .and_then(|e| e.as_array())
            .ok_or_else(|| CollectError::NoData {
                url: self.base_url.clone(),
            })?;

        let trails = process_trails(elements);
        tracing::info!(resort = %resort.name, "Found {} trails", trails.len());

        Ok(TrailCollection { boundary, trails })
    }

    /// Try the boundary strategies in order until one yields a polygon.
    async fn collect_boundary(
        &self,
        resort: &ResortDescriptor,
    ) -> Result<Option<Vec<[f64; 2]>>, CollectError> {
        let name = escape_ql(&resort.name);

        let exact_bbox = bbox_degrees(resort.lat, resort.lon, BOUNDARY_BBOX_EXACT_DEG);
        let regex_bbox = bbox_degrees(resort.lat, resort.lon, BOUNDARY_BBOX_REGEX_DEG);
        let area_bbox = bbox_around(resort.lat, resort.lon, TRAIL_SEARCH_RADIUS_KM);

        let strategies = [
            format!(
                "[out:json][timeout:{OVERPASS_QL_TIMEOUT_SECS}];\n\
                 (\n  way[\"landuse\"=\"winter_sports\"][\"name\"=\"{name}\"]{exact_bbox};\n\
                   relation[\"landuse\"=\"winter_sports\"][\"name\"=\"{name}\"]{exact_bbox};\n);\n\
                 out geom;"
            ),
            format!(
                "[out:json][timeout:{OVERPASS_QL_TIMEOUT_SECS}];\n\
                 (\n  way[\"landuse\"=\"winter_sports\"][\"name\"~\"{name}\",i]{regex_bbox};\n\
                   relation[\"landuse\"=\"winter_sports\"][\"name\"~\"{name}\",i]{regex_bbox};\n);\n\
                 out geom;"
            ),
            format!(
                "[out:json][timeout:{OVERPASS_QL_TIMEOUT_SECS}];\n\
                 (\n  way[\"landuse\"=\"winter_sports\"]{area_bbox};\n\
                   relation[\"landuse\"=\"winter_sports\"]{area_bbox};\n);\n\
                 out geom;"
            ),
        ];

        for (i, query) in strategies.iter().enumerate() {
            let data = self.run_query(query).await?;
            let Some(elements) = data.get("elements").and_then(|e| e.as_array()) else {
                continue;
            };
            if let Some(ring) = closest_ring(elements, resort.lat, resort.lon) {
                tracing::debug!(
                    resort = %resort.name,
                    "Boundary found with strategy {} ({} points)",
                    i + 1,
                    ring.len(),
                );
                return Ok(Some(ring));
            }
        }

        Ok(None)
    }
}

/// Bounding box string "(south,west,north,east)" for a radius in km.
fn bbox_around(lat: f64, lon: f64, radius_km: f64) -> String {
    // 1 degree of latitude is ~111 km; longitude shrinks with cos(lat)
    let lat_offset = radius_km / 111.0;
    let lon_offset = radius_km / (111.0 * lat.to_radians().cos());
    format!(
        "({},{},{},{})",
        lat - lat_offset,
        lon - lon_offset,
        lat + lat_offset,
        lon + lon_offset
    )
}

/// Bounding box string for a half-width in degrees.
fn bbox_degrees(lat: f64, lon: f64, half_width_deg: f64) -> String {
    format!(
        "({},{},{},{})",
        lat - half_width_deg,
        lon - half_width_deg,
        lat + half_width_deg,
        lon + half_width_deg
    )
}

/// Escape a resort name for use inside an Overpass QL quoted string.
fn escape_ql(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Extract the ring whose centroid is closest to the resort center.
fn closest_ring(elements: &[Value], center_lat: f64, center_lon: f64) -> Option<Vec<[f64; 2]>> {
    elements
        .iter()
        .filter_map(extract_geometry)
        .filter(|ring| ring.len() >= 3)
        .min_by(|a, b| {
            let da = centroid_distance_km(a, center_lat, center_lon);
            let db = centroid_distance_km(b, center_lat, center_lon);
            da.total_cmp(&db)
        })
}

fn centroid_distance_km(ring: &[[f64; 2]], center_lat: f64, center_lon: f64) -> f64 {
    let n = ring.len() as f64;
    let (lon_sum, lat_sum) = ring
        .iter()
        .fold((0.0, 0.0), |(lo, la), p| (lo + p[0], la + p[1]));
    haversine_km(center_lat, center_lon, lat_sum / n, lon_sum / n)
}

/// Pull the [lon, lat] polyline out of a way or relation element.
fn extract_geometry(element: &Value) -> Option<Vec<[f64; 2]>> {
    let mut geometry = Vec::new();
    match element.get("type").and_then(|t| t.as_str()) {
        Some("way") => {
            for node in element.get("geometry")?.as_array()? {
                if let (Some(lon), Some(lat)) = (
                    node.get("lon").and_then(|v| v.as_f64()),
                    node.get("lat").and_then(|v| v.as_f64()),
                ) {
                    geometry.push([lon, lat]);
                }
            }
        }
        Some("relation") => {
            for member in element.get("members")?.as_array()? {
                let role = member.get("role").and_then(|r| r.as_str()).unwrap_or("");
                if role != "" && role != "outer" {
                    continue;
                }
                let Some(nodes) = member.get("geometry").and_then(|g| g.as_array()) else {
                    continue;
                };
                for node in nodes {
                    if let (Some(lon), Some(lat)) = (
                        node.get("lon").and_then(|v| v.as_f64()),
                        node.get("lat").and_then(|v| v.as_f64()),
                    ) {
                        geometry.push([lon, lat]);
                    }
                }
            }
        }
        _ => return None,
    }
    if geometry.is_empty() {
        None
    } else {
        Some(geometry)
    }
}

/// Convert raw Overpass elements into trail records.
fn process_trails(elements: &[Value]) -> Vec<TrailRecord> {
    elements
        .iter()
        .filter_map(process_single_trail)
        .collect()
}

fn process_single_trail(element: &Value) -> Option<TrailRecord> {
    let geometry = extract_geometry(element)?;
    let osm_type = element.get("type")?.as_str()?.to_string();
    let osm_id = element.get("id")?.as_i64()?.to_string();
    let tags = element.get("tags").cloned().unwrap_or(Value::Null);

    let tag = |key: &str| -> Option<String> {
        tags.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
    };

    let name = tag("name")
        .or_else(|| tag("ref"))
        .unwrap_or_else(|| format!("Trail {osm_id}"));

    Some(TrailRecord {
        name,
        difficulty: tag("piste:difficulty").unwrap_or_else(|| "unknown".to_string()),
        piste_type: tag("piste:type").unwrap_or_else(|| "downhill".to_string()),
        length_meters: round2(polyline_length_meters(&geometry)),
        lit: tag("lit").map(|v| v == "yes"),
        grooming: tag("piste:grooming"),
        width: tag("width"),
        trail_ref: tag("ref"),
        geometry,
        osm_id,
        osm_type,
    })
}

/// Length of a [lon, lat] polyline in meters.
fn polyline_length_meters(coordinates: &[[f64; 2]]) -> f64 {
    if coordinates.len() < 2 {
        return 0.0;
    }
    coordinates
        .windows(2)
        .map(|pair| haversine_km(pair[0][1], pair[0][0], pair[1][1], pair[1][0]))
        .sum::<f64>()
        * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn descriptor() -> ResortDescriptor {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "Powder Peak",
            "slug": "powder-peak",
            "lat": 50.0,
            "lon": -122.0,
            "data_source": "mtnpowder",
            "enabled": true
        }))
        .unwrap()
    }

    fn way_element(id: i64, tags: Value, points: &[(f64, f64)]) -> Value {
        serde_json::json!({
            "type": "way",
            "id": id,
            "tags": tags,
            "geometry": points
                .iter()
                .map(|(lat, lon)| serde_json::json!({ "lat": lat, "lon": lon }))
                .collect::<Vec<_>>()
        })
    }

    #[test]
    fn test_bbox_around_is_ordered() {
        let bbox = bbox_around(50.0, -122.0, 5.0);
        assert!(bbox.starts_with('('));
        let parts: Vec<f64> = bbox
            .trim_matches(|c| c == '(' || c == ')')
            .split(',')
            .map(|p| p.parse().unwrap())
            .collect();
        assert_eq!(parts.len(), 4);
        assert!(parts[0] < parts[2], "south < north");
        assert!(parts[1] < parts[3], "west < east");
    }

    #[test]
    fn test_escape_ql() {
        assert_eq!(escape_ql(r#"Le "Grand" Massif"#), r#"Le \"Grand\" Massif"#);
    }

    #[test]
    fn test_process_trails_basic() {
        let elements = vec![way_element(
            101,
            serde_json::json!({
                "piste:type": "downhill",
                "piste:difficulty": "advanced",
                "name": "Couloir",
                "lit": "yes",
                "piste:grooming": "classic"
            }),
            &[(50.0, -122.0), (50.001, -122.0), (50.002, -122.0)],
        )];
        let trails = process_trails(&elements);
        assert_eq!(trails.len(), 1);
        let trail = &trails[0];
        assert_eq!(trail.osm_id, "101");
        assert_eq!(trail.osm_type, "way");
        assert_eq!(trail.name, "Couloir");
        assert_eq!(trail.difficulty, "advanced");
        assert_eq!(trail.lit, Some(true));
        assert_eq!(trail.grooming.as_deref(), Some("classic"));
        // Two ~111m segments of latitude
        assert!((trail.length_meters - 222.4).abs() < 5.0, "len={}", trail.length_meters);
    }

    #[test]
    fn test_process_trail_defaults() {
        let elements = vec![way_element(
            7,
            serde_json::json!({ "piste:type": "nordic" }),
            &[(50.0, -122.0), (50.001, -122.0)],
        )];
        let trails = process_trails(&elements);
        assert_eq!(trails[0].name, "Trail 7");
        assert_eq!(trails[0].difficulty, "unknown");
        assert_eq!(trails[0].piste_type, "nordic");
        assert_eq!(trails[0].lit, None);
    }

    #[test]
    fn test_element_without_geometry_is_skipped() {
        let elements = vec![serde_json::json!({ "type": "way", "id": 9, "tags": {} })];
        assert!(process_trails(&elements).is_empty());
    }

    #[test]
    fn test_relation_outer_members() {
        let element = serde_json::json!({
            "type": "relation",
            "id": 55,
            "tags": { "piste:type": "downhill" },
            "members": [
                {
                    "role": "outer",
                    "geometry": [
                        { "lat": 50.0, "lon": -122.0 },
                        { "lat": 50.001, "lon": -122.0 }
                    ]
                },
                { "role": "inner", "geometry": [ { "lat": 1.0, "lon": 1.0 } ] }
            ]
        });
        let geometry = extract_geometry(&element).unwrap();
        assert_eq!(geometry.len(), 2, "inner members are excluded");
    }

    #[test]
    fn test_closest_ring_picks_nearest() {
        let near = way_element(
            1,
            serde_json::json!({ "landuse": "winter_sports" }),
            &[(50.0, -122.0), (50.01, -122.0), (50.0, -122.01)],
        );
        let far = way_element(
            2,
            serde_json::json!({ "landuse": "winter_sports" }),
            &[(51.0, -121.0), (51.01, -121.0), (51.0, -121.01)],
        );
        let ring = closest_ring(&[far, near], 50.0, -122.0).unwrap();
        // The nearest ring's first point is the 50.0 / -122.0 polygon
        assert!((ring[0][1] - 50.0).abs() < 0.1);
    }

    #[tokio::test]
    async fn test_collect_degrades_without_boundary() {
        let server = MockServer::start().await;
        // Boundary strategies find nothing
        Mock::given(method("POST"))
            .and(path("/interpreter"))
            .and(body_string_contains("winter_sports"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "elements": [] })),
            )
            .mount(&server)
            .await;
        // Piste query returns one trail
        Mock::given(method("POST"))
            .and(path("/interpreter"))
            .and(body_string_contains("piste%3Atype"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "elements": [{
                    "type": "way",
                    "id": 101,
                    "tags": { "piste:type": "downhill" },
                    "geometry": [
                        { "lat": 50.0, "lon": -122.0 },
                        { "lat": 50.001, "lon": -122.0 }
                    ]
                }]
            })))
            .mount(&server)
            .await;

        let client = OverpassClient::new(HttpFetcher::new())
            .with_base_url(&format!("{}/interpreter", server.uri()));
        let collection = client.collect(&descriptor()).await.unwrap();
        assert!(collection.boundary.is_none());
        assert_eq!(collection.trails.len(), 1);
    }
}
