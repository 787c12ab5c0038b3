use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A `Vehicle` entity as returned by the NGSI-LD broker.
///
/// Only the properties the aggregation consumes are decoded; everything else
/// in the payload (speed, heading, vehicleType, ...) is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct VehicleEntity {
    pub id: String,
    #[serde(default)]
    pub description: Option<TextProperty>,
    pub location: GeoProperty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextProperty {
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoProperty {
    pub value: Geometry,
    #[serde(rename = "observedAt")]
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

/// A single vehicle detection, flattened out of its NGSI-LD envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub id: String,
    /// Free text of the form `Parking: <id>, Gate: <id>`.
    pub description: String,
    /// Coordinate pair in the order the broker sent it. `None` when the
    /// entity carried fewer than two coordinates.
    pub coordinates: Option<[f64; 2]>,
    pub observed_at: DateTime<Utc>,
}

impl From<VehicleEntity> for RawEvent {
    fn from(entity: VehicleEntity) -> Self {
        let coordinates = match entity.location.value.coordinates.as_slice() {
            [first, second, ..] => Some([*first, *second]),
            _ => None,
        };

        Self {
            id: entity.id,
            description: entity.description.map(|d| d.value).unwrap_or_default(),
            coordinates,
            observed_at: entity.location.observed_at,
        }
    }
}
