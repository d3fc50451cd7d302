use std::fmt;

use bon::Builder;

use crate::error::ValidationError;
use crate::vehicle::VehicleId;

/// A WGS84 point in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Planar distance in coordinate-degree space. Only meaningful at city scale.
    pub fn planar_distance(&self, other: &Coordinate) -> f64 {
        (other.lat - self.lat).hypot(other.lng - self.lng)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let in_range = self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng);

        if in_range {
            Ok(())
        } else {
            Err(ValidationError::CoordinateOutOfRange {
                lat: self.lat,
                lng: self.lng,
            })
        }
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Self { lat, lng }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub const fn as_millis(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Folds any finite heading into `[0, 360)`.
pub fn normalize_heading(heading_deg: f64) -> f64 {
    let folded = heading_deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if folded >= 360.0 { 0.0 } else { folded }
}

/// Last known state of one vehicle, as held by the fleet store.
#[derive(Debug, Clone, PartialEq)]
pub struct VehiclePosition {
    pub vehicle_id: VehicleId,
    pub line_id: String,
    pub label: Option<String>,
    pub coordinate: Coordinate,
    /// `None` until some report supplies a heading.
    pub heading: Option<f64>,
    pub last_updated: Timestamp,
}

impl VehiclePosition {
    /// The name drawn on the marker, falling back to the vehicle id.
    pub fn display_label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("Bus {}", self.vehicle_id),
        }
    }

    /// A report that reproduces this position exactly when upserted into an empty store.
    pub fn to_report(&self) -> PositionReport {
        PositionReport {
            vehicle_id: self.vehicle_id.clone(),
            line_id: self.line_id.clone(),
            coordinate: self.coordinate,
            label: self.label.clone(),
            heading: self.heading,
            timestamp: Some(self.last_updated),
            seq: None,
        }
    }
}

/// An inbound position sample before it is merged into the fleet store.
///
/// Optional fields that are absent leave the stored value untouched.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct PositionReport {
    #[builder(into)]
    pub vehicle_id: VehicleId,
    #[builder(into)]
    pub line_id: String,
    #[builder(into)]
    pub coordinate: Coordinate,
    #[builder(into)]
    pub label: Option<String>,
    pub heading: Option<f64>,
    pub timestamp: Option<Timestamp>,
    /// Monotonic per-vehicle sequence number, when the producer supplies one.
    pub seq: Option<u64>,
}

impl PositionReport {
    /// Check the report and normalise its heading.
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        if self.vehicle_id.as_str().is_empty() {
            return Err(ValidationError::EmptyVehicleId);
        }
        if self.line_id.is_empty() {
            return Err(ValidationError::EmptyLineId {
                vehicle_id: self.vehicle_id.to_string(),
            });
        }

        self.coordinate.validate()?;

        if let Some(heading) = self.heading {
            if !heading.is_finite() {
                return Err(ValidationError::NonFiniteHeading(heading));
            }
            self.heading = Some(normalize_heading(heading));
        }

        Ok(self)
    }
}
