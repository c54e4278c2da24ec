use serde::{Deserialize, Serialize};

use crate::models::Job;

pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const DEFAULT_RADIUS_KM: f64 = 50.0;

/// A point on the map, longitude first to match the map SDK's ordering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinates {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Longitude 0 marks a center that was never chosen.
    pub fn is_unset(&self) -> bool {
        self.lon == 0.0
    }

    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        haversine_km(self.lat, self.lon, other.lat, other.lon)
    }
}

pub const LAGOS: Coordinates = Coordinates::new(3.3792, 6.5244);
pub const ABUJA: Coordinates = Coordinates::new(7.4913, 9.0722);

/// Canonical location names with a known position. "Remote" is a
/// canonical location too, but has no place on the map.
pub fn canonical_location(name: &str) -> Option<Coordinates> {
    match name.trim().to_lowercase().as_str() {
        "lagos" => Some(LAGOS),
        "abuja" => Some(ABUJA),
        "hybrid" => Some(LAGOS),
        _ => None,
    }
}

/// Explicit coordinates win; otherwise fall back to the canonical table.
pub fn job_coordinates(job: &Job) -> Option<Coordinates> {
    match (job.longitude, job.latitude) {
        (Some(lon), Some(lat)) => Some(Coordinates::new(lon, lat)),
        _ => canonical_location(&job.location),
    }
}

/// Great-circle distance on a spherical Earth, in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Inclusive radius test. Unresolvable jobs and an unset center never match.
pub fn is_within_radius(job_coords: Option<Coordinates>, center: Coordinates, radius_km: f64) -> bool {
    let Some(coords) = job_coords else {
        return false;
    };
    if center.is_unset() {
        return false;
    }
    center.distance_km(&coords) <= radius_km
}

/// Origin and radius of the radius search for one feed session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCenter {
    pub center: Coordinates,
    pub radius_km: f64,
}

impl Default for GeoCenter {
    fn default() -> Self {
        Self {
            center: LAGOS,
            radius_km: DEFAULT_RADIUS_KM,
        }
    }
}
