use serde::Serialize;

use crate::geo::{self, Coordinates};
use crate::models::Job;

/// The radius-search origin as drawn on the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CenterMarker {
    pub center: Coordinates,
    pub radius_km: f64,
}

/// Receives every filtered list, in order, including the empty one.
pub trait MapSink {
    fn sync(&mut self, jobs: &[Job], center: Option<CenterMarker>);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub job_id: i64,
    pub coords: Coordinates,
}

/// Marker registry for the current result list.
#[derive(Debug, Default)]
pub struct MarkerBoard {
    markers: Vec<Marker>,
    center: Option<CenterMarker>,
    syncs: usize,
}

impl MarkerBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn center(&self) -> Option<CenterMarker> {
        self.center
    }

    pub fn sync_count(&self) -> usize {
        self.syncs
    }

    pub fn marker_for(&self, job_id: i64) -> Option<&Marker> {
        self.markers.iter().find(|m| m.job_id == job_id)
    }

    pub fn distance_from_center(&self, job_id: i64) -> Option<f64> {
        let center = self.center?;
        let marker = self.marker_for(job_id)?;
        Some(center.center.distance_km(&marker.coords))
    }
}

impl MapSink for MarkerBoard {
    fn sync(&mut self, jobs: &[Job], center: Option<CenterMarker>) {
        self.markers = jobs
            .iter()
            .filter_map(|job| {
                geo::job_coordinates(job).map(|coords| Marker {
                    job_id: job.id,
                    coords,
                })
            })
            .collect();
        self.center = center;
        self.syncs += 1;
    }
}
