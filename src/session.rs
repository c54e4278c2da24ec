//! Feed session state: filter inputs, the radius-search lifecycle and the
//! bookkeeping that keeps late results from overwriting newer ones.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::error::{BoardError, Result};
use crate::filter::{self, FilterInputs, FilterSpec, JobStore, RadiusFilter};
use crate::geo::{Coordinates, GeoCenter};
use crate::locate::Locator;
use crate::map::{CenterMarker, MapSink};
use crate::models::Job;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiusState {
    /// No radius constraint.
    Inactive,
    /// A center was chosen but no radius applied yet.
    CenterSet,
    /// Results are restricted to the radius around the center.
    Active,
}

/// Holds the latest value until it has been quiet for `delay`.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((now + self.delay, value));
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((deadline, _)) if *deadline <= now => self.pending.take().map(|(_, v)| v),
            _ => None,
        }
    }

    /// Releases the pending value regardless of the deadline.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(_, v)| v)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

/// One filtering pass, tagged with the generation it was issued in.
#[derive(Debug, Clone)]
pub struct FilterPass {
    pub id: u64,
    pub spec: FilterSpec,
    pub center: Option<CenterMarker>,
}

impl FilterPass {
    pub fn run(&self, store: &dyn JobStore) -> Result<Vec<Job>> {
        filter::run_pipeline(store, &self.spec)
    }
}

#[derive(Debug)]
pub struct FeedSession {
    inputs: FilterInputs,
    geo: GeoCenter,
    default_geo: GeoCenter,
    radius_state: RadiusState,
    search: Debouncer<String>,
    generation: u64,
}

impl FeedSession {
    pub fn new(default_geo: GeoCenter, search_debounce: Duration) -> Self {
        Self {
            inputs: FilterInputs::default(),
            geo: default_geo,
            default_geo,
            radius_state: RadiusState::Inactive,
            search: Debouncer::new(search_debounce),
            generation: 0,
        }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(config.default_geo(), config.search_debounce())
    }

    pub fn inputs(&self) -> &FilterInputs {
        &self.inputs
    }

    pub fn geo(&self) -> GeoCenter {
        self.geo
    }

    pub fn radius_state(&self) -> RadiusState {
        self.radius_state
    }

    pub fn set_category(&mut self, category: &str) {
        self.inputs.category = category.to_string();
    }

    pub fn set_location(&mut self, location: &str) {
        self.inputs.location = location.to_string();
    }

    pub fn set_salary(&mut self, bucket: &str) {
        self.inputs.salary = bucket.to_string();
    }

    /// Records a keystroke; the text only reaches the filters once typing
    /// pauses (see `poll_search`).
    pub fn type_search(&mut self, text: &str, now: Instant) {
        self.search.push(text.to_string(), now);
    }

    /// Applies a settled search text. Returns true when the filters changed.
    pub fn poll_search(&mut self, now: Instant) -> bool {
        match self.search.poll(now) {
            Some(text) => self.apply_search(text),
            None => false,
        }
    }

    pub fn flush_search(&mut self) -> bool {
        match self.search.flush() {
            Some(text) => self.apply_search(text),
            None => false,
        }
    }

    pub fn search_deadline(&self) -> Option<Instant> {
        self.search.deadline()
    }

    fn apply_search(&mut self, text: String) -> bool {
        if text == self.inputs.search {
            return false;
        }
        self.inputs.search = text;
        true
    }

    /// Moves the search center. An active radius follows the new center.
    pub fn set_center(&mut self, center: Coordinates) {
        self.geo.center = center;
        if self.radius_state == RadiusState::Inactive {
            self.radius_state = RadiusState::CenterSet;
        }
        info!(lon = center.lon, lat = center.lat, state = ?self.radius_state, "search center set");
    }

    /// Returns false, leaving the session untouched, when no position
    /// could be resolved.
    pub fn locate(&mut self, locator: &dyn Locator) -> bool {
        match locator.locate() {
            Some(center) => {
                self.set_center(center);
                true
            }
            None => {
                warn!("could not determine location; keeping current center");
                false
            }
        }
    }

    pub fn apply_radius(&mut self, km: f64) -> Result<()> {
        if !(km.is_finite() && km > 0.0) {
            return Err(BoardError::InvalidRadius(km));
        }
        if self.geo.center.is_unset() {
            return Err(BoardError::CenterUnset);
        }
        self.geo.radius_km = km;
        self.radius_state = RadiusState::Active;
        info!(km, lon = self.geo.center.lon, lat = self.geo.center.lat, "radius search applied");
        Ok(())
    }

    /// Clears every filter and restores the default center and radius.
    pub fn reset(&mut self) {
        self.inputs.clear();
        self.search.cancel();
        self.geo = self.default_geo;
        self.radius_state = RadiusState::Inactive;
        info!("filters reset");
    }

    pub fn radius_filter(&self) -> Option<RadiusFilter> {
        (self.radius_state == RadiusState::Active).then_some(RadiusFilter {
            center: self.geo.center,
            km: self.geo.radius_km,
        })
    }

    pub fn center_marker(&self) -> Option<CenterMarker> {
        (self.radius_state != RadiusState::Inactive).then_some(CenterMarker {
            center: self.geo.center,
            radius_km: self.geo.radius_km,
        })
    }

    pub fn snapshot(&self) -> Result<FilterSpec> {
        filter::read_filters(&self.inputs, self.radius_filter())
    }

    pub fn begin_pass(&mut self) -> Result<FilterPass> {
        let spec = self.snapshot()?;
        self.generation += 1;
        debug!(pass = self.generation, "filter pass started");
        Ok(FilterPass {
            id: self.generation,
            spec,
            center: self.center_marker(),
        })
    }

    /// Delivers a finished pass. Results from a superseded pass are dropped
    /// (`Ok(None)`) and never reach the map.
    pub fn complete(
        &self,
        pass: &FilterPass,
        result: Result<Vec<Job>>,
        map: &mut dyn MapSink,
    ) -> Result<Option<Vec<Job>>> {
        if pass.id != self.generation {
            warn!(pass = pass.id, latest = self.generation, "discarding stale filter result");
            return Ok(None);
        }
        let jobs = result?;
        map.sync(&jobs, pass.center);
        Ok(Some(jobs))
    }

    pub fn refresh(&mut self, store: &dyn JobStore, map: &mut dyn MapSink) -> Result<Vec<Job>> {
        let pass = self.begin_pass()?;
        let result = pass.run(store);
        Ok(self.complete(&pass, result, map)?.unwrap_or_default())
    }
}
