use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{LocateConfig, LocateMode};
use crate::geo::Coordinates;

/// Resolves the user's position. Denial, timeout and lack of support all
/// come back as `None`; callers leave their state untouched in that case.
pub trait Locator {
    fn locate(&self) -> Option<Coordinates>;
}

/// A configured position, or `None` when geolocation is unavailable.
pub struct FixedLocator(pub Option<Coordinates>);

impl Locator for FixedLocator {
    fn locate(&self) -> Option<Coordinates> {
        if self.0.is_none() {
            warn!("geolocation is not available");
        }
        self.0
    }
}

/// Approximate position from an IP geolocation service.
pub struct IpLocator {
    client: reqwest::blocking::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct IpLookup {
    status: String,
    lat: Option<f64>,
    lon: Option<f64>,
    message: Option<String>,
}

impl IpLocator {
    pub fn new(url: &str, timeout: Duration) -> Option<Self> {
        match reqwest::blocking::Client::builder().timeout(timeout).build() {
            Ok(client) => Some(Self {
                client,
                url: url.to_string(),
            }),
            Err(e) => {
                warn!(error = %e, "failed to build geolocation client");
                None
            }
        }
    }

    fn fetch(&self) -> reqwest::Result<String> {
        self.client.get(&self.url).send()?.error_for_status()?.text()
    }
}

impl Locator for IpLocator {
    fn locate(&self) -> Option<Coordinates> {
        let body = match self.fetch() {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %self.url, error = %e, "geolocation lookup failed");
                return None;
            }
        };
        let coords = parse_ip_lookup(&body);
        if let Some(c) = coords {
            info!(lon = c.lon, lat = c.lat, "located via IP");
        }
        coords
    }
}

fn parse_ip_lookup(body: &str) -> Option<Coordinates> {
    let lookup: IpLookup = match serde_json::from_str(body) {
        Ok(lookup) => lookup,
        Err(e) => {
            warn!(error = %e, "malformed geolocation response");
            return None;
        }
    };

    if lookup.status != "success" {
        warn!(
            status = %lookup.status,
            message = lookup.message.as_deref().unwrap_or(""),
            "geolocation refused"
        );
        return None;
    }

    match (lookup.lon, lookup.lat) {
        (Some(lon), Some(lat)) => Some(Coordinates::new(lon, lat)),
        _ => None,
    }
}

pub fn locator_from_config(config: &LocateConfig) -> Box<dyn Locator> {
    match config.mode {
        LocateMode::Off => Box::new(FixedLocator(None)),
        LocateMode::Fixed => Box::new(FixedLocator(config.position)),
        LocateMode::Ip => {
            match IpLocator::new(&config.url, Duration::from_secs(config.timeout_secs)) {
                Some(locator) => Box::new(locator),
                None => Box::new(FixedLocator(None)),
            }
        }
    }
}
