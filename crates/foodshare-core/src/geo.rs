//! Proximity search over a snapshot of located records.
//!
//! Distances use the haversine formula on a sphere of radius
//! [`EARTH_RADIUS_KM`]. This is an approximation: compared with an ellipsoidal
//! Earth model the error can reach roughly 0.5%, which is an accepted
//! precision bound for "what is near me" queries.

use serde::Serialize;
use thiserror::Error;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("{0}")]
    InvalidArgument(String),
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Build coordinates, rejecting non-finite or out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidArgument`] if latitude is outside `[-90, 90]`
    /// or longitude is outside `[-180, 180]`.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::InvalidArgument(format!(
                "latitude must be between -90 and 90, got {latitude}"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::InvalidArgument(format!(
                "longitude must be between -180 and 180, got {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Anything that may carry a position. Records without a complete position
/// return `None` and are left out of proximity results.
pub trait Located {
    fn coordinates(&self) -> Option<Coordinates>;
}

impl Located for Coordinates {
    fn coordinates(&self) -> Option<Coordinates> {
        Some(*self)
    }
}

/// A candidate paired with its distance from the query point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithDistance<T> {
    #[serde(flatten)]
    pub item: T,
    /// Great-circle distance in kilometres, always `>= 0`.
    pub distance_km: f64,
}

/// Validated parameters of a nearby search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery {
    pub origin: Coordinates,
    pub radius_km: f64,
}

impl NearbyQuery {
    /// Parse raw query-string values.
    ///
    /// `lat` and `lng` are required; `distance` falls back to
    /// `default_radius_km` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidArgument`] when a coordinate is missing, a
    /// value does not parse as a number, or a coordinate is out of range.
    /// Any numeric radius is accepted: a negative one matches nothing and
    /// `inf` matches every located candidate.
    pub fn parse(
        lat: Option<&str>,
        lng: Option<&str>,
        distance: Option<&str>,
        default_radius_km: f64,
    ) -> Result<Self, GeoError> {
        let latitude = parse_number("lat", lat)?;
        let longitude = parse_number("lng", lng)?;
        let radius_km = match distance {
            Some(raw) => parse_number("distance", Some(raw))?,
            None => default_radius_km,
        };
        Ok(Self {
            origin: Coordinates::new(latitude, longitude)?,
            radius_km,
        })
    }
}

fn parse_number(name: &str, raw: Option<&str>) -> Result<f64, GeoError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| GeoError::InvalidArgument(format!("'{name}' is required")))?;
    raw.parse::<f64>()
        .map_err(|_| GeoError::InvalidArgument(format!("'{name}' must be a number, got '{raw}'")))
}

/// Great-circle distance between two points in kilometres.
#[must_use]
pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlat = (to.latitude - from.latitude).to_radians();
    let dlng = (to.longitude - from.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    // Rounding can push `a` a hair outside [0, 1] for antipodal points.
    let a = a.clamp(0.0, 1.0);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Keep candidates within `radius_km` of `origin`, nearest first.
///
/// Candidates without coordinates are skipped. Equal distances keep their
/// input order.
pub fn find_within<T, I>(origin: Coordinates, radius_km: f64, candidates: I) -> Vec<WithDistance<T>>
where
    T: Located,
    I: IntoIterator<Item = T>,
{
    let mut hits: Vec<WithDistance<T>> = candidates
        .into_iter()
        .filter_map(|item| {
            let position = item.coordinates()?;
            let distance_km = haversine_km(origin, position);
            (distance_km <= radius_km).then_some(WithDistance { item, distance_km })
        })
        .collect();

    hits.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    hits
}
