// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Great-circle distance and the client-side geofence pre-check.
//!
//! The pre-check only rejects early. The server re-validates and its
//! `GEOFENCE_VIOLATION` is authoritative.

use crate::error::ClientError;
use crate::models::Geofence;
use geo::Point;
use serde::{Deserialize, Serialize};

/// Earth radius used for haversine distances, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Reject fixes that cannot be real coordinates.
    pub fn validate(&self) -> Result<(), ClientError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(ClientError::Location(format!("invalid latitude {}", self.lat)));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(ClientError::Location(format!("invalid longitude {}", self.lng)));
        }
        Ok(())
    }

    /// Haversine distance to `other` in meters.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_distance((*self).into(), (*other).into())
    }
}

impl From<GeoPoint> for Point<f64> {
    fn from(p: GeoPoint) -> Self {
        // geo points are (x = longitude, y = latitude)
        Point::new(p.lng, p.lat)
    }
}

/// Haversine distance between two lon/lat points, in meters.
pub fn haversine_distance(a: Point<f64>, b: Point<f64>) -> f64 {
    let phi1 = a.y().to_radians();
    let phi2 = b.y().to_radians();
    let d_phi = (b.y() - a.y()).to_radians();
    let d_lambda = (b.x() - a.x()).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Check `at` against the session geofence.
///
/// Returns the measured distance when a geofence exists and the point is
/// inside it, `None` when the session has no geofence.
pub fn check_geofence(fence: Option<&Geofence>, at: &GeoPoint) -> Result<Option<f64>, ClientError> {
    let Some(fence) = fence else {
        return Ok(None);
    };

    let distance = fence.center().distance_to(at);
    if distance > fence.radius {
        tracing::info!(
            distance_m = distance,
            radius_m = fence.radius,
            "Geofence pre-check rejected location"
        );
        return Err(ClientError::GeofenceViolation {
            distance_m: Some(distance),
            radius_m: Some(fence.radius),
        });
    }

    Ok(Some(distance))
}
