//! Great-circle distance used to scope report listings.

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Listing inclusion radius around the caller's reference point.
pub const PROXIMITY_RADIUS_KM: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Haversine distance in kilometers between two points on a 6371 km sphere.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

pub fn within_proximity(reference: GeoPoint, candidate: GeoPoint) -> bool {
    haversine_km(reference, candidate) <= PROXIMITY_RADIUS_KM
}
