use geo::{GeodesicDestination, GeodesicDistance, Point};
use serde::{Deserialize, Serialize};

pub const NORTH: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    fn to_point(self) -> Point<f64> {
        Point::new(self.lng, self.lat)
    }

    fn from_point(point: Point<f64>) -> Self {
        Self {
            lat: point.y(),
            lng: point.x(),
        }
    }
}

pub fn distance_m(a: LatLng, b: LatLng) -> f64 {
    a.to_point().geodesic_distance(&b.to_point())
}

#[derive(Debug, Clone, Copy)]
pub struct MarkerOffset {
    bearing_deg: f64,
    distance_m: f64,
}

impl MarkerOffset {
    pub fn north(distance_m: f64) -> Self {
        Self {
            bearing_deg: NORTH,
            distance_m,
        }
    }

    pub fn distance_m(&self) -> f64 {
        self.distance_m
    }

    pub fn apply(&self, position: LatLng) -> LatLng {
        LatLng::from_point(
            position
                .to_point()
                .geodesic_destination(self.bearing_deg, self.distance_m),
        )
    }
}
