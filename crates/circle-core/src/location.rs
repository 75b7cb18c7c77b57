use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Where pins land when the location text carries no coordinates.
pub const DEFAULT_COORDINATE: Coordinate = Coordinate {
    latitude: 51.505,
    longitude: -0.09,
};

static DECIMAL_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-?\d+\.\d+)\s*[,\s]\s*(-?\d+\.\d+)").expect("decimal pair pattern is valid")
});

/// Pull a "lat, lng" pair out of free text. Not a geocoder.
pub fn parse_coordinate(text: &str) -> Option<Coordinate> {
    let caps = DECIMAL_PAIR.captures(text)?;
    let latitude = caps[1].parse().ok()?;
    let longitude = caps[2].parse().ok()?;
    Some(Coordinate {
        latitude,
        longitude,
    })
}

pub fn coordinate_or_default(text: &str) -> Coordinate {
    parse_coordinate(text).unwrap_or(DEFAULT_COORDINATE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_pair() {
        let c = coordinate_or_default("40.712800, -74.006000");
        assert_eq!(c, Coordinate { latitude: 40.7128, longitude: -74.006 });
    }

    #[test]
    fn parses_whitespace_separated_pair_inside_text() {
        let c = parse_coordinate("Pickup near 48.8566 2.3522 (back door)").unwrap();
        assert_eq!(c.latitude, 48.8566);
        assert_eq!(c.longitude, 2.3522);
    }

    #[test]
    fn street_address_falls_back() {
        assert_eq!(parse_coordinate("123 Main St"), None);
        assert_eq!(coordinate_or_default("123 Main St"), DEFAULT_COORDINATE);
    }

    #[test]
    fn integers_do_not_count() {
        assert_eq!(parse_coordinate("40, -74"), None);
    }
}
