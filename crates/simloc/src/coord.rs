/// Coordinate types and utilities.
use std::fmt;

use crate::{Error, SLResult};

//  _____
// |_   _|   _ _ __   ___  ___
//   | || | | | '_ \ / _ \/ __|
//   | || |_| | |_) |  __/\__ \
//   |_| \__, | .__/ \___||___/
//       |___/|_|

/// A geographic position in decimal degrees.
///
/// Both components are finite, but no range check is done: out of range values are passed to the
/// device unchanged and it is up to the device to reject them.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> SLResult<Self> {
        Self::validate_finite("latitude", latitude)?;
        Self::validate_finite("longitude", longitude)?;
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Parse a point from decimal latitude and longitude strings.
    pub fn from_strs(lat: &str, lon: &str) -> SLResult<Self> {
        if lat.is_empty() || lon.is_empty() {
            return Err(Error::Validation(
                "latitude and longitude must be non-empty".to_string(),
            ));
        }
        Self::new(
            Self::parse_degrees("latitude", lat)?,
            Self::parse_degrees("longitude", lon)?,
        )
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    fn parse_degrees(what: &str, s: &str) -> SLResult<f64> {
        s.parse::<f64>()
            .map_err(|e| Error::Validation(format!("{what} {s:?}: {e}")))
    }

    // f64's parser accepts "inf" and "NaN", which have no fixed-point rendering.
    fn validate_finite(what: &str, v: f64) -> SLResult<()> {
        if !v.is_finite() {
            return Err(Error::Validation(format!("{what} {v} is not finite")));
        }
        Ok(())
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lazy_init_tracing;

    #[test]
    fn test_parse_valid() {
        lazy_init_tracing();
        let pt = GeoPoint::from_strs("37.331677", "-122.030121").unwrap();
        assert_eq!(pt.latitude(), 37.331677);
        assert_eq!(pt.longitude(), -122.030121);
    }

    #[test]
    fn test_parse_rejects_empty_and_garbage() {
        lazy_init_tracing();
        let test_cases = [
            ("", "40.0"),
            ("40.0", ""),
            ("abc", "40.0"),
            ("40.0", "12,5"),
            (" 40.0", "1.0"),
            ("inf", "1.0"),
            ("1.0", "NaN"),
        ];
        for (lat, lon) in test_cases.iter() {
            let res = GeoPoint::from_strs(lat, lon);
            assert!(
                matches!(res, Err(Error::Validation(_))),
                "from_strs({lat:?}, {lon:?}) = {res:?}"
            );
        }
    }

    #[test]
    fn test_out_of_range_passes_through() {
        lazy_init_tracing();
        let pt = GeoPoint::from_strs("123.5", "-400").unwrap();
        assert_eq!(pt.latitude(), 123.5);
        assert_eq!(pt.longitude(), -400.0);
    }
}
