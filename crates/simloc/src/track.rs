/// Recorded tracks as ordered sequences of timestamped waypoints.
///
/// Coordinates and times stay as text until a waypoint is consumed, so one bad point only fails
/// playback when playback reaches it.
use std::{path::Path, str::FromStr};

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use crate::{coord::GeoPoint, Error, SLResult};

//  _____
// |_   _|   _ _ __   ___  ___
//   | || | | | '_ \ / _ \/ __|
//   | || |_| | |_) |  __/\__ \
//   |_| \__, | .__/ \___||___/
//       |___/|_|

/// One fix of a recorded track, unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waypoint {
    pub lat: String,
    pub lon: String,
    /// RFC 3339 timestamp.
    pub time: String,
}

impl Waypoint {
    pub fn new(lat: impl Into<String>, lon: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            lat: lat.into(),
            lon: lon.into(),
            time: time.into(),
        }
    }

    pub fn timestamp(&self) -> SLResult<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.time)
            .map_err(|e| Error::Validation(format!("timestamp {:?}: {e}", self.time)))
    }

    pub fn point(&self) -> SLResult<GeoPoint> {
        GeoPoint::from_strs(&self.lat, &self.lon)
    }
}

/// An ordered, finite source of waypoints.
///
/// Each call to [`WaypointSource::waypoints`] starts again from the first point.
pub trait WaypointSource {
    fn waypoints(&self) -> impl Iterator<Item = Waypoint> + '_;
}

impl WaypointSource for [Waypoint] {
    fn waypoints(&self) -> impl Iterator<Item = Waypoint> + '_ {
        self.iter().cloned()
    }
}

impl WaypointSource for Vec<Waypoint> {
    fn waypoints(&self) -> impl Iterator<Item = Waypoint> + '_ {
        self.as_slice().waypoints()
    }
}

//   ____ ______  __
//  / ___|  _ \ \/ /
// | |  _| |_) \  /
// | |_| |  __//  \
//  \____|_|  /_/\_\

/// GPX document, reduced to its tracks.
#[derive(Debug, Default, Deserialize)]
pub struct Gpx {
    #[serde(rename = "trk", default)]
    pub tracks: Vec<Track>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "trkseg", default)]
    pub segments: Vec<TrackSegment>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrackSegment {
    #[serde(rename = "trkpt", default)]
    pub points: Vec<TrackPoint>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrackPoint {
    #[serde(rename = "@lat")]
    pub lat: String,
    #[serde(rename = "@lon")]
    pub lon: String,
    // Missing times are caught when the point is played back.
    #[serde(default)]
    pub time: String,
}

impl Gpx {
    pub fn from_path(path: impl AsRef<Path>) -> SLResult<Self> {
        let xml = std::fs::read_to_string(path)?;
        xml.parse()
    }

    /// Number of track points over all tracks and segments.
    pub fn len(&self) -> usize {
        self.tracks
            .iter()
            .flat_map(|t| &t.segments)
            .map(|s| s.points.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromStr for Gpx {
    type Err = Error;

    fn from_str(xml: &str) -> SLResult<Self> {
        Ok(quick_xml::de::from_str(xml)?)
    }
}

/// Points in document order: tracks, then segments, then points. Never re-sorted by time.
impl WaypointSource for Gpx {
    fn waypoints(&self) -> impl Iterator<Item = Waypoint> + '_ {
        self.tracks
            .iter()
            .flat_map(|t| &t.segments)
            .flat_map(|s| &s.points)
            .map(|p| Waypoint::new(p.lat.as_str(), p.lon.as_str(), p.time.as_str()))
    }
}
