/// Device location simulation library.
///
/// A [`LocationSession`] speaks the simulated-location protocol (see [`protocol`]) over one
/// [`Connection`] obtained from a [`Device`]. Recorded tracks are exposed as a
/// [`WaypointSource`] and replayed in real time by the [`PlaybackScheduler`].
use std::sync::Once;

use thiserror::Error;
use tracing::{debug, warn};

pub mod connection;
pub mod coord;
pub mod playback;
pub mod protocol;
pub mod session;
pub mod track;

pub use connection::{Connection, Device, MemoryDevice, TcpDevice};
pub use coord::GeoPoint;
pub use playback::{
    CancelToken, PlaybackScheduler, PlaybackState, PlaybackSummary, Sleeper, ThreadSleeper,
};
pub use protocol::{LocationMessage, SERVICE_NAME};
pub use session::LocationSession;
pub use track::{Gpx, Waypoint, WaypointSource};

/// Result type for this library
pub type SLResult<T> = std::result::Result<T, Error>;

/// Error type for this library
#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Encoding error: {0}")]
    Encoding(String),
    #[error("Transport error: {0}")]
    Transport(#[source] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Playback cancelled")]
    Cancelled,
    #[error("Playback cannot start from state {0:?}")]
    InvalidState(PlaybackState),
}

impl From<nom::error::Error<&[u8]>> for Error {
    fn from(err: nom::error::Error<&[u8]>) -> Self {
        Error::Parse(format!("{:?}", err))
    }
}

impl From<quick_xml::DeError> for Error {
    fn from(err: quick_xml::DeError) -> Self {
        Error::Parse(err.to_string())
    }
}

/// Set the device location once, using a fresh session.
///
/// Both coordinates are validated before any connection is made.
pub fn set_location<D: Device>(device: &D, lat: &str, lon: &str) -> SLResult<()> {
    let point = GeoPoint::from_strs(lat, lon)?;
    let mut session = LocationSession::open(device)?;
    let res = session.set_point(point);
    close_quietly(&mut session);
    res
}

/// Return the device to its real location.
pub fn reset_location<D: Device>(device: &D) -> SLResult<()> {
    let mut session = LocationSession::open(device)?;
    let res = session.reset();
    close_quietly(&mut session);
    res
}

/// Replay `source` in real time over a single session, blocking the calling thread.
pub fn playback<D, W>(device: &D, source: &W) -> SLResult<PlaybackSummary>
where
    D: Device,
    W: WaypointSource + ?Sized,
{
    playback_with(device, source, ThreadSleeper, CancelToken::new())
}

/// Like [`playback`], with an explicit sleep strategy and a token the caller can use to abort.
pub fn playback_with<D, W, S>(
    device: &D,
    source: &W,
    sleeper: S,
    cancel: CancelToken,
) -> SLResult<PlaybackSummary>
where
    D: Device,
    W: WaypointSource + ?Sized,
    S: Sleeper,
{
    // No points means nothing to send, so the device is never contacted.
    if source.waypoints().next().is_none() {
        debug!("no waypoints to play back");
        return Ok(PlaybackSummary::default());
    }
    let mut session = LocationSession::open(device)?;
    let mut scheduler = PlaybackScheduler::new(sleeper, cancel);
    let res = scheduler.run(&mut session, source);
    close_quietly(&mut session);
    res
}

// A failed close must not mask the result of the operation itself.
fn close_quietly<C: Connection>(session: &mut LocationSession<C>) {
    if let Err(e) = session.close() {
        warn!("closing location session: {e}");
    }
}

/// Test binary helper to init tracing. This is usually the responsibility of the consumer of the
/// library crate.
pub fn lazy_init_tracing() {
    {
        static INIT: Once = Once::new();
        &INIT
    }
    .call_once(|| {
        tracing_subscriber::fmt::init();
    });
}
