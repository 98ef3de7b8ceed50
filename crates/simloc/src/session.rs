use tracing::{debug, info};

use crate::{
    connection::{Connection, Device},
    coord::GeoPoint,
    protocol::{encode, LocationMessage, SERVICE_NAME},
    Error, SLResult,
};

/// One open connection to the simulated-location service.
///
/// The session owns its connection exclusively. Once closed, every operation fails with
/// [`Error::Connection`]. Dropping an open session closes it.
pub struct LocationSession<C: Connection> {
    conn: Option<C>,
}

impl<C: Connection> LocationSession<C> {
    /// Connect to the location service of `device`.
    pub fn open<D>(device: &D) -> SLResult<Self>
    where
        D: Device<Conn = C>,
    {
        let conn = device.connect(SERVICE_NAME)?;
        debug!("location session open");
        Ok(Self::with_connection(conn))
    }

    /// Wrap a connection that is already open to the location service.
    pub fn with_connection(conn: C) -> Self {
        Self { conn: Some(conn) }
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Simulate the location given as decimal latitude / longitude strings.
    pub fn set_location(&mut self, lat: &str, lon: &str) -> SLResult<()> {
        self.ensure_open()?;
        let point = GeoPoint::from_strs(lat, lon)?;
        self.set_point(point)
    }

    pub fn set_point(&mut self, point: GeoPoint) -> SLResult<()> {
        self.ensure_open()?;
        info!(
            latitude = point.latitude(),
            longitude = point.longitude(),
            "Simulating device location"
        );
        self.send(&LocationMessage::SetLocation(point))
    }

    /// Return the device to its real location.
    pub fn reset(&mut self) -> SLResult<()> {
        self.ensure_open()?;
        info!("Resetting device location");
        self.send(&LocationMessage::Reset)
    }

    /// Release the connection. Calling this again is a no-op.
    ///
    /// The session counts as closed even if closing the underlying connection reports an error.
    pub fn close(&mut self) -> SLResult<()> {
        match self.conn.take() {
            Some(mut conn) => {
                debug!("location session closed");
                conn.close().map_err(Error::Transport)
            }
            None => Ok(()),
        }
    }

    fn ensure_open(&self) -> SLResult<()> {
        if self.conn.is_none() {
            return Err(Error::Connection("location session is closed".to_string()));
        }
        Ok(())
    }

    fn send(&mut self, msg: &LocationMessage) -> SLResult<()> {
        let bytes = encode(msg)?;
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| Error::Connection("location session is closed".to_string()))?;
        conn.send(&bytes).map_err(Error::Transport)
    }
}

impl<C: Connection> Drop for LocationSession<C> {
    fn drop(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            let _ = conn.close();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        connection::MemoryDevice,
        lazy_init_tracing,
        protocol::{parse, Frame},
    };

    #[test]
    fn test_set_location_and_reset() {
        lazy_init_tracing();
        let device = MemoryDevice::new();
        let mut session = LocationSession::open(&device).unwrap();
        session.set_location("37.331677", "-122.030121").unwrap();
        session.reset().unwrap();
        session.close().unwrap();

        let frames = device.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(
            parse(&frames[0]).unwrap(),
            Frame::SetLocation {
                latitude: "37.331677",
                longitude: "-122.030121"
            }
        );
        assert_eq!(parse(&frames[1]).unwrap(), Frame::Reset);
        assert_eq!(device.services(), vec![SERVICE_NAME.to_string()]);
    }

    #[test]
    fn test_validation_does_not_write_or_close() {
        lazy_init_tracing();
        let device = MemoryDevice::new();
        let mut session = LocationSession::open(&device).unwrap();
        for (lat, lon) in [("", "40.0"), ("40.0", ""), ("abc", "40.0")] {
            let err = session.set_location(lat, lon).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{err}");
        }
        assert!(device.frames().is_empty());
        assert!(session.is_open());
        session.set_location("1", "2").unwrap();
        assert_eq!(device.frames().len(), 1);
    }

    #[test]
    fn test_use_after_close() {
        lazy_init_tracing();
        let device = MemoryDevice::new();
        let mut session = LocationSession::open(&device).unwrap();
        session.close().unwrap();
        session.close().unwrap();
        assert!(device.is_closed());

        let err = session.set_location("1.0", "2.0").unwrap_err();
        assert!(matches!(err, Error::Connection(_)), "{err}");
        let err = session.reset().unwrap_err();
        assert!(matches!(err, Error::Connection(_)), "{err}");
        assert!(device.frames().is_empty());
    }

    #[test]
    fn test_close_after_failed_send() {
        lazy_init_tracing();
        let device = MemoryDevice::new();
        device.fail_send_at(0);
        let mut session = LocationSession::open(&device).unwrap();
        let err = session.reset().unwrap_err();
        assert!(matches!(err, Error::Transport(_)), "{err}");
        session.close().unwrap();
        assert!(device.is_closed());
    }

    #[test]
    fn test_drop_closes() {
        lazy_init_tracing();
        let device = MemoryDevice::new();
        {
            let _session = LocationSession::open(&device).unwrap();
            assert!(!device.is_closed());
        }
        assert!(device.is_closed());
    }
}
