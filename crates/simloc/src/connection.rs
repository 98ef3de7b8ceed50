/// Device connection capability.
///
/// The core never establishes device links itself. A [`Device`] hands out ready, message framed
/// [`Connection`]s to a named service, and the core only sends frames on them and closes them.
use std::{
    io::{self, Write},
    net::{Shutdown, SocketAddr, TcpStream},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::debug;

use crate::{Error, SLResult};

/// An open, exclusively owned link to one device service.
pub trait Connection {
    /// Send one complete message frame.
    fn send(&mut self, frame: &[u8]) -> io::Result<()>;
    fn close(&mut self) -> io::Result<()>;
}

/// Something that can open connections to its services, e.g. a physical device.
pub trait Device {
    type Conn: Connection;

    fn connect(&self, service_name: &str) -> SLResult<Self::Conn>;
}

//  _____ ____ ____
// |_   _/ ___|  _ \
//   | || |   | |_) |
//   | || |___|  __/
//   |_| \____|_|

/// A device whose service is reachable on a TCP address, e.g. a port forwarded by the host's
/// device communication stack.
#[derive(Debug, Clone)]
pub struct TcpDevice {
    addr: SocketAddr,
}

impl TcpDevice {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl Device for TcpDevice {
    type Conn = TcpConnection;

    fn connect(&self, service_name: &str) -> SLResult<TcpConnection> {
        debug!(service = service_name, addr = %self.addr, "connecting");
        let stream = TcpStream::connect(self.addr)
            .map_err(|e| Error::Connection(format!("{service_name} at {}: {e}", self.addr)))?;
        Ok(TcpConnection { stream })
    }
}

#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
}

impl Connection for TcpConnection {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        self.stream.write_all(frame)?;
        self.stream.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

//  __  __
// |  \/  | ___ _ __ ___   ___  _ __ _   _
// | |\/| |/ _ \ '_ ` _ \ / _ \| '__| | | |
// | |  | |  __/ | | | | | (_) | |  | |_| |
// |_|  |_|\___|_| |_| |_|\___/|_|   \__, |
//                                   |___/

/// In-memory device that records everything sent to it.
///
/// Clones share the same record, so a clone kept by the caller can inspect what a session wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryDevice {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    services: Vec<String>,
    frames: Vec<Vec<u8>>,
    open: usize,
    refuse_connections: bool,
    fail_send_at: Option<usize>,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `connect` calls fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.lock().refuse_connections = refuse;
    }

    /// Fail the send of frame number `index` (counting from 0 over the device's lifetime).
    pub fn fail_send_at(&self, index: usize) {
        self.lock().fail_send_at = Some(index);
    }

    /// Frames successfully sent, in order.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.lock().frames.clone()
    }

    /// Service names passed to `connect`, one per successful connection.
    pub fn services(&self) -> Vec<String> {
        self.lock().services.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.lock().services.len()
    }

    /// True when every connection handed out has been closed.
    pub fn is_closed(&self) -> bool {
        self.lock().open == 0
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Device for MemoryDevice {
    type Conn = MemoryConnection;

    fn connect(&self, service_name: &str) -> SLResult<MemoryConnection> {
        let mut state = self.lock();
        if state.refuse_connections {
            return Err(Error::Connection(format!("{service_name}: refused")));
        }
        state.services.push(service_name.to_string());
        state.open += 1;
        Ok(MemoryConnection {
            device: self.clone(),
            open: true,
        })
    }
}

#[derive(Debug)]
pub struct MemoryConnection {
    device: MemoryDevice,
    open: bool,
}

impl Connection for MemoryConnection {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        if !self.open {
            return Err(io::ErrorKind::NotConnected.into());
        }
        let mut state = self.device.lock();
        if state.fail_send_at == Some(state.frames.len()) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "injected send failure"));
        }
        state.frames.push(frame.to_vec());
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if self.open {
            self.open = false;
            self.device.lock().open -= 1;
        }
        Ok(())
    }
}
