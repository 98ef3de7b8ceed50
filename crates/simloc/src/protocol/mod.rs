/// Wire protocol of the simulated-location service.
pub mod simlocation;

pub use simlocation::{encode, parse, Frame, LocationMessage};

/// Name under which the device exposes the simulated-location service.
pub const SERVICE_NAME: &str = "com.apple.dt.simulatelocation";
