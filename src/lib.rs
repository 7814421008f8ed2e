// krusty_motion: socket-level motion diagnostics for Klipper-style firmware

pub mod config;
pub mod correction;
pub mod envelope;
pub mod error;
pub mod framing;
pub mod gcode;
pub mod pacing;
pub mod path;
pub mod session;
pub mod transport;

pub use config::{Config, ConfigError, ConnectionConfig, ReadMode, load_config};
pub use envelope::{Envelope, Reply, TERMINATOR};
pub use error::{PathError, TransportError};
pub use path::{DEFAULT_POINTS, Point, circle_path};
pub use transport::{ConnectionState, FirmwareClient};
