pub mod clock;
pub mod comm;
pub mod comm_config;
pub mod config;
pub mod data_structures;
pub mod error;
pub mod link;
pub mod sampler;
pub mod session;

pub use comm::{crc32, encode, Frame, FrameParser};
pub use comm_config::LinkSettings;
pub use config::SessionConfig;
pub use data_structures::{ScaleConfig, SessionState, Transform, TransformSample};
pub use error::{ConfigError, LinkError, SessionError};
pub use link::{list_ports, DryRunOpener, LinkOpener, PortInfo, SerialLink, SerialPortOpener};
pub use sampler::{sample, SceneSource, SharedScene};
pub use session::StreamingSession;
