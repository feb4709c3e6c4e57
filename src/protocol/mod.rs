//! Wire formats: binary audio frames, text control lines, WebSocket messages

pub mod control;
pub mod frame;
pub mod messages;

pub use control::ControlMessage;
pub use frame::AudioFrame;
pub use messages::{ClientCommand, Role, ServerMessage};
