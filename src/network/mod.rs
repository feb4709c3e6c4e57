//! UDP transport: audio ingest, control text, outbound commands

pub mod audio;
pub mod command;
pub mod control;
pub mod udp;

pub use audio::{AudioIngest, AudioListener};
pub use command::CommandSender;
pub use control::{control_queue, ControlListener, ControlProcessor};
pub use udp::create_socket;
