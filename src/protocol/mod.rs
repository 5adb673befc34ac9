//! Line-oriented ASCII protocol spoken with the host.
//!
//! Inbound: one command per line, `<yaw>` or `<pitch>,<yaw>`, CR/LF/CRLF
//! terminated. Outbound: diagnostic lines starting with `# `.

mod command;
mod diagnostic;
mod line_buffer;
mod link;

pub use command::*;
pub use diagnostic::*;
pub use line_buffer::*;
pub use link::*;
