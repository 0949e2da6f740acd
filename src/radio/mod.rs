//! Self-synchronizing byte-framed radio link.

mod link;
mod packet;
mod transport;

pub use link::RadioLink;
pub use packet::{Diagnostic, Motion, Packet, TAG_DIAGNOSTIC, TAG_MOTION};
pub use transport::RadioTransport;
