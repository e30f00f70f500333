//! SSE event framing
//!
//! Every message goes out as a single `data:` event. The payload is written
//! verbatim between the fixed prefix and the terminating blank line.

use bytes::{BufMut, Bytes, BytesMut};

/// Field prefix of a data event
pub const DATA_PREFIX: &[u8] = b"data: ";

/// Terminates an event
pub const EVENT_TERMINATOR: &[u8] = b"\n\n";

/// Encode a message as `data: <message>\n\n`
pub fn encode_event(message: &str) -> Bytes {
    let mut buf =
        BytesMut::with_capacity(DATA_PREFIX.len() + message.len() + EVENT_TERMINATOR.len());
    buf.put_slice(DATA_PREFIX);
    buf.put_slice(message.as_bytes());
    buf.put_slice(EVENT_TERMINATOR);
    buf.freeze()
}
