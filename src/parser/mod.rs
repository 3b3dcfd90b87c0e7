//! Email parsing: mbox framing, header decoding, and message normalization.

pub mod header;
pub mod mbox;
pub mod mime;

pub use header::{decode_header, decode_header_bytes};
pub use mime::{extract_plain_body, normalize};
