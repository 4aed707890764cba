pub mod constants;
pub mod error;
pub mod frame;
pub mod types;

pub use constants::*;
pub use error::HpsError;
pub use frame::{ddns_document, frame_blob, is_valid_domain, parse_framed, ParsedBlob};
pub use types::*;
