//! Grouping keys computed for stored objects

mod cryptographic;
mod signature;

pub use cryptographic::content_hash;
pub use signature::{file_name_signature, strip_uuid_prefix};
