//! Record codec: domain `Order` <-> fixed-width `OrderRecord`
//!
//! - `record`: record layout, `RecordCodec`, `DecodePolicy`
//! - `symbols`: FNV-1a hashing with a bounded, shared memo
//! - `ident`: two-word radix packing of short identifiers

pub mod ident;
pub mod record;
pub mod symbols;

#[cfg(test)]
mod codec_proptest;

pub use ident::MAX_IDENTIFIER_LEN;
pub use record::{DecodePolicy, OrderRecord, RecordCodec, RECORD_WORDS};
pub use symbols::{fnv1a, SymbolCache};
