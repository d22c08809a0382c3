//! Fixed-width order record and the codec that produces it
//!
//! ```text
//! ┌──────────────────────────── OrderRecord (96 bytes) ───────────────────────────┐
//! │ symbol_hash │ side │ order_type │ quantity │ price │ timestamp │ status │      │
//! │ venue_hash  │ order_id_hi │ order_id_lo │ client_order_id_hi │ client_id_lo   │
//! └───────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every field is one `u64`. Quantity and price are fixed-point with 9
//! decimals. Strings are hashed through the shared [`SymbolCache`];
//! identifiers are packed by [`ident`](super::ident).

use super::ident;
use super::symbols::SymbolCache;
use crate::core::{
    fixed_point, CodecError, IdentifierField, Order, OrderStatus, OrderType, Side,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Number of machine words in a record
pub const RECORD_WORDS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct OrderRecord {
    pub symbol_hash: u64,
    pub side: u64,
    pub order_type: u64,
    pub quantity: u64,
    pub price: u64,
    pub timestamp: u64,
    pub status: u64,
    pub venue_hash: u64,
    pub order_id_hi: u64,
    pub order_id_lo: u64,
    pub client_order_id_hi: u64,
    pub client_order_id_lo: u64,
}

impl OrderRecord {
    /// View the record as its raw words, in declaration order
    pub fn words(&self) -> [u64; RECORD_WORDS] {
        [
            self.symbol_hash,
            self.side,
            self.order_type,
            self.quantity,
            self.price,
            self.timestamp,
            self.status,
            self.venue_hash,
            self.order_id_hi,
            self.order_id_lo,
            self.client_order_id_hi,
            self.client_order_id_lo,
        ]
    }

    pub fn from_words(w: [u64; RECORD_WORDS]) -> Self {
        Self {
            symbol_hash: w[0],
            side: w[1],
            order_type: w[2],
            quantity: w[3],
            price: w[4],
            timestamp: w[5],
            status: w[6],
            venue_hash: w[7],
            order_id_hi: w[8],
            order_id_lo: w[9],
            client_order_id_hi: w[10],
            client_order_id_lo: w[11],
        }
    }
}

/// How unknown enum codes are treated on decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DecodePolicy {
    /// Unknown order type decodes to `Limit`, unknown status to `Pending`
    #[default]
    Permissive,
    /// Unknown codes are errors
    Strict,
}

/// Encodes domain orders into records and back.
///
/// Cloning is cheap; clones share the symbol cache.
#[derive(Clone)]
pub struct RecordCodec {
    symbols: Arc<SymbolCache>,
    policy: DecodePolicy,
}

impl RecordCodec {
    pub fn new(symbols: Arc<SymbolCache>) -> Self {
        Self {
            symbols,
            policy: DecodePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DecodePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> DecodePolicy {
        self.policy
    }

    pub fn symbols(&self) -> &Arc<SymbolCache> {
        &self.symbols
    }

    /// Encode an order.
    ///
    /// Identifiers longer than [`ident::MAX_IDENTIFIER_LEN`] are truncated;
    /// use [`is_lossless`](Self::is_lossless) to detect that up front.
    pub fn encode(&self, order: &Order) -> Result<OrderRecord, CodecError> {
        let (order_id_hi, order_id_lo) = ident::pack(&order.order_id, IdentifierField::OrderId)?;
        let (client_order_id_hi, client_order_id_lo) =
            ident::pack(&order.client_order_id, IdentifierField::ClientOrderId)?;

        Ok(OrderRecord {
            symbol_hash: self.symbols.intern(&order.symbol),
            side: order.side.code(),
            order_type: order.order_type.code(),
            quantity: to_fixed("quantity", order.quantity)?,
            price: to_fixed("price", order.price)?,
            timestamp: order.timestamp,
            status: order.status.code(),
            venue_hash: self.symbols.intern(&order.venue),
            order_id_hi,
            order_id_lo,
            client_order_id_hi,
            client_order_id_lo,
        })
    }

    /// Decode a record.
    ///
    /// Unknown symbol or venue hashes decode to a `#<hex>` placeholder.
    pub fn decode(&self, record: &OrderRecord) -> Result<Order, CodecError> {
        let side = Side::from_code(record.side).ok_or(CodecError::UnknownCode {
            field: "side",
            code: record.side,
        })?;

        let order_type = match (OrderType::from_code(record.order_type), self.policy) {
            (Some(t), _) => t,
            (None, DecodePolicy::Permissive) => OrderType::Limit,
            (None, DecodePolicy::Strict) => {
                return Err(CodecError::UnknownCode {
                    field: "order_type",
                    code: record.order_type,
                })
            }
        };

        let status = match (OrderStatus::from_code(record.status), self.policy) {
            (Some(s), _) => s,
            (None, DecodePolicy::Permissive) => OrderStatus::Pending,
            (None, DecodePolicy::Strict) => {
                return Err(CodecError::UnknownCode {
                    field: "status",
                    code: record.status,
                })
            }
        };

        Ok(Order {
            symbol: self.symbols.resolve_or_placeholder(record.symbol_hash),
            side,
            order_type,
            quantity: fixed_point::to_decimal(record.quantity),
            price: fixed_point::to_decimal(record.price),
            timestamp: record.timestamp,
            status,
            venue: self.symbols.resolve_or_placeholder(record.venue_hash),
            order_id: ident::unpack(record.order_id_hi, record.order_id_lo),
            client_order_id: ident::unpack(record.client_order_id_hi, record.client_order_id_lo),
        })
    }

    /// True if `decode(encode(order)) == order` is guaranteed: identifiers fit,
    /// and both strings are (or can still be) held by the symbol cache.
    pub fn is_lossless(&self, order: &Order) -> bool {
        let ids_fit = ident::truncated(&order.order_id).len() == order.order_id.len()
            && ident::truncated(&order.client_order_id).len() == order.client_order_id.len();
        // A hash already owned by a different string is a collision
        let cached = |s: &str| match self.symbols.resolve(super::symbols::fnv1a(s)) {
            Some(name) => name == s,
            None => !self.symbols.is_full(),
        };
        ids_fit && cached(&order.symbol) && cached(&order.venue)
    }
}

fn to_fixed(field: &'static str, value: Decimal) -> Result<u64, CodecError> {
    fixed_point::from_decimal(value).ok_or_else(|| CodecError::InvalidDecimal {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn codec() -> RecordCodec {
        RecordCodec::new(Arc::new(SymbolCache::new(64)))
    }

    fn sample() -> Order {
        Order {
            symbol: "BTC-USD".into(),
            side: Side::Sell,
            order_type: OrderType::PostOnly,
            quantity: dec!(0.25),
            price: dec!(50000.5),
            timestamp: 1_700_000_000_000_000_000,
            status: OrderStatus::Open,
            venue: "LIGHTER".into(),
            order_id: "ORD0000000000042".into(),
            client_order_id: "cli-7".into(),
        }
    }

    #[test]
    fn test_record_layout() {
        assert_eq!(std::mem::size_of::<OrderRecord>(), RECORD_WORDS * 8);
    }

    #[test]
    fn test_roundtrip() {
        let codec = codec();
        let order = sample();
        let record = codec.encode(&order).unwrap();
        assert_eq!(codec.decode(&record).unwrap(), order);
        assert!(codec.is_lossless(&order));
    }

    #[test]
    fn test_encoded_fields() {
        let codec = codec();
        let record = codec.encode(&sample()).unwrap();
        assert_eq!(record.side, 1);
        assert_eq!(record.order_type, 2);
        assert_eq!(record.status, 1);
        assert_eq!(record.quantity, 250_000_000);
        assert_eq!(record.price, 50_000_500_000_000);
        assert_eq!(record.symbol_hash, super::super::symbols::fnv1a("BTC-USD"));
    }

    #[test]
    fn test_words_roundtrip() {
        let record = codec().encode(&sample()).unwrap();
        assert_eq!(OrderRecord::from_words(record.words()), record);
    }

    #[test]
    fn test_permissive_unknown_codes() {
        let codec = codec();
        let mut record = codec.encode(&sample()).unwrap();
        record.order_type = 99;
        record.status = 42;

        let order = codec.decode(&record).unwrap();
        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_strict_unknown_codes() {
        let codec = codec().with_policy(DecodePolicy::Strict);
        let mut record = codec.encode(&sample()).unwrap();
        record.status = 42;

        assert_eq!(
            codec.decode(&record).unwrap_err(),
            CodecError::UnknownCode { field: "status", code: 42 }
        );
    }

    #[test]
    fn test_unknown_side_always_rejected() {
        let codec = codec();
        let mut record = codec.encode(&sample()).unwrap();
        record.side = 2;
        assert!(matches!(
            codec.decode(&record),
            Err(CodecError::UnknownCode { field: "side", .. })
        ));
    }

    #[test]
    fn test_unknown_symbol_placeholder() {
        let codec = codec();
        let mut record = codec.encode(&sample()).unwrap();
        record.symbol_hash = 0xdead_beef;
        let order = codec.decode(&record).unwrap();
        assert_eq!(order.symbol, "#00000000deadbeef");
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut order = sample();
        order.price = dec!(-1);
        assert!(matches!(
            codec().encode(&order),
            Err(CodecError::InvalidDecimal { field: "price", .. })
        ));
    }

    #[test]
    fn test_too_precise_quantity_rejected() {
        let mut order = sample();
        order.quantity = dec!(0.0000000001);
        assert!(matches!(
            codec().encode(&order),
            Err(CodecError::InvalidDecimal { field: "quantity", .. })
        ));
    }

    #[test]
    fn test_long_identifier_not_lossless() {
        let codec = codec();
        let mut order = sample();
        order.client_order_id = "a-very-long-client-order-identifier".into();
        assert!(!codec.is_lossless(&order));

        let decoded = codec.decode(&codec.encode(&order).unwrap()).unwrap();
        assert_eq!(decoded.client_order_id, "a-very-long-clie");
    }

    #[test]
    fn test_hash_collision_not_lossless() {
        let codec = codec();
        // Another string already holds the symbol's hash slot
        codec
            .symbols()
            .remember("XBT-USD", super::super::symbols::fnv1a("BTC-USD"));
        assert!(!codec.is_lossless(&sample()));

        let decoded = codec.decode(&codec.encode(&sample()).unwrap()).unwrap();
        assert_eq!(decoded.symbol, "XBT-USD");
    }

    #[test]
    fn test_shared_cache_between_clones() {
        let a = codec();
        let b = a.clone();
        let record = a.encode(&sample()).unwrap();
        assert_eq!(b.decode(&record).unwrap().symbol, "BTC-USD");
    }
}
