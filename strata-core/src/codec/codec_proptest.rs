//! Property-based tests for the record codec
//!
//! Randomised orders exercise the full field space: any identifier of up to
//! 16 alphabet characters must survive encode/decode exactly, and longer ones
//! must come back as their 16-character prefix.

use super::ident::{self, MAX_IDENTIFIER_LEN};
use super::record::RecordCodec;
use super::symbols::SymbolCache;
use crate::core::{fixed_point, Order, OrderStatus, OrderType, Side};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

const ID_CHARS: &str = "[0-9A-Za-z_-]";

fn side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Buy), Just(Side::Sell)]
}

fn order_type() -> impl Strategy<Value = OrderType> {
    (0u64..5).prop_map(|c| OrderType::from_code(c).unwrap())
}

fn status() -> impl Strategy<Value = OrderStatus> {
    (0u64..7).prop_map(|c| OrderStatus::from_code(c).unwrap())
}

/// Non-negative decimal with at most 9 places that fits the fixed-point range
fn fixed_decimal() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        any::<u64>().prop_map(fixed_point::to_decimal),
        (0i64..10_000_000_000, 0u32..=9)
            .prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale)),
    ]
}

fn identifier(max_len: usize) -> impl Strategy<Value = String> {
    proptest::string::string_regex(&format!("{}{{0,{}}}", ID_CHARS, max_len)).unwrap()
}

fn order(id_len: usize) -> impl Strategy<Value = Order> {
    (
        "[A-Z]{2,6}-[A-Z]{3}",
        side(),
        order_type(),
        fixed_decimal(),
        fixed_decimal(),
        any::<u64>(),
        status(),
        "[A-Z]{3,8}",
        identifier(id_len),
        identifier(id_len),
    )
        .prop_map(
            |(symbol, side, order_type, quantity, price, timestamp, status, venue, oid, cid)| {
                Order {
                    symbol,
                    side,
                    order_type,
                    quantity,
                    price,
                    timestamp,
                    status,
                    venue,
                    order_id: oid,
                    client_order_id: cid,
                }
            },
        )
}

proptest! {
    /// Property: orders with identifiers of at most 16 characters round-trip
    #[test]
    fn prop_roundtrip_short_identifiers(order in order(MAX_IDENTIFIER_LEN)) {
        let codec = RecordCodec::new(Arc::new(SymbolCache::new(1024)));
        let record = codec.encode(&order).unwrap();
        let decoded = codec.decode(&record).unwrap();
        prop_assert_eq!(decoded, order);
    }

    /// Property: longer identifiers decode to their kept prefix, everything
    /// else still round-trips
    #[test]
    fn prop_long_identifiers_truncate(order in order(40)) {
        let codec = RecordCodec::new(Arc::new(SymbolCache::new(1024)));
        let decoded = codec.decode(&codec.encode(&order).unwrap()).unwrap();

        prop_assert_eq!(&decoded.order_id, ident::truncated(&order.order_id));
        prop_assert_eq!(&decoded.client_order_id, ident::truncated(&order.client_order_id));
        prop_assert_eq!(decoded.price, order.price);
        prop_assert_eq!(decoded.quantity, order.quantity);
        prop_assert_eq!(&decoded.symbol, &order.symbol);
    }

    /// Property: packing is injective on kept prefixes
    #[test]
    fn prop_pack_injective(a in identifier(16), b in identifier(16)) {
        let field = crate::core::IdentifierField::OrderId;
        let pa = ident::pack(&a, field).unwrap();
        let pb = ident::pack(&b, field).unwrap();
        prop_assert_eq!(pa == pb, a == b);
    }
}
