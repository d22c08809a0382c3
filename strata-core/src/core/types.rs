//! Domain order types at the ingestion boundary
//!
//! Producers hand the core an [`Order`] built from strings and decimals;
//! the codec turns it into a fixed-width [`OrderRecord`](crate::codec::OrderRecord)
//! before it ever touches a ring buffer.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side (Buy or Sell)
///
/// Single byte enum for minimal size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    /// Wire code stored in the record
    #[inline(always)]
    pub const fn code(self) -> u64 {
        self as u64
    }

    /// Parse a wire code. There is no fallback for sides.
    #[inline]
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Side::Buy),
            1 => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OrderType {
    Limit = 0,
    Market = 1,
    PostOnly = 2,
    Stop = 3,
    StopLimit = 4,
}

impl OrderType {
    #[inline(always)]
    pub const fn code(self) -> u64 {
        self as u64
    }

    #[inline]
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(OrderType::Limit),
            1 => Some(OrderType::Market),
            2 => Some(OrderType::PostOnly),
            3 => Some(OrderType::Stop),
            4 => Some(OrderType::StopLimit),
            _ => None,
        }
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OrderStatus {
    Pending = 0,
    Open = 1,
    PartiallyFilled = 2,
    Filled = 3,
    Cancelled = 4,
    Rejected = 5,
    Expired = 6,
}

impl OrderStatus {
    #[inline(always)]
    pub const fn code(self) -> u64 {
        self as u64
    }

    #[inline]
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(OrderStatus::Pending),
            1 => Some(OrderStatus::Open),
            2 => Some(OrderStatus::PartiallyFilled),
            3 => Some(OrderStatus::Filled),
            4 => Some(OrderStatus::Cancelled),
            5 => Some(OrderStatus::Rejected),
            6 => Some(OrderStatus::Expired),
            _ => None,
        }
    }
}

/// An inbound order as produced by intake adapters and strategies.
///
/// The core performs no business validation on it. Identifiers are expected
/// to be short ASCII strings (`0-9A-Za-z-_`); only the first
/// [`MAX_IDENTIFIER_LEN`](crate::codec::MAX_IDENTIFIER_LEN) characters survive
/// encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Decimal,
    /// Nanoseconds since the Unix epoch
    pub timestamp: u64,
    pub status: OrderStatus,
    pub venue: String,
    pub order_id: String,
    pub client_order_id: String,
}

impl Order {
    /// Convenience constructor for a pending limit order
    pub fn limit(
        symbol: impl Into<String>,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        venue: impl Into<String>,
        order_id: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Limit,
            quantity,
            price,
            timestamp: now_ns(),
            status: OrderStatus::Pending,
            venue: venue.into(),
            order_id: order_id.into(),
            client_order_id: String::new(),
        }
    }

    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = id.into();
        self
    }
}

/// Current wall-clock time in nanoseconds
pub fn now_ns() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Fixed-point conversion utilities
///
/// Records carry prices and sizes with 9 decimal places.
pub mod fixed_point {
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal::Decimal;

    /// Scale factor for 9 decimal places
    pub const SCALE: u64 = 1_000_000_000;

    /// Number of decimal places kept
    pub const DECIMALS: u32 = 9;

    /// Convert a non-negative decimal with at most 9 decimal places.
    ///
    /// Returns None for negative values, finer precision or overflow.
    #[inline]
    pub fn from_decimal(value: Decimal) -> Option<u64> {
        if value.is_sign_negative() && !value.is_zero() {
            return None;
        }
        let scaled = value.checked_mul(Decimal::from(SCALE))?;
        if !scaled.fract().is_zero() {
            return None;
        }
        scaled.trunc().to_u64()
    }

    /// Convert fixed-point back to a decimal
    #[inline]
    pub fn to_decimal(value: u64) -> Decimal {
        Decimal::from_i128_with_scale(value as i128, DECIMALS)
    }
}
