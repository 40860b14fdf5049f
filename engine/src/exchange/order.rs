//! Order records kept by venues

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::portfolio::Side;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    /// Buy
    Buy,
    /// Sell
    Sell,
}

impl OrderSide {
    /// Side of the order that opens a position
    pub fn opening(side: Side) -> Self {
        match side {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        }
    }

    /// Side of the order that flattens a position
    pub fn closing(side: Side) -> Self {
        Self::opening(side.opposite())
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Filled
    Filled,
    /// Rejected
    Rejected,
}

/// Market order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Order ID
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    /// Closing orders only reduce an existing position
    pub reduce_only: bool,
    /// Average fill price
    pub avg_fill_price: Option<f64>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Create a filled market order
    pub fn filled(
        id: String,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        fill_price: f64,
        reduce_only: bool,
    ) -> Self {
        Self {
            id,
            symbol: symbol.to_string(),
            side,
            quantity,
            reduce_only,
            avg_fill_price: Some(fill_price),
            status: OrderStatus::Filled,
            created_at: Utc::now(),
        }
    }

    /// Create a rejected market order
    pub fn rejected(id: String, symbol: &str, side: OrderSide, quantity: f64, reduce_only: bool) -> Self {
        Self {
            id,
            symbol: symbol.to_string(),
            side,
            quantity,
            reduce_only,
            avg_fill_price: None,
            status: OrderStatus::Rejected,
            created_at: Utc::now(),
        }
    }

    /// Check if order is filled
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }
}
