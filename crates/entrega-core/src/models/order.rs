use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order lifecycle. The server stores the snake_case names; anything else
/// (legacy rows predate the current vocabulary) parses as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    InTransit,
    Delivered,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Unknown => "unknown",
        }
    }

    /// Step on the four-stage customer-facing timeline
    /// (received, preparing, on the way, delivered). Cancelled and unknown
    /// orders sit outside the timeline.
    pub fn timeline_step(&self) -> u8 {
        match self {
            OrderStatus::Pending => 1,
            OrderStatus::Preparing | OrderStatus::Ready => 2,
            OrderStatus::InTransit => 3,
            OrderStatus::Delivered => 4,
            OrderStatus::Cancelled | OrderStatus::Unknown => 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Whether the lifecycle permits moving to `next`. Cancellation is
    /// allowed until the order leaves the merchant.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Preparing)
                | (Pending, Cancelled)
                | (Preparing, Ready)
                | (Preparing, Cancelled)
                | (Ready, InTransit)
                | (Ready, Cancelled)
                | (InTransit, Delivered)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Order received",
            OrderStatus::Preparing => "Being prepared",
            OrderStatus::Ready => "Ready for pickup",
            OrderStatus::InTransit => "On the way",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "preparing" => Ok(OrderStatus::Preparing),
            "ready" => Ok(OrderStatus::Ready),
            "in_transit" => Ok(OrderStatus::InTransit),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// Row from the `orders` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub code: Option<String>,
    pub user_id: Option<String>,
    pub merchant_id: Option<String>,
    pub status: OrderStatus,
    pub address: Option<String>,
    pub courier_name: Option<String>,
    #[serde(default)]
    pub total: f64,
    pub delivery_fee: Option<f64>,
    pub cancellation_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Payload for creating an order at checkout.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub courier_name: Option<String>,
}

/// Partial order update; absent fields are left untouched server-side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrderUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub courier_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
}

/// Row from the `order_items` table. Items carry a denormalized product
/// name and price so order history survives product edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub name: String,
    pub quantity: i64,
    pub price: Option<f64>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewOrderItem {
    pub order_id: i64,
    pub name: String,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub image_url: Option<String>,
}

/// Row from the `deliveries` table tracking the courier leg of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: String,
    pub order_id: i64,
    pub driver_id: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewDelivery {
    pub order_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picked_up_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
}
