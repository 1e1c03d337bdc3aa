use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Geographic point stored on the merchant row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Row from the `merchants` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Merchant {
    pub id: String,
    pub business_name: String,
    pub user_id: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub delivery_fee: f64,
    pub coordinates: Option<Coordinates>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_approved: bool,
    pub rejection_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Partial merchant update for the back-office settings page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MerchantUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_fee: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_approved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// Row from the `products` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub merchant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    pub image_url: Option<String>,
    pub category: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.is_active && self.stock > 0
    }
}

fn default_true() -> bool {
    true
}

/// Payload for creating a product in the merchant back-office.
#[derive(Debug, Clone, Serialize)]
pub struct NewProduct {
    pub merchant_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: f64,
    pub stock: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}
