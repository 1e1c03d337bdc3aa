//! Merchant back-office operations: catalog management, incoming orders,
//! and the storefront dashboard stats.

use chrono::{NaiveTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::api::error::ApiError;
use crate::api::rest::RestClient;
use crate::models::{
    Merchant, MerchantUpdate, NewProduct, Order, OrderStatus, OrderUpdate, Product, ProductUpdate,
};

/// How many recent orders feed the client-side sales sum. The hosted
/// endpoint offers no aggregate queries, so the dashboard approximates
/// from the latest rows.
const SALES_SAMPLE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MerchantStats {
    pub orders_today: u64,
    pub total_sales: f64,
}

#[derive(Clone)]
pub struct MerchantService {
    rest: RestClient,
}

impl MerchantService {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    /// The merchant row owned by a signed-in account. A missing row is a
    /// normal state (account not yet onboarded), not an error.
    pub async fn merchant_by_user(&self, user_id: &str) -> Result<Option<Merchant>, ApiError> {
        self.rest
            .select_one(
                "merchants",
                &[
                    ("user_id", format!("eq.{user_id}")),
                    ("select", "*".to_string()),
                ],
            )
            .await
    }

    pub async fn products(&self, merchant_id: &str) -> Result<Vec<Product>, ApiError> {
        self.rest
            .select(
                "products",
                &[
                    ("merchant_id", format!("eq.{merchant_id}")),
                    ("select", "*".to_string()),
                    ("order", "name.asc".to_string()),
                ],
            )
            .await
    }

    pub async fn create_product(&self, product: &NewProduct) -> Result<Product, ApiError> {
        self.rest.insert("products", product).await
    }

    pub async fn update_product(
        &self,
        id: &str,
        update: &ProductUpdate,
    ) -> Result<Option<Product>, ApiError> {
        self.rest
            .update("products", &[("id", format!("eq.{id}"))], update)
            .await
    }

    pub async fn delete_product(&self, id: &str) -> Result<(), ApiError> {
        self.rest
            .delete("products", &[("id", format!("eq.{id}"))])
            .await
    }

    pub async fn orders(&self, merchant_id: &str) -> Result<Vec<Order>, ApiError> {
        self.rest
            .select(
                "orders",
                &[
                    ("merchant_id", format!("eq.{merchant_id}")),
                    ("select", "*".to_string()),
                    ("order", "created_at.desc".to_string()),
                ],
            )
            .await
    }

    pub async fn update_order_status(
        &self,
        order_id: i64,
        status: OrderStatus,
    ) -> Result<Option<Order>, ApiError> {
        let update = OrderUpdate {
            status: Some(status),
            ..Default::default()
        };
        self.rest
            .update("orders", &[("id", format!("eq.{order_id}"))], &update)
            .await
    }

    pub async fn update_merchant(
        &self,
        merchant_id: &str,
        update: &MerchantUpdate,
    ) -> Result<Option<Merchant>, ApiError> {
        self.rest
            .update("merchants", &[("id", format!("eq.{merchant_id}"))], update)
            .await
    }

    /// Dashboard stats: today's order count plus a sales sum over the most
    /// recent orders.
    pub async fn stats(&self, merchant_id: &str) -> Result<MerchantStats, ApiError> {
        let midnight = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();

        let orders_today = self
            .rest
            .count(
                "orders",
                &[
                    ("merchant_id", format!("eq.{merchant_id}")),
                    ("created_at", format!("gte.{}", midnight.to_rfc3339())),
                ],
            )
            .await?;

        #[derive(Deserialize)]
        struct OrderTotal {
            total: Option<f64>,
        }

        let recent: Vec<OrderTotal> = self
            .rest
            .select(
                "orders",
                &[
                    ("merchant_id", format!("eq.{merchant_id}")),
                    ("select", "total".to_string()),
                    ("order", "created_at.desc".to_string()),
                    ("limit", SALES_SAMPLE_LIMIT.to_string()),
                ],
            )
            .await?;
        let total_sales = recent.iter().filter_map(|o| o.total).sum();

        debug!(merchant_id, orders_today, "merchant stats computed");
        Ok(MerchantStats {
            orders_today,
            total_sales,
        })
    }
}
