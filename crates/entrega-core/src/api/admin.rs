//! Admin back-office operations: platform-wide order management, account
//! moderation, merchant/driver approval, and the global dashboard counts.

use chrono::{DateTime, NaiveTime, Utc};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::rest::RestClient;
use crate::models::{
    Driver, Merchant, MerchantUpdate, Order, OrderStatus, OrderUpdate, Role, UserProfile,
};

/// How many of a customer's orders the account view shows.
const USER_ORDER_HISTORY_LIMIT: u32 = 10;

/// Filters for the admin order list.
#[derive(Debug, Clone, Default)]
pub struct OrderFilters {
    pub status: Option<OrderStatus>,
    pub merchant_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminMerchantStats {
    pub total_orders: u64,
    pub delivered_orders: u64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalStats {
    pub orders_today: u64,
    pub total_customers: u64,
    pub active_merchants: u64,
    pub available_drivers: u64,
}

#[derive(Clone)]
pub struct AdminService {
    rest: RestClient,
}

impl AdminService {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    // ===== Orders =====

    pub async fn orders(&self, filters: &OrderFilters) -> Result<Vec<Order>, ApiError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(status) = filters.status {
            query.push(("status", format!("eq.{status}")));
        }
        if let Some(merchant_id) = &filters.merchant_id {
            query.push(("merchant_id", format!("eq.{merchant_id}")));
        }
        if let Some(start) = filters.start_date {
            query.push(("created_at", format!("gte.{}", start.to_rfc3339())));
        }
        if let Some(end) = filters.end_date {
            query.push(("created_at", format!("lte.{}", end.to_rfc3339())));
        }
        self.rest.select("orders", &query).await
    }

    pub async fn order_by_id(&self, id: i64) -> Result<Option<Order>, ApiError> {
        self.rest
            .select_one(
                "orders",
                &[("id", format!("eq.{id}")), ("select", "*".to_string())],
            )
            .await
    }

    pub async fn update_order_status(
        &self,
        id: i64,
        status: OrderStatus,
    ) -> Result<Option<Order>, ApiError> {
        let update = OrderUpdate {
            status: Some(status),
            ..Default::default()
        };
        self.rest
            .update("orders", &[("id", format!("eq.{id}"))], &update)
            .await
    }

    pub async fn cancel_order(&self, id: i64, reason: &str) -> Result<Option<Order>, ApiError> {
        let update = OrderUpdate {
            status: Some(OrderStatus::Cancelled),
            cancellation_reason: Some(reason.to_string()),
            ..Default::default()
        };
        self.rest
            .update("orders", &[("id", format!("eq.{id}"))], &update)
            .await
    }

    // ===== Customers =====

    pub async fn customers(&self) -> Result<Vec<UserProfile>, ApiError> {
        self.rest
            .select(
                "users",
                &[
                    ("role", format!("eq.{}", Role::Customer)),
                    ("select", "*".to_string()),
                    ("order", "created_at.desc".to_string()),
                ],
            )
            .await
    }

    pub async fn user_by_id(&self, id: &str) -> Result<Option<UserProfile>, ApiError> {
        self.rest
            .select_one(
                "users",
                &[("id", format!("eq.{id}")), ("select", "*".to_string())],
            )
            .await
    }

    pub async fn user_orders(&self, user_id: &str) -> Result<Vec<Order>, ApiError> {
        self.rest
            .select(
                "orders",
                &[
                    ("user_id", format!("eq.{user_id}")),
                    ("select", "*".to_string()),
                    ("order", "created_at.desc".to_string()),
                    ("limit", USER_ORDER_HISTORY_LIMIT.to_string()),
                ],
            )
            .await
    }

    pub async fn set_user_active(
        &self,
        id: &str,
        is_active: bool,
    ) -> Result<Option<UserProfile>, ApiError> {
        self.rest
            .update(
                "users",
                &[("id", format!("eq.{id}"))],
                &serde_json::json!({ "is_active": is_active }),
            )
            .await
    }

    // ===== Merchants =====

    pub async fn merchants(&self) -> Result<Vec<Merchant>, ApiError> {
        self.rest
            .select(
                "merchants",
                &[
                    ("select", "*".to_string()),
                    ("order", "created_at.desc".to_string()),
                ],
            )
            .await
    }

    pub async fn merchant_by_id(&self, id: &str) -> Result<Option<Merchant>, ApiError> {
        self.rest
            .select_one(
                "merchants",
                &[("id", format!("eq.{id}")), ("select", "*".to_string())],
            )
            .await
    }

    /// Order count and delivered revenue for one merchant, computed from
    /// its order rows.
    pub async fn merchant_stats(&self, merchant_id: &str) -> Result<AdminMerchantStats, ApiError> {
        #[derive(Deserialize)]
        struct OrderRow {
            total: Option<f64>,
            status: OrderStatus,
        }

        let rows: Vec<OrderRow> = self
            .rest
            .select(
                "orders",
                &[
                    ("merchant_id", format!("eq.{merchant_id}")),
                    ("select", "id,total,status".to_string()),
                ],
            )
            .await?;

        let delivered: Vec<&OrderRow> = rows
            .iter()
            .filter(|row| row.status == OrderStatus::Delivered)
            .collect();
        Ok(AdminMerchantStats {
            total_orders: rows.len() as u64,
            delivered_orders: delivered.len() as u64,
            total_revenue: delivered.iter().filter_map(|row| row.total).sum(),
        })
    }

    pub async fn approve_merchant(&self, id: &str) -> Result<Option<Merchant>, ApiError> {
        let update = MerchantUpdate {
            is_approved: Some(true),
            ..Default::default()
        };
        self.rest
            .update("merchants", &[("id", format!("eq.{id}"))], &update)
            .await
    }

    pub async fn reject_merchant(
        &self,
        id: &str,
        reason: &str,
    ) -> Result<Option<Merchant>, ApiError> {
        let update = MerchantUpdate {
            is_approved: Some(false),
            rejection_reason: Some(reason.to_string()),
            ..Default::default()
        };
        self.rest
            .update("merchants", &[("id", format!("eq.{id}"))], &update)
            .await
    }

    // ===== Drivers =====

    pub async fn drivers(&self) -> Result<Vec<Driver>, ApiError> {
        self.rest
            .select(
                "drivers",
                &[
                    ("select", "*".to_string()),
                    ("order", "created_at.desc".to_string()),
                ],
            )
            .await
    }

    pub async fn approve_driver(&self, id: &str) -> Result<Option<Driver>, ApiError> {
        self.rest
            .update(
                "drivers",
                &[("id", format!("eq.{id}"))],
                &serde_json::json!({ "is_approved": true }),
            )
            .await
    }

    pub async fn set_driver_active(
        &self,
        id: &str,
        is_active: bool,
    ) -> Result<Option<Driver>, ApiError> {
        self.rest
            .update(
                "drivers",
                &[("id", format!("eq.{id}"))],
                &serde_json::json!({ "is_active": is_active }),
            )
            .await
    }

    // ===== Dashboard =====

    /// The four headline numbers on the admin dashboard. Counts run as
    /// independent sequential requests; each is cheap server-side.
    pub async fn global_stats(&self) -> Result<GlobalStats, ApiError> {
        let midnight = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();

        let orders_today = self
            .rest
            .count(
                "orders",
                &[("created_at", format!("gte.{}", midnight.to_rfc3339()))],
            )
            .await?;
        let total_customers = self
            .rest
            .count("users", &[("role", format!("eq.{}", Role::Customer))])
            .await?;
        let active_merchants = self
            .rest
            .count("merchants", &[("is_approved", "eq.true".to_string())])
            .await?;
        let available_drivers = self
            .rest
            .count("drivers", &[("is_available", "eq.true".to_string())])
            .await?;

        Ok(GlobalStats {
            orders_today,
            total_customers,
            active_merchants,
            available_drivers,
        })
    }
}
