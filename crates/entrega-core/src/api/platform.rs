//! Customer-facing resource operations.
//!
//! Thin typed wrappers over the REST client for the entities the customer
//! and driver apps touch: orders, order items, merchants, products,
//! addresses, payment methods, profiles, drivers, and deliveries. Column
//! lists mirror what each screen actually renders.

use crate::api::error::ApiError;
use crate::api::rest::RestClient;
use crate::models::{
    Address, AddressUpdate, Delivery, DeliveryUpdate, Driver, Merchant, NewDelivery, NewOrder,
    NewOrderItem, Order, OrderItem, OrderStatus, OrderUpdate, PaymentMethod, Product,
    ProfileUpdate, UserProfile,
};

const MERCHANT_COLUMNS: &str = "id,business_name,user_id,address,phone,delivery_fee,coordinates,image_url,is_approved,rejection_reason,created_at";
const PRODUCT_COLUMNS: &str =
    "id,merchant_id,name,description,price,stock,image_url,category,is_active";
const ADDRESS_COLUMNS: &str = "id,user_id,street,commune,city,is_default,alias,type";
const PAYMENT_COLUMNS: &str = "id,user_id,type,last4,brand,is_default";
const PROFILE_COLUMNS: &str = "id,email,name,phone,role,is_active,points,level,created_at";
const DRIVER_COLUMNS: &str =
    "id,name,phone,user_id,is_approved,is_active,is_available,created_at";

#[derive(Clone)]
pub struct PlatformApi {
    rest: RestClient,
}

impl PlatformApi {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    // ===== Orders =====

    pub async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, ApiError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(status) = status {
            query.push(("status", format!("eq.{status}")));
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

    pub async fn list_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, ApiError> {
        self.rest
            .select(
                "order_items",
                &[
                    ("order_id", format!("eq.{order_id}")),
                    ("select", "*".to_string()),
                ],
            )
            .await
    }

    pub async fn create_order(&self, order: &NewOrder) -> Result<Order, ApiError> {
        self.rest.insert("orders", order).await
    }

    pub async fn create_order_items(&self, items: &[NewOrderItem]) -> Result<(), ApiError> {
        self.rest.insert_many("order_items", items).await
    }

    pub async fn update_order(
        &self,
        id: i64,
        update: &OrderUpdate,
    ) -> Result<Option<Order>, ApiError> {
        self.rest
            .update("orders", &[("id", format!("eq.{id}"))], update)
            .await
    }

    // ===== Catalog =====

    pub async fn list_merchants(&self) -> Result<Vec<Merchant>, ApiError> {
        self.rest
            .select("merchants", &[("select", MERCHANT_COLUMNS.to_string())])
            .await
    }

    pub async fn list_products(&self, merchant_id: Option<&str>) -> Result<Vec<Product>, ApiError> {
        let mut query = vec![("select", PRODUCT_COLUMNS.to_string())];
        if let Some(merchant_id) = merchant_id {
            query.push(("merchant_id", format!("eq.{merchant_id}")));
        }
        self.rest.select("products", &query).await
    }

    // ===== Addresses =====

    pub async fn list_addresses(&self, user_id: Option<&str>) -> Result<Vec<Address>, ApiError> {
        let mut query = vec![("select", ADDRESS_COLUMNS.to_string())];
        if let Some(user_id) = user_id {
            query.push(("user_id", format!("eq.{user_id}")));
        }
        self.rest.select("addresses", &query).await
    }

    pub async fn default_address(&self, user_id: &str) -> Result<Option<Address>, ApiError> {
        self.rest
            .select_one(
                "addresses",
                &[
                    ("user_id", format!("eq.{user_id}")),
                    ("is_default", "eq.true".to_string()),
                    ("select", ADDRESS_COLUMNS.to_string()),
                ],
            )
            .await
    }

    pub async fn update_address(
        &self,
        id: &str,
        update: &AddressUpdate,
    ) -> Result<Option<Address>, ApiError> {
        self.rest
            .update("addresses", &[("id", format!("eq.{id}"))], update)
            .await
    }

    // ===== Payment methods =====

    pub async fn list_payment_methods(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<PaymentMethod>, ApiError> {
        let mut query = vec![("select", PAYMENT_COLUMNS.to_string())];
        if let Some(user_id) = user_id {
            query.push(("user_id", format!("eq.{user_id}")));
        }
        self.rest.select("payment_methods", &query).await
    }

    // ===== Profiles =====

    pub async fn get_user_profile(&self, id: &str) -> Result<Option<UserProfile>, ApiError> {
        self.rest
            .select_one(
                "users",
                &[
                    ("id", format!("eq.{id}")),
                    ("select", PROFILE_COLUMNS.to_string()),
                ],
            )
            .await
    }

    pub async fn update_user_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<UserProfile>, ApiError> {
        self.rest
            .update("users", &[("id", format!("eq.{id}"))], update)
            .await
    }

    // ===== Drivers and deliveries =====

    pub async fn list_drivers(&self) -> Result<Vec<Driver>, ApiError> {
        self.rest
            .select("drivers", &[("select", DRIVER_COLUMNS.to_string())])
            .await
    }

    pub async fn delivery_by_order(&self, order_id: i64) -> Result<Option<Delivery>, ApiError> {
        self.rest
            .select_one(
                "deliveries",
                &[
                    ("order_id", format!("eq.{order_id}")),
                    ("select", "*".to_string()),
                ],
            )
            .await
    }

    pub async fn create_delivery(&self, delivery: &NewDelivery) -> Result<Delivery, ApiError> {
        self.rest.insert("deliveries", delivery).await
    }

    pub async fn update_delivery(
        &self,
        id: &str,
        update: &DeliveryUpdate,
    ) -> Result<Option<Delivery>, ApiError> {
        self.rest
            .update("deliveries", &[("id", format!("eq.{id}"))], update)
            .await
    }
}
