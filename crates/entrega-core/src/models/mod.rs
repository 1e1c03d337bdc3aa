//! Data models for the delivery platform.
//!
//! This module contains the typed rows of the hosted tables and the
//! session-level user types:
//!
//! - `UserProfile`, `AuthIdentity`, `SessionUser`: account and session types
//! - `Merchant`, `Product`: storefront catalog
//! - `Order`, `OrderItem`, `Delivery`: order lifecycle and courier tracking
//! - `Address`, `PaymentMethod`, `Driver`: supporting entities
//!
//! Update payloads (`OrderUpdate`, `ProductUpdate`, ...) serialize only the
//! fields that are set, matching the partial-update semantics of the REST
//! endpoint.

pub mod address;
pub mod driver;
pub mod merchant;
pub mod order;
pub mod payment;
pub mod user;

pub use address::{Address, AddressKind, AddressUpdate};
pub use driver::Driver;
pub use merchant::{Coordinates, Merchant, MerchantUpdate, NewProduct, Product, ProductUpdate};
pub use order::{
    Delivery, DeliveryUpdate, NewDelivery, NewOrder, NewOrderItem, Order, OrderItem, OrderStatus,
    OrderUpdate,
};
pub use payment::{PaymentKind, PaymentMethod};
pub use user::{
    AuthIdentity, LoyaltyLevel, ProfileUpdate, Role, SessionUser, UserMetadata, UserProfile,
};
