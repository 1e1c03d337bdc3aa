//! Client-side shopping cart.
//!
//! A cart holds products from a single merchant: adding a product from a
//! different merchant starts the cart over with that product. Quantities
//! never drop below one; removing the line item is explicit.

use crate::models::{NewOrderItem, Product};

#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub product_id: String,
    pub merchant_id: String,
    pub name: String,
    pub price: f64,
    pub image_url: Option<String>,
    pub quantity: u32,
}

impl CartItem {
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Cart {
    items: Vec<CartItem>,
    merchant_id: Option<String>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn merchant_id(&self) -> Option<&str> {
        self.merchant_id.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add one unit of a product. Same product increments its line;
    /// a product from another merchant resets the cart first.
    pub fn add(&mut self, product: &Product) {
        if let Some(current) = &self.merchant_id {
            if *current != product.merchant_id {
                self.items.clear();
                self.merchant_id = Some(product.merchant_id.clone());
            }
        } else {
            self.merchant_id = Some(product.merchant_id.clone());
        }

        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product.id) {
            item.quantity += 1;
        } else {
            self.items.push(CartItem {
                product_id: product.id.clone(),
                merchant_id: product.merchant_id.clone(),
                name: product.name.clone(),
                price: product.price,
                image_url: product.image_url.clone(),
                quantity: 1,
            });
        }
    }

    /// Remove a line item entirely. The merchant binding stays until the
    /// cart is cleared or an item from elsewhere is added.
    pub fn remove(&mut self, product_id: &str) {
        self.items.retain(|i| i.product_id != product_id);
    }

    /// Set a line's quantity, flooring at one.
    pub fn change_quantity(&mut self, product_id: &str, quantity: u32) {
        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            item.quantity = quantity.max(1);
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.merchant_id = None;
    }

    pub fn subtotal(&self) -> f64 {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Checkout total: items plus the merchant's delivery fee.
    pub fn total_with_delivery(&self, delivery_fee: f64) -> f64 {
        self.subtotal() + delivery_fee
    }

    /// Materialize the cart as order-item rows for a created order.
    pub fn order_items(&self, order_id: i64) -> Vec<NewOrderItem> {
        self.items
            .iter()
            .map(|item| NewOrderItem {
                order_id,
                name: item.name.clone(),
                quantity: i64::from(item.quantity),
                price: Some(item.price),
                image_url: item.image_url.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, merchant_id: &str, price: f64) -> Product {
        Product {
            id: id.to_string(),
            merchant_id: merchant_id.to_string(),
            name: format!("product {id}"),
            description: None,
            price,
            stock: 10,
            image_url: None,
            category: None,
            is_active: true,
        }
    }

    #[test]
    fn test_add_same_product_increments_quantity() {
        let mut cart = Cart::new();
        let empanada = product("p-1", "m-1", 2500.0);
        cart.add(&empanada);
        cart.add(&empanada);

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 2);
        assert_eq!(cart.subtotal(), 5000.0);
        assert_eq!(cart.merchant_id(), Some("m-1"));
    }

    #[test]
    fn test_adding_from_another_merchant_resets_cart() {
        let mut cart = Cart::new();
        cart.add(&product("p-1", "m-1", 2500.0));
        cart.add(&product("p-2", "m-1", 3000.0));
        assert_eq!(cart.items().len(), 2);

        cart.add(&product("p-9", "m-2", 8900.0));

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].product_id, "p-9");
        assert_eq!(cart.merchant_id(), Some("m-2"));
        assert_eq!(cart.subtotal(), 8900.0);
    }

    #[test]
    fn test_change_quantity_floors_at_one() {
        let mut cart = Cart::new();
        cart.add(&product("p-1", "m-1", 2500.0));

        cart.change_quantity("p-1", 5);
        assert_eq!(cart.items()[0].quantity, 5);

        cart.change_quantity("p-1", 0);
        assert_eq!(cart.items()[0].quantity, 1);
    }

    #[test]
    fn test_remove_keeps_merchant_binding() {
        let mut cart = Cart::new();
        cart.add(&product("p-1", "m-1", 2500.0));
        cart.remove("p-1");

        assert!(cart.is_empty());
        assert_eq!(cart.merchant_id(), Some("m-1"));

        cart.clear();
        assert_eq!(cart.merchant_id(), None);
    }

    #[test]
    fn test_checkout_total_adds_delivery_fee() {
        let mut cart = Cart::new();
        cart.add(&product("p-1", "m-1", 2500.0));
        cart.add(&product("p-2", "m-1", 3000.0));
        cart.change_quantity("p-1", 2);

        assert_eq!(cart.subtotal(), 8000.0);
        assert_eq!(cart.total_with_delivery(1990.0), 9990.0);
    }

    #[test]
    fn test_order_items_carry_denormalized_lines() {
        let mut cart = Cart::new();
        cart.add(&product("p-1", "m-1", 2500.0));
        cart.change_quantity("p-1", 3);

        let items = cart.order_items(55);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].order_id, 55);
        assert_eq!(items[0].quantity, 3);
        assert_eq!(items[0].price, Some(2500.0));
    }
}
