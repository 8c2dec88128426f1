use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Track,
    Course,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[validate(length(min = 1, message = "Item id is required"))]
    pub item_id: String,
    pub item_type: ItemType,

    #[serde(default)]
    pub title: String,

    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,
}

/// One cart per learner, keyed by the learner's user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(rename = "_id")]
    pub user_id: String,

    #[serde(default)]
    pub items: Vec<CartItem>,

    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn empty(user_id: impl Into<String>) -> Self {
        Cart {
            user_id: user_id.into(),
            items: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Adds an item unless one with the same id is already present.
    pub fn add_item(&mut self, item: CartItem) -> bool {
        if self.items.iter().any(|existing| existing.item_id == item.item_id) {
            return false;
        }
        self.items.push(item);
        self.updated_at = Utc::now();
        true
    }

    pub fn remove_item(&mut self, item_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.item_id != item_id);
        self.updated_at = Utc::now();
        self.items.len() != before
    }

    pub fn total(&self) -> f64 {
        cart_total(&self.items)
    }
}

pub fn cart_total(items: &[CartItem]) -> f64 {
    items.iter().map(|item| item.price).sum()
}

/// Splits cart items into (track ids, course ids) for enrollment.
pub fn enrollment_ids(items: &[CartItem]) -> (Vec<String>, Vec<String>) {
    let mut tracks = Vec::new();
    let mut courses = Vec::new();
    for item in items {
        match item.item_type {
            ItemType::Track => tracks.push(item.item_id.clone()),
            ItemType::Course => courses.push(item.item_id.clone()),
        }
    }
    (tracks, courses)
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub cart: Cart,
    pub total: f64,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        let total = cart.total();
        CartResponse { cart, total }
    }
}
