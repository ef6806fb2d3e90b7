use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: i32,
}

impl User {
    pub fn new(first_name: &str, last_name: &str, email: &str, age: i32) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            age,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub product_name: String,
    pub quantity: i32,
    pub price: f64,
}

impl Item {
    pub fn new(product_name: &str, quantity: i32, price: f64) -> Self {
        Self {
            product_name: product_name.to_string(),
            quantity,
            price,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Order {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "orderDate")]
    pub order_date: bson::DateTime,
    pub total: f64,
    pub items: Vec<Item>,
}

impl Order {
    pub fn order_date_rfc3339(&self) -> String {
        self.order_date.try_to_rfc3339_string().unwrap_or_default()
    }
}

pub fn sample_users() -> Vec<User> {
    vec![
        User::new("Maria", "Garcia", "maria.garcia@example.com", 30),
        User::new("John", "Doe", "john.doe@example.com", 40),
        User::new("Alice", "Smith", "alice.smith@example.com", 50),
    ]
}
