use bson::{doc, Document};
use chrono::{Duration, Utc};
use tracing::info;

use crate::modules::users::model::{sample_users, Item, Order, User};
use crate::store::{CollectionRef, DocumentRef, DocumentWriter, MongoStore, StoreError};

pub const USERS_COLLECTION: &str = "users";
pub const ORDERS_COLLECTION: &str = "orders";

pub struct UserCrud<'a, S> {
    store: &'a S,
    users: CollectionRef,
    orders: CollectionRef,
}

impl<'a, S> UserCrud<'a, S> {
    pub fn new(store: &'a S) -> Result<Self, StoreError> {
        Ok(Self {
            store,
            users: CollectionRef::root(USERS_COLLECTION)?,
            orders: CollectionRef::root(ORDERS_COLLECTION)?,
        })
    }
}

/// Orders placed by the `index`-th sample user. Even users get a second order.
pub fn sample_orders(user_id: &str, index: i64) -> Vec<Order> {
    let now = Utc::now();
    let step = index as f64;
    let mut orders = vec![Order {
        user_id: user_id.to_string(),
        order_date: bson::DateTime::from_chrono(now - Duration::days(index)),
        total: 129.99 + step * 10.0,
        items: vec![
            Item::new("Wireless Headphones", 1, 129.99 + step * 5.0),
            Item::new("Charger", 1, step * 5.0),
        ],
    }];

    if index % 2 == 0 {
        orders.push(Order {
            user_id: user_id.to_string(),
            order_date: bson::DateTime::from_chrono(now - Duration::days(2 * index)),
            total: 75.50 + step * 5.0,
            items: vec![
                Item::new("Mousepad", 2, 20.00 + step * 2.0),
                Item::new("Keyboard Cleaner", 1, 35.50 + step),
            ],
        });
    }
    orders
}

impl<S: DocumentWriter> UserCrud<'_, S> {
    pub async fn add_user(&self, user: &User) -> Result<DocumentRef, StoreError> {
        self.store.add(&self.users, bson::to_document(user)?).await
    }

    pub async fn add_order(&self, order: &Order) -> Result<DocumentRef, StoreError> {
        self.store.add(&self.orders, bson::to_document(order)?).await
    }

    /// Adds the sample users, each with orders in the top-level orders collection.
    pub async fn add_samples(&self) -> Result<Vec<DocumentRef>, StoreError> {
        info!("Writing data to separate top-level collections");
        let mut users = Vec::new();
        for (i, user) in sample_users().iter().enumerate() {
            let user_ref = self.add_user(user).await?;
            info!(first_name = %user.first_name, last_name = %user.last_name, id = user_ref.id(), "Added user");

            for (n, order) in sample_orders(user_ref.id(), i as i64).iter().enumerate() {
                self.add_order(order).await?;
                info!(user = user_ref.id(), order = n + 1, collection = ORDERS_COLLECTION, "Added order");
            }
            users.push(user_ref);
        }
        Ok(users)
    }
}

impl UserCrud<'_, MongoStore> {
    /// Runs each of [`user_pipelines`] and returns the rows per pipeline.
    pub async fn read_with_pipelines(&self) -> Result<Vec<Vec<Document>>, StoreError> {
        let mut results = Vec::new();
        for pipeline in user_pipelines() {
            results.push(self.store.aggregate(&self.users, pipeline).await?);
        }
        Ok(results)
    }

    /// Orders of one user across every `orders` collection in the database.
    pub async fn orders_for_user(&self, user_id: &str) -> Result<Vec<(DocumentRef, Order)>, StoreError> {
        self.store
            .collection_group_find(ORDERS_COLLECTION, doc! { "userID": user_id })
            .await
    }
}

fn age_sum() -> Vec<Document> {
    vec![
        doc! { "$group": { "_id": null, "age_sum": { "$sum": "$age" } } },
        doc! { "$project": { "_id": 0 } },
    ]
}

pub fn user_pipelines() -> Vec<Vec<Document>> {
    let mut with_fields = vec![doc! {
        "$addFields": {
            "contact_email": "$email",
            "orig_age": "$age",
            "agePlus+5*2": { "$add": [{ "$add": ["$age", 5] }, 2] },
        }
    }];
    with_fields.extend(age_sum());

    vec![
        vec![doc! { "$project": { "_id": 1 } }],
        vec![doc! {
            "$project": {
                "_id": 0,
                "contact_email": "$email",
                "agePlus5": { "$add": ["$age", 5] },
            }
        }],
        with_fields,
        age_sum(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, MemoryStore};

    #[test]
    fn test_sample_orders_alternate() {
        assert_eq!(sample_orders("u0", 0).len(), 2);
        assert_eq!(sample_orders("u1", 1).len(), 1);

        let orders = sample_orders("u2", 2);
        assert_eq!(orders.len(), 2);
        assert!((orders[0].total - 149.99).abs() < 1e-9);
        assert!((orders[1].total - 85.50).abs() < 1e-9);
        assert!(orders.iter().all(|o| o.user_id == "u2"));
    }

    #[test]
    fn test_pipelines_end_in_age_sum() {
        let pipelines = user_pipelines();
        assert_eq!(pipelines.len(), 4);
        for pipeline in &pipelines[2..] {
            let group = pipeline[pipeline.len() - 2].get_document("$group").unwrap();
            assert!(group.contains_key("age_sum"));
        }
    }

    #[tokio::test]
    async fn test_add_samples_links_orders_to_users() {
        let store = MemoryStore::new();
        let crud = UserCrud::new(&store).unwrap();

        let users = crud.add_samples().await.unwrap();
        assert_eq!(users.len(), 3);

        let orders = CollectionRef::root(ORDERS_COLLECTION).unwrap();
        let order_refs = store.document_refs(&orders).await.unwrap();
        assert_eq!(order_refs.len(), 5);

        for order_ref in order_refs {
            let raw = store.get(&order_ref).await.unwrap();
            let order: Order = bson::from_document(raw).unwrap();
            assert!(users.iter().any(|u| u.id() == order.user_id));
        }
    }
}
