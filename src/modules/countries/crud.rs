use tracing::info;

use crate::modules::countries::model::{sample_cities, City};
use crate::store::{CollectionRef, DocumentRef, DocumentWriter, StoreError};

pub const COUNTRIES_COLLECTION: &str = "Countries";
pub const CITIES_COLLECTION: &str = "Cities";

pub struct CityCrud<'a, S> {
    store: &'a S,
    countries: CollectionRef,
}

impl<'a, S: DocumentWriter> CityCrud<'a, S> {
    pub fn new(store: &'a S) -> Result<Self, StoreError> {
        Ok(Self {
            store,
            countries: CollectionRef::root(COUNTRIES_COLLECTION)?,
        })
    }

    /// Writes `Countries/{country}/Cities/{city}`, overwriting any existing city.
    ///
    /// Country documents get no data of their own.
    pub async fn set_city(&self, country: &str, name: &str, city: City) -> Result<DocumentRef, StoreError> {
        let document = self
            .countries
            .doc(country)?
            .collection(CITIES_COLLECTION)?
            .doc(name)?;
        self.store.set(&document, bson::to_document(&city)?).await?;
        Ok(document)
    }

    pub async fn add_samples(&self) -> Result<Vec<DocumentRef>, StoreError> {
        info!("Writing city data with Countries/{{country}}/Cities/{{city}} structure");
        let mut added = Vec::new();
        for (country, cities) in sample_cities() {
            for (name, city) in cities {
                let document = self.set_city(country, name, city).await?;
                info!(path = %document, population = city.population, "Added city");
                added.push(document);
            }
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, MemoryStore};

    #[tokio::test]
    async fn test_countries_are_documents_without_data() {
        let store = MemoryStore::new();
        let crud = CityCrud::new(&store).unwrap();

        let added = crud.add_samples().await.unwrap();
        assert_eq!(added.len(), 8);
        assert!(store.contains("Countries/France/Cities/Paris").await);
        assert!(!store.contains("Countries/France").await);

        let countries = CollectionRef::root(COUNTRIES_COLLECTION).unwrap();
        let ids: Vec<String> = store
            .document_refs(&countries)
            .await
            .unwrap()
            .iter()
            .map(|d| d.id().to_string())
            .collect();
        assert_eq!(ids, vec!["Canada", "France", "Germany"]);
    }

    #[tokio::test]
    async fn test_set_city_overwrites() {
        let store = MemoryStore::new();
        let crud = CityCrud::new(&store).unwrap();

        let paris = crud.set_city("France", "Paris", City { population: 1 }).await.unwrap();
        crud.set_city("France", "Paris", City { population: 2 }).await.unwrap();

        let stored: City = bson::from_document(store.get(&paris).await.unwrap()).unwrap();
        assert_eq!(stored.population, 2);
    }
}
