use crate::domain::money::Price;
use crate::domain::party::{
    Business, BusinessFilter, BusinessId, Location, LocationId, NewBusiness, NewLocation,
    NewReview, NewSellable, NewUser, Review, SavedBusiness, Sellable, SellableFilter,
    SellableKind, User, UserId, UserRole,
};
use crate::domain::ports::DirectoryStoreBox;
use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub businesses: Vec<Business>,
    pub sellables: Vec<Sellable>,
}

/// The browsable side of the marketplace: registration, listings, bookmarks,
/// reviews. No state machines here, just gated CRUD over the directory port.
pub struct DirectoryService {
    directory: DirectoryStoreBox,
}

impl DirectoryService {
    pub fn new(directory: DirectoryStoreBox) -> Self {
        Self { directory }
    }

    pub async fn register_user(&self, name: String, email: String, role: UserRole) -> Result<User> {
        if name.trim().is_empty() || email.trim().is_empty() {
            return Err(EngineError::Validation(
                "name and email are required".to_string(),
            ));
        }
        let user = self
            .directory
            .insert_user(NewUser { name, email, role })
            .await?;
        info!(user = user.id, role = ?user.role, "user registered");
        Ok(user)
    }

    pub async fn add_location(
        &self,
        city: String,
        province: String,
        postal_code: String,
    ) -> Result<Location> {
        if city.trim().is_empty() || province.trim().is_empty() {
            return Err(EngineError::Validation(
                "city and province are required".to_string(),
            ));
        }
        self.directory
            .insert_location(NewLocation {
                city,
                province,
                postal_code,
            })
            .await
    }

    /// Registers a business owned by the actor, who must hold the
    /// BusinessOwner role.
    pub async fn register_business(
        &self,
        actor: UserId,
        name: String,
        description: Option<String>,
        category: Option<String>,
        location_id: Option<LocationId>,
    ) -> Result<Business> {
        let user = self.require_user(actor).await?;
        if user.role != UserRole::BusinessOwner {
            return Err(EngineError::Unauthorized);
        }
        if name.trim().is_empty() {
            return Err(EngineError::Validation(
                "business name is required".to_string(),
            ));
        }
        if let Some(location) = location_id
            && self.directory.location(location).await?.is_none()
        {
            return Err(EngineError::NotFound("location"));
        }
        let business = self
            .directory
            .insert_business(NewBusiness {
                owner_id: actor,
                name,
                description,
                category,
                location_id,
            })
            .await?;
        info!(business = business.id, owner = actor, "business registered");
        Ok(business)
    }

    /// Adds a sellable to a business the actor owns.
    pub async fn add_sellable(
        &self,
        actor: UserId,
        business_id: BusinessId,
        name: String,
        kind: SellableKind,
        price: Decimal,
        description: Option<String>,
    ) -> Result<Sellable> {
        let business = self
            .directory
            .business(business_id)
            .await?
            .ok_or(EngineError::NotFound("business"))?;
        if business.owner_id != actor {
            return Err(EngineError::Unauthorized);
        }
        if name.trim().is_empty() {
            return Err(EngineError::Validation(
                "sellable name is required".to_string(),
            ));
        }
        self.directory
            .insert_sellable(NewSellable {
                business_id,
                name,
                kind,
                price: Price::new(price)?,
                description,
            })
            .await
    }

    pub async fn businesses(&self, filter: &BusinessFilter) -> Result<Vec<Business>> {
        self.directory.businesses(filter).await
    }

    pub async fn sellables(&self, filter: &SellableFilter) -> Result<Vec<Sellable>> {
        self.directory.sellables(filter).await
    }

    /// Case-insensitive substring search over businesses and sellables.
    pub async fn search(&self, query: String) -> Result<SearchResults> {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Err(EngineError::Validation(
                "a search query is required".to_string(),
            ));
        }
        let businesses = self
            .directory
            .businesses(&BusinessFilter {
                query: Some(query.clone()),
                ..Default::default()
            })
            .await?;
        let sellables = self
            .directory
            .sellables(&SellableFilter {
                query: Some(query),
                ..Default::default()
            })
            .await?;
        Ok(SearchResults {
            businesses,
            sellables,
        })
    }

    pub async fn save_business(&self, actor: UserId, business: BusinessId) -> Result<SavedBusiness> {
        self.require_user(actor).await?;
        if self.directory.business(business).await?.is_none() {
            return Err(EngineError::NotFound("business"));
        }
        self.directory.save_business(actor, business).await
    }

    pub async fn unsave_business(&self, actor: UserId, business: BusinessId) -> Result<()> {
        self.require_user(actor).await?;
        if !self.directory.unsave_business(actor, business).await? {
            return Err(EngineError::NotFound("saved business"));
        }
        Ok(())
    }

    pub async fn saved_businesses(&self, actor: UserId) -> Result<Vec<Business>> {
        self.require_user(actor).await?;
        self.directory.saved_businesses(actor).await
    }

    /// Customers only; rating is a 1-5 star scale.
    pub async fn add_review(
        &self,
        actor: UserId,
        business: BusinessId,
        rating: u8,
        body: Option<String>,
    ) -> Result<Review> {
        let user = self.require_user(actor).await?;
        if user.role != UserRole::Customer {
            return Err(EngineError::Unauthorized);
        }
        if self.directory.business(business).await?.is_none() {
            return Err(EngineError::NotFound("business"));
        }
        if !(1..=5).contains(&rating) {
            return Err(EngineError::Validation(
                "rating must be between 1 and 5".to_string(),
            ));
        }
        self.directory
            .insert_review(NewReview {
                customer_id: actor,
                business_id: business,
                rating,
                body,
            })
            .await
    }

    pub async fn reviews(&self, business: BusinessId) -> Result<Vec<Review>> {
        if self.directory.business(business).await?.is_none() {
            return Err(EngineError::NotFound("business"));
        }
        self.directory.reviews(business).await
    }

    async fn require_user(&self, id: UserId) -> Result<User> {
        self.directory
            .user(id)
            .await?
            .ok_or(EngineError::NotFound("user"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryStore;
    use rust_decimal_macros::dec;

    fn service(store: &InMemoryStore) -> DirectoryService {
        DirectoryService::new(Box::new(store.clone()))
    }

    async fn owner_and_business(directory: &DirectoryService) -> (UserId, BusinessId) {
        let owner = directory
            .register_user(
                "Olive".to_string(),
                "olive@example.com".to_string(),
                UserRole::BusinessOwner,
            )
            .await
            .unwrap();
        let business = directory
            .register_business(
                owner.id,
                "Olive's Oddities".to_string(),
                Some("curios and oddments".to_string()),
                Some("Antiques".to_string()),
                None,
            )
            .await
            .unwrap();
        (owner.id, business.id)
    }

    #[tokio::test]
    async fn test_register_business_requires_owner_role() {
        let store = InMemoryStore::new();
        let directory = service(&store);
        let customer = directory
            .register_user(
                "Cass".to_string(),
                "cass@example.com".to_string(),
                UserRole::Customer,
            )
            .await
            .unwrap();
        let denied = directory
            .register_business(customer.id, "Nope".to_string(), None, None, None)
            .await;
        assert!(matches!(denied, Err(EngineError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_add_sellable_requires_ownership() {
        let store = InMemoryStore::new();
        let directory = service(&store);
        let (owner, business) = owner_and_business(&directory).await;
        let interloper = directory
            .register_user(
                "Ivy".to_string(),
                "ivy@example.com".to_string(),
                UserRole::BusinessOwner,
            )
            .await
            .unwrap();

        assert!(
            directory
                .add_sellable(
                    owner,
                    business,
                    "Widget".to_string(),
                    SellableKind::Product,
                    dec!(25),
                    None,
                )
                .await
                .is_ok()
        );
        let denied = directory
            .add_sellable(
                interloper.id,
                business,
                "Gadget".to_string(),
                SellableKind::Product,
                dec!(10),
                None,
            )
            .await;
        assert!(matches!(denied, Err(EngineError::Unauthorized)));

        let negative = directory
            .add_sellable(
                owner,
                business,
                "Refundable".to_string(),
                SellableKind::Service,
                dec!(-1),
                None,
            )
            .await;
        assert!(matches!(negative, Err(EngineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_search_spans_businesses_and_sellables() {
        let store = InMemoryStore::new();
        let directory = service(&store);
        let (owner, business) = owner_and_business(&directory).await;
        directory
            .add_sellable(
                owner,
                business,
                "Odd Widget".to_string(),
                SellableKind::Product,
                dec!(25),
                None,
            )
            .await
            .unwrap();

        let results = directory.search("odd".to_string()).await.unwrap();
        assert_eq!(results.businesses.len(), 1);
        assert_eq!(results.sellables.len(), 1);

        let blank = directory.search("   ".to_string()).await;
        assert!(matches!(blank, Err(EngineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_saved_businesses_roundtrip() {
        let store = InMemoryStore::new();
        let directory = service(&store);
        let (_, business) = owner_and_business(&directory).await;
        let customer = directory
            .register_user(
                "Cass".to_string(),
                "cass@example.com".to_string(),
                UserRole::Customer,
            )
            .await
            .unwrap();

        directory.save_business(customer.id, business).await.unwrap();
        let again = directory.save_business(customer.id, business).await;
        assert!(matches!(again, Err(EngineError::Conflict(_))));

        let saved = directory.saved_businesses(customer.id).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, business);

        directory.unsave_business(customer.id, business).await.unwrap();
        assert!(directory.saved_businesses(customer.id).await.unwrap().is_empty());
        let missing = directory.unsave_business(customer.id, business).await;
        assert!(matches!(missing, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reviews_are_customer_only_and_bounded() {
        let store = InMemoryStore::new();
        let directory = service(&store);
        let (owner, business) = owner_and_business(&directory).await;
        let customer = directory
            .register_user(
                "Cass".to_string(),
                "cass@example.com".to_string(),
                UserRole::Customer,
            )
            .await
            .unwrap();

        let denied = directory.add_review(owner, business, 5, None).await;
        assert!(matches!(denied, Err(EngineError::Unauthorized)));

        let out_of_range = directory.add_review(customer.id, business, 6, None).await;
        assert!(matches!(out_of_range, Err(EngineError::Validation(_))));

        directory
            .add_review(customer.id, business, 4, Some("lovely oddments".to_string()))
            .await
            .unwrap();
        assert_eq!(directory.reviews(business).await.unwrap().len(), 1);
    }
}
