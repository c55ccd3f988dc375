use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// ============================================================================
// BUSINESSES (owners of products/services)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Business {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub logo_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBusiness {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub logo_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBusinessRequest {
    pub owner_user_id: Uuid,
    #[validate(length(min = 2, max = 120))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
    #[validate(length(min = 5, max = 32))]
    pub phone: Option<String>,
    #[validate(url)]
    pub logo_url: Option<String>,
}

impl CreateBusinessRequest {
    pub fn into_new_business(self) -> NewBusiness {
        NewBusiness {
            id: Uuid::new_v4(),
            owner_user_id: self.owner_user_id,
            name: self.name,
            description: self.description,
            website: self.website,
            phone: self.phone,
            logo_url: self.logo_url,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBusinessRequest {
    #[validate(length(min = 2, max = 120))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
    #[validate(length(min = 5, max = 32))]
    pub phone: Option<String>,
    #[validate(url)]
    pub logo_url: Option<String>,
    pub is_active: bool,
}

impl UpdateBusinessRequest {
    pub fn apply_to_existing(&self, existing: &mut Business) {
        existing.name = self.name.clone();
        existing.description = self.description.clone();
        existing.website = self.website.clone();
        existing.phone = self.phone.clone();
        existing.logo_url = self.logo_url.clone();
        existing.is_active = self.is_active;
        existing.updated_at = Utc::now();
    }
}

#[derive(Debug, Deserialize)]
pub struct BusinessListQuery {
    pub owner_user_id: Option<Uuid>,
    pub include_inactive: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Business with everything it sells
#[derive(Debug, Clone, Serialize)]
pub struct BusinessCatalog {
    pub business: Business,
    pub products: Vec<Product>,
    pub services: Vec<Service>,
}

// ============================================================================
// CATEGORIES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 2, max = 80))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 2, max = 80))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub is_active: bool,
}

impl UpdateCategoryRequest {
    pub fn apply_to_existing(&self, existing: &mut Category) {
        existing.name = self.name.trim().to_string();
        existing.description = self.description.clone();
        existing.is_active = self.is_active;
        existing.updated_at = Utc::now();
    }
}

#[derive(Debug, Deserialize)]
pub struct CategoryListQuery {
    pub include_inactive: Option<bool>,
}

// ============================================================================
// PRODUCTS & SERVICES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub business_id: Option<Uuid>,
    pub name: String,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: Uuid,
    pub business_id: Option<Uuid>,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductWithCategories {
    #[serde(flatten)]
    pub product: Product,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceWithCategories {
    #[serde(flatten)]
    pub service: Service,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub id: Uuid,
    pub business_id: Option<Uuid>,
    pub name: String,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewService {
    pub id: Uuid,
    pub business_id: Option<Uuid>,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    pub business_id: Option<Uuid>,
    #[validate(length(min = 2, max = 160))]
    pub name: String,
    #[validate(length(max = 120))]
    pub brand: Option<String>,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

impl CreateProductRequest {
    pub fn into_new_product(self) -> (NewProduct, Vec<Uuid>) {
        let product = NewProduct {
            id: Uuid::new_v4(),
            business_id: self.business_id,
            name: self.name,
            brand: self.brand,
            description: self.description,
            image_url: self.image_url,
        };
        (product, dedup_ids(self.category_ids))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    pub business_id: Option<Uuid>,
    #[validate(length(min = 2, max = 160))]
    pub name: String,
    #[validate(length(max = 120))]
    pub brand: Option<String>,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

impl UpdateProductRequest {
    pub fn apply_to_existing(&self, existing: &mut Product) -> Vec<Uuid> {
        existing.business_id = self.business_id;
        existing.name = self.name.clone();
        existing.brand = self.brand.clone();
        existing.description = self.description.clone();
        existing.image_url = self.image_url.clone();
        existing.is_active = self.is_active;
        existing.updated_at = Utc::now();
        dedup_ids(self.category_ids.clone())
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateServiceRequest {
    pub business_id: Option<Uuid>,
    #[validate(length(min = 2, max = 160))]
    pub name: String,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

impl CreateServiceRequest {
    pub fn into_new_service(self) -> (NewService, Vec<Uuid>) {
        let service = NewService {
            id: Uuid::new_v4(),
            business_id: self.business_id,
            name: self.name,
            location: self.location,
            description: self.description,
            image_url: self.image_url,
        };
        (service, dedup_ids(self.category_ids))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateServiceRequest {
    pub business_id: Option<Uuid>,
    #[validate(length(min = 2, max = 160))]
    pub name: String,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

impl UpdateServiceRequest {
    pub fn apply_to_existing(&self, existing: &mut Service) -> Vec<Uuid> {
        existing.business_id = self.business_id;
        existing.name = self.name.clone();
        existing.location = self.location.clone();
        existing.description = self.description.clone();
        existing.image_url = self.image_url.clone();
        existing.is_active = self.is_active;
        existing.updated_at = Utc::now();
        dedup_ids(self.category_ids.clone())
    }
}

/// Filters for product and service listings
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub category_id: Option<Uuid>,
    pub business_id: Option<Uuid>,
    pub search: Option<String>,
    pub include_inactive: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Keeps first-seen order; join tables reject duplicate pairs.
fn dedup_ids(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_ids_are_deduplicated_in_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let request = CreateProductRequest {
            business_id: None,
            name: "Espresso machine".into(),
            brand: Some("Brew Co".into()),
            description: None,
            image_url: None,
            category_ids: vec![a, b, a],
        };
        let (_, categories) = request.into_new_product();
        assert_eq!(categories, vec![a, b]);
    }

    #[test]
    fn invalid_image_url_fails_validation() {
        let request = CreateServiceRequest {
            business_id: None,
            name: "Car wash".into(),
            location: None,
            description: None,
            image_url: Some("not a url".into()),
            category_ids: vec![],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn update_request_overwrites_product_fields() {
        let now = Utc::now();
        let mut product = Product {
            id: Uuid::new_v4(),
            business_id: None,
            name: "Old".into(),
            brand: None,
            description: None,
            image_url: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let category = Uuid::new_v4();
        let request = UpdateProductRequest {
            business_id: None,
            name: "New".into(),
            brand: Some("Acme".into()),
            description: Some("Updated".into()),
            image_url: None,
            is_active: false,
            category_ids: vec![category],
        };
        let categories = request.apply_to_existing(&mut product);
        assert_eq!(product.name, "New");
        assert_eq!(product.brand.as_deref(), Some("Acme"));
        assert!(!product.is_active);
        assert_eq!(categories, vec![category]);
    }
}
