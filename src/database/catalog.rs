use std::collections::HashMap;

use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{page_bounds, Database};
use crate::errors::ServiceError;
use crate::models::{
    Business, BusinessCatalog, BusinessListQuery, CatalogQuery, Category, CreateCategoryRequest,
    ItemType, NewBusiness, NewProduct, NewService, Product, ProductWithCategories, Service,
    ServiceWithCategories, UpdateBusinessRequest, UpdateCategoryRequest, UpdateProductRequest,
    UpdateServiceRequest,
};

/// Join table and owning column for an item's category links
fn category_link(item_type: ItemType) -> (&'static str, &'static str) {
    match item_type {
        ItemType::Product => ("product_categories", "product_id"),
        ItemType::Service => ("service_categories", "service_id"),
    }
}

impl Database {
    // ========================================================================
    // BUSINESSES
    // ========================================================================

    pub async fn create_business(&self, business: NewBusiness) -> Result<Business, ServiceError> {
        let record = sqlx::query_as::<_, Business>(
            r#"
            INSERT INTO businesses (
                id, owner_user_id, name, description, website, phone, logo_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(business.id)
        .bind(business.owner_user_id)
        .bind(business.name)
        .bind(business.description)
        .bind(business.website)
        .bind(business.phone)
        .bind(business.logo_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn get_business(&self, business_id: Uuid) -> Result<Option<Business>, ServiceError> {
        let record = sqlx::query_as::<_, Business>("SELECT * FROM businesses WHERE id = $1")
            .bind(business_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    pub async fn list_businesses(
        &self,
        query: &BusinessListQuery,
    ) -> Result<Vec<Business>, ServiceError> {
        let (limit, offset) = page_bounds(query.limit, query.offset);
        let records = sqlx::query_as::<_, Business>(
            r#"
            SELECT * FROM businesses
            WHERE ($1::uuid IS NULL OR owner_user_id = $1)
              AND ($2 OR is_active)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(query.owner_user_id)
        .bind(query.include_inactive.unwrap_or(false))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    pub async fn update_business(
        &self,
        business_id: Uuid,
        changes: UpdateBusinessRequest,
    ) -> Result<Business, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let mut existing =
            sqlx::query_as::<_, Business>("SELECT * FROM businesses WHERE id = $1 FOR UPDATE")
                .bind(business_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| ServiceError::not_found("Business"))?;

        changes.apply_to_existing(&mut existing);

        let updated = sqlx::query_as::<_, Business>(
            r#"
            UPDATE businesses
            SET name = $2, description = $3, website = $4, phone = $5,
                logo_url = $6, is_active = $7, updated_at = $8
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(existing.id)
        .bind(&existing.name)
        .bind(&existing.description)
        .bind(&existing.website)
        .bind(&existing.phone)
        .bind(&existing.logo_url)
        .bind(existing.is_active)
        .bind(existing.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn delete_business(&self, business_id: Uuid) -> Result<(), ServiceError> {
        soft_delete(&self.pool, "businesses", business_id, "Business").await
    }

    pub async fn get_business_catalog(
        &self,
        business_id: Uuid,
    ) -> Result<Option<BusinessCatalog>, ServiceError> {
        let business = match self.get_business(business_id).await? {
            Some(business) => business,
            None => return Ok(None),
        };

        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE business_id = $1 AND is_active ORDER BY name ASC",
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;

        let services = sqlx::query_as::<_, Service>(
            "SELECT * FROM services WHERE business_id = $1 AND is_active ORDER BY name ASC",
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(BusinessCatalog {
            business,
            products,
            services,
        }))
    }

    // ========================================================================
    // CATEGORIES
    // ========================================================================

    pub async fn create_category(
        &self,
        request: CreateCategoryRequest,
    ) -> Result<Category, ServiceError> {
        let record = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (id, name, description)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.name.trim())
        .bind(request.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn get_category(&self, category_id: Uuid) -> Result<Option<Category>, ServiceError> {
        let record = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(category_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    pub async fn list_categories(&self, include_inactive: bool) -> Result<Vec<Category>, ServiceError> {
        let records = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE ($1 OR is_active) ORDER BY name ASC",
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    pub async fn update_category(
        &self,
        category_id: Uuid,
        changes: UpdateCategoryRequest,
    ) -> Result<Category, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let mut existing =
            sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1 FOR UPDATE")
                .bind(category_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| ServiceError::not_found("Category"))?;

        changes.apply_to_existing(&mut existing);

        let updated = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET name = $2, description = $3, is_active = $4, updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(existing.id)
        .bind(&existing.name)
        .bind(&existing.description)
        .bind(existing.is_active)
        .bind(existing.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn delete_category(&self, category_id: Uuid) -> Result<(), ServiceError> {
        soft_delete(&self.pool, "categories", category_id, "Category").await
    }

    // ========================================================================
    // PRODUCTS
    // ========================================================================

    pub async fn create_product(
        &self,
        product: NewProduct,
        category_ids: Vec<Uuid>,
    ) -> Result<ProductWithCategories, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (id, business_id, name, brand, description, image_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(product.id)
        .bind(product.business_id)
        .bind(product.name)
        .bind(product.brand)
        .bind(product.description)
        .bind(product.image_url)
        .fetch_one(&mut *tx)
        .await?;

        let categories =
            replace_categories(&mut tx, ItemType::Product, record.id, &category_ids).await?;

        tx.commit().await?;
        Ok(ProductWithCategories {
            product: record,
            categories,
        })
    }

    pub async fn get_product(
        &self,
        product_id: Uuid,
    ) -> Result<Option<ProductWithCategories>, ServiceError> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        let product = match product {
            Some(product) => product,
            None => return Ok(None),
        };

        let mut grouped = self
            .fetch_categories_for(ItemType::Product, &[product.id])
            .await?;
        Ok(Some(ProductWithCategories {
            categories: grouped.remove(&product.id).unwrap_or_default(),
            product,
        }))
    }

    pub async fn list_products(
        &self,
        query: &CatalogQuery,
    ) -> Result<Vec<ProductWithCategories>, ServiceError> {
        let mut builder = catalog_listing(ItemType::Product, query);
        let products = builder
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?;

        let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let mut grouped = self.fetch_categories_for(ItemType::Product, &ids).await?;

        Ok(products
            .into_iter()
            .map(|product| ProductWithCategories {
                categories: grouped.remove(&product.id).unwrap_or_default(),
                product,
            })
            .collect())
    }

    pub async fn update_product(
        &self,
        product_id: Uuid,
        changes: UpdateProductRequest,
    ) -> Result<ProductWithCategories, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let mut existing =
            sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 FOR UPDATE")
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| ServiceError::not_found("Product"))?;

        let category_ids = changes.apply_to_existing(&mut existing);

        let updated = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET business_id = $2, name = $3, brand = $4, description = $5,
                image_url = $6, is_active = $7, updated_at = $8
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(existing.id)
        .bind(existing.business_id)
        .bind(&existing.name)
        .bind(&existing.brand)
        .bind(&existing.description)
        .bind(&existing.image_url)
        .bind(existing.is_active)
        .bind(existing.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        let categories =
            replace_categories(&mut tx, ItemType::Product, updated.id, &category_ids).await?;

        tx.commit().await?;
        Ok(ProductWithCategories {
            product: updated,
            categories,
        })
    }

    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        soft_delete(&self.pool, "products", product_id, "Product").await
    }

    // ========================================================================
    // SERVICES
    // ========================================================================

    pub async fn create_service(
        &self,
        service: NewService,
        category_ids: Vec<Uuid>,
    ) -> Result<ServiceWithCategories, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, Service>(
            r#"
            INSERT INTO services (id, business_id, name, location, description, image_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(service.id)
        .bind(service.business_id)
        .bind(service.name)
        .bind(service.location)
        .bind(service.description)
        .bind(service.image_url)
        .fetch_one(&mut *tx)
        .await?;

        let categories =
            replace_categories(&mut tx, ItemType::Service, record.id, &category_ids).await?;

        tx.commit().await?;
        Ok(ServiceWithCategories {
            service: record,
            categories,
        })
    }

    pub async fn get_service(
        &self,
        service_id: Uuid,
    ) -> Result<Option<ServiceWithCategories>, ServiceError> {
        let service = sqlx::query_as::<_, Service>("SELECT * FROM services WHERE id = $1")
            .bind(service_id)
            .fetch_optional(&self.pool)
            .await?;

        let service = match service {
            Some(service) => service,
            None => return Ok(None),
        };

        let mut grouped = self
            .fetch_categories_for(ItemType::Service, &[service.id])
            .await?;
        Ok(Some(ServiceWithCategories {
            categories: grouped.remove(&service.id).unwrap_or_default(),
            service,
        }))
    }

    pub async fn list_services(
        &self,
        query: &CatalogQuery,
    ) -> Result<Vec<ServiceWithCategories>, ServiceError> {
        let mut builder = catalog_listing(ItemType::Service, query);
        let services = builder
            .build_query_as::<Service>()
            .fetch_all(&self.pool)
            .await?;

        let ids: Vec<Uuid> = services.iter().map(|s| s.id).collect();
        let mut grouped = self.fetch_categories_for(ItemType::Service, &ids).await?;

        Ok(services
            .into_iter()
            .map(|service| ServiceWithCategories {
                categories: grouped.remove(&service.id).unwrap_or_default(),
                service,
            })
            .collect())
    }

    pub async fn update_service(
        &self,
        service_id: Uuid,
        changes: UpdateServiceRequest,
    ) -> Result<ServiceWithCategories, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let mut existing =
            sqlx::query_as::<_, Service>("SELECT * FROM services WHERE id = $1 FOR UPDATE")
                .bind(service_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| ServiceError::not_found("Service"))?;

        let category_ids = changes.apply_to_existing(&mut existing);

        let updated = sqlx::query_as::<_, Service>(
            r#"
            UPDATE services
            SET business_id = $2, name = $3, location = $4, description = $5,
                image_url = $6, is_active = $7, updated_at = $8
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(existing.id)
        .bind(existing.business_id)
        .bind(&existing.name)
        .bind(&existing.location)
        .bind(&existing.description)
        .bind(&existing.image_url)
        .bind(existing.is_active)
        .bind(existing.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        let categories =
            replace_categories(&mut tx, ItemType::Service, updated.id, &category_ids).await?;

        tx.commit().await?;
        Ok(ServiceWithCategories {
            service: updated,
            categories,
        })
    }

    pub async fn delete_service(&self, service_id: Uuid) -> Result<(), ServiceError> {
        soft_delete(&self.pool, "services", service_id, "Service").await
    }

    async fn fetch_categories_for(
        &self,
        item_type: ItemType,
        item_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Category>>, ServiceError> {
        if item_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let (table, owner_column) = category_link(item_type);
        let sql = format!(
            r#"
            SELECT l.{owner_column} AS owner_id, c.*
            FROM {table} l
            JOIN categories c ON c.id = l.category_id
            WHERE l.{owner_column} = ANY($1)
            ORDER BY c.name ASC
            "#
        );

        let rows = sqlx::query_as::<_, CategoryLinkRow>(&sql)
            .bind(item_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut grouped: HashMap<Uuid, Vec<Category>> = HashMap::new();
        for row in rows {
            grouped.entry(row.owner_id).or_default().push(row.category);
        }
        Ok(grouped)
    }
}

#[derive(sqlx::FromRow)]
struct CategoryLinkRow {
    owner_id: Uuid,
    #[sqlx(flatten)]
    category: Category,
}

/// Rewrites the category set of one product/service inside `conn`'s transaction.
async fn replace_categories(
    conn: &mut PgConnection,
    item_type: ItemType,
    item_id: Uuid,
    category_ids: &[Uuid],
) -> Result<Vec<Category>, ServiceError> {
    let (table, owner_column) = category_link(item_type);

    let delete_sql = format!("DELETE FROM {table} WHERE {owner_column} = $1");
    sqlx::query(&delete_sql)
        .bind(item_id)
        .execute(&mut *conn)
        .await?;

    if category_ids.is_empty() {
        return Ok(Vec::new());
    }

    let categories = sqlx::query_as::<_, Category>(
        "SELECT * FROM categories WHERE id = ANY($1) AND is_active ORDER BY name ASC",
    )
    .bind(category_ids)
    .fetch_all(&mut *conn)
    .await?;

    if categories.len() != category_ids.len() {
        return Err(ServiceError::Validation(
            "One or more categories do not exist or are inactive".into(),
        ));
    }

    let insert_sql = format!(
        "INSERT INTO {table} ({owner_column}, category_id) SELECT $1, UNNEST($2::uuid[])"
    );
    sqlx::query(&insert_sql)
        .bind(item_id)
        .bind(category_ids)
        .execute(&mut *conn)
        .await?;

    Ok(categories)
}

fn catalog_listing<'a>(item_type: ItemType, query: &'a CatalogQuery) -> QueryBuilder<'a, Postgres> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let (link_table, owner_column) = category_link(item_type);

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT i.* FROM {} i WHERE 1 = 1", item_type.table()));

    if !query.include_inactive.unwrap_or(false) {
        builder.push(" AND i.is_active");
    }
    if let Some(business_id) = query.business_id {
        builder.push(" AND i.business_id = ").push_bind(business_id);
    }
    if let Some(category_id) = query.category_id {
        builder
            .push(format!(
                " AND EXISTS (SELECT 1 FROM {link_table} l WHERE l.{owner_column} = i.id AND l.category_id = "
            ))
            .push_bind(category_id)
            .push(")");
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        builder
            .push(" AND i.name ILIKE ")
            .push_bind(format!("%{}%", search));
    }
    builder
        .push(" ORDER BY i.created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    builder
}

async fn soft_delete(
    pool: &sqlx::PgPool,
    table: &'static str,
    id: Uuid,
    label: &str,
) -> Result<(), ServiceError> {
    let sql = format!("UPDATE {table} SET is_active = FALSE, updated_at = NOW() WHERE id = $1");
    let result = sqlx::query(&sql).bind(id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(ServiceError::not_found(label));
    }
    Ok(())
}
