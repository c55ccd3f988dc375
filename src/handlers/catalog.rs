use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use uuid::Uuid;
use validator::Validate;

use crate::database::Database;
use crate::errors::failure;
use crate::models::{
    ApiResponse, BusinessListQuery, CatalogQuery, CategoryListQuery, CreateBusinessRequest,
    CreateCategoryRequest, CreateProductRequest, CreateServiceRequest, UpdateBusinessRequest,
    UpdateCategoryRequest, UpdateProductRequest, UpdateServiceRequest,
};

// ============================================================================
// BUSINESSES
// ============================================================================

#[post("/businesses")]
pub async fn create_business(
    db: web::Data<Database>,
    payload: web::Json<CreateBusinessRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    match db.create_business(body.into_new_business()).await {
        Ok(business) => HttpResponse::Created().json(ApiResponse::success(business)),
        Err(err) => failure("Failed to create business", err),
    }
}

#[get("/businesses")]
pub async fn list_businesses(
    db: web::Data<Database>,
    query: web::Query<BusinessListQuery>,
) -> impl Responder {
    match db.list_businesses(&query).await {
        Ok(businesses) => HttpResponse::Ok().json(ApiResponse::success(businesses)),
        Err(err) => failure("Failed to list businesses", err),
    }
}

#[get("/businesses/{business_id}")]
pub async fn get_business(db: web::Data<Database>, business_id: web::Path<Uuid>) -> impl Responder {
    match db.get_business(business_id.into_inner()).await {
        Ok(Some(business)) => HttpResponse::Ok().json(ApiResponse::success(business)),
        Ok(None) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Business not found".into()))
        }
        Err(err) => failure("Failed to fetch business", err),
    }
}

#[put("/businesses/{business_id}")]
pub async fn update_business(
    db: web::Data<Database>,
    business_id: web::Path<Uuid>,
    payload: web::Json<UpdateBusinessRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    match db.update_business(business_id.into_inner(), body).await {
        Ok(business) => HttpResponse::Ok().json(ApiResponse::success(business)),
        Err(err) => failure("Failed to update business", err),
    }
}

#[delete("/businesses/{business_id}")]
pub async fn delete_business(
    db: web::Data<Database>,
    business_id: web::Path<Uuid>,
) -> impl Responder {
    match db.delete_business(business_id.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => failure("Failed to delete business", err),
    }
}

#[get("/businesses/{business_id}/catalog")]
pub async fn get_business_catalog(
    db: web::Data<Database>,
    business_id: web::Path<Uuid>,
) -> impl Responder {
    match db.get_business_catalog(business_id.into_inner()).await {
        Ok(Some(catalog)) => HttpResponse::Ok().json(ApiResponse::success(catalog)),
        Ok(None) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Business not found".into()))
        }
        Err(err) => failure("Failed to fetch business catalog", err),
    }
}

// ============================================================================
// CATEGORIES
// ============================================================================

#[post("/categories")]
pub async fn create_category(
    db: web::Data<Database>,
    payload: web::Json<CreateCategoryRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    match db.create_category(body).await {
        Ok(category) => HttpResponse::Created().json(ApiResponse::success(category)),
        Err(err) => failure("Failed to create category", err),
    }
}

#[get("/categories")]
pub async fn list_categories(
    db: web::Data<Database>,
    query: web::Query<CategoryListQuery>,
) -> impl Responder {
    match db.list_categories(query.include_inactive.unwrap_or(false)).await {
        Ok(categories) => HttpResponse::Ok().json(ApiResponse::success(categories)),
        Err(err) => failure("Failed to list categories", err),
    }
}

#[get("/categories/{category_id}")]
pub async fn get_category(db: web::Data<Database>, category_id: web::Path<Uuid>) -> impl Responder {
    match db.get_category(category_id.into_inner()).await {
        Ok(Some(category)) => HttpResponse::Ok().json(ApiResponse::success(category)),
        Ok(None) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Category not found".into()))
        }
        Err(err) => failure("Failed to fetch category", err),
    }
}

#[put("/categories/{category_id}")]
pub async fn update_category(
    db: web::Data<Database>,
    category_id: web::Path<Uuid>,
    payload: web::Json<UpdateCategoryRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    match db.update_category(category_id.into_inner(), body).await {
        Ok(category) => HttpResponse::Ok().json(ApiResponse::success(category)),
        Err(err) => failure("Failed to update category", err),
    }
}

#[delete("/categories/{category_id}")]
pub async fn delete_category(
    db: web::Data<Database>,
    category_id: web::Path<Uuid>,
) -> impl Responder {
    match db.delete_category(category_id.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => failure("Failed to delete category", err),
    }
}

// ============================================================================
// PRODUCTS
// ============================================================================

#[post("/products")]
pub async fn create_product(
    db: web::Data<Database>,
    payload: web::Json<CreateProductRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    let (product, category_ids) = body.into_new_product();
    match db.create_product(product, category_ids).await {
        Ok(product) => HttpResponse::Created().json(ApiResponse::success(product)),
        Err(err) => failure("Failed to create product", err),
    }
}

#[get("/products")]
pub async fn list_products(
    db: web::Data<Database>,
    query: web::Query<CatalogQuery>,
) -> impl Responder {
    match db.list_products(&query).await {
        Ok(products) => HttpResponse::Ok().json(ApiResponse::success(products)),
        Err(err) => failure("Failed to list products", err),
    }
}

#[get("/products/{product_id}")]
pub async fn get_product(db: web::Data<Database>, product_id: web::Path<Uuid>) -> impl Responder {
    match db.get_product(product_id.into_inner()).await {
        Ok(Some(product)) => HttpResponse::Ok().json(ApiResponse::success(product)),
        Ok(None) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Product not found".into()))
        }
        Err(err) => failure("Failed to fetch product", err),
    }
}

#[put("/products/{product_id}")]
pub async fn update_product(
    db: web::Data<Database>,
    product_id: web::Path<Uuid>,
    payload: web::Json<UpdateProductRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    match db.update_product(product_id.into_inner(), body).await {
        Ok(product) => HttpResponse::Ok().json(ApiResponse::success(product)),
        Err(err) => failure("Failed to update product", err),
    }
}

#[delete("/products/{product_id}")]
pub async fn delete_product(db: web::Data<Database>, product_id: web::Path<Uuid>) -> impl Responder {
    match db.delete_product(product_id.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => failure("Failed to delete product", err),
    }
}

// ============================================================================
// SERVICES
// ============================================================================

#[post("/services")]
pub async fn create_service(
    db: web::Data<Database>,
    payload: web::Json<CreateServiceRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    let (service, category_ids) = body.into_new_service();
    match db.create_service(service, category_ids).await {
        Ok(service) => HttpResponse::Created().json(ApiResponse::success(service)),
        Err(err) => failure("Failed to create service", err),
    }
}

#[get("/services")]
pub async fn list_services(
    db: web::Data<Database>,
    query: web::Query<CatalogQuery>,
) -> impl Responder {
    match db.list_services(&query).await {
        Ok(services) => HttpResponse::Ok().json(ApiResponse::success(services)),
        Err(err) => failure("Failed to list services", err),
    }
}

#[get("/services/{service_id}")]
pub async fn get_service(db: web::Data<Database>, service_id: web::Path<Uuid>) -> impl Responder {
    match db.get_service(service_id.into_inner()).await {
        Ok(Some(service)) => HttpResponse::Ok().json(ApiResponse::success(service)),
        Ok(None) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Service not found".into()))
        }
        Err(err) => failure("Failed to fetch service", err),
    }
}

#[put("/services/{service_id}")]
pub async fn update_service(
    db: web::Data<Database>,
    service_id: web::Path<Uuid>,
    payload: web::Json<UpdateServiceRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    match db.update_service(service_id.into_inner(), body).await {
        Ok(service) => HttpResponse::Ok().json(ApiResponse::success(service)),
        Err(err) => failure("Failed to update service", err),
    }
}

#[delete("/services/{service_id}")]
pub async fn delete_service(db: web::Data<Database>, service_id: web::Path<Uuid>) -> impl Responder {
    match db.delete_service(service_id.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => failure("Failed to delete service", err),
    }
}
