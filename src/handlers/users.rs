use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use uuid::Uuid;
use validator::Validate;

use super::PaginationQuery;
use crate::clients::identity::IdentityClient;
use crate::database::Database;
use crate::errors::failure;
use crate::models::{ApiResponse, SyncUserRequest, UpdateUserRequest, UserListQuery};

#[post("/users/sync")]
pub async fn sync_user(
    db: web::Data<Database>,
    identity: web::Data<IdentityClient>,
    payload: web::Json<SyncUserRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    let account = match identity.lookup(&body.id_token).await {
        Ok(account) => account,
        Err(err) => return failure("Identity lookup failed", err),
    };

    match db.upsert_mobile_user(account).await {
        Ok(user) => HttpResponse::Ok().json(ApiResponse::success(user)),
        Err(err) => failure("Failed to sync user", err),
    }
}

#[get("/users")]
pub async fn list_users(db: web::Data<Database>, query: web::Query<UserListQuery>) -> impl Responder {
    match db.list_users(&query).await {
        Ok(users) => HttpResponse::Ok().json(ApiResponse::success(users)),
        Err(err) => failure("Failed to list users", err),
    }
}

#[get("/users/{user_id}")]
pub async fn get_user(db: web::Data<Database>, user_id: web::Path<Uuid>) -> impl Responder {
    match db.get_user_with_analytics(user_id.into_inner()).await {
        Ok(Some(user)) => HttpResponse::Ok().json(ApiResponse::success(user)),
        Ok(None) => HttpResponse::NotFound().json(ApiResponse::<()>::error("User not found".into())),
        Err(err) => failure("Failed to fetch user", err),
    }
}

#[put("/users/{user_id}")]
pub async fn update_user(
    db: web::Data<Database>,
    user_id: web::Path<Uuid>,
    payload: web::Json<UpdateUserRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    match db.update_user(user_id.into_inner(), body).await {
        Ok(user) => HttpResponse::Ok().json(ApiResponse::success(user)),
        Err(err) => failure("Failed to update user", err),
    }
}

#[delete("/users/{user_id}")]
pub async fn deactivate_user(db: web::Data<Database>, user_id: web::Path<Uuid>) -> impl Responder {
    match db.deactivate_user(user_id.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => failure("Failed to deactivate user", err),
    }
}

#[get("/users/{user_id}/analytics")]
pub async fn get_user_analytics(
    db: web::Data<Database>,
    user_id: web::Path<Uuid>,
) -> impl Responder {
    match db.get_user_analytics(user_id.into_inner()).await {
        Ok(Some(analytics)) => HttpResponse::Ok().json(ApiResponse::success(analytics)),
        Ok(None) => HttpResponse::NotFound()
            .json(ApiResponse::<()>::error("No analytics recorded for user".into())),
        Err(err) => failure("Failed to fetch user analytics", err),
    }
}

#[get("/users/{user_id}/reviews")]
pub async fn list_user_reviews(
    db: web::Data<Database>,
    user_id: web::Path<Uuid>,
    query: web::Query<PaginationQuery>,
) -> impl Responder {
    match db
        .list_reviews_for_user(user_id.into_inner(), query.limit, query.offset)
        .await
    {
        Ok(reviews) => HttpResponse::Ok().json(ApiResponse::success(reviews)),
        Err(err) => failure("Failed to list user reviews", err),
    }
}

#[get("/users/{user_id}/quick-ratings")]
pub async fn list_user_quick_ratings(
    db: web::Data<Database>,
    user_id: web::Path<Uuid>,
    query: web::Query<PaginationQuery>,
) -> impl Responder {
    match db
        .list_ratings_for_user(user_id.into_inner(), query.limit, query.offset)
        .await
    {
        Ok(ratings) => HttpResponse::Ok().json(ApiResponse::success(ratings)),
        Err(err) => failure("Failed to list user quick ratings", err),
    }
}
