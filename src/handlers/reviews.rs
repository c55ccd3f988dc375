use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use uuid::Uuid;
use validator::Validate;

use super::PaginationQuery;
use crate::database::Database;
use crate::errors::failure;
use crate::models::{ApiResponse, ItemType, SubmitReviewRequest, UpdateReviewRequest};

#[post("/reviews")]
pub async fn submit_review(
    db: web::Data<Database>,
    payload: web::Json<SubmitReviewRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    match db.submit_review(body.into_new_review()).await {
        Ok(submission) if submission.created => {
            HttpResponse::Created().json(ApiResponse::success(submission))
        }
        Ok(submission) => HttpResponse::Ok().json(ApiResponse::success(submission)),
        Err(err) => failure("Failed to submit review", err),
    }
}

#[get("/reviews/{review_id}")]
pub async fn get_review(db: web::Data<Database>, review_id: web::Path<Uuid>) -> impl Responder {
    match db.get_review(review_id.into_inner()).await {
        Ok(Some(review)) if !review.is_deleted => {
            HttpResponse::Ok().json(ApiResponse::success(review))
        }
        Ok(_) => HttpResponse::NotFound().json(ApiResponse::<()>::error("Review not found".into())),
        Err(err) => failure("Failed to fetch review", err),
    }
}

#[put("/reviews/{review_id}")]
pub async fn update_review(
    db: web::Data<Database>,
    review_id: web::Path<Uuid>,
    payload: web::Json<UpdateReviewRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }
    if let Err(message) = body.validate_business_rules() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(message));
    }

    match db.update_review(review_id.into_inner(), body).await {
        Ok(review) => HttpResponse::Ok().json(ApiResponse::success(review)),
        Err(err) => failure("Failed to update review", err),
    }
}

#[delete("/reviews/{review_id}")]
pub async fn delete_review(db: web::Data<Database>, review_id: web::Path<Uuid>) -> impl Responder {
    match db.delete_review(review_id.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => failure("Failed to delete review", err),
    }
}

#[get("/items/{item_type}/{item_id}/reviews")]
pub async fn list_item_reviews(
    db: web::Data<Database>,
    path: web::Path<(ItemType, Uuid)>,
    query: web::Query<PaginationQuery>,
) -> impl Responder {
    let (item_type, item_id) = path.into_inner();
    match db
        .list_reviews_for_item(item_type, item_id, query.limit, query.offset)
        .await
    {
        Ok(reviews) => HttpResponse::Ok().json(ApiResponse::success(reviews)),
        Err(err) => failure("Failed to list item reviews", err),
    }
}

#[get("/items/{item_type}/{item_id}/sentiment")]
pub async fn item_sentiment(
    db: web::Data<Database>,
    path: web::Path<(ItemType, Uuid)>,
) -> impl Responder {
    let (item_type, item_id) = path.into_inner();
    match db.item_sentiment_summary(item_type, item_id).await {
        Ok(summary) => HttpResponse::Ok().json(ApiResponse::success(summary)),
        Err(err) => failure("Failed to summarise item sentiment", err),
    }
}
