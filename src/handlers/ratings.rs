use actix_web::{get, post, web, HttpResponse, Responder};
use uuid::Uuid;
use validator::Validate;

use crate::database::Database;
use crate::errors::failure;
use crate::models::{ApiResponse, ItemType, RatingPolicy, SubmitQuickRatingRequest};

#[post("/quick-ratings")]
pub async fn submit_quick_rating(
    db: web::Data<Database>,
    policy: web::Data<RatingPolicy>,
    payload: web::Json<SubmitQuickRatingRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    match db.submit_quick_rating(body, &policy).await {
        Ok(submission) if submission.created => {
            HttpResponse::Created().json(ApiResponse::success(submission))
        }
        Ok(submission) => HttpResponse::Ok().json(ApiResponse::success(submission)),
        Err(err) => failure("Quick rating rejected", err),
    }
}

#[get("/items/{item_type}/{item_id}/quick-ratings")]
pub async fn item_rating_summary(
    db: web::Data<Database>,
    path: web::Path<(ItemType, Uuid)>,
) -> impl Responder {
    let (item_type, item_id) = path.into_inner();
    match db.item_rating_summary(item_type, item_id).await {
        Ok(summary) => HttpResponse::Ok().json(ApiResponse::success(summary)),
        Err(err) => failure("Failed to summarise quick ratings", err),
    }
}

#[get("/items/{item_type}/{item_id}/quick-ratings/users/{user_id}")]
pub async fn get_user_rating(
    db: web::Data<Database>,
    path: web::Path<(ItemType, Uuid, Uuid)>,
) -> impl Responder {
    let (item_type, item_id, user_id) = path.into_inner();
    match db.get_user_rating(user_id, item_type, item_id).await {
        Ok(Some(rating)) => HttpResponse::Ok().json(ApiResponse::success(rating)),
        Ok(None) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Quick rating not found".into()))
        }
        Err(err) => failure("Failed to fetch quick rating", err),
    }
}
