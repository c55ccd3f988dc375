use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use uuid::Uuid;
use validator::Validate;

use super::PaginationQuery;
use crate::database::Database;
use crate::errors::failure;
use crate::models::{
    ApiResponse, CreateCommentRequest, ItemType, ReactRequest, UpdateCommentRequest,
};

#[post("/comments")]
pub async fn create_comment(
    db: web::Data<Database>,
    payload: web::Json<CreateCommentRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }
    if let Err(message) = body.validate_business_rules() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(message));
    }

    match db.create_comment(body.into_new_comment()).await {
        Ok(comment) => HttpResponse::Created().json(ApiResponse::success(comment)),
        Err(err) => failure("Failed to create comment", err),
    }
}

#[get("/comments/{comment_id}")]
pub async fn get_comment(db: web::Data<Database>, comment_id: web::Path<Uuid>) -> impl Responder {
    match db.get_comment(comment_id.into_inner()).await {
        Ok(Some(comment)) if !comment.is_deleted => {
            HttpResponse::Ok().json(ApiResponse::success(comment))
        }
        Ok(_) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Comment not found".into()))
        }
        Err(err) => failure("Failed to fetch comment", err),
    }
}

#[put("/comments/{comment_id}")]
pub async fn update_comment(
    db: web::Data<Database>,
    comment_id: web::Path<Uuid>,
    payload: web::Json<UpdateCommentRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }
    if body.content.trim().is_empty() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error("Comment content can not be blank".into()));
    }

    match db
        .update_comment(comment_id.into_inner(), body.user_id, body.content)
        .await
    {
        Ok(comment) => HttpResponse::Ok().json(ApiResponse::success(comment)),
        Err(err) => failure("Failed to update comment", err),
    }
}

#[delete("/comments/{comment_id}")]
pub async fn delete_comment(db: web::Data<Database>, comment_id: web::Path<Uuid>) -> impl Responder {
    match db.delete_comment(comment_id.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => failure("Failed to delete comment", err),
    }
}

#[get("/comments/{comment_id}/replies")]
pub async fn list_replies(db: web::Data<Database>, comment_id: web::Path<Uuid>) -> impl Responder {
    match db.list_replies(comment_id.into_inner()).await {
        Ok(replies) => HttpResponse::Ok().json(ApiResponse::success(replies)),
        Err(err) => failure("Failed to list replies", err),
    }
}

#[put("/comments/{comment_id}/reactions")]
pub async fn react_to_comment(
    db: web::Data<Database>,
    comment_id: web::Path<Uuid>,
    payload: web::Json<ReactRequest>,
) -> impl Responder {
    let ReactRequest {
        user_id,
        reaction_type,
    } = payload.into_inner();

    match db
        .react_to_comment(comment_id.into_inner(), user_id, reaction_type)
        .await
    {
        Ok(outcome) => HttpResponse::Ok().json(ApiResponse::success(outcome)),
        Err(err) => failure("Failed to record reaction", err),
    }
}

#[delete("/comments/{comment_id}/reactions/{user_id}")]
pub async fn remove_reaction(
    db: web::Data<Database>,
    path: web::Path<(Uuid, Uuid)>,
) -> impl Responder {
    let (comment_id, user_id) = path.into_inner();
    match db.remove_reaction(comment_id, user_id).await {
        Ok(comment) => HttpResponse::Ok().json(ApiResponse::success(comment)),
        Err(err) => failure("Failed to remove reaction", err),
    }
}

#[get("/items/{item_type}/{item_id}/comments")]
pub async fn list_item_comments(
    db: web::Data<Database>,
    path: web::Path<(ItemType, Uuid)>,
    query: web::Query<PaginationQuery>,
) -> impl Responder {
    let (item_type, item_id) = path.into_inner();
    match db
        .list_comments_for_item(item_type, item_id, query.limit, query.offset)
        .await
    {
        Ok(comments) => HttpResponse::Ok().json(ApiResponse::success(comments)),
        Err(err) => failure("Failed to list item comments", err),
    }
}
