use actix_web::{get, web, HttpResponse, Responder};

use crate::database::Database;
use crate::errors::failure;
use crate::models::ApiResponse;

#[get("/dashboard/stats")]
pub async fn dashboard_stats(db: web::Data<Database>) -> impl Responder {
    match db.dashboard_stats().await {
        Ok(stats) => HttpResponse::Ok().json(ApiResponse::success(stats)),
        Err(err) => failure("Failed to load dashboard stats", err),
    }
}
