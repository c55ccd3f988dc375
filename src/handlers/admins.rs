use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{self, Actor, TokenIssuer};
use crate::database::Database;
use crate::errors::{failure, ServiceError};
use crate::models::{
    ApiResponse, ChangePasswordRequest, CreateAdminRequest, LoginRequest, LoginResponse,
    SetupStatus, SetupSuperAdminRequest, UpdateAdminRequest,
};

#[derive(Deserialize)]
pub struct AdminListQuery {
    pub include_inactive: Option<bool>,
}

#[get("/admins/setup/status")]
pub async fn setup_status(db: web::Data<Database>) -> impl Responder {
    match db.super_admin_exists().await {
        Ok(super_admin_exists) => {
            HttpResponse::Ok().json(ApiResponse::success(SetupStatus { super_admin_exists }))
        }
        Err(err) => failure("Failed to check setup status", err),
    }
}

#[post("/admins/setup")]
pub async fn setup_super_admin(
    db: web::Data<Database>,
    payload: web::Json<SetupSuperAdminRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    let (user, password) = body.into_new_user();
    let password_hash = match auth::hash_password(&password) {
        Ok(hash) => hash,
        Err(err) => return failure("Failed to hash password", err),
    };

    match db.setup_super_admin(user, password_hash).await {
        Ok(admin) => HttpResponse::Created().json(ApiResponse::success(admin)),
        Err(err) => failure("Failed to set up super admin", err),
    }
}

#[post("/admins/login")]
pub async fn login(
    db: web::Data<Database>,
    tokens: web::Data<TokenIssuer>,
    payload: web::Json<LoginRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    match authenticate(&db, &tokens, &body).await {
        Ok(response) => HttpResponse::Ok().json(ApiResponse::success(response)),
        Err(err) => failure("Admin login rejected", err),
    }
}

async fn authenticate(
    db: &Database,
    tokens: &TokenIssuer,
    body: &LoginRequest,
) -> Result<LoginResponse, ServiceError> {
    let rejected = || ServiceError::Unauthorized("Invalid email or password".into());

    let credentials = db
        .find_admin_credentials(&body.email)
        .await?
        .filter(|c| c.role.is_admin_tier())
        .ok_or_else(rejected)?;

    if !auth::verify_password(&body.password, &credentials.password_hash)? {
        return Err(rejected());
    }
    if !credentials.is_active {
        return Err(ServiceError::Forbidden("Account is deactivated".into()));
    }

    let admin = db.record_admin_login(credentials.user_id).await?;
    let (token, expires_at) = tokens.issue(&admin)?;
    log::info!("Admin {} logged in", admin.id);

    Ok(LoginResponse {
        token,
        expires_at,
        admin,
    })
}

#[get("/admins/me")]
pub async fn current_admin(
    req: HttpRequest,
    db: web::Data<Database>,
    tokens: web::Data<TokenIssuer>,
) -> impl Responder {
    let token = match auth::bearer_token(&req) {
        Some(token) => token,
        None => {
            return HttpResponse::Unauthorized()
                .json(ApiResponse::<()>::error("Missing bearer token".into()))
        }
    };

    let claims = match tokens.verify(token) {
        Ok(claims) => claims,
        Err(err) => return failure("Rejected admin token", err),
    };

    match db.get_admin(claims.sub).await {
        Ok(Some(admin)) if admin.is_active => HttpResponse::Ok().json(ApiResponse::success(admin)),
        Ok(Some(_)) => {
            HttpResponse::Forbidden().json(ApiResponse::<()>::error("Account is deactivated".into()))
        }
        Ok(None) => HttpResponse::NotFound().json(ApiResponse::<()>::error("Admin not found".into())),
        Err(err) => failure("Failed to fetch current admin", err),
    }
}

#[get("/admins")]
pub async fn list_admins(
    db: web::Data<Database>,
    query: web::Query<AdminListQuery>,
) -> impl Responder {
    match db.list_admins(query.include_inactive.unwrap_or(false)).await {
        Ok(admins) => HttpResponse::Ok().json(ApiResponse::success(admins)),
        Err(err) => failure("Failed to list admins", err),
    }
}

#[post("/admins")]
pub async fn create_admin(
    db: web::Data<Database>,
    actor: Actor,
    payload: web::Json<CreateAdminRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }
    if let Err(message) = body.validate_business_rules() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(message));
    }

    let (user, password) = body.into_new_user();
    let password_hash = match auth::hash_password(&password) {
        Ok(hash) => hash,
        Err(err) => return failure("Failed to hash password", err),
    };

    match db.create_admin(user, password_hash).await {
        Ok(admin) => {
            log::info!("Admin {} ({:?}) created by {}", admin.id, admin.role, actor.id);
            HttpResponse::Created().json(ApiResponse::success(admin))
        }
        Err(err) => failure("Failed to create admin", err),
    }
}

#[get("/admins/{admin_id}")]
pub async fn get_admin(db: web::Data<Database>, admin_id: web::Path<Uuid>) -> impl Responder {
    match db.get_admin(admin_id.into_inner()).await {
        Ok(Some(admin)) => HttpResponse::Ok().json(ApiResponse::success(admin)),
        Ok(None) => HttpResponse::NotFound().json(ApiResponse::<()>::error("Admin not found".into())),
        Err(err) => failure("Failed to fetch admin", err),
    }
}

#[put("/admins/{admin_id}")]
pub async fn update_admin(
    db: web::Data<Database>,
    actor: Actor,
    admin_id: web::Path<Uuid>,
    payload: web::Json<UpdateAdminRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    match db.update_admin(admin_id.into_inner(), body, actor.id).await {
        Ok(admin) => HttpResponse::Ok().json(ApiResponse::success(admin)),
        Err(err) => failure("Failed to update admin", err),
    }
}

#[put("/admins/{admin_id}/password")]
pub async fn change_admin_password(
    db: web::Data<Database>,
    actor: Actor,
    admin_id: web::Path<Uuid>,
    payload: web::Json<ChangePasswordRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    let admin_id = admin_id.into_inner();
    let password_hash = match auth::hash_password(&body.password) {
        Ok(hash) => hash,
        Err(err) => return failure("Failed to hash password", err),
    };

    match db.change_admin_password(admin_id, password_hash).await {
        Ok(()) => {
            log::info!("Password for admin {} changed by {}", admin_id, actor.id);
            HttpResponse::NoContent().finish()
        }
        Err(err) => failure("Failed to change admin password", err),
    }
}

#[delete("/admins/{admin_id}")]
pub async fn deactivate_admin(
    db: web::Data<Database>,
    actor: Actor,
    admin_id: web::Path<Uuid>,
) -> impl Responder {
    match db.deactivate_admin(admin_id.into_inner(), actor.id).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => failure("Failed to deactivate admin", err),
    }
}
