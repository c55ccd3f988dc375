mod auth;
mod clients;
mod config;
mod database;
mod errors;
mod handlers;
mod models;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};

use crate::auth::TokenIssuer;
use crate::clients::identity::IdentityClient;
use crate::config::Settings;
use crate::database::Database;
use crate::models::RatingPolicy;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = Settings::from_env().map_err(|err| {
        log::error!("Invalid configuration: {err}");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, err)
    })?;
    let bind_address = settings.bind_address();

    let db = Database::connect(&settings.database_url, settings.database_max_connections)
        .await
        .map_err(|err| {
            log::error!("Failed to initialize database: {err:?}");
            std::io::Error::new(std::io::ErrorKind::Other, err)
        })?;

    let db_data = web::Data::new(db);
    let token_issuer = web::Data::new(TokenIssuer::new(
        settings.jwt_secret.clone(),
        settings.jwt_ttl_hours,
    ));
    let identity_client = web::Data::new(IdentityClient::new(
        settings.identity_service_url.clone(),
        settings.identity_api_key.clone(),
    ));
    let rating_policy = web::Data::new(RatingPolicy::new(settings.rating_cooldown_hours));

    log::info!("🚀 Starting review platform admin API on {}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(db_data.clone())
            .app_data(token_issuer.clone())
            .app_data(identity_client.clone())
            .app_data(rating_policy.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .service(web::scope("/api/v1").configure(handlers::routes))
    })
    .bind(&bind_address)?
    .run()
    .await
}
