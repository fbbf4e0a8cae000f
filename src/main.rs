use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use log::{error, info};

use campus_book::auth::{AppState, TokenService};
use campus_book::config::{Config, StorageBackend};
use campus_book::db::{seed::seed, MemoryStore, MongoDB, Repository};
use campus_book::routes;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let repo: Arc<dyn Repository> = match config.storage {
        StorageBackend::MongoDb => {
            let mongo = MongoDB::new(&config.mongodb_uri, &config.database_name)
                .await
                .map_err(|e| {
                    error!("Failed to connect to MongoDB: {}", e);
                    io::Error::new(io::ErrorKind::Other, e)
                })?;
            Arc::new(mongo)
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    if let Err(e) = seed(repo.as_ref(), config.force_seed, bcrypt::DEFAULT_COST).await {
        error!("Seeding failed: {}", e);
        return Err(io::Error::new(io::ErrorKind::Other, e.to_string()));
    }

    let tokens = TokenService::new(
        &config.jwt_secret,
        config.access_token_hours,
        config.refresh_token_hours,
    );
    let state = web::Data::new(AppState::new(repo, tokens));
    let cors_origin = config.cors_origin.clone();

    info!("Starting server at http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&cors_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
