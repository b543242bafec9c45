mod application;
mod data;
mod domain;
mod infrastructure;
mod presentation;

use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::middleware::DefaultHeaders;
use actix_web::{App, HttpResponse, HttpServer, Responder, web};
use chrono::{DateTime, Utc};
use serde::Serialize;

use application::auth_service::AuthService;
use application::cart_service::CartService;
use application::product_service::ProductService;
use data::cart_repository::PostgresCartRepository;
use data::product_repository::PostgresProductRepository;
use data::user_repository::PostgresUserRepository;
use infrastructure::config::AppConfig;
use infrastructure::database::{create_pool, run_migrations};
use infrastructure::logging::init_logging;
use infrastructure::security::JwtKeys;
use infrastructure::uploads::UploadStore;
use presentation::handlers;
use presentation::middleware::{RequestIdMiddleware, TimingMiddleware};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_logging();

    let config = AppConfig::from_env().expect("invalid configuration");
    let pool = create_pool(&config.database_url)
        .await
        .expect("failed to connect to database");
    run_migrations(&pool)
        .await
        .expect("failed to run migrations");

    let uploads = UploadStore::new(&config.upload_dir);
    uploads
        .ensure_root()
        .await
        .expect("failed to create upload directory");

    let user_repo = Arc::new(PostgresUserRepository::new(pool.clone()));
    let product_repo = Arc::new(PostgresProductRepository::new(pool.clone()));
    let cart_repo = Arc::new(PostgresCartRepository::new(pool.clone()));

    let auth_service = AuthService::new(
        Arc::clone(&user_repo),
        JwtKeys::new(config.jwt_secret.clone()),
    );
    let product_service = ProductService::new(Arc::clone(&product_repo), uploads.clone());
    let cart_service = CartService::new(Arc::clone(&cart_repo));

    let config_data = config.clone();
    let upload_root = uploads.root().to_path_buf();

    HttpServer::new(move || {
        let cors = build_cors(&config_data);
        App::new()
            .wrap(RequestIdMiddleware)
            .wrap(TimingMiddleware)
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("Referrer-Policy", "no-referrer"))
                    .add(("Permissions-Policy", "geolocation=()"))
                    .add(("Cross-Origin-Opener-Policy", "same-origin")),
            )
            .wrap(cors)
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(product_service.clone()))
            .app_data(web::Data::new(cart_service.clone()))
            .app_data(web::Data::new(uploads.clone()))
            .service(Files::new("/uploads", upload_root.clone()))
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(health))
                    .service(handlers::auth::scope())
                    .service(
                        web::resource("/products")
                            .route(web::get().to(handlers::product::list_products))
                            .route(web::post().to(handlers::product::create_product)),
                    )
                    // Registered before /products/{id} so "my-store" is
                    // never captured as an id.
                    .route(
                        "/products/my-store",
                        web::get().to(handlers::product::my_store_products),
                    )
                    .service(
                        web::resource("/products/{id}")
                            .route(web::put().to(handlers::product::update_product))
                            .route(web::delete().to(handlers::product::delete_product)),
                    )
                    .route("/cart", web::get().to(handlers::cart::get_cart))
                    .route("/cart/items", web::post().to(handlers::cart::put_cart_item))
                    .route(
                        "/cart/items/{product_id}",
                        web::delete().to(handlers::cart::remove_cart_item),
                    ),
            )
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

fn build_cors(config: &AppConfig) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allowed_headers(vec![
            actix_web::http::header::CONTENT_TYPE,
            actix_web::http::header::AUTHORIZATION,
        ])
        .supports_credentials()
        .max_age(3600);

    for origin in &config.cors_origins {
        if origin == "*" {
            cors = cors.allow_any_origin();
        } else {
            cors = cors.allowed_origin(origin);
        }
    }

    cors
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}
