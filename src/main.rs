mod api;
mod driver;
mod error;
mod extract;
mod locate;
mod normalize;
mod poll;
mod products;
mod session;
mod stealth;
mod stores;

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use dotenv::dotenv;
use std::env;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(api::health, api::get_stores, api::get_products),
    components(
        schemas(
            api::HealthResponse,
            api::StoresResponse,
            api::ProductsResponse,
            api::ErrorResponse,
            crate::stores::StoreRecord,
            crate::products::ProductRecord
        )
    ),
    tags(
        (name = "stores", description = "Store locator extraction"),
        (name = "products", description = "Product index search"),
        (name = "health", description = "Liveness")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let port = env::var("PORT").unwrap_or_else(|_| "8080".to_string());

    // Mobile clients call from arbitrary origins; the API carries no
    // cookies, so a permissive CORS policy is fine.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::health))
        .route("/api/v1/stores/:zipcode", get(api::get_stores))
        .route("/api/v1/products/:query", get(api::get_products))
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    info!("API running on port {port}");
    info!("   GET  /health");
    info!("   GET  /api/v1/stores/{{zipcode}}");
    info!("   GET  /api/v1/products/{{query}}");
    axum::serve(listener, app).await?;

    Ok(())
}
