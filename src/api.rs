//! HTTP surface: health check, store lookup, product search.
//!
//! Every endpoint answers the same envelope shape `{status, data?, message?,
//! timestamp}` so mobile clients can switch on `status` alone. Lookup-key
//! validation lives here, not in the engine: by the time a zipcode reaches
//! the scraper it is known to be five digits.

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::products::{self, ProductRecord};
use crate::stores::{self, StoreRecord};

static ZIPCODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5}$").unwrap());

pub fn is_valid_zipcode(zipcode: &str) -> bool {
    ZIPCODE_RE.is_match(zipcode)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StoresResponse {
    pub status: String,
    pub data: Vec<StoreRecord>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductsResponse {
    pub status: String,
    pub data: Vec<ProductRecord>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            status: "error".to_string(),
            message,
            timestamp: Utc::now(),
        }),
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse)),
    tag = "health"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "success".to_string(),
        message: "Scraper API is healthy and running".to_string(),
        timestamp: Utc::now(),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/stores/{zipcode}",
    params(("zipcode" = String, Path, description = "Five-digit zipcode to search around")),
    responses(
        (status = 200, description = "Stores near the zipcode (possibly none)", body = StoresResponse),
        (status = 400, description = "Malformed zipcode", body = ErrorResponse),
        (status = 500, description = "Extraction failed", body = ErrorResponse)
    ),
    tag = "stores"
)]
pub async fn get_stores(Path(zipcode): Path<String>) -> Response {
    if !is_valid_zipcode(&zipcode) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid zipcode format. Must be 5 digits.".to_string(),
        );
    }

    match stores::lookup_stores(&zipcode).await {
        Ok(data) => (
            StatusCode::OK,
            Json(StoresResponse {
                status: "success".to_string(),
                data,
                timestamp: Utc::now(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("store lookup for {zipcode} failed: {e}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to scrape store data: {e}"),
            )
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{query}",
    params(("query" = String, Path, description = "Product search terms")),
    responses(
        (status = 200, description = "Matching products", body = ProductsResponse),
        (status = 500, description = "Search failed", body = ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_products(Path(query): Path<String>) -> Response {
    match products::search_products(&query).await {
        Ok(data) => (
            StatusCode::OK,
            Json(ProductsResponse {
                status: "success".to_string(),
                data,
                timestamp: Utc::now(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("product search for {query:?} failed: {e}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to search products: {e}"),
            )
        }
    }
}
