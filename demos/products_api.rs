use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use uuid::Uuid;

use structured_audit_log::init::init_logging_from_env;
use structured_audit_log::middleware::AuditLayer;
use structured_audit_log::{domain_error, domain_info, domain_warning, StructuredLogger};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Product {
    name: String,
    description: Option<String>,
    price: f64,
    #[serde(default = "in_stock_default")]
    in_stock: bool,
}

fn in_stock_default() -> bool {
    true
}

#[derive(Clone)]
struct AppState {
    logger: StructuredLogger,
    products: Arc<RwLock<HashMap<String, Product>>>,
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    domain_info!(state.logger, "health_checked", status = "healthy");
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn create_product(
    State(state): State<AppState>,
    Json(product): Json<Product>,
) -> (StatusCode, Json<Product>) {
    let product_id = Uuid::new_v4().to_string();
    if let Ok(mut products) = state.products.write() {
        products.insert(product_id.clone(), product.clone());
    }
    domain_info!(
        state.logger,
        "product_created",
        product_id = &product_id,
        product_name = &product.name,
        price = product.price,
    );
    (StatusCode::CREATED, Json(product))
}

async fn list_products(State(state): State<AppState>) -> Json<Vec<Product>> {
    let products: Vec<Product> = state
        .products
        .read()
        .map(|p| p.values().cloned().collect())
        .unwrap_or_default();
    domain_info!(state.logger, "products_listed", product_count = products.len());
    Json(products)
}

async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<Product>, StatusCode> {
    let found = state
        .products
        .read()
        .ok()
        .and_then(|p| p.get(&product_id).cloned());
    match found {
        Some(product) => {
            domain_info!(state.logger, "product_retrieved", product_id = &product_id);
            Ok(Json(product))
        }
        None => {
            domain_warning!(
                state.logger,
                "product_retrieval_failed",
                reason = "product_not_found",
                product_id = &product_id,
            );
            Err(StatusCode::NOT_FOUND)
        }
    }
}

async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(product): Json<Product>,
) -> Result<Json<Product>, StatusCode> {
    let updated = match state.products.write() {
        Ok(mut products) => match products.get_mut(&product_id) {
            Some(existing) => {
                *existing = product.clone();
                true
            }
            None => false,
        },
        Err(_) => false,
    };
    if !updated {
        domain_warning!(
            state.logger,
            "product_update_failed",
            reason = "product_not_found",
            product_id = &product_id,
        );
        return Err(StatusCode::NOT_FOUND);
    }
    domain_info!(
        state.logger,
        "product_updated",
        product_id = &product_id,
        product_name = &product.name,
        price = product.price,
    );
    Ok(Json(product))
}

async fn delete_product(State(state): State<AppState>, Path(product_id): Path<String>) -> StatusCode {
    let removed = state
        .products
        .write()
        .ok()
        .and_then(|mut p| p.remove(&product_id));
    match removed {
        Some(product) => {
            domain_info!(
                state.logger,
                "product_deleted",
                product_id = &product_id,
                product_name = &product.name,
            );
            StatusCode::NO_CONTENT
        }
        None => {
            domain_warning!(
                state.logger,
                "product_deletion_failed",
                reason = "product_not_found",
                product_id = &product_id,
            );
            StatusCode::NOT_FOUND
        }
    }
}

async fn trigger_error(State(state): State<AppState>) -> StatusCode {
    domain_error!(state.logger, "error_endpoint_called", reason = "demonstration");
    panic!("This is a test error")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // LOG_LEVEL, LOGS_EXTRA_FIELDS, LOGGER_NAME and LOG_REQUEST_ID_HEADER
    // are read once here.
    let logger = init_logging_from_env()?;

    let state = AppState {
        logger: logger.named("domain"),
        products: Arc::new(RwLock::new(HashMap::new())),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/error", get(trigger_error))
        .with_state(state)
        .layer(AuditLayer::new(logger.named("audit")))
        // Outermost: the audit layer records the panic, this turns it into a 500.
        .layer(CatchPanicLayer::new());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
