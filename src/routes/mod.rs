use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

pub mod auth;
pub mod company;
pub mod customers;
pub mod health;
pub mod invoices;
pub mod settings;

// Logos arrive base64-encoded inside JSON bodies.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

fn cors_layer(allowed: Option<&str>) -> CorsLayer {
    let allow_origin = match allowed {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(origin, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(state.config.cors_allowed_origin.as_deref());

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/guest", post(auth::guest))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let invoice_routes = Router::new()
        .route(
            "/",
            get(invoices::list_invoices).post(invoices::save_invoice),
        )
        .route(
            "/:id",
            get(invoices::get_invoice).delete(invoices::delete_invoice),
        )
        .route("/:id/status", patch(invoices::update_status));

    let customer_routes = Router::new()
        .route("/", get(customers::list_customers))
        .route("/:id", get(customers::get_customer));

    let company_routes = Router::new()
        .route("/", get(company::get_company).put(company::save_company))
        .route(
            "/logo",
            post(company::upload_logo).delete(company::delete_logo),
        );

    let settings_routes = Router::new()
        .route("/email", post(settings::update_email))
        .route("/password", post(settings::update_password));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/invoices", invoice_routes)
        .nest("/api/customers", customer_routes)
        .nest("/api/company", company_routes)
        .nest("/api/settings", settings_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
