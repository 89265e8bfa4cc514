use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod config;
pub mod convert;
pub mod db;
pub mod document;
pub mod estimate;
pub mod pipeline;

pub use crate::db::AppState;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::auth::handlers::get_auth_status,
        crate::auth::handlers::login,
        crate::auth::handlers::create_user,
        crate::estimate::handlers::dashboard,
        crate::estimate::handlers::create_estimate_form,
        crate::estimate::handlers::create_estimate,
        crate::estimate::handlers::generate_pdf,
        crate::estimate::handlers::confirm_delete_estimate,
        crate::estimate::handlers::delete_estimate,
        crate::estimate::handlers::get_estimate,
        crate::estimate::handlers::update_estimate,
        crate::estimate::paver_blocks::manage_paver_blocks,
        crate::estimate::paver_blocks::create_paver_block,
        crate::estimate::paver_blocks::confirm_delete_paver_block,
        crate::estimate::paver_blocks::delete_paver_block,
        crate::estimate::paver_blocks::update_paver_block
    ),
    components(
        schemas(
            ErrorResponse,
            auth::model::LoginRequest,
            auth::model::TokenResponse,
            auth::model::CreateUserRequest,
            auth::model::UserInfo,
            auth::model::AuthStatusResponse,
            estimate::model::Estimate,
            estimate::model::EstimateForm,
            estimate::model::EstimateSummary,
            estimate::model::PaverBlockType,
            estimate::model::PaverBlockTypeForm,
            estimate::model::DeleteConfirmation,
            estimate::handlers::EstimateFormOptions,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Login and user bootstrap."),
        (name = "Estimates", description = "Estimate records and quotation documents."),
        (name = "Paver Blocks", description = "Paver block type management.")
    ),
    servers(
        (url = "http://127.0.0.1:8080", description = "Localhost server")
    )
)]
pub struct ApiDoc;

/// Routes shared by the server and the integration tests.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(auth::config)
            .configure(estimate::api_config),
    )
    .configure(estimate::config);
}

pub async fn run() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match config::AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let app_state = match AppState::from_config(&config).await {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!("Failed to connect to database. Please check DATABASE_URL in .env and ensure the database is running. Error: {}", e);
            std::process::exit(1);
        }
    };

    let prometheus = match PrometheusMetricsBuilder::new("paver_estimate_server")
        .endpoint("/metrics")
        .build()
    {
        Ok(prometheus) => prometheus,
        Err(e) => {
            log::error!("Failed to create Prometheus metrics middleware: {}", e);
            std::process::exit(1);
        }
    };

    let cors_origins = config.cors_allowed_origins.clone();
    log::info!(
        "Starting server at http://{}:{}",
        config.bind_addr,
        config.port
    );

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();
        let cors = cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
            ])
            .expose_headers(vec![
                header::CONTENT_DISPOSITION,
                header::HeaderName::from_static("x-estimate-warning"),
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(app_state)
            .configure(configure_app)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}
