pub mod handlers;
pub mod model;
pub mod paver_blocks;
pub mod validation;

use actix_web::{error, http::header, web, HttpResponse};

use crate::db::StoreError;

/// `303 See Other` to `location`, the response to every successful form post.
pub(crate) fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

pub(crate) fn store_failure(action: &str, e: StoreError) -> HttpResponse {
    match e {
        StoreError::UnknownPaverBlockType(id) => {
            HttpResponse::BadRequest().json(crate::ErrorResponse::bad_request(&format!(
                "Paver block type {} does not exist",
                id
            )))
        }
        e => {
            log::error!("Failed to {}: {:?}", action, e);
            HttpResponse::InternalServerError()
                .json(crate::ErrorResponse::internal_error(&format!("Failed to {}", action)))
        }
    }
}

fn form_error_handler(err: error::UrlencodedError, _req: &actix_web::HttpRequest) -> error::Error {
    let message = format!("Invalid form data: {}", err);
    error::InternalError::from_response(
        err,
        HttpResponse::BadRequest().json(crate::ErrorResponse::bad_request(&message)),
    )
    .into()
}

fn json_error_handler(err: error::JsonPayloadError, _req: &actix_web::HttpRequest) -> error::Error {
    let message = format!("Invalid JSON payload: {}", err);
    error::InternalError::from_response(
        err,
        HttpResponse::BadRequest().json(crate::ErrorResponse::bad_request(&message)),
    )
    .into()
}

/// Form-driven routes (dashboard, create, generate, delete).
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::FormConfig::default().error_handler(form_error_handler))
        .route("/dashboard/", web::get().to(handlers::dashboard))
        .route("/create-estimate/", web::get().to(handlers::create_estimate_form))
        .route("/create-estimate/", web::post().to(handlers::create_estimate))
        .route("/generate-pdf/{id}/", web::get().to(handlers::generate_pdf))
        .route("/delete-estimate/{id}/", web::get().to(handlers::confirm_delete_estimate))
        .route("/delete-estimate/{id}/", web::post().to(handlers::delete_estimate))
        .route("/manage-paver-blocks/", web::get().to(paver_blocks::manage_paver_blocks))
        .route("/manage-paver-blocks/", web::post().to(paver_blocks::create_paver_block))
        .route("/delete-paver-block/{id}/", web::get().to(paver_blocks::confirm_delete_paver_block))
        .route("/delete-paver-block/{id}/", web::post().to(paver_blocks::delete_paver_block));
}

/// JSON routes, mounted under `/api`.
pub fn api_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .route("/estimates/{id}", web::get().to(handlers::get_estimate))
        .route("/estimates/{id}", web::put().to(handlers::update_estimate))
        .route("/paver-blocks/{id}", web::put().to(paver_blocks::update_paver_block));
}
