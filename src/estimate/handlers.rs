use actix_web::http::header::{
    Charset, ContentDisposition, DispositionParam, DispositionType, ExtendedValue,
};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Serialize;
use utoipa::ToSchema;

use super::model::{
    DeleteConfirmation, Estimate, EstimateForm, EstimateSummary, PaverBlockType,
};
use super::{see_other, store_failure};
use crate::auth::current_user;
use crate::pipeline::{PipelineError, RequestContext};
use crate::AppState;

/// Response header carrying the degraded-download notice.
pub const WARNING_HEADER: &str = "X-Estimate-Warning";

/// What the estimate form needs to render its paver block choices.
#[derive(Debug, Serialize, ToSchema)]
pub struct EstimateFormOptions {
    pub paver_block_types: Vec<PaverBlockType>,
}

/// `attachment; filename=...`. Non-ASCII names also get an RFC 5987
/// `filename*` and an ASCII-only `filename` for older clients.
pub fn attachment(filename: &str) -> ContentDisposition {
    let mut parameters = Vec::new();
    if filename.is_ascii() {
        parameters.push(DispositionParam::Filename(filename.to_string()));
    } else {
        let fallback: String = filename
            .chars()
            .map(|c| if c.is_ascii() { c } else { '_' })
            .collect();
        parameters.push(DispositionParam::Filename(fallback));
        parameters.push(DispositionParam::FilenameExt(ExtendedValue {
            charset: Charset::Ext(String::from("UTF-8")),
            language_tag: None,
            value: filename.as_bytes().to_vec(),
        }));
    }
    ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters,
    }
}

/// The caller's estimates, newest first.
#[utoipa::path(
    get,
    path = "/dashboard/",
    tag = "Estimates",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's estimates", body = [EstimateSummary]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn dashboard(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    let user_id = match current_user(&req) {
        Ok(id) => id,
        Err(e) => return e.error_response(),
    };

    match state.store.list_estimates(user_id).await {
        Ok(estimates) => {
            let summaries: Vec<EstimateSummary> =
                estimates.iter().map(EstimateSummary::from).collect();
            HttpResponse::Ok().json(summaries)
        }
        Err(e) => store_failure("list estimates", e),
    }
}

#[utoipa::path(
    get,
    path = "/create-estimate/",
    tag = "Estimates",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Paver block choices for the form", body = EstimateFormOptions),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_estimate_form(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    if let Err(e) = current_user(&req) {
        return e.error_response();
    }

    match state.store.list_paver_block_types().await {
        Ok(paver_block_types) => HttpResponse::Ok().json(EstimateFormOptions { paver_block_types }),
        Err(e) => store_failure("list paver block types", e),
    }
}

#[utoipa::path(
    post,
    path = "/create-estimate/",
    tag = "Estimates",
    request_body(content = EstimateForm, content_type = "application/x-www-form-urlencoded"),
    security(("bearer_auth" = [])),
    responses(
        (status = 303, description = "Created, redirects to the dashboard"),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_estimate(
    req: HttpRequest,
    state: web::Data<AppState>,
    form: web::Form<EstimateForm>,
) -> impl Responder {
    let user_id = match current_user(&req) {
        Ok(id) => id,
        Err(e) => return e.error_response(),
    };

    let validated = match form.into_inner().validate() {
        Ok(v) => v,
        Err(message) => {
            return HttpResponse::BadRequest().json(crate::ErrorResponse::bad_request(&message))
        }
    };

    match state.store.create_estimate(user_id, &validated).await {
        Ok(estimate) => {
            log::info!(
                "User {} created estimate {} for {}",
                user_id,
                estimate.id,
                estimate.party_name
            );
            see_other("/dashboard/")
        }
        Err(e) => store_failure("create estimate", e),
    }
}

/// Render the estimate. Responds with a PDF, or with the filled-in DOCX and
/// an `X-Estimate-Warning` header when no PDF could be produced.
#[utoipa::path(
    get,
    path = "/generate-pdf/{id}/",
    tag = "Estimates",
    params(("id" = i64, Path, description = "Estimate ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "PDF (or DOCX fallback) attachment"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Estimate not found"),
        (status = 500, description = "Template missing or unreadable")
    )
)]
pub async fn generate_pdf(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> impl Responder {
    let user_id = match current_user(&req) {
        Ok(id) => id,
        Err(e) => return e.error_response(),
    };
    let estimate_id = path.into_inner();

    let estimate = match state.store.get_estimate(user_id, estimate_id).await {
        Ok(Some(estimate)) => estimate,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(crate::ErrorResponse::not_found("Estimate not found"))
        }
        Err(e) => return store_failure("load estimate", e),
    };

    let paver_block_type = match state
        .store
        .get_paver_block_type(estimate.paver_block_type_id)
        .await
    {
        Ok(Some(t)) => t,
        Ok(None) => {
            log::error!(
                "Estimate {} references missing paver block type {}",
                estimate.id,
                estimate.paver_block_type_id
            );
            return HttpResponse::InternalServerError().json(
                crate::ErrorResponse::internal_error("Estimate references an unknown paver block type"),
            );
        }
        Err(e) => return store_failure("load paver block type", e),
    };

    let context = RequestContext::new(user_id, estimate.id);
    let document = match state
        .pipeline
        .generate(&context, &estimate, &paver_block_type.name)
        .await
    {
        Ok(document) => document,
        Err(PipelineError::TemplateMissing(_)) => {
            return HttpResponse::InternalServerError().json(crate::ErrorResponse::new(
                "ConfigurationError",
                "Estimate template is not installed. Contact the administrator.",
            ))
        }
        Err(e) => {
            log::error!("{} generation failed: {}", context, e);
            return HttpResponse::InternalServerError().json(
                crate::ErrorResponse::internal_error("Failed to generate estimate document"),
            );
        }
    };

    let mut response = HttpResponse::Ok();
    response
        .content_type(document.content_type())
        .insert_header(attachment(&document.filename));
    if let Some(warning) = &document.warning {
        response.insert_header((WARNING_HEADER, warning.as_str()));
    }
    response.body(document.bytes)
}

#[utoipa::path(
    get,
    path = "/delete-estimate/{id}/",
    tag = "Estimates",
    params(("id" = i64, Path, description = "Estimate ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Delete confirmation", body = DeleteConfirmation),
        (status = 404, description = "Estimate not found")
    )
)]
pub async fn confirm_delete_estimate(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> impl Responder {
    let user_id = match current_user(&req) {
        Ok(id) => id,
        Err(e) => return e.error_response(),
    };

    match state.store.get_estimate(user_id, path.into_inner()).await {
        Ok(Some(estimate)) => HttpResponse::Ok().json(DeleteConfirmation {
            id: estimate.id,
            name: estimate.party_name,
            cascaded_estimates: 0,
            warning: "This estimate will be permanently deleted. This action cannot be undone."
                .to_string(),
        }),
        Ok(None) => {
            HttpResponse::NotFound().json(crate::ErrorResponse::not_found("Estimate not found"))
        }
        Err(e) => store_failure("load estimate", e),
    }
}

#[utoipa::path(
    post,
    path = "/delete-estimate/{id}/",
    tag = "Estimates",
    params(("id" = i64, Path, description = "Estimate ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 303, description = "Deleted, redirects to the dashboard"),
        (status = 404, description = "Estimate not found")
    )
)]
pub async fn delete_estimate(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> impl Responder {
    let user_id = match current_user(&req) {
        Ok(id) => id,
        Err(e) => return e.error_response(),
    };
    let estimate_id = path.into_inner();

    match state.store.delete_estimate(user_id, estimate_id).await {
        Ok(true) => {
            log::info!("User {} deleted estimate {}", user_id, estimate_id);
            see_other("/dashboard/")
        }
        Ok(false) => {
            HttpResponse::NotFound().json(crate::ErrorResponse::not_found("Estimate not found"))
        }
        Err(e) => store_failure("delete estimate", e),
    }
}

#[utoipa::path(
    context_path = "/api",
    get,
    path = "/estimates/{id}",
    tag = "Estimates",
    params(("id" = i64, Path, description = "Estimate ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Estimate found", body = Estimate),
        (status = 404, description = "Estimate not found")
    )
)]
pub async fn get_estimate(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> impl Responder {
    let user_id = match current_user(&req) {
        Ok(id) => id,
        Err(e) => return e.error_response(),
    };

    match state.store.get_estimate(user_id, path.into_inner()).await {
        Ok(Some(estimate)) => HttpResponse::Ok().json(estimate),
        Ok(None) => {
            HttpResponse::NotFound().json(crate::ErrorResponse::not_found("Estimate not found"))
        }
        Err(e) => store_failure("load estimate", e),
    }
}

/// Replace an estimate's fields. Derived amounts are recomputed.
#[utoipa::path(
    context_path = "/api",
    put,
    path = "/estimates/{id}",
    tag = "Estimates",
    params(("id" = i64, Path, description = "Estimate ID")),
    request_body = EstimateForm,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Estimate updated", body = Estimate),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Estimate not found")
    )
)]
pub async fn update_estimate(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<EstimateForm>,
) -> impl Responder {
    let user_id = match current_user(&req) {
        Ok(id) => id,
        Err(e) => return e.error_response(),
    };

    let validated = match body.into_inner().validate() {
        Ok(v) => v,
        Err(message) => {
            return HttpResponse::BadRequest().json(crate::ErrorResponse::bad_request(&message))
        }
    };

    match state
        .store
        .update_estimate(user_id, path.into_inner(), &validated)
        .await
    {
        Ok(Some(estimate)) => HttpResponse::Ok().json(estimate),
        Ok(None) => {
            HttpResponse::NotFound().json(crate::ErrorResponse::not_found("Estimate not found"))
        }
        Err(e) => store_failure("update estimate", e),
    }
}
