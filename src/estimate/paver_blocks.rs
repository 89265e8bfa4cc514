//! Paver block type management.
//!
//! Types are shared by all users. Deleting one removes every estimate that
//! references it, so the confirmation step reports how many will go.

use actix_web::{web, HttpRequest, HttpResponse, Responder};

use super::model::{DeleteConfirmation, PaverBlockType, PaverBlockTypeForm};
use super::{see_other, store_failure};
use crate::auth::current_user;
use crate::AppState;

fn cascade_warning(count: i64) -> String {
    match count {
        0 => "No estimates use this paver block type. This action cannot be undone.".to_string(),
        1 => "1 estimate uses this paver block type and will be deleted as well. This action cannot be undone.".to_string(),
        n => format!(
            "{} estimates use this paver block type and will be deleted as well. This action cannot be undone.",
            n
        ),
    }
}

#[utoipa::path(
    get,
    path = "/manage-paver-blocks/",
    tag = "Paver Blocks",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All paver block types, ordered by name", body = [PaverBlockType]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn manage_paver_blocks(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    if let Err(e) = current_user(&req) {
        return e.error_response();
    }

    match state.store.list_paver_block_types().await {
        Ok(types) => HttpResponse::Ok().json(types),
        Err(e) => store_failure("list paver block types", e),
    }
}

#[utoipa::path(
    post,
    path = "/manage-paver-blocks/",
    tag = "Paver Blocks",
    request_body(content = PaverBlockTypeForm, content_type = "application/x-www-form-urlencoded"),
    security(("bearer_auth" = [])),
    responses(
        (status = 303, description = "Created, redirects to the paver block list"),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn create_paver_block(
    req: HttpRequest,
    state: web::Data<AppState>,
    form: web::Form<PaverBlockTypeForm>,
) -> impl Responder {
    let user_id = match current_user(&req) {
        Ok(id) => id,
        Err(e) => return e.error_response(),
    };

    if let Err(message) = form.validate() {
        return HttpResponse::BadRequest().json(crate::ErrorResponse::bad_request(&message));
    }

    match state.store.create_paver_block_type(&form).await {
        Ok(created) => {
            log::info!("User {} added paver block type '{}'", user_id, created.name);
            see_other("/manage-paver-blocks/")
        }
        Err(e) => store_failure("create paver block type", e),
    }
}

#[utoipa::path(
    get,
    path = "/delete-paver-block/{id}/",
    tag = "Paver Blocks",
    params(("id" = i64, Path, description = "Paver block type ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Delete confirmation with cascade count", body = DeleteConfirmation),
        (status = 404, description = "Paver block type not found")
    )
)]
pub async fn confirm_delete_paver_block(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> impl Responder {
    if let Err(e) = current_user(&req) {
        return e.error_response();
    }
    let id = path.into_inner();

    let paver_block_type = match state.store.get_paver_block_type(id).await {
        Ok(Some(t)) => t,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(crate::ErrorResponse::not_found("Paver block type not found"))
        }
        Err(e) => return store_failure("load paver block type", e),
    };

    match state.store.count_estimates_using(id).await {
        Ok(count) => HttpResponse::Ok().json(DeleteConfirmation {
            id: paver_block_type.id,
            name: paver_block_type.name,
            cascaded_estimates: count,
            warning: cascade_warning(count),
        }),
        Err(e) => store_failure("count estimates", e),
    }
}

#[utoipa::path(
    post,
    path = "/delete-paver-block/{id}/",
    tag = "Paver Blocks",
    params(("id" = i64, Path, description = "Paver block type ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 303, description = "Deleted, redirects to the paver block list"),
        (status = 404, description = "Paver block type not found")
    )
)]
pub async fn delete_paver_block(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> impl Responder {
    let user_id = match current_user(&req) {
        Ok(id) => id,
        Err(e) => return e.error_response(),
    };
    let id = path.into_inner();

    match state.store.delete_paver_block_type(id).await {
        Ok(true) => {
            log::warn!(
                "User {} deleted paver block type {} and its estimates",
                user_id,
                id
            );
            see_other("/manage-paver-blocks/")
        }
        Ok(false) => HttpResponse::NotFound()
            .json(crate::ErrorResponse::not_found("Paver block type not found")),
        Err(e) => store_failure("delete paver block type", e),
    }
}

#[utoipa::path(
    context_path = "/api",
    put,
    path = "/paver-blocks/{id}",
    tag = "Paver Blocks",
    params(("id" = i64, Path, description = "Paver block type ID")),
    request_body = PaverBlockTypeForm,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Paver block type updated", body = PaverBlockType),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Paver block type not found")
    )
)]
pub async fn update_paver_block(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<PaverBlockTypeForm>,
) -> impl Responder {
    if let Err(e) = current_user(&req) {
        return e.error_response();
    }

    if let Err(message) = body.validate() {
        return HttpResponse::BadRequest().json(crate::ErrorResponse::bad_request(&message));
    }

    match state
        .store
        .update_paver_block_type(path.into_inner(), &body)
        .await
    {
        Ok(Some(updated)) => HttpResponse::Ok().json(updated),
        Ok(None) => HttpResponse::NotFound()
            .json(crate::ErrorResponse::not_found("Paver block type not found")),
        Err(e) => store_failure("update paver block type", e),
    }
}
