use actix_web::{web, HttpRequest, HttpResponse, Responder};
use bcrypt::{hash, verify, DEFAULT_COST};

use super::jwt::{generate_access_token, get_access_token_expiry};
use super::middleware::validate_request_token;
use super::model::{AuthStatusResponse, CreateUserRequest, LoginRequest, TokenResponse, UserInfo};
use crate::db::StoreError;
use crate::AppState;

const MIN_PASSWORD_LENGTH: usize = 8;

/// Check if setup is required (no users exist)
#[utoipa::path(
    get,
    path = "/api/auth/status",
    tag = "Authentication",
    responses(
        (status = 200, description = "Auth status", body = AuthStatusResponse)
    )
)]
pub async fn get_auth_status(state: web::Data<AppState>) -> impl Responder {
    match state.store.count_users().await {
        Ok(count) => HttpResponse::Ok().json(AuthStatusResponse {
            has_users: count > 0,
            setup_required: count == 0,
        }),
        Err(e) => {
            log::error!("Failed to count users: {:?}", e);
            HttpResponse::InternalServerError()
                .json(crate::ErrorResponse::internal_error("Failed to read auth status"))
        }
    }
}

/// Login endpoint
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> impl Responder {
    let user = match state.store.find_user_by_username(body.username.trim()).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::Unauthorized().json(crate::ErrorResponse::new(
                "Unauthorized",
                "Invalid username or password",
            ));
        }
        Err(e) => {
            log::error!("Database error during login: {:?}", e);
            return HttpResponse::InternalServerError()
                .json(crate::ErrorResponse::internal_error("Login failed"));
        }
    };

    let password_valid = verify(&body.password, &user.password_hash).unwrap_or(false);
    if !password_valid {
        return HttpResponse::Unauthorized().json(crate::ErrorResponse::new(
            "Unauthorized",
            "Invalid username or password",
        ));
    }

    let access_token = match generate_access_token(&user.id.to_string(), &user.username) {
        Ok(t) => t,
        Err(e) => {
            log::error!("Failed to generate access token: {:?}", e);
            return HttpResponse::InternalServerError().json(crate::ErrorResponse::internal_error(
                "Failed to generate token",
            ));
        }
    };

    log::info!("User {} logged in", user.username);
    HttpResponse::Ok().json(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: get_access_token_expiry(),
    })
}

/// Create a user. Open while no user exists (first-time setup), protected afterwards.
#[utoipa::path(
    post,
    path = "/api/auth/users",
    tag = "Authentication",
    request_body = CreateUserRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "User created", body = UserInfo),
        (status = 400, description = "Invalid username or password"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Username already exists")
    )
)]
pub async fn create_user(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateUserRequest>,
) -> impl Responder {
    let user_count = match state.store.count_users().await {
        Ok(count) => count,
        Err(e) => {
            log::error!("Failed to count users: {:?}", e);
            return HttpResponse::InternalServerError()
                .json(crate::ErrorResponse::internal_error("Failed to create user"));
        }
    };

    if user_count > 0 {
        if let Err(e) = validate_request_token(&req) {
            return e.error_response();
        }
    }

    let username = body.username.trim();
    if username.is_empty() {
        return HttpResponse::BadRequest()
            .json(crate::ErrorResponse::bad_request("Username is required"));
    }
    if body.password.chars().count() < MIN_PASSWORD_LENGTH {
        return HttpResponse::BadRequest().json(crate::ErrorResponse::bad_request(&format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let password_hash = match hash(&body.password, DEFAULT_COST) {
        Ok(h) => h,
        Err(e) => {
            log::error!("Failed to hash password: {:?}", e);
            return HttpResponse::InternalServerError()
                .json(crate::ErrorResponse::internal_error("Failed to create user"));
        }
    };

    match state.store.create_user(username, &password_hash).await {
        Ok(user) => {
            log::info!("Created user {}", user.username);
            HttpResponse::Created().json(UserInfo::from(user))
        }
        Err(StoreError::DuplicateUsername(_)) => HttpResponse::Conflict().json(
            crate::ErrorResponse::new("Conflict", "Username already exists"),
        ),
        Err(e) => {
            log::error!("Failed to create user: {:?}", e);
            HttpResponse::InternalServerError()
                .json(crate::ErrorResponse::internal_error("Failed to create user"))
        }
    }
}

/// Configure auth routes
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/status", web::get().to(get_auth_status))
            .route("/login", web::post().to(login))
            .route("/users", web::post().to(create_user)),
    );
}
