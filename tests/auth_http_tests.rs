mod common;

use actix_web::http::header::AUTHORIZATION;
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use paver_estimate_server::auth::validate_token;
use paver_estimate_server::configure_app;

#[actix_web::test]
async fn test_first_user_bootstrap_then_login() {
    let env = common::builtin_env();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(env.state.clone()))
            .configure(configure_app),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/auth/status").to_request();
    let status: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(status["setup_required"], true);
    assert_eq!(status["has_users"], false);

    let req = test::TestRequest::post()
        .uri("/api/auth/users")
        .set_json(json!({"username": "estimator", "password": "correct horse"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["username"], "estimator");
    assert!(created.get("password_hash").is_none());

    let req = test::TestRequest::get().uri("/api/auth/status").to_request();
    let status: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(status["setup_required"], false);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"username": "estimator", "password": "correct horse"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let token: Value = test::read_body_json(resp).await;
    assert_eq!(token["token_type"], "Bearer");
    let claims = validate_token(token["access_token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.sub, created["id"].as_str().unwrap());

    // the token opens the estimate routes
    let req = test::TestRequest::get()
        .uri("/dashboard/")
        .insert_header((
            AUTHORIZATION,
            format!("Bearer {}", token["access_token"].as_str().unwrap()),
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_login_rejects_wrong_password() {
    let env = common::builtin_env();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(env.state.clone()))
            .configure(configure_app),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/auth/users")
        .set_json(json!({"username": "estimator", "password": "correct horse"}))
        .to_request();
    test::call_service(&app, req).await;

    for (username, password) in [("estimator", "wrong password"), ("nobody", "correct horse")] {
        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"username": username, "password": password}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Invalid username or password");
    }
}

#[actix_web::test]
async fn test_user_creation_is_protected_after_bootstrap() {
    let env = common::builtin_env();
    let bearer = common::bearer_for(&env.state, "owner").await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(env.state.clone()))
            .configure(configure_app),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/auth/users")
        .set_json(json!({"username": "intruder", "password": "long enough"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/auth/users")
        .insert_header((AUTHORIZATION, bearer.clone()))
        .set_json(json!({"username": "colleague", "password": "long enough"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/api/auth/users")
        .insert_header((AUTHORIZATION, bearer.clone()))
        .set_json(json!({"username": "colleague", "password": "long enough"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::post()
        .uri("/api/auth/users")
        .insert_header((AUTHORIZATION, bearer))
        .set_json(json!({"username": "shortpw", "password": "short"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_garbage_token_is_rejected() {
    let env = common::builtin_env();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(env.state.clone()))
            .configure(configure_app),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/dashboard/")
        .insert_header((AUTHORIZATION, "Bearer not.a.token"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
