//! Unit tests for authentication module

#[cfg(test)]
mod tests {
    use crate::auth::jwt::{generate_access_token, validate_token};
    use crate::auth::middleware::{current_user, validate_request_token};
    use crate::auth::model::{LoginRequest, TokenResponse, User, UserInfo};
    use actix_web::test::TestRequest;
    use uuid::Uuid;

    #[test]
    fn test_generate_and_validate_access_token() {
        let user_id = Uuid::new_v4().to_string();
        let username = "estimator";

        let token =
            generate_access_token(&user_id, username).expect("Failed to generate access token");

        let claims = validate_token(&token).expect("Failed to validate token");

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, username);
        assert_eq!(claims.token_type, "access");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_invalid_token_returns_error() {
        let result = validate_token("invalid.token.here");
        assert!(result.is_err());
    }

    #[test]
    fn test_user_to_user_info_hides_hash() {
        let user = User {
            id: Uuid::new_v4(),
            username: "estimator".to_string(),
            password_hash: "hashedpassword".to_string(),
            created_at: chrono::Utc::now(),
        };

        let info: UserInfo = user.clone().into();
        assert_eq!(info.id, user.id);
        assert_eq!(info.username, user.username);

        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("hashedpassword"));
    }

    #[test]
    fn test_login_request_deserialize() {
        let json = r#"{"username": "estimator", "password": "secret"}"#;
        let request: LoginRequest = serde_json::from_str(json).expect("Failed to deserialize");

        assert_eq!(request.username, "estimator");
        assert_eq!(request.password, "secret");
    }

    #[test]
    fn test_token_response_serialize() {
        let response = TokenResponse {
            access_token: "access".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 900,
        };

        let json = serde_json::to_string(&response).expect("Failed to serialize");
        assert!(json.contains("access_token"));
        assert!(json.contains("expires_in"));
    }

    #[test]
    fn test_current_user_reads_bearer_token() {
        let user_id = Uuid::new_v4();
        let token = generate_access_token(&user_id.to_string(), "estimator").unwrap();
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_http_request();

        assert_eq!(current_user(&req).unwrap(), user_id);
    }

    #[test]
    fn test_missing_or_malformed_header_is_rejected() {
        let req = TestRequest::default().to_http_request();
        assert!(validate_request_token(&req).is_err());

        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert!(validate_request_token(&req).is_err());
    }

    #[test]
    fn test_non_uuid_subject_is_rejected() {
        let token = generate_access_token("not-a-uuid", "estimator").unwrap();
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_http_request();
        assert!(validate_request_token(&req).is_ok());
        assert!(current_user(&req).is_err());
    }
}
