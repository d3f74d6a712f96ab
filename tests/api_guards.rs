//! Requests that are turned away before any query reaches the database.
//! The pool is lazy, so these run without a MySQL server.

use actix_web::{App, http::StatusCode, test, web::Data};
use erp_backend::{
    auth::jwt::{Subject, generate_access_token, generate_refresh_token},
    backup::BackupJob,
    config::Config,
    models::PrincipalKind,
    routes,
    storage::{LocalStore, Storage},
};
use serde_json::Value;
use sqlx::mysql::MySqlPoolOptions;
use std::net::SocketAddr;

fn peer() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

fn user_token(config: &Config, role: u8) -> String {
    let subject = Subject {
        principal: PrincipalKind::User,
        subject_id: 1,
        name: "tester".into(),
        role: Some(role),
    };
    generate_access_token(&subject, &config.jwt_secret, 60).unwrap()
}

fn employee_token(config: &Config) -> String {
    let subject = Subject {
        principal: PrincipalKind::Employee,
        subject_id: 9,
        name: "EMP-009".into(),
        role: None,
    };
    generate_access_token(&subject, &config.jwt_secret, 60).unwrap()
}

macro_rules! app {
    ($config:expr) => {{
        let config: Config = $config;
        let pool = MySqlPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let dir = std::env::temp_dir().join("erp-backend-guard-tests");
        let storage = Storage::local_only(LocalStore::new(dir));
        let job = BackupJob::new(pool.clone(), storage.clone(), "backups");
        let routes_config = config.clone();
        test::init_service(
            App::new()
                .app_data(Data::new(pool))
                .app_data(Data::new(config))
                .app_data(Data::new(storage))
                .app_data(Data::new(job))
                .configure(move |cfg| routes::configure(cfg, routes_config)),
        )
        .await
    }};
}

async fn error_code(resp: actix_web::dev::ServiceResponse) -> String {
    let body: Value = test::read_body_json(resp).await;
    body["code"].as_str().unwrap_or_default().to_string()
}

#[actix_web::test]
async fn missing_token_is_unauthorized() {
    let app = app!(Config::for_tests());

    let req = test::TestRequest::get()
        .uri("/api/employees")
        .peer_addr(peer())
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(resp).await, "UNAUTHORIZED");
}

#[actix_web::test]
async fn refresh_token_cannot_call_the_api() {
    let config = Config::for_tests();
    let subject = Subject {
        principal: PrincipalKind::User,
        subject_id: 1,
        name: "admin".into(),
        role: Some(1),
    };
    let (refresh, _) = generate_refresh_token(&subject, &config.jwt_secret, 60).unwrap();
    let app = app!(config);

    let req = test::TestRequest::get()
        .uri("/api/users")
        .insert_header(("Authorization", format!("Bearer {refresh}")))
        .peer_addr(peer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn token_signed_with_another_secret_is_rejected() {
    let config = Config::for_tests();
    let mut other = Config::for_tests();
    other.jwt_secret = "someone-else".into();
    let token = user_token(&other, 1);
    let app = app!(config);

    let req = test::TestRequest::get()
        .uri("/api/departments")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .peer_addr(peer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn store_role_cannot_manage_users() {
    let config = Config::for_tests();
    let token = user_token(&config, 4);
    let app = app!(config);

    let req = test::TestRequest::get()
        .uri("/api/users")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .peer_addr(peer())
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(resp).await, "FORBIDDEN");
}

#[actix_web::test]
async fn employees_are_kept_out_of_back_office() {
    let config = Config::for_tests();
    let token = employee_token(&config);
    let app = app!(config);

    let req = test::TestRequest::post()
        .uri("/api/departments")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(serde_json::json!({"name": "Fleet"}))
        .peer_addr(peer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn back_office_users_have_no_self_service() {
    let config = Config::for_tests();
    let token = user_token(&config, 1);
    let app = app!(config);

    let req = test::TestRequest::post()
        .uri("/api/me/attendance/check-in")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .peer_addr(peer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn malformed_json_uses_the_error_envelope() {
    let config = Config::for_tests();
    let token = user_token(&config, 2);
    let app = app!(config);

    let req = test::TestRequest::post()
        .uri("/api/departments")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{\"name\": ")
        .peer_addr(peer())
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(resp).await, "BAD_REQUEST");
}

#[actix_web::test]
async fn bad_path_parameter_is_a_bad_request() {
    let config = Config::for_tests();
    let token = user_token(&config, 2);
    let app = app!(config);

    let req = test::TestRequest::get()
        .uri("/api/departments/abc")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .peer_addr(peer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
