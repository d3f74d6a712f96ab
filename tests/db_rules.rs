//! Behaviour that only shows against a real MySQL server.
//!
//! Ignored by default. Point `DATABASE_URL` at a scratch database and run
//! `cargo test --test db_rules -- --ignored`. Every test names its rows with a
//! fresh uuid, so runs can share one database.

use actix_web::{App, http::StatusCode, test, web::Data};
use chrono::NaiveDate;
use erp_backend::{
    auth::{
        handlers::prune_refresh_tokens,
        jwt::{Subject, generate_access_token},
    },
    backup::BackupJob,
    config::Config,
    db::run_migrations,
    model::leave_period::LeaveType,
    models::PrincipalKind,
    routes,
    service::leave::{LeavePlan, apply_leave_day},
    storage::{LocalStore, Storage},
};
use serde_json::{Value, json};
use sqlx::{MySqlConnection, MySqlPool, mysql::MySqlPoolOptions};
use std::net::SocketAddr;
use uuid::Uuid;

fn peer() -> SocketAddr {
    "127.0.0.1:40100".parse().unwrap()
}

async fn pool() -> MySqlPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for database tests");
    let pool = MySqlPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

fn admin_token(config: &Config) -> String {
    let subject = Subject {
        principal: PrincipalKind::User,
        subject_id: 1,
        name: "db-tests".into(),
        role: Some(1),
    };
    generate_access_token(&subject, &config.jwt_secret, 300).unwrap()
}

fn tag() -> String {
    Uuid::new_v4().simple().to_string()
}

macro_rules! app {
    ($pool:expr, $config:expr) => {{
        let pool: MySqlPool = $pool;
        let config: Config = $config;
        let dir = std::env::temp_dir().join("erp-backend-db-tests");
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

macro_rules! send {
    ($app:expr, $token:expr, $req:expr) => {{
        let req = $req
            .insert_header(("Authorization", format!("Bearer {}", $token)))
            .peer_addr(peer())
            .to_request();
        test::call_service(&$app, req).await
    }};
}

#[actix_web::test]
#[ignore = "needs a MySQL server in DATABASE_URL"]
async fn created_department_reads_back_and_duplicate_is_conflict() {
    let config = Config::for_tests();
    let token = admin_token(&config);
    let app = app!(pool().await, config);
    let name = format!("Ops {}", tag());

    let resp = send!(
        app,
        token,
        test::TestRequest::post()
            .uri("/api/departments")
            .set_json(json!({"name": name, "description": "Yard"}))
    );
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    let id = created["id"].as_u64().unwrap();

    let resp = send!(
        app,
        token,
        test::TestRequest::get().uri(&format!("/api/departments/{id}"))
    );
    assert_eq!(resp.status(), StatusCode::OK);
    let read: Value = test::read_body_json(resp).await;
    assert_eq!(read["name"], name.as_str());
    assert_eq!(read["description"], "Yard");

    let resp = send!(
        app,
        token,
        test::TestRequest::post()
            .uri("/api/departments")
            .set_json(json!({"name": name}))
    );
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "CONFLICT");
}

#[actix_web::test]
#[ignore = "needs a MySQL server in DATABASE_URL"]
async fn foreign_keys_map_to_client_errors() {
    let config = Config::for_tests();
    let token = admin_token(&config);
    let app = app!(pool().await, config);

    let resp = send!(
        app,
        token,
        test::TestRequest::post()
            .uri("/api/clients")
            .set_json(json!({"name": format!("Client {}", tag())}))
    );
    assert_eq!(resp.status(), StatusCode::CREATED);
    let client: Value = test::read_body_json(resp).await;
    let client_id = client["id"].as_u64().unwrap();

    let invoice = |client_id: u64| {
        json!({
            "client_id": client_id,
            "issue_date": "2026-03-01",
            "items": [{"description": "Haulage", "quantity": "1", "unit_price": "100.00"}]
        })
    };

    let resp = send!(
        app,
        token,
        test::TestRequest::post().uri("/api/invoices").set_json(invoice(client_id))
    );
    assert_eq!(resp.status(), StatusCode::CREATED);

    // unknown parent row
    let resp = send!(
        app,
        token,
        test::TestRequest::post().uri("/api/invoices").set_json(invoice(u64::MAX))
    );
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // parent still referenced by the invoice
    let resp = send!(
        app,
        token,
        test::TestRequest::delete().uri(&format!("/api/clients/{client_id}"))
    );
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
#[ignore = "needs a MySQL server in DATABASE_URL"]
async fn failed_import_chunk_keeps_earlier_chunks() {
    let config = Config::for_tests();
    let token = admin_token(&config);
    let pool = pool().await;
    let app = app!(pool.clone(), config);
    let run = tag();

    let mut csv = String::from("first_name,email,join_date\n");
    for i in 0..50 {
        csv.push_str(&format!("Worker{i},imp-{run}-{i}@example.com,2026-01-05\n"));
    }
    // second chunk repeats the first email
    csv.push_str(&format!("Late,imp-{run}-0@example.com,2026-01-05\n"));

    let resp = send!(
        app,
        token,
        test::TestRequest::post()
            .uri("/api/employees/import")
            .insert_header(("Content-Type", "text/csv"))
            .set_payload(csv)
    );
    assert_eq!(resp.status(), StatusCode::OK);
    let report: Value = test::read_body_json(resp).await;

    assert_eq!(report["total_rows"], 51);
    assert_eq!(report["inserted"], 50);
    assert_eq!(report["chunks"][0]["status"], "ok");
    assert_eq!(report["chunks"][1]["status"], "failed");
    assert_eq!(report["chunks"][1]["error"], "Conflict: Record already exists");

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees WHERE email LIKE ?")
        .bind(format!("imp-{run}-%"))
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, 50);
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

async fn mark(conn: &mut MySqlConnection, employee_id: u64, leave_type: LeaveType, d: u32) -> LeavePlan {
    apply_leave_day(conn, employee_id, leave_type, day(d)).await.unwrap()
}

#[actix_web::test]
#[ignore = "needs a MySQL server in DATABASE_URL"]
async fn leave_days_insert_extend_and_bridge() {
    let pool = pool().await;
    let employee_id = sqlx::query(
        "INSERT INTO employees (employee_code, first_name, join_date) VALUES (?, 'Leave', '2026-01-01')",
    )
    .bind(format!("LV-{}", &tag()[..16]))
    .execute(&pool)
    .await
    .unwrap()
    .last_insert_id();

    let mut conn = pool.acquire().await.unwrap();
    let conn = &mut *conn;

    assert_eq!(mark(conn, employee_id, LeaveType::Sick, 10).await, LeavePlan::Insert { day: day(10) });
    assert!(matches!(
        mark(conn, employee_id, LeaveType::Sick, 11).await,
        LeavePlan::ExtendPrevious { .. }
    ));
    assert_eq!(mark(conn, employee_id, LeaveType::Sick, 13).await, LeavePlan::Insert { day: day(13) });
    assert!(matches!(mark(conn, employee_id, LeaveType::Sick, 12).await, LeavePlan::Bridge { .. }));
    assert!(matches!(
        mark(conn, employee_id, LeaveType::Sick, 12).await,
        LeavePlan::AlreadyCovered { .. }
    ));
    // a different type never merges with the sick period next to it
    assert_eq!(
        mark(conn, employee_id, LeaveType::Annual, 14).await,
        LeavePlan::Insert { day: day(14) }
    );

    let periods: Vec<(String, NaiveDate, NaiveDate)> = sqlx::query_as(
        "SELECT leave_type, from_date, to_date FROM leave_periods WHERE employee_id = ? ORDER BY from_date",
    )
    .bind(employee_id)
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(
        periods,
        vec![
            ("sick".to_string(), day(10), day(13)),
            ("annual".to_string(), day(14), day(14)),
        ]
    );
}

#[actix_web::test]
#[ignore = "needs a MySQL server in DATABASE_URL"]
async fn pruning_drops_only_dead_refresh_tokens() {
    let pool = pool().await;
    let subject_id = Uuid::new_v4().as_u64_pair().0 >> 1;

    for (jti, revoked, expires) in [
        (tag(), true, "DATE_ADD(NOW(), INTERVAL 1 DAY)"),
        (tag(), false, "DATE_SUB(NOW(), INTERVAL 1 DAY)"),
        (tag(), false, "DATE_ADD(NOW(), INTERVAL 1 DAY)"),
    ] {
        sqlx::query(&format!(
            "INSERT INTO refresh_tokens (principal, subject_id, jti, expires_at, revoked) \
             VALUES ('user', ?, ?, {expires}, ?)"
        ))
        .bind(subject_id)
        .bind(jti)
        .bind(revoked)
        .execute(&pool)
        .await
        .unwrap();
    }

    let pruned = prune_refresh_tokens(&pool, PrincipalKind::User, subject_id)
        .await
        .unwrap();
    assert_eq!(pruned, 2);

    let live: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM refresh_tokens WHERE subject_id = ?")
        .bind(subject_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(live, 1);
}
