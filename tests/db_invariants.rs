//! Storage-backed behavior that only a real MySQL server can show: the
//! open-shift index, conditional updates and single-use secrets.
//!
//! Run with `DATABASE_URL=mysql://... cargo test -- --ignored`.

use actix_web::{App, http::StatusCode, test, web::Data};
use attendance::{
    api::is_duplicate_key,
    auth::{
        jwt::{TokenSubject, generate_access_token},
        password::hash_password,
        recovery::hash_secret,
    },
    config::Config,
    db::{init_db, run_migrations},
    model::role::Role,
    routes,
};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use uuid::Uuid;

const SECRET: &str = "integration-secret";
const PASSWORD: &str = "correct horse battery";

fn config() -> Config {
    Config::from_lookup(|key| match key {
        "SERVER_ADDR" => Some("127.0.0.1:8080".to_string()),
        "JWT_SECRET" => Some(SECRET.to_string()),
        "DATABASE_URL" => std::env::var("DATABASE_URL").ok(),
        _ => None,
    })
    .expect("DATABASE_URL must be set")
}

async fn pool(config: &Config) -> MySqlPool {
    let pool = init_db(&config.database_url).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

struct Account {
    id: u64,
    email: String,
}

async fn create_account(pool: &MySqlPool) -> Account {
    let email = format!("{}@example.com", Uuid::new_v4().to_simple());
    let id = sqlx::query("INSERT INTO users (email, name, password, role) VALUES (?, ?, ?, 'employee')")
        .bind(&email)
        .bind("Meera")
        .bind(hash_password(PASSWORD).unwrap())
        .execute(pool)
        .await
        .unwrap()
        .last_insert_id();
    Account { id, email }
}

fn access_token(account: &Account, role: Role) -> String {
    let subject = TokenSubject {
        user_id: account.id,
        email: account.email.clone(),
        name: "Meera".to_string(),
        role,
    };
    generate_access_token(&subject, SECRET, 900).unwrap()
}

macro_rules! app {
    ($pool:expr, $config:expr) => {{
        let routes_config = $config.clone();
        test::init_service(
            App::new()
                .app_data(Data::new($pool.clone()))
                .app_data(Data::new($config.clone()))
                .configure(move |cfg| routes::configure(cfg, routes_config.clone())),
        )
        .await
    }};
}

fn from_peer(req: test::TestRequest) -> test::TestRequest {
    req.peer_addr("127.0.0.1:12345".parse().unwrap())
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

fn check_in_body() -> Value {
    json!({"latitude": 23.02, "longitude": 72.57, "work_location": "ghcl"})
}

#[actix_web::test]
#[ignore = "needs a MySQL database (DATABASE_URL)"]
async fn second_check_in_is_rejected() {
    let config = config();
    let pool = pool(&config).await;
    let account = create_account(&pool).await;
    let token = access_token(&account, Role::Employee);
    let app = app!(pool, config);

    let check_in = || {
        from_peer(test::TestRequest::post())
            .uri("/api/attendance/check-in")
            .insert_header(bearer(&token))
            .set_json(check_in_body())
            .to_request()
    };

    let resp = test::call_service(&app, check_in()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    // stored in canonical form
    assert_eq!(body["data"]["work_location"], "GHCL");

    let resp = test::call_service(&app, check_in()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Already checked in");

    let open: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM attendance WHERE user_id = ? AND check_out_at IS NULL",
    )
    .bind(account.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(open, 1);
}

#[actix_web::test]
#[ignore = "needs a MySQL database (DATABASE_URL)"]
async fn open_shift_index_reports_duplicates_only() {
    let config = config();
    let pool = pool(&config).await;
    let account = create_account(&pool).await;

    let insert = |user_id: u64| {
        sqlx::query(
            r#"
            INSERT INTO attendance
                (user_id, user_name, date, check_in_at, latitude_in, longitude_in, work_location)
            VALUES (?, 'Meera', ?, ?, 23.0, 72.5, 'GHCL')
            "#,
        )
        .bind(user_id)
        .bind(Utc::now().date_naive())
        .bind(Utc::now())
    };

    insert(account.id).execute(&pool).await.unwrap();

    let second = insert(account.id).execute(&pool).await.unwrap_err();
    assert!(is_duplicate_key(&second), "{second}");

    // foreign-key failures share SQLSTATE 23000 but are not duplicates
    let orphan = insert(u64::MAX - 1).execute(&pool).await.unwrap_err();
    assert!(!is_duplicate_key(&orphan), "{orphan}");
}

#[actix_web::test]
#[ignore = "needs a MySQL database (DATABASE_URL)"]
async fn check_out_closes_the_open_shift_once() {
    let config = config();
    let pool = pool(&config).await;
    let account = create_account(&pool).await;
    let token = access_token(&account, Role::Employee);
    let app = app!(pool, config);

    let check_out = || {
        from_peer(test::TestRequest::post())
            .uri("/api/attendance/check-out")
            .insert_header(bearer(&token))
            .set_json(json!({"latitude": 23.03, "longitude": 72.58}))
            .to_request()
    };

    let resp = test::call_service(&app, check_out()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "No active check-in found");

    let resp = test::call_service(
        &app,
        from_peer(test::TestRequest::post())
            .uri("/api/attendance/check-in")
            .insert_header(bearer(&token))
            .set_json(check_in_body())
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = test::call_service(&app, check_out()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert!(!body["data"]["check_out_at"].is_null());

    let resp = test::call_service(&app, check_out()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        from_peer(test::TestRequest::get())
            .uri("/api/attendance/latest?limit=1")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
}

#[actix_web::test]
#[ignore = "needs a MySQL database (DATABASE_URL)"]
async fn corrections_check_order_and_existence() {
    let config = config();
    let pool = pool(&config).await;
    let account = create_account(&pool).await;
    let token = access_token(&account, Role::Employee);
    let admin = access_token(&account, Role::Admin);
    let app = app!(pool, config);

    let resp = test::call_service(
        &app,
        from_peer(test::TestRequest::post())
            .uri("/api/attendance/check-in")
            .insert_header(bearer(&token))
            .set_json(check_in_body())
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    let id = body["data"]["id"].as_u64().unwrap();

    let patch = |id: u64, value: String| {
        from_peer(test::TestRequest::patch())
            .uri(&format!("/api/admin/attendance/{id}"))
            .insert_header(bearer(&admin))
            .set_json(json!({"field": "check_out", "value": value}))
            .to_request()
    };

    let before_check_in = (Utc::now() - Duration::hours(2)).to_rfc3339();
    let resp = test::call_service(&app, patch(id, before_check_in)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(&app, patch(u64::MAX - 1, Utc::now().to_rfc3339())).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let later = (Utc::now() + Duration::hours(1)).to_rfc3339();
    let resp = test::call_service(&app, patch(id, later)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert!(!body["data"]["check_out_at"].is_null());
}

#[actix_web::test]
#[ignore = "needs a MySQL database (DATABASE_URL)"]
async fn recovery_secret_works_once() {
    let config = config();
    let pool = pool(&config).await;
    let account = create_account(&pool).await;
    let app = app!(pool, config);

    let secret = Uuid::new_v4().to_simple().to_string();
    sqlx::query("INSERT INTO password_recoveries (user_id, secret_hash, expires_at) VALUES (?, ?, ?)")
        .bind(account.id)
        .bind(hash_secret(&secret))
        .bind(Utc::now() + Duration::hours(1))
        .execute(&pool)
        .await
        .unwrap();

    let reset = |password: &str| {
        from_peer(test::TestRequest::post())
            .uri("/auth/reset-password")
            .set_json(json!({
                "user_id": account.id,
                "secret": secret,
                "password": password,
                "password_again": password
            }))
            .to_request()
    };

    let resp = test::call_service(&app, reset("first new password")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(&app, reset("second new password")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Invalid or expired recovery link.");

    // the first reset's password is the one that stuck
    let resp = test::call_service(
        &app,
        from_peer(test::TestRequest::post())
            .uri("/auth/login")
            .set_json(json!({"email": account.email, "password": "first new password"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
#[ignore = "needs a MySQL database (DATABASE_URL)"]
async fn new_recovery_request_retires_earlier_secrets() {
    let config = config();
    let pool = pool(&config).await;
    let account = create_account(&pool).await;
    let app = app!(pool, config);

    for _ in 0..2 {
        let resp = test::call_service(
            &app,
            from_peer(test::TestRequest::post())
                .uri("/auth/forgot-password")
                .set_json(json!({"email": account.email}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }

    let (issued, live): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), CAST(COALESCE(SUM(used_at IS NULL), 0) AS SIGNED)
        FROM password_recoveries
        WHERE user_id = ?
        "#,
    )
    .bind(account.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!((issued, live), (2, 1));
}

#[actix_web::test]
#[ignore = "needs a MySQL database (DATABASE_URL)"]
async fn refresh_token_rotates_exactly_once() {
    let config = config();
    let pool = pool(&config).await;
    let account = create_account(&pool).await;
    let app = app!(pool, config);

    let resp = test::call_service(
        &app,
        from_peer(test::TestRequest::post())
            .uri("/auth/login")
            .set_json(json!({"email": account.email, "password": PASSWORD}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let refresh = body["refresh_token"].as_str().unwrap().to_string();

    let rotate = |token: &str| {
        from_peer(test::TestRequest::post())
            .uri("/auth/refresh")
            .insert_header(bearer(token))
            .to_request()
    };

    let (first, second) = futures::join!(
        test::call_service(&app, rotate(&refresh)),
        test::call_service(&app, rotate(&refresh))
    );
    let mut statuses = [first.status(), second.status()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::UNAUTHORIZED]);

    let resp = test::call_service(&app, rotate(&refresh)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
