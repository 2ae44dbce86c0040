use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info, instrument};

use crate::api::is_duplicate_key;
use crate::auth::auth::AuthUser;
use crate::auth::password::{MIN_PASSWORD_LEN, hash_password};
use crate::model::user::{User, normalize_email};
use crate::models::CreateUserReq;
use crate::utils::{email_cache, email_filter};

/// true  => email AVAILABLE
/// false => email TAKEN
pub async fn is_email_available(email: &str, pool: &MySqlPool) -> bool {
    let email = normalize_email(email);

    // cuckoo filter: a miss is definitive
    if !email_filter::might_exist(&email) {
        return true;
    }

    // moka cache: a hit is definitive
    if email_cache::is_taken(&email).await {
        return false;
    }

    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? LIMIT 1)",
    )
    .bind(&email)
    .fetch_one(pool)
    .await
    .map(|found| found != 0)
    .unwrap_or(true); // fail-safe

    if exists {
        email_cache::mark_taken(&email).await;
    }

    !exists
}

pub fn validate_new_user(req: &CreateUserReq) -> Result<(), &'static str> {
    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err("A valid email is required");
    }
    if req.name.trim().is_empty() {
        return Err("Name is required");
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err("Password must be at least 8 characters.");
    }
    Ok(())
}

/// Provisions an account.
#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = CreateUserReq,
    responses(
        (status = 201, description = "Account created", body = UserProfile),
        (status = 400, description = "Invalid input", body = MessageResponse),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Email already registered", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
#[instrument(name = "create_user", skip(pool, body, auth), fields(admin = auth.user_id))]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<CreateUserReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    if let Err(message) = validate_new_user(&body) {
        return Ok(HttpResponse::BadRequest().json(json!({"message": message})));
    }

    let conflict = || HttpResponse::Conflict().json(json!({"message": "Email already registered"}));

    let email = normalize_email(&body.email);
    if !is_email_available(&email, pool.get_ref()).await {
        return Ok(conflict());
    }

    let password_hash = hash_password(&body.password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        ErrorInternalServerError("Internal Server Error")
    })?;

    let phone = body
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, name, phone, password, role)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&email)
    .bind(body.name.trim())
    .bind(phone)
    .bind(&password_hash)
    .bind(body.role.as_ref())
    .execute(pool.get_ref())
    .await;

    let user_id = match result {
        Ok(r) => r.last_insert_id(),
        // lost a race with another insert
        Err(e) if is_duplicate_key(&e) => {
            email_cache::mark_taken(&email).await;
            email_filter::insert(&email);
            return Ok(conflict());
        }
        Err(e) => {
            error!(error = %e, "Failed to insert user");
            return Err(ErrorInternalServerError("Internal Server Error"));
        }
    };

    email_filter::insert(&email);
    email_cache::mark_taken(&email).await;

    info!(user_id, role = %body.role, "Account created");

    let user = User::find_by_id(pool.get_ref(), user_id).await.map_err(|e| {
        error!(error = %e, user_id, "Failed to reload new account");
        ErrorInternalServerError("Internal Server Error")
    })?;

    match user {
        Some(u) => Ok(HttpResponse::Created().json(u.profile())),
        None => Err(ErrorInternalServerError("Internal Server Error")),
    }
}
