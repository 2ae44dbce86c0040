//! Password recovery: a single-use secret is issued for an account and
//! exchanged, together with a new password, for a password change.

use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::{Duration, Utc};
use serde_json::json;
use sha2::{Digest, Sha256};
use sqlx::MySqlPool;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::password::{MIN_PASSWORD_LEN, hash_password},
    config::Config,
    model::user::User,
    models::{ForgotPasswordReq, MessageResponse, ResetPasswordReq},
};

/// Checks a reset request before any storage is touched.
pub fn validate_reset(req: &ResetPasswordReq) -> Result<(), &'static str> {
    if req.secret.trim().is_empty() {
        return Err("Invalid or missing recovery tokens.");
    }
    if req.password != req.password_again {
        return Err("Passwords do not match.");
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err("Password must be at least 8 characters.");
    }
    Ok(())
}

/// Hex SHA-256 of a recovery secret; rows are looked up by this value.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn reset_link(app_url: &str, user_id: u64, secret: &str) -> String {
    format!("{app_url}/reset-password?userId={user_id}&secret={secret}")
}

#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordReq,
    responses(
        (status = 202, description = "Recovery link issued if the account exists", body = MessageResponse),
        (status = 400, description = "Email missing")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_forgot_password", skip(pool, config, body))]
pub async fn forgot_password(
    body: web::Json<ForgotPasswordReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    if body.email.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({"error": "Email is required"})));
    }

    // same answer whether or not the account exists
    let accepted = HttpResponse::Accepted().json(MessageResponse {
        message: "If the account exists, a recovery link has been sent.".to_string(),
    });

    let user = User::find_by_email(pool.get_ref(), &body.email)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to look up account for recovery");
            ErrorInternalServerError("Internal Server Error")
        })?;

    let Some(user) = user else {
        info!("Recovery requested for unknown account");
        return Ok(accepted);
    };

    let secret = Uuid::new_v4().to_string().replace('-', "");
    let expires_at = Utc::now() + Duration::seconds(config.recovery_token_ttl);

    let mut tx = pool.begin().await.map_err(|e| {
        error!(error = %e, "Failed to open transaction");
        ErrorInternalServerError("Internal Server Error")
    })?;

    // a new link replaces any earlier one
    sqlx::query("UPDATE password_recoveries SET used_at = NOW() WHERE user_id = ? AND used_at IS NULL")
        .bind(user.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = user.id, "Failed to retire earlier recovery secrets");
            ErrorInternalServerError("Internal Server Error")
        })?;

    sqlx::query(
        r#"
        INSERT INTO password_recoveries (user_id, secret_hash, expires_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(user.id)
    .bind(hash_secret(&secret))
    .bind(expires_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        error!(error = %e, user_id = user.id, "Failed to store recovery secret");
        ErrorInternalServerError("Internal Server Error")
    })?;

    tx.commit().await.map_err(|e| {
        error!(error = %e, "Failed to commit recovery secret");
        ErrorInternalServerError("Internal Server Error")
    })?;

    // mail delivery is handled outside this service; the link goes to the log
    info!(
        user_id = user.id,
        link = %reset_link(&config.app_url, user.id, &secret),
        "Password recovery link issued"
    );

    Ok(accepted)
}

#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordReq,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid input or recovery link")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_reset_password", skip(pool, body), fields(user_id = body.user_id))]
pub async fn reset_password(
    body: web::Json<ResetPasswordReq>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    if let Err(message) = validate_reset(&body) {
        return Ok(HttpResponse::BadRequest().json(json!({"error": message})));
    }

    let new_hash = hash_password(&body.password).map_err(|e| {
        error!(error = %e, "Failed to hash new password");
        ErrorInternalServerError("Internal Server Error")
    })?;

    let mut tx = pool.begin().await.map_err(|e| {
        error!(error = %e, "Failed to open transaction");
        ErrorInternalServerError("Internal Server Error")
    })?;

    // consuming the secret is the check: a second request matches no row
    let consumed = sqlx::query(
        r#"
        UPDATE password_recoveries
        SET used_at = NOW()
        WHERE secret_hash = ? AND user_id = ? AND used_at IS NULL AND expires_at > ?
        "#,
    )
    .bind(hash_secret(&body.secret))
    .bind(body.user_id)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to consume recovery secret");
        ErrorInternalServerError("Internal Server Error")
    })?;

    if consumed.rows_affected() != 1 {
        warn!("Invalid or expired recovery secret");
        return Ok(HttpResponse::BadRequest().json(json!({
            "error": "Invalid or expired recovery link."
        })));
    }

    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&new_hash)
        .bind(body.user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to update password");
            ErrorInternalServerError("Internal Server Error")
        })?;

    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = ?")
        .bind(body.user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to revoke sessions after reset");
            ErrorInternalServerError("Internal Server Error")
        })?;

    tx.commit().await.map_err(|e| {
        error!(error = %e, "Failed to commit password reset");
        ErrorInternalServerError("Internal Server Error")
    })?;

    info!("Password reset completed");

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Password updated. You can now log in.".to_string(),
    }))
}
