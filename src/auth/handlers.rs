use crate::{
    auth::{
        auth::{AuthUser, bearer_token},
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::verify_password,
    },
    config::Config,
    model::user::User,
    models::{LoginReqDto, LoginResponse, TokenPair, TokenType},
};
use actix_web::{HttpRequest, HttpResponse, Responder, error::ErrorInternalServerError, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument, warn};

/// Issues an access/refresh pair and records the refresh `jti`.
pub(crate) async fn issue_token_pair(
    subject: &TokenSubject,
    pool: &MySqlPool,
    config: &Config,
) -> actix_web::Result<TokenPair> {
    let access_token =
        generate_access_token(subject, &config.jwt_secret, config.access_token_ttl).map_err(|e| {
            error!(error = %e, "Failed to sign access token");
            ErrorInternalServerError("Internal Server Error")
        })?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl).map_err(
            |e| {
                error!(error = %e, "Failed to sign refresh token");
                ErrorInternalServerError("Internal Server Error")
            },
        )?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to store refresh token");
        ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(email = %user.email)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    info!("Login request received");

    if user.email.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty email or password");
        return Ok(HttpResponse::BadRequest().json(json!({
            "error": "Email and password are required"
        })));
    }

    let db_user = match User::find_by_email(pool.get_ref(), &user.email).await {
        Ok(Some(u)) => {
            debug!(user_id = u.id, "User found");
            u
        }
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return Ok(HttpResponse::Unauthorized().json(json!({"error": "Invalid credentials"})));
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return Err(ErrorInternalServerError("Internal Server Error"));
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Ok(HttpResponse::Unauthorized().json(json!({"error": "Invalid credentials"})));
    }

    let role = db_user.role();
    let subject = TokenSubject {
        user_id: db_user.id,
        email: db_user.email.clone(),
        name: db_user.name.clone(),
        role,
    };
    let pair = issue_token_pair(&subject, pool.get_ref(), &config).await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // not fatal for the login itself
        error!(error = %e, "Failed to update last_login_at");
    }

    info!("Login successful");

    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        role,
        name: db_user.name,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Missing, invalid or revoked refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let Some(token) = bearer_token(&req) else {
        return Ok(HttpResponse::Unauthorized().json(json!({"error": "Missing token"})));
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return Ok(HttpResponse::Unauthorized().finish()),
    };

    let record = sqlx::query_as::<_, (u64, u64)>(
        r#"
        SELECT id, user_id
        FROM refresh_tokens
        WHERE jti = ? AND revoked = FALSE AND expires_at > NOW()
        "#,
    )
    .bind(&claims.jti)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to look up refresh token");
        ErrorInternalServerError("Internal Server Error")
    })?;

    let Some((record_id, user_id)) = record else {
        return Ok(HttpResponse::Unauthorized().finish());
    };

    // only the request that flips `revoked` may rotate the token
    let revoked = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ? AND revoked = FALSE")
        .bind(record_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to revoke refresh token");
            ErrorInternalServerError("Internal Server Error")
        })?;

    if revoked.rows_affected() != 1 {
        warn!(user_id, "Refresh token already rotated");
        return Ok(HttpResponse::Unauthorized().finish());
    }

    // role or name may have changed since the last token was issued
    let user = User::find_by_id(pool.get_ref(), user_id).await.map_err(|e| {
        error!(error = %e, user_id, "Failed to load user for refresh");
        ErrorInternalServerError("Internal Server Error")
    })?;
    let Some(user) = user else {
        return Ok(HttpResponse::Unauthorized().finish());
    };

    let subject = TokenSubject {
        user_id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role(),
    };
    let pair = issue_token_pair(&subject, pool.get_ref(), &config).await?;

    Ok(HttpResponse::Ok().json(pair))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Refresh token revoked (idempotent)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer_token(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::NoContent().finish(),
    };

    // only refresh tokens end a session
    if claims.token_type != TokenType::Refresh {
        return HttpResponse::NoContent().finish();
    }

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Current account", body = UserProfile),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Account no longer exists", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let user = User::find_by_id(pool.get_ref(), auth.user_id)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = auth.user_id, "Failed to load profile");
            ErrorInternalServerError("Internal Server Error")
        })?;

    match user {
        Some(u) => Ok(HttpResponse::Ok().json(u.profile())),
        None => Ok(HttpResponse::NotFound().json(json!({"message": "Account not found"}))),
    }
}
