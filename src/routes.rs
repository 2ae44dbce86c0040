use crate::{
    api::{admin, attendance, register, users},
    auth::{handlers, middleware::auth_middleware, recovery},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{HttpResponse, Responder, get, middleware::from_fn, web};
use std::sync::Arc;

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        // both values are non-zero, which is all the builder checks
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let recovery_limiter = Arc::new(build_limiter(config.rate_recovery_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            )
            .service(
                web::resource("/forgot-password")
                    .wrap(recovery_limiter.clone())
                    .route(web::post().to(recovery::forgot_password)),
            )
            .service(
                web::resource("/reset-password")
                    .wrap(recovery_limiter.clone())
                    .route(web::post().to(recovery::reset_password)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .route("/me", web::get().to(handlers::me))
            .service(
                web::scope("/attendance")
                    .route("/check-in", web::post().to(attendance::check_in))
                    .route("/check-out", web::post().to(attendance::check_out))
                    .route("/current", web::get().to(attendance::current_shift))
                    .route("/latest", web::get().to(attendance::latest))
                    .route("/sheet", web::get().to(attendance::monthly_sheet)),
            )
            .service(
                web::scope("/admin")
                    // /admin/attendance
                    .service(web::resource("/attendance").route(web::get().to(admin::daily_log)))
                    // /admin/attendance/{id}
                    .service(
                        web::resource("/attendance/{id}")
                            .route(web::patch().to(admin::update_time)),
                    )
                    .service(
                        web::resource("/register")
                            .route(web::get().to(register::monthly_register)),
                    )
                    .service(
                        web::resource("/register/pdf").route(web::get().to(register::register_pdf)),
                    )
                    .service(
                        web::resource("/export").route(web::get().to(register::monthly_export)),
                    )
                    .service(
                        web::resource("/export/pdf")
                            .route(web::get().to(register::monthly_export_pdf)),
                    )
                    .service(web::resource("/users").route(web::post().to(users::create_user))),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (30 days, jti stored)
//
// API CALL
//  └─ Authorization: Bearer access_token
//
// REFRESH
//  └─ old jti revoked, new pair issued
//
// RESET PASSWORD
//  └─ every refresh token of the account revoked
