use crate::api::MonthQuery;
use crate::api::admin::{DailyLogQuery, DailyLogResponse, DailyLogRow, TimeField, UpdateTimeReq};
use crate::api::attendance::{CheckInReq, CheckOutReq, LatestEntry, SheetResponse};
use crate::api::register::RegisterResponse;
use crate::model::attendance::{AttendanceRecord, GeoPoint};
use crate::model::role::Role;
use crate::model::user::UserProfile;
use crate::models::{
    CreateUserReq, ForgotPasswordReq, LoginReqDto, LoginResponse, MessageResponse,
    ResetPasswordReq, TokenPair,
};
use crate::report::register::{DayStatus, UserMonthly};
use crate::report::shift::ShiftKind;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance API",
        version = "1.0.0",
        description = r#"
## Geo-tagged Attendance

Employees check in and out from a browser, which reports the device location
and the work site. Administrators review the daily log, correct timestamps,
and export the monthly register.

### 🔹 Key Features
- **Attendance**
  - Check-in / check-out with coordinates, current shift, monthly calendar
- **Register**
  - Users × days grid per month, filtered by work location, PDF export
- **Daily log**
  - Paginated shift log with day/night classification and map links
- **Accounts**
  - JWT login with refresh rotation, password recovery, admin provisioning

### 🔐 Security
Endpoints under the API prefix need a **JWT Bearer** access token.
`/admin/*` requires the **admin** role.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,
        crate::auth::recovery::forgot_password,
        crate::auth::recovery::reset_password,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::current_shift,
        crate::api::attendance::latest,
        crate::api::attendance::monthly_sheet,

        crate::api::admin::daily_log,
        crate::api::admin::update_time,
        crate::api::register::monthly_register,
        crate::api::register::register_pdf,
        crate::api::register::monthly_export,
        crate::api::register::monthly_export_pdf,
        crate::api::users::create_user
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            TokenPair,
            ForgotPasswordReq,
            ResetPasswordReq,
            CreateUserReq,
            MessageResponse,
            UserProfile,
            Role,
            AttendanceRecord,
            GeoPoint,
            CheckInReq,
            CheckOutReq,
            LatestEntry,
            SheetResponse,
            MonthQuery,
            DailyLogQuery,
            DailyLogRow,
            DailyLogResponse,
            TimeField,
            UpdateTimeReq,
            ShiftKind,
            DayStatus,
            UserMonthly,
            RegisterResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, tokens and password recovery"),
        (name = "Attendance", description = "Employee check-in/check-out APIs"),
        (name = "Admin", description = "Daily log, register, exports and accounts"),
    )
)]
pub struct ApiDoc;

/// The document with `/api/...` paths moved under the configured prefix.
pub fn api_doc(api_prefix: &str) -> openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    let paths = std::mem::take(&mut doc.paths.paths);
    doc.paths.paths = paths
        .into_iter()
        .map(|(path, item)| match path.strip_prefix("/api") {
            Some(rest) if rest.starts_with('/') => (format!("{api_prefix}{rest}"), item),
            _ => (path, item),
        })
        .collect();
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_bearer_auth_and_admin_paths() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(doc.paths.paths.contains_key("/api/admin/register"));
        assert!(doc.paths.paths.contains_key("/auth/login"));
    }

    #[test]
    fn api_paths_follow_the_configured_prefix() {
        let doc = api_doc("/v2");
        assert!(doc.paths.paths.contains_key("/v2/admin/register"));
        assert!(doc.paths.paths.contains_key("/v2/attendance/check-in"));
        assert!(!doc.paths.paths.keys().any(|p| p.starts_with("/api/")));
        assert!(doc.paths.paths.contains_key("/auth/login"));

        assert_eq!(api_doc("/api").paths.paths.len(), ApiDoc::openapi().paths.paths.len());
    }
}
