//! Monthly register and export endpoints for administrators.

use actix_web::{
    HttpResponse, Responder,
    error::ErrorInternalServerError,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    web,
};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

use crate::api::MonthQuery;
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::model::attendance::AttendanceRecord;
use crate::report::register::{
    ALL_LOCATIONS, UserMonthly, build_register, filter_by_location, grand_total, unique_locations,
};
use crate::report::shift::ShiftWindow;
use crate::report::{pdf, table};
use crate::utils::month::Month;

/// Upper bound on rows read for one month across all users.
pub const MONTH_ROW_LIMIT: u32 = 5000;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RegisterQuery {
    /// Month number, 1-12
    pub month: u32,
    pub year: i32,
    /// Work location, or `All` (default)
    pub location: Option<String>,
}

impl RegisterQuery {
    fn month_query(&self) -> MonthQuery {
        MonthQuery {
            month: self.month,
            year: self.year,
        }
    }

    fn location(&self) -> &str {
        match self.location.as_deref().map(str::trim) {
            Some(loc) if !loc.is_empty() => loc,
            _ => ALL_LOCATIONS,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub month: u32,
    pub year: i32,
    pub days_in_month: u32,
    pub location: String,
    /// Every location seen this month, plus `All`
    pub locations: Vec<String>,
    pub grand_total: u32,
    pub users: Vec<UserMonthly>,
}

/// Builds the register view for `location` from a month of rows.
pub fn register_view(
    records: &[AttendanceRecord],
    month: Month,
    location: &str,
    config: &Config,
) -> RegisterResponse {
    let all = build_register(records, month, config.utc_offset);
    let users = filter_by_location(&all, location);

    RegisterResponse {
        month: month.month(),
        year: month.year(),
        days_in_month: month.days_in_month(),
        location: location.to_string(),
        locations: unique_locations(&all),
        grand_total: grand_total(&users),
        users,
    }
}

async fn month_rows(
    pool: &MySqlPool,
    month: Month,
    config: &Config,
) -> actix_web::Result<Vec<AttendanceRecord>> {
    let (start, end) = month.utc_bounds(config.utc_offset);
    AttendanceRecord::in_range(pool, start, end, None, MONTH_ROW_LIMIT)
        .await
        .map_err(|e| {
            error!(error = %e, month = month.month(), year = month.year(), "Failed to load month");
            ErrorInternalServerError("Database error")
        })
}

fn pdf_response(bytes: Vec<u8>, file_name: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(file_name)],
        })
        .body(bytes)
}

fn render_pdf(t: &table::Table) -> actix_web::Result<Vec<u8>> {
    pdf::render(t).map_err(|e| {
        error!(error = %e, title = %t.title, "PDF rendering failed");
        ErrorInternalServerError("Failed to generate PDF")
    })
}

/// Users × days grid for one month.
#[utoipa::path(
    get,
    path = "/api/admin/register",
    params(RegisterQuery),
    responses(
        (status = 200, description = "Monthly register", body = RegisterResponse),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn monthly_register(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<RegisterQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let month = match query.month_query().resolve() {
        Ok(m) => m,
        Err(resp) => return Ok(resp),
    };

    let rows = month_rows(pool.get_ref(), month, &config).await?;
    Ok(HttpResponse::Ok().json(register_view(&rows, month, query.location(), &config)))
}

/// The register as a landscape PDF.
#[utoipa::path(
    get,
    path = "/api/admin/register/pdf",
    params(RegisterQuery),
    responses(
        (status = 200, description = "application/pdf attachment"),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn register_pdf(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<RegisterQuery>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;
    let month = match query.month_query().resolve() {
        Ok(m) => m,
        Err(resp) => return Ok(resp),
    };
    let location = query.location();

    let rows = month_rows(pool.get_ref(), month, &config).await?;
    let view = register_view(&rows, month, location, &config);

    let bytes = render_pdf(&table::register_table(&view.users, month, location))?;
    info!(admin = auth.user_id, location, bytes = bytes.len(), "Register PDF generated");

    Ok(pdf_response(bytes, table::register_file_name(location, month)))
}

/// Every shift of the month, oldest first.
#[utoipa::path(
    get,
    path = "/api/admin/export",
    params(MonthQuery),
    responses(
        (status = 200, description = "Rows for the month", body = [AttendanceRecord]),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn monthly_export(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<MonthQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let month = match query.resolve() {
        Ok(m) => m,
        Err(resp) => return Ok(resp),
    };

    let rows = month_rows(pool.get_ref(), month, &config).await?;
    Ok(HttpResponse::Ok().json(rows))
}

/// The month's shifts as a daily-log PDF.
#[utoipa::path(
    get,
    path = "/api/admin/export/pdf",
    params(MonthQuery),
    responses(
        (status = 200, description = "application/pdf attachment"),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn monthly_export_pdf(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<MonthQuery>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;
    let month = match query.resolve() {
        Ok(m) => m,
        Err(resp) => return Ok(resp),
    };

    let rows = month_rows(pool.get_ref(), month, &config).await?;
    let window = ShiftWindow::from_config(&config);

    let bytes = render_pdf(&table::log_table(&rows, month, &window))?;
    info!(admin = auth.user_id, rows = rows.len(), "Attendance log PDF generated");

    Ok(pdf_response(bytes, table::log_file_name(month)))
}
