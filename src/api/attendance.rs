use std::collections::BTreeMap;

use crate::api::{MonthQuery, is_duplicate_key};
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::model::attendance::{AttendanceRecord, GeoPoint};
use crate::model::user::User;
use crate::report::register::shifts_per_day;
use crate::utils::month::local_date;
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

/// Upper bound on rows read for one employee's month.
const SHEET_ROW_LIMIT: u32 = 500;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckInReq {
    #[schema(example = 23.0225)]
    pub latitude: f64,
    #[schema(example = 72.5714)]
    pub longitude: f64,
    #[schema(example = "GHCL")]
    pub work_location: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckOutReq {
    #[schema(example = 23.0225)]
    pub latitude: f64,
    #[schema(example = 72.5714)]
    pub longitude: f64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LatestQuery {
    /// Number of records, 1-10 (default 2)
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LatestEntry {
    pub id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = String, format = "date-time")]
    pub check_in_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "date-time", nullable = true)]
    pub check_out_at: Option<DateTime<Utc>>,
    pub location: String,
    pub checked_out: bool,
}

impl From<AttendanceRecord> for LatestEntry {
    fn from(r: AttendanceRecord) -> Self {
        Self {
            id: r.id,
            date: r.date,
            check_in_at: r.check_in_at,
            checked_out: r.check_out_at.is_some(),
            check_out_at: r.check_out_at,
            location: r.work_location,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SheetResponse {
    pub month: u32,
    pub year: i32,
    pub days_in_month: u32,
    /// Day of month → number of shifts started that day
    pub data: BTreeMap<u32, u32>,
}

fn db_error(e: sqlx::Error, context: &'static str, user_id: u64) -> actix_web::Error {
    error!(error = %e, user_id, "{context}");
    ErrorInternalServerError("Internal Server Error")
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body = CheckInReq,
    responses(
        (status = 201, description = "Checked in successfully", body = AttendanceRecord),
        (status = 400, description = "Invalid location/coordinates or already checked in", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CheckInReq>,
) -> actix_web::Result<impl Responder> {
    let point = GeoPoint {
        latitude: payload.latitude,
        longitude: payload.longitude,
    };
    if !point.is_valid() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Invalid coordinates"
        })));
    }

    let Some(work_location) = config.resolve_work_location(&payload.work_location) else {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Unknown work location",
            "allowed": config.work_locations,
        })));
    };

    // best effort; the unique open-shift index catches the race
    let open = AttendanceRecord::find_open(pool.get_ref(), auth.user_id)
        .await
        .map_err(|e| db_error(e, "Open shift lookup failed", auth.user_id))?;
    if open.is_some() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Already checked in"
        })));
    }

    let user = User::find_by_id(pool.get_ref(), auth.user_id)
        .await
        .map_err(|e| db_error(e, "User lookup failed", auth.user_id))?
        .ok_or_else(|| actix_web::error::ErrorUnauthorized("Account not found"))?;

    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO attendance
            (user_id, user_name, phone_number, date, check_in_at,
             latitude_in, longitude_in, work_location)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id)
    .bind(&user.name)
    .bind(&user.phone)
    .bind(local_date(now, config.utc_offset))
    .bind(now)
    .bind(point.latitude)
    .bind(point.longitude)
    .bind(work_location)
    .execute(pool.get_ref())
    .await;

    let inserted = match result {
        Ok(r) => r.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "Already checked in"
            })));
        }
        Err(e) => return Err(db_error(e, "Check-in failed", auth.user_id)),
    };

    info!(user_id = auth.user_id, attendance_id = inserted, work_location, "Checked in");

    let record = AttendanceRecord::find_by_id(pool.get_ref(), inserted)
        .await
        .map_err(|e| db_error(e, "Reading new shift failed", auth.user_id))?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Checked in successfully",
        "data": record
    })))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body = CheckOutReq,
    responses(
        (status = 200, description = "Checked out successfully", body = AttendanceRecord),
        (status = 400, description = "Invalid coordinates or no active check-in found", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CheckOutReq>,
) -> actix_web::Result<impl Responder> {
    let point = GeoPoint {
        latitude: payload.latitude,
        longitude: payload.longitude,
    };
    if !point.is_valid() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Invalid coordinates"
        })));
    }

    let no_active = || {
        HttpResponse::BadRequest().json(json!({
            "message": "No active check-in found"
        }))
    };

    let Some(open) = AttendanceRecord::find_open(pool.get_ref(), auth.user_id)
        .await
        .map_err(|e| db_error(e, "Open shift lookup failed", auth.user_id))?
    else {
        return Ok(no_active());
    };

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out_at = ?, latitude_out = ?, longitude_out = ?
        WHERE id = ? AND check_out_at IS NULL
        "#,
    )
    .bind(Utc::now())
    .bind(point.latitude)
    .bind(point.longitude)
    .bind(open.id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Check-out failed", auth.user_id))?;

    // closed concurrently
    if result.rows_affected() == 0 {
        return Ok(no_active());
    }

    info!(user_id = auth.user_id, attendance_id = open.id, "Checked out");

    let record = AttendanceRecord::find_by_id(pool.get_ref(), open.id)
        .await
        .map_err(|e| db_error(e, "Reading closed shift failed", auth.user_id))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked out successfully",
        "data": record
    })))
}

/// The caller's open shift, or null.
#[utoipa::path(
    get,
    path = "/api/attendance/current",
    responses(
        (status = 200, description = "Open shift, or null when not working", body = AttendanceRecord),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn current_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let open = AttendanceRecord::find_open(pool.get_ref(), auth.user_id)
        .await
        .map_err(|e| db_error(e, "Open shift lookup failed", auth.user_id))?;

    Ok(HttpResponse::Ok().json(open))
}

/// The caller's most recent shifts.
#[utoipa::path(
    get,
    path = "/api/attendance/latest",
    params(LatestQuery),
    responses(
        (status = 200, description = "Newest shifts first", body = [LatestEntry]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn latest(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LatestQuery>,
) -> actix_web::Result<impl Responder> {
    let limit = query.limit.unwrap_or(2).clamp(1, 10);

    let sql = format!(
        "SELECT {} FROM attendance WHERE user_id = ? ORDER BY check_in_at DESC LIMIT ?",
        crate::model::attendance::ATTENDANCE_COLUMNS
    );
    let rows = sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(auth.user_id)
        .bind(limit)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Latest shifts lookup failed", auth.user_id))?;

    let entries: Vec<LatestEntry> = rows.into_iter().map(LatestEntry::from).collect();
    Ok(HttpResponse::Ok().json(entries))
}

/// The caller's calendar for one month.
#[utoipa::path(
    get,
    path = "/api/attendance/sheet",
    params(MonthQuery),
    responses(
        (status = 200, description = "Shift count per day", body = SheetResponse),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn monthly_sheet(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<MonthQuery>,
) -> actix_web::Result<impl Responder> {
    let month = match query.resolve() {
        Ok(m) => m,
        Err(resp) => return Ok(resp),
    };

    let (start, end) = month.utc_bounds(config.utc_offset);
    let rows = AttendanceRecord::in_range(
        pool.get_ref(),
        start,
        end,
        Some(auth.user_id),
        SHEET_ROW_LIMIT,
    )
    .await
    .map_err(|e| db_error(e, "Monthly sheet lookup failed", auth.user_id))?;

    Ok(HttpResponse::Ok().json(SheetResponse {
        month: month.month(),
        year: month.year(),
        days_in_month: month.days_in_month(),
        data: shifts_per_day(&rows, month, config.utc_offset),
    }))
}
