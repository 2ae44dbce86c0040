use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::model::attendance::{ATTENDANCE_COLUMNS, AttendanceRecord};
use crate::report::shift::{ShiftKind, ShiftWindow, worked};
use crate::utils::month::local_date;

pub const DEFAULT_PAGE_SIZE: u32 = 14;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct DailyLogQuery {
    /// Page number, starting at 1
    #[schema(example = 1)]
    pub page: Option<u32>,
    /// Rows per page, 1-100 (default 14)
    #[schema(example = 14)]
    pub limit: Option<u32>,
}

/// One row of the admin daily log.
#[derive(Debug, Serialize, ToSchema)]
pub struct DailyLogRow {
    #[serde(flatten)]
    pub record: AttendanceRecord,
    pub shift: ShiftKind,
    /// `"{h}h {m}m"`, `Working` or `Invalid`
    #[schema(example = "8h 30m")]
    pub hours: String,
    #[schema(example = "9:05 AM")]
    pub check_in_time: String,
    pub check_out_time: Option<String>,
    pub map_in: String,
    pub map_out: Option<String>,
}

impl DailyLogRow {
    pub fn new(record: AttendanceRecord, window: &ShiftWindow) -> Self {
        Self {
            shift: window.classify(record.check_in_at, record.check_out_at),
            hours: worked(record.check_in_at, record.check_out_at).to_string(),
            check_in_time: window.format_time(record.check_in_at),
            check_out_time: record.check_out_at.map(|ts| window.format_time(ts)),
            map_in: record.point_in().map_url(),
            map_out: record.point_out().map(|p| p.map_url()),
            record,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DailyLogResponse {
    pub data: Vec<DailyLogRow>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

/// Normalizes paging input to `(page, limit, offset)`.
pub fn page_window(page: Option<u32>, limit: Option<u32>) -> (u32, u32, u64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = (page as u64 - 1) * limit as u64;
    (page, limit, offset)
}

pub fn total_pages(total: i64, limit: u32) -> i64 {
    if total <= 0 {
        0
    } else {
        (total + limit as i64 - 1) / limit as i64
    }
}

/// Paginated daily log, newest first.
#[utoipa::path(
    get,
    path = "/api/admin/attendance",
    params(DailyLogQuery),
    responses(
        (status = 200, description = "One page of the log", body = DailyLogResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn daily_log(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<DailyLogQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let (page, limit, offset) = page_window(query.page, query.limit);
    debug!(page, limit, offset, "Fetching daily log");

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM attendance")
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to count attendance rows");
            ErrorInternalServerError("Database error")
        })?;

    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
    );
    let rows = sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch attendance page");
            ErrorInternalServerError("Database error")
        })?;

    let window = ShiftWindow::from_config(&config);
    Ok(HttpResponse::Ok().json(DailyLogResponse {
        data: rows.into_iter().map(|r| DailyLogRow::new(r, &window)).collect(),
        page,
        limit,
        total,
        total_pages: total_pages(total, limit),
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimeField {
    CheckIn,
    CheckOut,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTimeReq {
    pub field: TimeField,
    /// RFC 3339 timestamp
    #[schema(example = "2025-03-14T03:30:00Z", value_type = String, format = "date-time")]
    pub value: DateTime<Utc>,
}

/// The corrected `(check_in, check_out)` pair, or why it is rejected.
pub fn corrected_times(
    record: &AttendanceRecord,
    field: TimeField,
    value: DateTime<Utc>,
) -> Result<(DateTime<Utc>, Option<DateTime<Utc>>), &'static str> {
    let (check_in, check_out) = match field {
        TimeField::CheckIn => (value, record.check_out_at),
        TimeField::CheckOut => (record.check_in_at, Some(value)),
    };

    match check_out {
        Some(out) if out < check_in => Err("Check-out cannot be before check-in"),
        _ => Ok((check_in, check_out)),
    }
}

/// Corrects the check-in or check-out time of a shift.
#[utoipa::path(
    patch,
    path = "/api/admin/attendance/{id}",
    params(("id", Path, description = "Attendance row ID")),
    request_body = UpdateTimeReq,
    responses(
        (status = 200, description = "Row updated", body = AttendanceRecord),
        (status = 400, description = "Times out of order", body = MessageResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Row not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_time(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    body: web::Json<UpdateTimeReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let id = path.into_inner();

    let record = AttendanceRecord::find_by_id(pool.get_ref(), id)
        .await
        .map_err(|e| {
            error!(error = %e, id, "Failed to load attendance row");
            ErrorInternalServerError("Internal Server Error")
        })?;

    let Some(record) = record else {
        return Ok(HttpResponse::NotFound().json(json!({"message": "Attendance record not found"})));
    };

    let (check_in, check_out) = match corrected_times(&record, body.field, body.value) {
        Ok(pair) => pair,
        Err(message) => return Ok(HttpResponse::BadRequest().json(json!({"message": message}))),
    };

    sqlx::query("UPDATE attendance SET check_in_at = ?, check_out_at = ?, date = ? WHERE id = ?")
        .bind(check_in)
        .bind(check_out)
        .bind(local_date(check_in, config.utc_offset))
        .bind(id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, id, "Failed to update attendance time");
            ErrorInternalServerError("Internal Server Error")
        })?;

    info!(id, admin = auth.user_id, field = ?body.field, "Attendance time corrected");

    let updated = AttendanceRecord::find_by_id(pool.get_ref(), id)
        .await
        .map_err(|e| {
            error!(error = %e, id, "Failed to reload attendance row");
            ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Attendance time updated",
        "data": updated
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};
    use chrono::FixedOffset;

    fn record(closed: bool) -> AttendanceRecord {
        let check_in_at = Utc.with_ymd_and_hms(2025, 3, 14, 3, 30, 0).unwrap();
        AttendanceRecord {
            id: 1,
            user_id: 2,
            user_name: "Asha".to_string(),
            phone_number: None,
            date: check_in_at.date_naive(),
            check_in_at,
            check_out_at: closed.then(|| Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap()),
            latitude_in: 23.5,
            longitude_in: 72.25,
            latitude_out: closed.then_some(23.6),
            longitude_out: closed.then_some(72.3),
            work_location: "GHCL".to_string(),
            created_at: check_in_at,
        }
    }

    #[test]
    fn paging_defaults_and_bounds() {
        assert_eq!(page_window(None, None), (1, 14, 0));
        assert_eq!(page_window(Some(3), Some(10)), (3, 10, 20));
        assert_eq!(page_window(Some(0), Some(1000)), (1, 100, 0));
        assert_eq!(page_window(Some(2), Some(0)), (2, 1, 1));
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 14), 0);
        assert_eq!(total_pages(14, 14), 1);
        assert_eq!(total_pages(15, 14), 2);
    }

    #[test]
    fn log_row_carries_derived_columns() {
        let window = ShiftWindow {
            day_start: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            night_start: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            offset: FixedOffset::east_opt(330 * 60).unwrap(),
        };

        let done = DailyLogRow::new(record(true), &window);
        assert_eq!(done.shift, ShiftKind::Day);
        assert_eq!(done.hours, "8h 30m");
        assert_eq!(done.check_in_time, "9:00 AM");
        assert_eq!(done.check_out_time.as_deref(), Some("5:30 PM"));
        assert_eq!(done.map_in, "https://www.google.com/maps?q=23.5,72.25");
        assert!(done.map_out.is_some());

        let open = DailyLogRow::new(record(false), &window);
        assert_eq!(open.shift, ShiftKind::Pending);
        assert_eq!(open.hours, "Working");
        assert!(open.check_out_time.is_none());
        assert!(open.map_out.is_none());
    }

    #[test]
    fn corrections_keep_check_out_after_check_in() {
        let closed = record(true);
        let late_in = Utc.with_ymd_and_hms(2025, 3, 14, 13, 0, 0).unwrap();
        assert!(corrected_times(&closed, TimeField::CheckIn, late_in).is_err());

        let early_in = Utc.with_ymd_and_hms(2025, 3, 14, 2, 0, 0).unwrap();
        let (check_in, check_out) = corrected_times(&closed, TimeField::CheckIn, early_in).unwrap();
        assert_eq!(check_in, early_in);
        assert_eq!(check_out, closed.check_out_at);

        // closing an open shift through a correction is allowed
        let open = record(false);
        let out = Utc.with_ymd_and_hms(2025, 3, 14, 11, 0, 0).unwrap();
        assert_eq!(
            corrected_times(&open, TimeField::CheckOut, out).unwrap(),
            (open.check_in_at, Some(out))
        );
    }
}
