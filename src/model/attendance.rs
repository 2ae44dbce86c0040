use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::ToSchema;

/// Column list shared by every attendance query.
pub const ATTENDANCE_COLUMNS: &str = r#"
    id, user_id, user_name, phone_number, date,
    check_in_at, check_out_at,
    latitude_in, longitude_in, latitude_out, longitude_out,
    work_location, created_at
"#;

/// One shift. `check_out_at` is null while the shift is open.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    #[schema(example = 42)]
    pub id: u64,
    #[schema(example = 7)]
    pub user_id: u64,
    #[schema(example = "Ravi Kumar")]
    pub user_name: String,
    #[schema(example = "+919812345678", nullable = true)]
    pub phone_number: Option<String>,
    #[schema(example = "2025-03-14", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "2025-03-14T03:31:00Z", value_type = String, format = "date-time")]
    pub check_in_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "date-time", nullable = true)]
    pub check_out_at: Option<DateTime<Utc>>,
    #[schema(example = 23.0225)]
    pub latitude_in: f64,
    #[schema(example = 72.5714)]
    pub longitude_in: f64,
    #[schema(nullable = true)]
    pub latitude_out: Option<f64>,
    #[schema(nullable = true)]
    pub longitude_out: Option<f64>,
    #[schema(example = "GHCL")]
    pub work_location: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn point_in(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude_in,
            longitude: self.longitude_in,
        }
    }

    /// Set once the shift is closed.
    pub fn point_out(&self) -> Option<GeoPoint> {
        match (self.latitude_out, self.longitude_out) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint { latitude, longitude }),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.check_out_at.is_none()
    }

    /// Newest open shift of a user, if any.
    pub async fn find_open(pool: &MySqlPool, user_id: u64) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance \
             WHERE user_id = ? AND check_out_at IS NULL \
             ORDER BY created_at DESC LIMIT 1"
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &MySqlPool, id: u64) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = ?");
        sqlx::query_as::<_, Self>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Rows whose check-in falls inside `[start, end)`, oldest first.
    /// Restricted to one user when `user_id` is given.
    pub async fn in_range(
        pool: &MySqlPool,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        user_id: Option<u64>,
        limit: u32,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let user_filter = if user_id.is_some() { "AND user_id = ?" } else { "" };
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance \
             WHERE check_in_at >= ? AND check_in_at < ? {user_filter} \
             ORDER BY check_in_at ASC LIMIT ?"
        );

        let mut query = sqlx::query_as::<_, Self>(&sql).bind(start).bind(end);
        if let Some(id) = user_id {
            query = query.bind(id);
        }
        query.bind(limit).fetch_all(pool).await
    }
}

/// Latitude/longitude pair reported by the browser.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    #[schema(example = 23.0225)]
    pub latitude: f64,
    #[schema(example = 72.5714)]
    pub longitude: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn map_url(&self) -> String {
        format!("https://www.google.com/maps?q={},{}", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geo_point_bounds() {
        assert!(GeoPoint { latitude: 23.02, longitude: 72.57 }.is_valid());
        assert!(GeoPoint { latitude: -90.0, longitude: 180.0 }.is_valid());
        assert!(!GeoPoint { latitude: 90.5, longitude: 0.0 }.is_valid());
        assert!(!GeoPoint { latitude: 0.0, longitude: -181.0 }.is_valid());
        assert!(!GeoPoint { latitude: f64::NAN, longitude: 0.0 }.is_valid());
    }

    #[test]
    fn map_link_uses_query_coordinates() {
        let point = GeoPoint { latitude: 23.5, longitude: 72.25 };
        assert_eq!(point.map_url(), "https://www.google.com/maps?q=23.5,72.25");
    }
}
