pub mod admin;
pub mod attendance;
pub mod register;
pub mod users;

use actix_web::HttpResponse;
use serde::Deserialize;
use serde_json::json;
use sqlx::mysql::MySqlDatabaseError;
use utoipa::{IntoParams, ToSchema};

use crate::utils::month::Month;

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct MonthQuery {
    /// Month number, 1-12
    #[schema(example = 3)]
    pub month: u32,
    #[schema(example = 2025)]
    pub year: i32,
}

impl MonthQuery {
    /// The validated month, or a ready 400 response.
    pub fn resolve(&self) -> Result<Month, HttpResponse> {
        Month::new(self.year, self.month).ok_or_else(|| {
            HttpResponse::BadRequest().json(json!({
                "message": "month must be 1-12 and year 1970-9999"
            }))
        })
    }
}

/// MySQL error 1062 (`ER_DUP_ENTRY`). SQLSTATE 23000 alone also covers
/// foreign-key and NOT NULL violations.
pub fn is_duplicate_key(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => {
            db_err
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(|e| e.number())
                == Some(1062)
        }
        _ => false,
    }
}
