//! Day bucketing behind the monthly register and the employee calendar.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike, FixedOffset};
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::attendance::AttendanceRecord;
use crate::utils::month::{Month, day_key, local_date};

/// Pseudo-location meaning "no location filter".
pub const ALL_LOCATIONS: &str = "All";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DayStatus {
    /// Completed shifts that day.
    pub count: u32,
    /// An open shift started that day.
    pub working: bool,
    /// Location of each completed shift.
    pub locations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_location: Option<String>,
}

impl DayStatus {
    /// `W` while working, `P` / `{n}P` when present, `A` otherwise.
    pub fn label(&self) -> String {
        if self.working {
            "W".to_string()
        } else if self.count == 1 {
            "P".to_string()
        } else if self.count > 1 {
            format!("{}P", self.count)
        } else {
            "A".to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UserMonthly {
    pub user_id: u64,
    pub user_name: String,
    /// Location of the user's first shift in the month.
    pub work_location: String,
    /// Every date of the month keyed `YYYY-MM-DD`.
    pub days: BTreeMap<String, DayStatus>,
}

impl UserMonthly {
    fn empty(record: &AttendanceRecord, month: Month) -> Self {
        let work_location = if record.work_location.trim().is_empty() {
            "N/A".to_string()
        } else {
            record.work_location.clone()
        };

        Self {
            user_id: record.user_id,
            user_name: record.user_name.clone(),
            work_location,
            days: month.days().map(|d| (day_key(d), DayStatus::default())).collect(),
        }
    }

    pub fn total(&self) -> u32 {
        self.days.values().map(|d| d.count).sum()
    }

    pub fn day(&self, key: &str) -> Option<&DayStatus> {
        self.days.get(key)
    }
}

/// Groups a month of records into one row per user, in order of first appearance.
///
/// Records are expected oldest first. Rows whose local check-in day falls
/// outside `month` are ignored.
pub fn build_register(
    records: &[AttendanceRecord],
    month: Month,
    offset: FixedOffset,
) -> Vec<UserMonthly> {
    let mut users: Vec<UserMonthly> = Vec::new();
    let mut index: HashMap<u64, usize> = HashMap::new();

    for record in records {
        let date = local_date(record.check_in_at, offset);
        if !month.contains(date) {
            continue;
        }

        let slot = *index.entry(record.user_id).or_insert_with(|| {
            users.push(UserMonthly::empty(record, month));
            users.len() - 1
        });

        if let Some(day) = users[slot].days.get_mut(&day_key(date)) {
            if record.is_open() {
                day.working = true;
                day.working_location = Some(record.work_location.clone());
            } else {
                day.count += 1;
                day.locations.push(record.work_location.clone());
            }
        }
    }

    users
}

/// Every location seen in the register plus [`ALL_LOCATIONS`], sorted.
pub fn unique_locations(users: &[UserMonthly]) -> Vec<String> {
    let mut set: BTreeSet<String> = BTreeSet::new();
    set.insert(ALL_LOCATIONS.to_string());

    for day in users.iter().flat_map(|u| u.days.values()) {
        set.extend(day.locations.iter().cloned());
        if let Some(loc) = &day.working_location {
            set.insert(loc.clone());
        }
    }

    set.into_iter().collect()
}

/// Restricts the register to shifts at `location`.
///
/// Day counts are recomputed from the matching completed shifts, `working`
/// only survives if the open shift is at `location`, and users with nothing
/// at `location` are dropped.
pub fn filter_by_location(users: &[UserMonthly], location: &str) -> Vec<UserMonthly> {
    if location == ALL_LOCATIONS {
        return users.to_vec();
    }

    users
        .iter()
        .filter_map(|user| {
            let mut has_data = false;
            let days = user
                .days
                .iter()
                .map(|(key, day)| {
                    let count = day.locations.iter().filter(|l| *l == location).count() as u32;
                    let working = day.working_location.as_deref() == Some(location);
                    has_data |= count > 0 || working;

                    let filtered = DayStatus {
                        count,
                        working,
                        ..day.clone()
                    };
                    (key.clone(), filtered)
                })
                .collect();

            has_data.then(|| UserMonthly {
                days,
                ..user.clone()
            })
        })
        .collect()
}

pub fn grand_total(users: &[UserMonthly]) -> u32 {
    users.iter().map(UserMonthly::total).sum()
}

/// Day of month → number of shifts started that day, for a single user's calendar.
pub fn shifts_per_day(
    records: &[AttendanceRecord],
    month: Month,
    offset: FixedOffset,
) -> BTreeMap<u32, u32> {
    let mut map = BTreeMap::new();
    for record in records {
        let date = local_date(record.check_in_at, offset);
        if month.contains(date) {
            *map.entry(date.day()).or_insert(0) += 1;
        }
    }
    map
}
