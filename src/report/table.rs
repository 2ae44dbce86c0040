//! Layout of the exported reports, independent of the PDF backend.

use crate::model::attendance::AttendanceRecord;
use crate::report::register::UserMonthly;
use crate::report::shift::{ShiftKind, ShiftWindow, worked};
use crate::utils::month::{Month, day_key};

pub type Rgb8 = (u8, u8, u8);

pub mod palette {
    use super::Rgb8;

    pub const BACKGROUND: Rgb8 = (23, 23, 23);
    pub const HEADER_FILL: Rgb8 = (38, 38, 38);
    pub const GRID: Rgb8 = (64, 64, 64);
    pub const TEXT: Rgb8 = (255, 255, 255);
    pub const WORKING: Rgb8 = (250, 204, 21);
    pub const PRESENT: Rgb8 = (74, 222, 128);
    pub const ABSENT: Rgb8 = (248, 113, 113);
    pub const NIGHT: Rgb8 = (147, 197, 253);
}

/// Usable width of a landscape A4 page with 14 mm margins.
pub const PAGE_CONTENT_WIDTH: f32 = 269.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub header: String,
    /// Width in millimetres.
    pub width: f32,
    pub align: Align,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub text: String,
    pub color: Rgb8,
    pub fill: Rgb8,
    pub bold: bool,
    /// Number of columns covered.
    pub span: usize,
}

impl Cell {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: palette::TEXT,
            fill: palette::BACKGROUND,
            bold: false,
            span: 1,
        }
    }

    fn colored(text: impl Into<String>, color: Rgb8) -> Self {
        Self {
            color,
            ..Self::plain(text)
        }
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    fn filled(mut self, fill: Rgb8) -> Self {
        self.fill = fill;
        self
    }

    fn spanning(mut self, span: usize) -> Self {
        self.span = span;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub title: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
    /// Font size in points.
    pub font_size: f32,
}

/// Color of a register day cell.
pub fn day_cell_color(label: &str) -> Rgb8 {
    if label == "W" {
        palette::WORKING
    } else if label.contains('P') {
        palette::PRESENT
    } else {
        palette::ABSENT
    }
}

pub fn register_file_name(location: &str, month: Month) -> String {
    format!("Attendance_{}_{}_{}.pdf", location, month.month(), month.year())
}

pub fn log_file_name(month: Month) -> String {
    format!("Attendance_Log_{}_{}.pdf", month.month(), month.year())
}

/// Name, one column per day, total; closed by a grand-total row.
pub fn register_table(users: &[UserMonthly], month: Month, location: &str) -> Table {
    const NAME_WIDTH: f32 = 30.0;
    const TOTAL_WIDTH: f32 = 12.0;

    let days: Vec<String> = month.days().map(day_key).collect();
    let day_width = (PAGE_CONTENT_WIDTH - NAME_WIDTH - TOTAL_WIDTH) / days.len() as f32;

    let mut columns = vec![Column {
        header: "Name".to_string(),
        width: NAME_WIDTH,
        align: Align::Left,
    }];
    columns.extend((1..=days.len()).map(|d| Column {
        header: d.to_string(),
        width: day_width,
        align: Align::Center,
    }));
    columns.push(Column {
        header: "Total".to_string(),
        width: TOTAL_WIDTH,
        align: Align::Center,
    });

    let mut rows = Vec::with_capacity(users.len() + 1);
    let mut grand_total = 0;

    for user in users {
        let mut row = vec![Cell::plain(&user.user_name).bold()];
        let mut user_total = 0;

        for key in &days {
            let day = user.day(key).cloned().unwrap_or_default();
            user_total += day.count;
            let label = day.label();
            let color = day_cell_color(&label);
            let cell = Cell::colored(label, color);
            row.push(if color == palette::WORKING { cell.bold() } else { cell });
        }

        row.push(
            Cell::plain(user_total.to_string())
                .bold()
                .filled(palette::HEADER_FILL),
        );
        grand_total += user_total;
        rows.push(row);
    }

    rows.push(vec![
        Cell::plain("GRAND TOTAL")
            .bold()
            .filled(palette::HEADER_FILL)
            .spanning(days.len() + 1),
        Cell::plain(grand_total.to_string())
            .bold()
            .filled(palette::HEADER_FILL),
    ]);

    Table {
        title: format!(
            "Attendance Register ({}) - {} {}",
            location,
            month.name(),
            month.year()
        ),
        columns,
        rows,
        font_size: 7.0,
    }
}

/// One row per shift of the month, oldest first.
pub fn log_table(records: &[AttendanceRecord], month: Month, window: &ShiftWindow) -> Table {
    let layout: [(&str, f32, Align); 8] = [
        ("Date", 20.0, Align::Left),
        ("Name", 45.0, Align::Left),
        ("Phone", 32.0, Align::Left),
        ("In", 22.0, Align::Center),
        ("Out", 22.0, Align::Center),
        ("Hours", 24.0, Align::Center),
        ("Shift", 20.0, Align::Center),
        ("Location", 84.0, Align::Left),
    ];
    let columns = layout
        .iter()
        .map(|(header, width, align)| Column {
            header: header.to_string(),
            width: *width,
            align: *align,
        })
        .collect();

    let rows = records
        .iter()
        .map(|r| {
            let out = match r.check_out_at {
                Some(ts) => Cell::plain(window.format_time(ts)),
                None => Cell::colored("Pending", palette::WORKING),
            };
            let shift = window.classify(r.check_in_at, r.check_out_at);
            let shift_color = match shift {
                ShiftKind::Pending => palette::WORKING,
                ShiftKind::Day => palette::PRESENT,
                ShiftKind::Night => palette::NIGHT,
            };

            vec![
                Cell::plain(window.format_day(r.check_in_at)),
                Cell::plain(&r.user_name).bold(),
                Cell::plain(r.phone_number.as_deref().unwrap_or("-")),
                Cell::plain(window.format_time(r.check_in_at)),
                out,
                Cell::plain(worked(r.check_in_at, r.check_out_at).to_string()),
                Cell::colored(shift.to_string().to_uppercase(), shift_color).bold(),
                Cell::plain(&r.work_location),
            ]
        })
        .collect();

    Table {
        title: format!("Attendance Log - {} {}", month.name(), month.year()),
        columns,
        rows,
        font_size: 8.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::register::build_register;
    use chrono::{FixedOffset, NaiveTime, TimeZone, Utc};

    fn record(user_id: u64, name: &str, day: u32, closed: bool) -> AttendanceRecord {
        let check_in_at = Utc.with_ymd_and_hms(2025, 2, day, 8, 0, 0).unwrap();
        AttendanceRecord {
            id: day as u64,
            user_id,
            user_name: name.to_string(),
            phone_number: Some("+91000".to_string()),
            date: check_in_at.date_naive(),
            check_in_at,
            check_out_at: closed.then(|| Utc.with_ymd_and_hms(2025, 2, day, 16, 30, 0).unwrap()),
            latitude_in: 1.0,
            longitude_in: 2.0,
            latitude_out: None,
            longitude_out: None,
            work_location: "GHCL".to_string(),
            created_at: check_in_at,
        }
    }

    fn february() -> Month {
        Month::new(2025, 2).unwrap()
    }

    #[test]
    fn cell_colors_follow_the_label() {
        assert_eq!(day_cell_color("W"), palette::WORKING);
        assert_eq!(day_cell_color("P"), palette::PRESENT);
        assert_eq!(day_cell_color("3P"), palette::PRESENT);
        assert_eq!(day_cell_color("A"), palette::ABSENT);
    }

    #[test]
    fn register_table_shape_and_totals() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let records = vec![
            record(1, "Asha", 3, true),
            record(1, "Asha", 4, false),
            record(2, "Vikram", 3, true),
        ];
        let users = build_register(&records, february(), offset);
        let table = register_table(&users, february(), "All");

        assert_eq!(table.title, "Attendance Register (All) - February 2025");
        assert_eq!(table.columns.len(), 28 + 2);
        assert_eq!(table.columns[1].header, "1");
        assert_eq!(table.columns.last().unwrap().header, "Total");
        let width: f32 = table.columns.iter().map(|c| c.width).sum();
        assert!((width - PAGE_CONTENT_WIDTH).abs() < 0.01);

        assert_eq!(table.rows.len(), 3);
        let asha = &table.rows[0];
        assert_eq!(asha[0].text, "Asha");
        assert_eq!(asha[3].text, "P");
        assert_eq!(asha[4].text, "W");
        assert!(asha[4].bold);
        assert_eq!(asha[5].color, palette::ABSENT);
        assert_eq!(asha.last().unwrap().text, "1");

        let grand = table.rows.last().unwrap();
        assert_eq!(grand.len(), 2);
        assert_eq!(grand[0].text, "GRAND TOTAL");
        assert_eq!(grand[0].span, 29);
        assert_eq!(grand[1].text, "2");

        for row in &table.rows {
            assert_eq!(row.iter().map(|c| c.span).sum::<usize>(), table.columns.len());
        }
    }

    #[test]
    fn file_names() {
        assert_eq!(register_file_name("GHCL", february()), "Attendance_GHCL_2_2025.pdf");
        assert_eq!(log_file_name(february()), "Attendance_Log_2_2025.pdf");
    }

    #[test]
    fn log_table_describes_each_shift() {
        let window = ShiftWindow {
            day_start: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            night_start: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            offset: FixedOffset::east_opt(0).unwrap(),
        };
        let table = log_table(&[record(1, "Asha", 3, true), record(1, "Asha", 4, false)], february(), &window);

        assert_eq!(table.title, "Attendance Log - February 2025");
        assert_eq!(table.rows.len(), 2);

        let done = &table.rows[0];
        assert_eq!(done[0].text, "03 Feb");
        assert_eq!(done[3].text, "8:00 AM");
        assert_eq!(done[4].text, "4:30 PM");
        assert_eq!(done[5].text, "8h 30m");
        assert_eq!(done[6].text, "DAY");

        let open = &table.rows[1];
        assert_eq!(open[4].text, "Pending");
        assert_eq!(open[5].text, "Working");
        assert_eq!(open[6].text, "PENDING");
        assert_eq!(open[6].color, palette::WORKING);
    }
}
