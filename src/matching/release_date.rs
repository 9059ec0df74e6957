use chrono::{Datelike, NaiveDate};

/// Full-date formats tried in order after the catalog's own
/// `YYYY[-MM[-DD]]` precision forms.
const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%d %B %Y", "%B %d, %Y", "%d %b %Y", "%b %d, %Y"];

/// Parse a free-form release date into a calendar date.
///
/// Year-only and year-month values resolve to the first day of the period.
/// Returns `None` when nothing matches, and for year 0, which the catalog
/// uses as an "unknown" placeholder.
pub fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    parse_any(raw.trim()).filter(|date| date.year() > 0)
}

fn parse_any(raw: &str) -> Option<NaiveDate> {
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d") {
        return Some(date);
    }
    if raw.len() == 4 && raw.chars().all(|c| c.is_ascii_digit()) {
        return raw
            .parse::<i32>()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1));
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}
