use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Profile mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

impl Profile {
    pub fn app_name(&self) -> &'static str {
        match self {
            Profile::Dev => "famchart-dev",
            Profile::Prod => "famchart",
        }
    }
}

/// Get the configuration directory path.
/// If profile is Dev, uses "famchart-dev" instead of "famchart"
pub fn get_config_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "famchart", profile.app_name())
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the data directory path (where the database lives)
pub fn get_data_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "famchart", profile.app_name())
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse a date string in ISO 8601 format (YYYY-MM-DD)
pub fn parse_date(date_str: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
}

/// Parse a time of day in HH:MM format
pub fn parse_time_of_day(time_str: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(time_str.trim(), "%H:%M")
}

/// Midnight at the start of `date` in the given time zone.
///
/// Falls back to the first valid instant of the day when midnight itself is
/// skipped by a DST transition.
pub fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight).earliest() {
        Some(dt) => dt,
        None => {
            let one_hour_later = midnight + chrono::Duration::hours(1);
            tz.from_local_datetime(&one_hour_later)
                .earliest()
                .unwrap_or_else(|| tz.from_utc_datetime(&midnight))
        }
    }
}

/// Calendar day of an instant as seen in the given time zone.
pub fn day_in<Tz: TimeZone>(instant: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn parses_dates_and_times() {
        assert_eq!(parse_date("2024-12-24").ok(), NaiveDate::from_ymd_opt(2024, 12, 24));
        assert!(parse_date("24/12/2024").is_err());
        assert_eq!(parse_time_of_day("07:45").ok(), NaiveTime::from_hms_opt(7, 45, 0));
        assert!(parse_time_of_day("7pm").is_err());
    }

    #[test]
    fn day_in_respects_offset() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 9, 23, 30, 0).unwrap();
        let stockholm = FixedOffset::east_opt(3600).unwrap();
        assert_eq!(day_in(&instant, &Utc), NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        assert_eq!(day_in(&instant, &stockholm), NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
    }

    #[test]
    fn local_midnight_is_start_of_day() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let midnight = local_midnight(&tz, date);
        assert_eq!(midnight.date_naive(), date);
        assert_eq!(midnight.time(), NaiveTime::MIN);
    }

    #[test]
    fn expand_path_leaves_absolute_paths_alone() {
        assert_eq!(expand_path("/var/lib/famchart.db"), PathBuf::from("/var/lib/famchart.db"));
    }
}
