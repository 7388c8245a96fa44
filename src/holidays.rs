//! Swedish public holidays and notable days, used to annotate calendar days.
//! Nothing here affects which tasks are due.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: &'static str,
    pub name_en: &'static str,
}

/// Easter Sunday (anonymous Gregorian algorithm).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// First Saturday on or after the given day.
fn saturday_on_or_after(date: NaiveDate) -> NaiveDate {
    let offset = (7 + Weekday::Sat.num_days_from_monday() - date.weekday().num_days_from_monday()) % 7;
    date + Duration::days(i64::from(offset))
}

/// All holidays of `year`, sorted by date.
pub fn holidays_for_year(year: i32) -> Vec<Holiday> {
    let mut holidays = Vec::new();
    let mut push = |date: Option<NaiveDate>, name: &'static str, name_en: &'static str| {
        if let Some(date) = date {
            holidays.push(Holiday { date, name, name_en });
        }
    };
    let ymd = |m: u32, d: u32| NaiveDate::from_ymd_opt(year, m, d);

    push(ymd(1, 1), "Nyårsdagen", "New Year's Day");
    push(ymd(1, 6), "Trettondedag jul", "Epiphany");
    push(ymd(5, 1), "Första maj", "May Day");
    push(ymd(6, 6), "Sveriges nationaldag", "National Day of Sweden");
    push(ymd(12, 24), "Julafton", "Christmas Eve");
    push(ymd(12, 25), "Juldagen", "Christmas Day");
    push(ymd(12, 26), "Annandag jul", "Boxing Day");
    push(ymd(12, 31), "Nyårsafton", "New Year's Eve");

    if let Some(easter) = easter_sunday(year) {
        let shifted = |days: i64| Some(easter + Duration::days(days));
        push(shifted(-2), "Långfredagen", "Good Friday");
        push(shifted(-1), "Påskafton", "Easter Eve");
        push(Some(easter), "Påskdagen", "Easter Sunday");
        push(shifted(1), "Annandag påsk", "Easter Monday");
        push(shifted(39), "Kristi himmelsfärdsdag", "Ascension Day");
        push(shifted(49), "Pingstdagen", "Whit Sunday");
    }

    if let Some(june_20) = ymd(6, 20) {
        let midsummer = saturday_on_or_after(june_20);
        push(Some(midsummer - Duration::days(1)), "Midsommarafton", "Midsummer Eve");
        push(Some(midsummer), "Midsommardagen", "Midsummer Day");
    }
    if let Some(october_31) = ymd(10, 31) {
        push(Some(saturday_on_or_after(october_31)), "Alla helgons dag", "All Saints' Day");
    }

    holidays.sort_by_key(|h| h.date);
    holidays
}

pub fn holiday_for_date(date: NaiveDate) -> Option<Holiday> {
    holidays_for_year(date.year())
        .into_iter()
        .find(|h| h.date == date)
}

pub fn is_holiday(date: NaiveDate) -> bool {
    holiday_for_date(date).is_some()
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn is_non_working_day(date: NaiveDate) -> bool {
    is_weekend(date) || is_holiday(date)
}
