use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

// Examples: (WK4/8), (Week 6/8), (wk 3 / 6)
static CYCLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\((?:wk|week)\s*\d+\s*/\s*\d+\)").unwrap()
});
static MDY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})[./-](\d{1,2})[./-](\d{2,4})").unwrap());
static LINK_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(20\d{2})/(\d{2})/(\d{2})/").unwrap());

/// Unique cycle markers like "(WK4/8)" in order of first appearance.
pub fn extract_cycle_info(text: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for m in CYCLE_RE.find_iter(text) {
        let marker = m.as_str().trim().to_string();
        if !seen.contains(&marker) {
            seen.push(marker);
        }
    }
    seen
}

/// Workouts are usually posted the evening before. Prefer an explicit date in
/// the title or slug, then the permalink path, then the publish date.
pub fn derive_workout_date(
    title: &str,
    slug: &str,
    link: &str,
    published: Option<NaiveDate>,
) -> Option<NaiveDate> {
    let from_text = parse_mdy(title).or_else(|| parse_mdy(slug));

    // A title year far in the future (or before the blog existed) is a typo.
    let from_text = match (from_text, published) {
        (Some(d), Some(pub_date)) => {
            if d.year() - pub_date.year() > 2 || d.year() < 2007 {
                None
            } else {
                Some(d)
            }
        }
        (d, _) => d,
    };
    if from_text.is_some() {
        return from_text;
    }

    if let Some(caps) = LINK_DATE_RE.captures(link) {
        let date = NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        );
        if date.is_some() {
            return date;
        }
    }

    published
}

/// Parse "m/d/yy" or "m-d-yyyy" style dates. Two-digit years pivot at 70.
fn parse_mdy(text: &str) -> Option<NaiveDate> {
    let caps = MDY_RE.captures(text)?;
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let year_raw = &caps[3];
    let year: i32 = match year_raw.len() {
        2 => {
            let y: i32 = year_raw.parse().ok()?;
            if y < 70 {
                2000 + y
            } else {
                1900 + y
            }
        }
        4 => year_raw.parse().ok()?,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn cycle_markers_dedup_in_order() {
        let text = "Back Squat (WK4/8) then press (Week 2/6) and again (WK4/8)";
        assert_eq!(extract_cycle_info(text), vec!["(WK4/8)", "(Week 2/6)"]);
    }

    #[test]
    fn title_date_wins_over_publish() {
        let date = derive_workout_date(
            "WOD 5/7/23",
            "wod-5-7-23",
            "https://example.com/2023/05/06/wod-5-7-23/",
            Some(d(2023, 5, 6)),
        );
        assert_eq!(date, Some(d(2023, 5, 7)));
    }

    #[test]
    fn two_digit_year_pivot() {
        assert_eq!(parse_mdy("1/2/98"), Some(d(1998, 1, 2)));
        assert_eq!(parse_mdy("1/2/08"), Some(d(2008, 1, 2)));
    }

    #[test]
    fn future_year_typo_falls_back_to_link() {
        let date = derive_workout_date(
            "WOD 5/7/33",
            "wod",
            "https://example.com/2023/05/06/wod/",
            Some(d(2023, 5, 6)),
        );
        assert_eq!(date, Some(d(2023, 5, 6)));
    }

    #[test]
    fn pre_blog_year_rejected() {
        let date = derive_workout_date("WOD 5/7/1999", "wod", "", Some(d(2012, 5, 6)));
        assert_eq!(date, Some(d(2012, 5, 6)));
    }

    #[test]
    fn invalid_calendar_date_ignored() {
        // 13/45 parses as numbers but is not a real date
        let date = derive_workout_date("WOD 13/45/23", "wod", "", Some(d(2023, 5, 6)));
        assert_eq!(date, Some(d(2023, 5, 6)));
    }

    #[test]
    fn no_date_anywhere_is_none() {
        assert_eq!(derive_workout_date("Rest Day", "rest-day", "", None), None);
    }
}
