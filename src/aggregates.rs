use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::canonical::CanonicalWorkout;

#[derive(Debug, Clone, Serialize)]
pub struct MovementDays {
    pub movement: String,
    pub days: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PairCount {
    pub pair: [String; 2],
    pub days: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarEntry {
    pub day: u32,
    pub date: NaiveDate,
    pub title: String,
    pub summary: String,
    pub link: String,
}

/// Wholesale rollups over the canonical set. Every map is a BTreeMap and
/// every vec has a total order, so rebuilding from the same corpus emits
/// byte-identical JSON.
#[derive(Debug, Serialize)]
pub struct Aggregates {
    pub top_movements: Vec<MovementDays>,
    pub top_pairs: Vec<PairCount>,
    pub yearly_counts: BTreeMap<String, u32>,
    pub weekday_counts: BTreeMap<String, u32>,
    pub movement_yearly: BTreeMap<String, BTreeMap<String, u32>>,
    pub movement_weekday: BTreeMap<String, BTreeMap<String, u32>>,
    pub movement_monthly: BTreeMap<String, BTreeMap<String, BTreeMap<String, u32>>>,
    pub movement_calendar: BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<CalendarEntry>>>>,
}

const TOP_MOVEMENTS: usize = 100;
const TOP_PAIRS: usize = 200;

pub fn build(canonical: &[CanonicalWorkout]) -> Aggregates {
    let mut movement_days: BTreeMap<String, u32> = BTreeMap::new();
    let mut pair_days: BTreeMap<(String, String), u32> = BTreeMap::new();
    let mut yearly_counts: BTreeMap<String, u32> = BTreeMap::new();
    let mut weekday_counts: BTreeMap<String, u32> = BTreeMap::new();
    let mut movement_yearly: BTreeMap<String, BTreeMap<String, u32>> = BTreeMap::new();
    let mut movement_weekday: BTreeMap<String, BTreeMap<String, u32>> = BTreeMap::new();
    let mut movement_monthly: BTreeMap<String, BTreeMap<String, BTreeMap<String, u32>>> =
        BTreeMap::new();
    let mut movement_calendar: BTreeMap<
        String,
        BTreeMap<String, BTreeMap<String, Vec<CalendarEntry>>>,
    > = BTreeMap::new();

    for item in canonical.iter().filter(|c| !c.is_rest_day) {
        let year = item.date.year().to_string();
        let month = format!("{:02}", item.date.month());
        let weekday = item.date.format("%A").to_string();

        *yearly_counts.entry(year.clone()).or_default() += 1;
        *weekday_counts.entry(weekday.clone()).or_default() += 1;

        // `movements` is already deduplicated per post, so each increment
        // below counts programming days rather than mentions.
        let mut sorted: Vec<&String> = item.movements.iter().collect();
        sorted.sort();
        sorted.dedup();

        for m in &sorted {
            let m = (*m).clone();
            *movement_days.entry(m.clone()).or_default() += 1;
            *movement_yearly
                .entry(m.clone())
                .or_default()
                .entry(year.clone())
                .or_default() += 1;
            *movement_weekday
                .entry(m.clone())
                .or_default()
                .entry(weekday.clone())
                .or_default() += 1;
            *movement_monthly
                .entry(m.clone())
                .or_default()
                .entry(year.clone())
                .or_default()
                .entry(month.clone())
                .or_default() += 1;
            movement_calendar
                .entry(m)
                .or_default()
                .entry(year.clone())
                .or_default()
                .entry(month.clone())
                .or_default()
                .push(CalendarEntry {
                    day: item.date.day(),
                    date: item.date,
                    title: item.title.clone(),
                    summary: item.summary.clone(),
                    link: item.link.clone(),
                });
        }

        for (i, a) in sorted.iter().enumerate() {
            for b in &sorted[i + 1..] {
                *pair_days
                    .entry(((*a).clone(), (*b).clone()))
                    .or_default() += 1;
            }
        }
    }

    for months in movement_calendar.values_mut().flat_map(|y| y.values_mut()) {
        for entries in months.values_mut() {
            entries.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.link.cmp(&b.link)));
        }
    }

    let mut top_movements: Vec<MovementDays> = movement_days
        .into_iter()
        .map(|(movement, days)| MovementDays { movement, days })
        .collect();
    top_movements.sort_by(|a, b| b.days.cmp(&a.days).then_with(|| a.movement.cmp(&b.movement)));
    top_movements.truncate(TOP_MOVEMENTS);

    let mut top_pairs: Vec<PairCount> = pair_days
        .into_iter()
        .map(|((a, b), days)| PairCount { pair: [a, b], days })
        .collect();
    top_pairs.sort_by(|a, b| b.days.cmp(&a.days).then_with(|| a.pair.cmp(&b.pair)));
    top_pairs.truncate(TOP_PAIRS);

    Aggregates {
        top_movements,
        top_pairs,
        yearly_counts,
        weekday_counts,
        movement_yearly,
        movement_weekday,
        movement_monthly,
        movement_calendar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagger::ComponentTag;

    fn workout(id: i64, date: (i32, u32, u32), movements: &[&str]) -> CanonicalWorkout {
        CanonicalWorkout {
            id,
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            post_date: None,
            title: format!("WOD {}", id),
            link: format!("https://example.com/{}/", id),
            seq_no: id as u32,
            workout_no: Some(id as u32),
            is_rest_day: false,
            components: Vec::new(),
            component_tags: vec![ComponentTag::Conditioning],
            movements: movements.iter().map(|m| m.to_string()).collect(),
            format: None,
            cycle_info: Vec::new(),
            summary: String::new(),
            comment_count: 0,
            milestones: Vec::new(),
        }
    }

    fn rest_day(id: i64, date: (i32, u32, u32)) -> CanonicalWorkout {
        let mut w = workout(id, date, &[]);
        w.is_rest_day = true;
        w.workout_no = None;
        w
    }

    #[test]
    fn pairs_count_days_with_both_movements() {
        let canonical = vec![
            workout(1, (2020, 1, 6), &["run", "burpee"]),
            workout(2, (2020, 1, 7), &["burpee", "run"]),
            workout(3, (2020, 1, 8), &["run"]),
        ];
        let aggs = build(&canonical);
        assert_eq!(aggs.top_pairs.len(), 1);
        assert_eq!(aggs.top_pairs[0].pair, ["burpee".to_string(), "run".to_string()]);
        assert_eq!(aggs.top_pairs[0].days, 2);
    }

    #[test]
    fn duplicate_mentions_count_once_per_day() {
        let canonical = vec![workout(1, (2020, 1, 6), &["run", "run"])];
        let aggs = build(&canonical);
        assert_eq!(aggs.top_movements[0].days, 1);
        assert!(aggs.top_pairs.is_empty());
    }

    #[test]
    fn rest_days_excluded_everywhere() {
        let canonical = vec![
            workout(1, (2020, 1, 6), &["run"]),
            rest_day(2, (2020, 1, 7)),
        ];
        let aggs = build(&canonical);
        assert_eq!(aggs.yearly_counts.get("2020"), Some(&1));
        assert_eq!(aggs.weekday_counts.len(), 1);
        assert_eq!(aggs.weekday_counts.get("Monday"), Some(&1));
    }

    #[test]
    fn top_movements_ordered_by_days_then_name() {
        let canonical = vec![
            workout(1, (2020, 1, 6), &["squat", "burpee"]),
            workout(2, (2020, 1, 7), &["squat"]),
            workout(3, (2020, 1, 8), &["run"]),
        ];
        let aggs = build(&canonical);
        let names: Vec<&str> = aggs.top_movements.iter().map(|m| m.movement.as_str()).collect();
        assert_eq!(names, vec!["squat", "burpee", "run"]);
    }

    #[test]
    fn yearly_and_monthly_breakdowns() {
        let canonical = vec![
            workout(1, (2019, 12, 30), &["run"]),
            workout(2, (2020, 1, 6), &["run"]),
            workout(3, (2020, 1, 13), &["run"]),
        ];
        let aggs = build(&canonical);
        assert_eq!(aggs.movement_yearly["run"]["2019"], 1);
        assert_eq!(aggs.movement_yearly["run"]["2020"], 2);
        assert_eq!(aggs.movement_monthly["run"]["2020"]["01"], 2);
        let entries = &aggs.movement_calendar["run"]["2020"]["01"];
        assert_eq!(entries.len(), 2);
        assert!(entries[0].date < entries[1].date);
    }

    #[test]
    fn rebuild_is_byte_identical() {
        let canonical = vec![
            workout(1, (2020, 1, 6), &["run", "burpee", "squat"]),
            workout(2, (2020, 1, 7), &["squat", "run"]),
        ];
        let a = serde_json::to_string(&build(&canonical)).unwrap();
        let b = serde_json::to_string(&build(&canonical)).unwrap();
        assert_eq!(a, b);
    }
}
