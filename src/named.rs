use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::canonical::CanonicalWorkout;
use crate::catalog::{normalize_name, NamePattern, NamedCatalog};

#[derive(Debug, Clone, Serialize)]
pub struct Occurrence {
    pub date: NaiveDate,
    pub title: String,
    pub link: String,
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct NamedWorkoutRecord {
    pub name: String,
    pub count: usize,
    pub latest_date: NaiveDate,
    pub latest_link: String,
    pub occurrences: Vec<Occurrence>,
}

#[derive(Debug, Serialize)]
pub struct NamedWorkouts {
    pub heroes: Vec<NamedWorkoutRecord>,
    pub girls: Vec<NamedWorkoutRecord>,
}

/// Component headings that never count as a named-workout mention, even when
/// a catalog name appears in them ("Tomorrow: Fran").
const IGNORED_HEADINGS: &[&str] = &[
    "training cycle",
    "upcoming",
    "schedule",
    "news",
    "notes",
    "recap",
    "tomorrow",
];

/// Match every canonical record against the Hero/Girl catalogs and fold the
/// hits into per-name occurrence lists. `latest_date`/`latest_link` are
/// recomputed from the occurrence set, never carried forward.
pub fn build(canonical: &[CanonicalWorkout], catalog: &NamedCatalog) -> NamedWorkouts {
    let mut hero_hits: BTreeMap<String, Vec<Occurrence>> = BTreeMap::new();
    let mut girl_hits: BTreeMap<String, Vec<Occurrence>> = BTreeMap::new();

    for item in canonical {
        let title_lower = item.title.to_lowercase();
        let headings: Vec<String> = item
            .components
            .iter()
            .map(|c| c.heading.to_lowercase())
            .filter(|h| !h.is_empty() && !IGNORED_HEADINGS.iter().any(|ig| h.contains(ig)))
            .collect();

        let entry = Occurrence {
            date: item.date,
            title: item.title.clone(),
            link: item.link.clone(),
            summary: item.summary.clone(),
        };

        for name in &catalog.heroes {
            let title_hit = name.pattern.is_match(&title_lower);
            if !title_hit && !heading_hit(name, &headings) {
                continue;
            }
            // "Murph" is also a common surname around the gym; without a
            // title mention, require the summary to look like the workout.
            if name.norm == "murph" && !title_hit && !looks_like_murph(&item.summary) {
                continue;
            }
            hero_hits.entry(name.name.clone()).or_default().push(entry.clone());
        }

        for name in &catalog.girls {
            if name.pattern.is_match(&title_lower) || heading_hit(name, &headings) {
                girl_hits.entry(name.name.clone()).or_default().push(entry.clone());
            }
        }
    }

    NamedWorkouts {
        heroes: build_records(hero_hits),
        girls: build_records(girl_hits),
    }
}

fn heading_hit(name: &NamePattern, headings: &[String]) -> bool {
    headings.iter().any(|h| normalize_name(h) == name.norm)
}

fn looks_like_murph(summary: &str) -> bool {
    let s = summary.to_lowercase();
    (s.contains("pull") && s.contains("push") && s.contains("squat"))
        || s.contains("1 mile")
        || s.contains("1-mile")
}

fn build_records(hits: BTreeMap<String, Vec<Occurrence>>) -> Vec<NamedWorkoutRecord> {
    let mut records: Vec<NamedWorkoutRecord> = hits
        .into_iter()
        .map(|(name, mut occurrences)| {
            occurrences.sort_by(|a, b| b.date.cmp(&a.date));
            let latest = &occurrences[0];
            NamedWorkoutRecord {
                name,
                count: occurrences.len(),
                latest_date: latest.date,
                latest_link: latest.link.clone(),
                occurrences,
            }
        })
        .collect();
    records.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    records
}
