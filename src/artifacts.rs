use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::aggregates::Aggregates;
use crate::canonical::CanonicalWorkout;
use crate::named::NamedWorkouts;
use crate::tagger::{ComponentTag, Format};

/// Slim per-post row for the client-side search index.
#[derive(Serialize)]
struct SearchRow<'a> {
    id: i64,
    seq_no: u32,
    workout_no: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    milestones: &'a Vec<String>,
    date: NaiveDate,
    title: &'a str,
    link: &'a str,
    summary: &'a str,
    movements: &'a Vec<String>,
    component_tags: &'a Vec<ComponentTag>,
    format: Option<Format>,
    cycle_info: &'a Vec<String>,
}

#[derive(Serialize)]
struct DataVersion {
    generated_at: String,
    total_posts: usize,
    total_workouts: u32,
}

/// Write every derived artifact under `out_dir`. Existing files are
/// overwritten in place; a rebuild from the same corpus is byte-identical.
pub fn write_all(
    out_dir: &Path,
    canonical: &[CanonicalWorkout],
    named: &NamedWorkouts,
    aggregates: &Aggregates,
) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output dir {}", out_dir.display()))?;

    write_jsonl(&out_dir.join("workouts.jsonl"), canonical)?;

    write_pretty(&out_dir.join("top_movements.json"), &aggregates.top_movements)?;
    write_pretty(&out_dir.join("top_pairs.json"), &aggregates.top_pairs)?;
    write_pretty(&out_dir.join("yearly_counts.json"), &aggregates.yearly_counts)?;
    write_pretty(&out_dir.join("weekday_counts.json"), &aggregates.weekday_counts)?;
    write_pretty(&out_dir.join("movement_yearly.json"), &aggregates.movement_yearly)?;
    write_pretty(&out_dir.join("movement_weekday.json"), &aggregates.movement_weekday)?;
    write_pretty(&out_dir.join("movement_monthly.json"), &aggregates.movement_monthly)?;
    write_pretty(&out_dir.join("movement_calendar.json"), &aggregates.movement_calendar)?;

    write_pretty(&out_dir.join("named_workouts.json"), named)?;

    let rows: Vec<SearchRow> = canonical
        .iter()
        .map(|c| SearchRow {
            id: c.id,
            seq_no: c.seq_no,
            workout_no: c.workout_no,
            milestones: &c.milestones,
            date: c.date,
            title: &c.title,
            link: &c.link,
            summary: &c.summary,
            movements: &c.movements,
            component_tags: &c.component_tags,
            format: c.format,
            cycle_info: &c.cycle_info,
        })
        .collect();
    write_compact(&out_dir.join("search_index.json"), &rows)?;

    let version = DataVersion {
        generated_at: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        total_posts: canonical.len(),
        total_workouts: canonical.iter().filter(|c| !c.is_rest_day).count() as u32,
    };
    write_pretty(&out_dir.join("data_version.json"), &version)?;

    info!(dir = %out_dir.display(), posts = canonical.len(), "artifacts written");
    Ok(())
}

fn write_jsonl(path: &Path, canonical: &[CanonicalWorkout]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(file);
    for item in canonical {
        serde_json::to_writer(&mut w, item)?;
        w.write_all(b"\n")?;
    }
    w.flush().with_context(|| format!("writing {}", path.display()))
}

fn write_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_vec_pretty(value)?;
    json.push(b'\n');
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

fn write_compact<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec(value)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregates;
    use crate::catalog::parse_named;
    use crate::named;

    fn sample() -> Vec<CanonicalWorkout> {
        vec![CanonicalWorkout {
            id: 1,
            date: NaiveDate::from_ymd_opt(2020, 1, 6).unwrap(),
            post_date: None,
            title: "Fran".to_string(),
            link: "https://example.com/1/".to_string(),
            seq_no: 1,
            workout_no: Some(1),
            is_rest_day: false,
            components: Vec::new(),
            component_tags: vec![ComponentTag::Conditioning],
            movements: vec!["thruster".to_string(), "pull-up".to_string()],
            format: Some(Format::ForTime),
            cycle_info: Vec::new(),
            summary: "21-15-9".to_string(),
            comment_count: 3,
            milestones: vec!["1st workout".to_string()],
        }]
    }

    #[test]
    fn all_artifacts_written() {
        let dir = std::env::temp_dir().join(format!("wod_etl_artifacts_{}", std::process::id()));
        let canonical = sample();
        let cat = parse_named("heroes = []\ngirls = [\"fran\"]").unwrap();
        let named = named::build(&canonical, &cat);
        let aggs = aggregates::build(&canonical);
        write_all(&dir, &canonical, &named, &aggs).unwrap();

        for name in [
            "workouts.jsonl",
            "top_movements.json",
            "top_pairs.json",
            "yearly_counts.json",
            "weekday_counts.json",
            "movement_yearly.json",
            "movement_weekday.json",
            "movement_monthly.json",
            "movement_calendar.json",
            "named_workouts.json",
            "search_index.json",
            "data_version.json",
        ] {
            assert!(dir.join(name).exists(), "missing {}", name);
        }

        let jsonl = fs::read_to_string(dir.join("workouts.jsonl")).unwrap();
        assert_eq!(jsonl.lines().count(), 1);
        let row: serde_json::Value = serde_json::from_str(jsonl.lines().next().unwrap()).unwrap();
        assert_eq!(row["seq_no"], 1);

        let index: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join("search_index.json")).unwrap())
                .unwrap();
        assert_eq!(index[0]["title"], "Fran");
        assert!(index[0].get("components").is_none());

        fs::remove_dir_all(&dir).unwrap();
    }
}
