pub mod html;
pub mod segment;

use chrono::{NaiveDate, NaiveDateTime};

use crate::dates;
use crate::db::RawPostRow;
use segment::Component;

/// Structured view of one post, before classification.
pub struct ParsedPost {
    pub id: i64,
    pub title: String,
    pub link: String,
    /// Publish date from the API.
    pub post_date: Option<NaiveDate>,
    /// Intended workout date (often one day after publishing).
    pub date: Option<NaiveDate>,
    pub cycle_info: Vec<String>,
    pub components: Vec<Component>,
}

/// Per-post pipeline: rendered HTML -> block nodes -> components + metadata.
pub fn process_post(row: &RawPostRow) -> ParsedPost {
    let title = html::clean_text(&html::decode_entities(&row.title));
    let nodes = html::parse_body(&row.content);
    let components = segment::segment(&nodes);

    let post_date = row
        .published
        .as_deref()
        .and_then(parse_wp_datetime)
        .map(|dt| dt.date());
    let date = dates::derive_workout_date(&title, &row.slug, &row.link, post_date);

    let blob = html::nodes_text(&nodes);
    let cycle_info = dates::extract_cycle_info(&format!("{} {}", title, blob));

    ParsedPost {
        id: row.id,
        title,
        link: row.link.clone(),
        post_date,
        date,
        cycle_info,
        components,
    }
}

fn parse_wp_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok()
}
