use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::catalog::MovementCatalog;
use crate::filter;
use crate::parser::ParsedPost;
use crate::tagger::{self, ComponentTag, Format};

/// A component with its classified tag, in document order. `level` is the
/// source heading depth (0 for whole-body fallback posts).
#[derive(Debug, Clone, Serialize)]
pub struct TaggedComponent {
    pub tag: ComponentTag,
    pub level: u8,
    pub heading: String,
    pub details: String,
}

/// The analytics-ready record for one post. Immutable once built; every
/// aggregate downstream is recomputed from the full set.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalWorkout {
    pub id: i64,
    pub date: NaiveDate,
    pub post_date: Option<NaiveDate>,
    pub title: String,
    pub link: String,
    /// 1-based position over all posts, date-ascending.
    pub seq_no: u32,
    /// Same ordering, counting only non-rest-day posts.
    pub workout_no: Option<u32>,
    pub is_rest_day: bool,
    pub components: Vec<TaggedComponent>,
    pub component_tags: Vec<ComponentTag>,
    pub movements: Vec<String>,
    pub format: Option<Format>,
    pub cycle_info: Vec<String>,
    pub summary: String,
    pub comment_count: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub milestones: Vec<String>,
}

/// A post that cannot be placed in the sequence (no derivable date).
#[derive(Debug)]
pub struct SkippedPost {
    pub id: i64,
    pub title: String,
    pub reason: String,
}

pub struct BuildOutput {
    pub canonical: Vec<CanonicalWorkout>,
    pub skipped: Vec<SkippedPost>,
}

const MILESTONE_THRESHOLDS: &[u32] = &[1, 500, 1000, 2500, 5000];

pub fn build(
    parsed: Vec<ParsedPost>,
    movements: &MovementCatalog,
    comment_counts: &HashMap<i64, u32>,
) -> BuildOutput {
    let mut canonical: Vec<CanonicalWorkout> = Vec::with_capacity(parsed.len());
    let mut skipped: Vec<SkippedPost> = Vec::new();

    for post in parsed {
        let Some(date) = post.date else {
            skipped.push(SkippedPost {
                id: post.id,
                title: post.title,
                reason: "no derivable date".to_string(),
            });
            continue;
        };
        canonical.push(classify(post, date, movements, comment_counts));
    }

    canonical.sort_by(|a, b| (a.date, a.id).cmp(&(b.date, b.id)));

    let mut workout_no = 0u32;
    for (idx, item) in canonical.iter_mut().enumerate() {
        item.seq_no = idx as u32 + 1;
        if item.is_rest_day {
            item.workout_no = None;
        } else {
            workout_no += 1;
            item.workout_no = Some(workout_no);
        }
    }

    let total_workouts = workout_no;
    let mut targets: BTreeSet<u32> = MILESTONE_THRESHOLDS
        .iter()
        .copied()
        .filter(|t| *t <= total_workouts)
        .collect();
    if total_workouts > 0 {
        targets.insert(total_workouts);
    }
    for item in &mut canonical {
        if let Some(wn) = item.workout_no {
            if targets.contains(&wn) {
                item.milestones.push(format!("{} workout", ordinal(wn)));
            }
        }
    }

    BuildOutput { canonical, skipped }
}

fn classify(
    post: ParsedPost,
    date: NaiveDate,
    movements: &MovementCatalog,
    comment_counts: &HashMap<i64, u32>,
) -> CanonicalWorkout {
    let rest_day = tagger::is_rest_day(&post.components, &post.title);
    let summary = tagger::extract_rep_scheme(&post.components);

    let components: Vec<TaggedComponent> = post
        .components
        .iter()
        .map(|c| TaggedComponent {
            tag: tagger::component_tag(&c.heading),
            level: c.level,
            heading: c.heading.clone(),
            details: c.details.clone(),
        })
        .collect();
    let component_tags: Vec<ComponentTag> = components
        .iter()
        .map(|c| c.tag)
        .filter(|t| *t != ComponentTag::Other)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let (tagged_movements, format) = if rest_day {
        (Vec::new(), None)
    } else {
        // Title text is always eligible; component text goes through the
        // exclusion pipeline first.
        let source = format!("{} {}", post.title, tagger::movement_text(&post.components));
        let source = source.to_lowercase();
        let tagged = tagger::tag_movements(&source, movements);

        // Format: the conditioning piece is authoritative when present.
        let conditioning = components
            .iter()
            .filter(|c| c.tag == ComponentTag::Conditioning)
            .map(|c| filter::filter_details(&c.details))
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let format =
            tagger::detect_format(&conditioning).or_else(|| tagger::detect_format(&source));
        (tagged, format)
    };

    CanonicalWorkout {
        id: post.id,
        date,
        post_date: post.post_date,
        title: post.title,
        link: post.link,
        seq_no: 0,
        workout_no: None,
        is_rest_day: rest_day,
        components,
        component_tags,
        movements: tagged_movements,
        format,
        cycle_info: post.cycle_info,
        summary,
        comment_count: comment_counts.get(&post.id).copied().unwrap_or(0),
        milestones: Vec::new(),
    }
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}
