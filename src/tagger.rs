use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::catalog::MovementCatalog;
use crate::filter;
use crate::parser::segment::Component;

static MOVEMENT_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(press|squat|deadlift|clean|snatch|row|run|bike|burpee|swing|pull[- ]?up|push[- ]?up)")
        .unwrap()
});
static CALORIES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bcal(?:ories)?\b").unwrap());
static DIGIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").unwrap());
static REP_MOVEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(row|run|bike|burpee|squat|deadlift|snatch|clean|press|pull[- ]?up|push[- ]?up|thruster|swing)")
        .unwrap()
});
static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());

/// Closed component vocabulary; everything downstream matches exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentTag {
    Strength,
    Conditioning,
    Assistance,
    Partner,
    Other,
}

pub fn component_tag(heading: &str) -> ComponentTag {
    let h = heading.to_lowercase();
    if h.contains("strength") {
        ComponentTag::Strength
    } else if h.contains("assistance") || h.contains("accessory") || h.contains("bodybuilding") {
        ComponentTag::Assistance
    } else if h.contains("metcon") || h.contains("conditioning") || h.contains("workout") {
        ComponentTag::Conditioning
    } else if h.contains("partner") || h.contains("team") {
        ComponentTag::Partner
    } else {
        ComponentTag::Other
    }
}

/// Headings that name scheduling/news scaffolding rather than a workout
/// element, regardless of what their body text mentions.
const IGNORED_HEADINGS: &[&str] = &[
    "training cycle",
    "upcoming",
    "schedule",
    "news",
    "notes",
    "recap",
    "tomorrow",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

pub fn is_workout_component(heading: &str) -> bool {
    let norm = NON_WORD_RE.replace_all(&heading.to_lowercase(), " ").into_owned();
    if IGNORED_HEADINGS.iter().any(|k| norm.contains(k)) {
        return false;
    }
    if component_tag(heading) != ComponentTag::Other {
        return true;
    }
    if MOVEMENT_WORD_RE.is_match(&norm) {
        return true;
    }
    ["wod", "workout", "metcon", "conditioning", "cash out", "buy in", "cash-out", "cashout"]
        .iter()
        .any(|k| norm.contains(k))
}

/// Body text that reads like an actual workout even when its heading is
/// unrecognizable (old posts use all sorts of headings).
pub fn details_look_like_workout(details: &str) -> bool {
    if details.is_empty() {
        return false;
    }
    let d = details.to_lowercase();
    if ["amrap", "for time", "emom", "every", "interval", "tabata"]
        .iter()
        .any(|k| d.contains(k))
    {
        return true;
    }
    if CALORIES_RE.is_match(&d) && (d.contains("bike") || d.contains("row")) {
        return true;
    }
    DIGIT_RE.is_match(&d) && REP_MOVEMENT_RE.is_match(&d)
}

/// Text blob eligible for movement matching: the filtered details of every
/// workout-looking component. Posts where nothing looks like a workout fall
/// back to all components so a movement is never lost to a quirky heading.
pub fn movement_text(components: &[Component]) -> String {
    let workout: Vec<&Component> = components
        .iter()
        .filter(|c| is_workout_component(&c.heading) || details_look_like_workout(&c.details))
        .collect();
    let source: Vec<&Component> = if workout.is_empty() {
        components.iter().collect()
    } else {
        workout
    };

    let filtered: Vec<String> = source
        .iter()
        .map(|c| filter::filter_details(&c.details))
        .filter(|t| !t.is_empty())
        .collect();
    if !filtered.is_empty() {
        return filtered.join(" ").replace('\n', " ");
    }
    source
        .iter()
        .map(|c| c.details.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\n', " ")
}

/// One catalog hit, carrying the pattern that produced it so a surprising
/// tag can be traced back to its rule.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementHit {
    pub name: String,
    pub pattern: String,
}

/// Apply the movement catalog to lowercased text. A rule whose exclude
/// patterns hit is suppressed; names dedup in catalog order.
pub fn match_movements(text: &str, catalog: &MovementCatalog) -> Vec<MovementHit> {
    let mut found: Vec<MovementHit> = Vec::new();
    for rule in &catalog.rules {
        if found.iter().any(|h| h.name == rule.name) {
            continue;
        }
        if rule.excludes.iter().any(|r| r.is_match(text)) {
            continue;
        }
        if let Some(re) = rule.patterns.iter().find(|r| r.is_match(text)) {
            found.push(MovementHit {
                name: rule.name.clone(),
                pattern: re.as_str().to_string(),
            });
        }
    }
    found
}

pub fn tag_movements(text: &str, catalog: &MovementCatalog) -> Vec<String> {
    match_movements(text, catalog)
        .into_iter()
        .map(|h| h.name)
        .collect()
}

/// Rest-day detection: an explicit title always wins; otherwise "rest day"
/// must appear early in the post (whiteboard recaps mention it constantly)
/// and the intro must not itself read like a workout.
pub fn is_rest_day(components: &[Component], title: &str) -> bool {
    if title.to_lowercase().contains("rest day") {
        return true;
    }
    let intro = components
        .iter()
        .take(2)
        .map(|c| format!("{} {}", c.heading, c.details))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if !intro.contains("rest day") {
        return false;
    }
    !details_look_like_workout(&intro)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Format {
    #[serde(rename = "amrap")]
    Amrap,
    #[serde(rename = "for time")]
    ForTime,
    #[serde(rename = "emom")]
    Emom,
    #[serde(rename = "interval")]
    Interval,
}

const FORMAT_KEYWORDS: &[(&str, Format)] = &[
    ("amrap", Format::Amrap),
    ("for time", Format::ForTime),
    ("emom", Format::Emom),
    ("every minute", Format::Emom),
    ("interval", Format::Interval),
    ("tabata", Format::Interval),
];

/// Earliest format keyword in document order wins; a later keyword never
/// overrides an earlier one even if it is "stronger".
pub fn detect_format(text: &str) -> Option<Format> {
    FORMAT_KEYWORDS
        .iter()
        .filter_map(|(kw, fmt)| text.find(kw).map(|pos| (pos, *fmt)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, fmt)| fmt)
}

/// Short UI blurb: lines that look like rep schemes, prefixed with their
/// component heading. Falls back to the first component's opening text.
pub fn extract_rep_scheme(components: &[Component]) -> String {
    const KEYWORDS: &[&str] = &[
        "amrap", "for time", "emom", "every", "round", "rounds", "minutes", "minute",
    ];
    let mut lines: Vec<String> = Vec::new();
    for comp in components {
        for line in comp.details.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let lc = line.to_lowercase();
            if KEYWORDS.iter().any(|k| lc.contains(k)) || DIGIT_RE.is_match(line) {
                let entry = format!("{}: {}", comp.heading, line);
                lines.push(entry.trim_matches([':', ' ']).to_string());
            }
        }
    }
    if !lines.is_empty() {
        return truncate_chars(&lines.join(" | "), 400);
    }
    if let Some(first) = components.first() {
        return truncate_chars(&format!("{}: {}", first.heading, first.details), 200);
    }
    String::new()
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::parse_movements;

    fn comp(heading: &str, details: &str) -> Component {
        Component {
            level: 3,
            heading: heading.to_string(),
            details: details.to_string(),
        }
    }

    fn mini_catalog() -> MovementCatalog {
        parse_movements(
            r#"
            [[movement]]
            name = "row"
            patterns = ['\brow(s|ing|ed)?\b']

            [[movement]]
            name = "deadlift"
            patterns = ['\bdead\s?lifts?\b']
            excludes = ['\bclean deadlifts?\b', '\bsnatch deadlifts?\b']

            [[movement]]
            name = "kettlebell swing"
            patterns = ['\bkettlebell swings?\b', '\bkb swings?\b']

            [[movement]]
            name = "burpee"
            patterns = ['\bburpees?\b']
        "#,
        )
        .unwrap()
    }

    #[test]
    fn component_tag_vocabulary() {
        assert_eq!(component_tag("Strength"), ComponentTag::Strength);
        assert_eq!(component_tag("Floater Strength"), ComponentTag::Strength);
        assert_eq!(component_tag("Conditioning"), ComponentTag::Conditioning);
        assert_eq!(component_tag("Metcon"), ComponentTag::Conditioning);
        assert_eq!(component_tag("Accessory Work"), ComponentTag::Assistance);
        assert_eq!(component_tag("Partner WOD"), ComponentTag::Partner);
        assert_eq!(component_tag("Community News"), ComponentTag::Other);
    }

    #[test]
    fn word_boundaries_hold() {
        let catalog = mini_catalog();
        assert_eq!(tag_movements("500m row for time", &catalog), vec!["row"]);
        assert!(tag_movements("shoot an arrow and throw it", &catalog).is_empty());
    }

    #[test]
    fn excludes_suppress_rule() {
        let catalog = mini_catalog();
        assert!(tag_movements("3x3 clean deadlift", &catalog).is_empty());
        assert_eq!(tag_movements("3x3 deadlift", &catalog), vec!["deadlift"]);
    }

    #[test]
    fn hits_carry_matching_pattern() {
        let catalog = mini_catalog();
        let hits = match_movements("500m row", &catalog);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "row");
        assert_eq!(hits[0].pattern, r"\brow(s|ing|ed)?\b");
    }

    #[test]
    fn synonyms_dedup_to_canonical_name() {
        let catalog = mini_catalog();
        let tags = tag_movements("kb swings then kettlebell swings", &catalog);
        assert_eq!(tags, vec!["kettlebell swing"]);
    }

    #[test]
    fn filtered_future_text_not_tagged() {
        let catalog = mini_catalog();
        let components = vec![comp(
            "Conditioning",
            "Today: kettlebell swings. Tomorrow: burpees.",
        )];
        let text = movement_text(&components).to_lowercase();
        let tags = tag_movements(&text, &catalog);
        assert_eq!(tags, vec!["kettlebell swing"]);
    }

    #[test]
    fn promo_deadlift_not_tagged() {
        let catalog = mini_catalog();
        let components = vec![
            comp("Conditioning", "AMRAP 12: 10 kb swings"),
            comp("Iron Maidens", "Registration will open for the deadlift meet"),
        ];
        let text = movement_text(&components).to_lowercase();
        let tags = tag_movements(&text, &catalog);
        assert_eq!(tags, vec!["kettlebell swing"]);
    }

    #[test]
    fn schedule_heading_not_a_workout() {
        assert!(!is_workout_component("Next Training Cycle"));
        assert!(!is_workout_component("Saturday Schedule"));
        assert!(is_workout_component("Conditioning"));
        assert!(is_workout_component("Back Squat"));
        assert!(is_workout_component("Cash Out"));
    }

    #[test]
    fn workout_detected_by_details() {
        assert!(details_look_like_workout("21-15-9 thrusters and pull-ups"));
        assert!(details_look_like_workout("30 cal bike"));
        assert!(!details_look_like_workout("see you at the potluck"));
    }

    #[test]
    fn rest_day_by_title() {
        assert!(is_rest_day(&[], "Rest Day 5/7/23"));
    }

    #[test]
    fn rest_day_in_intro() {
        let components = vec![comp("Workout", "Rest Day. Come stretch at noon.")];
        assert!(is_rest_day(&components, "5/7/23"));
    }

    #[test]
    fn whiteboard_rest_mention_is_not_rest_day() {
        let components = vec![
            comp("Conditioning", "5 rounds for time: 10 burpees, 200m run"),
            comp("News", "Yesterday's Whiteboard: Rest Day"),
        ];
        assert!(!is_rest_day(&components, "5/8/23"));
    }

    #[test]
    fn format_first_match_wins() {
        assert_eq!(detect_format("amrap 12 then for time"), Some(Format::Amrap));
        assert_eq!(detect_format("21-15-9 for time. amrap cash out"), Some(Format::ForTime));
        assert_eq!(detect_format("every minute on the minute"), Some(Format::Emom));
        assert_eq!(detect_format("tabata squats"), Some(Format::Interval));
        assert_eq!(detect_format("5x5 back squat"), None);
    }

    #[test]
    fn rep_scheme_summary() {
        let components = vec![
            comp("Strength", "Back Squat 5x5\nheavier than last week"),
            comp("Conditioning", "AMRAP 12:\n10 swings"),
        ];
        let summary = extract_rep_scheme(&components);
        assert!(summary.starts_with("Strength: Back Squat 5x5"));
        assert!(summary.contains("Conditioning: AMRAP 12"));
        assert!(!summary.contains("heavier than last week"));
    }

    #[test]
    fn rep_scheme_fallback_truncates() {
        let components = vec![comp("Workout", &"no numbers here ".repeat(40))];
        let summary = extract_rep_scheme(&components);
        assert_eq!(summary.chars().count(), 200);
    }
}
