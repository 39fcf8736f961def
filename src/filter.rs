use std::sync::LazyLock;

use regex::Regex;

// Separator runs and recurring boilerplate phrases that older posts use to
// glue several workout sections into one block. Normalized to line breaks so
// the text after them is still scanned.
static UNDERSCORE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*_{3,}\s*").unwrap());
static HYPHEN_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*-{3,}\s*").unwrap());
static POST_LOADS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bpost\s+(?:loads?|work|times?)\s+to\s+comments\.?").unwrap());
static POST_TO_COMMENTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bpost\s+to\s+comments\.?").unwrap());
static EXPOSURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bexposure\s+\d+\s+of\s+\d+\b").unwrap());

static SEPARATOR_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[_\-\s]+$").unwrap());
// The trim rules below match on the raw line so the offsets they produce are
// valid byte indices into it; lowercasing can change byte lengths.
static POST_COMMENTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)post\s+.*comments").unwrap());
static POST_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)post").unwrap());
static EXPOSURE_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)exposure").unwrap());
static NUMBERED_QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.").unwrap());
static WEEKS_TEMPLATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"weeks\s+1-2").unwrap());

/// Lines mentioning an upcoming session rather than today's work.
const FUTURE_MARKERS: &[&str] = &[
    "tomorrow",
    "next week",
    "next day",
    "next cycle",
    "tomorrows",
    "training cycle",
    "our new cycle starts",
    "monday:",
    "tuesday:",
    "wednesday:",
    "thursday:",
    "friday:",
    "saturday:",
    "sunday:",
];

/// Recurring promotional blurbs; once one appears, the rest of the component
/// is sponsor/series copy rather than workout text.
const PROMO_MARKERS: &[&str] = &[
    "pull for pride",
    "east coast gambit",
    "iron maidens",
    "registration will open",
    "next level weightlifting",
    "subway series",
    "our new cycle starts",
    "training cycle dates",
    "goals:",
];

/// What a rule decides about one line.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Keep,
    Drop,
    /// Keep only this subset of the line and move on.
    Rewrite(String),
    /// Drop the line and everything after it in this component.
    Stop,
}

pub struct LineCtx<'a> {
    pub raw: &'a str,
    /// Lowercased raw line. Not byte-aligned with `raw`; rules that cut the
    /// raw line must find their offsets on `raw` itself.
    pub lower: String,
    /// Lowercased, nbsp/apostrophe-normalized, whitespace-collapsed.
    pub norm: String,
}

impl<'a> LineCtx<'a> {
    fn new(raw: &'a str) -> Self {
        let lower = raw.to_lowercase();
        let norm = lower
            .replace('\u{a0}', " ")
            .replace(['\u{2019}', '\u{2018}'], "'")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        LineCtx { raw, lower, norm }
    }
}

pub struct LineRule {
    pub name: &'static str,
    pub apply: fn(&LineCtx) -> Option<Verdict>,
}

/// The exclusion pipeline, in evaluation order. First rule that has an
/// opinion wins; a line no rule touches is kept.
pub const RULES: &[LineRule] = &[
    LineRule {
        name: "separator_only",
        apply: |line| SEPARATOR_ONLY_RE.is_match(&line.norm).then_some(Verdict::Drop),
    },
    LineRule {
        name: "future_note",
        apply: future_note,
    },
    LineRule {
        name: "trivia",
        apply: |line| {
            let is_question_item =
                NUMBERED_QUESTION_RE.is_match(line.norm.trim()) && line.raw.contains('?');
            (line.lower.contains("trivia") || is_question_item).then_some(Verdict::Drop)
        },
    },
    LineRule {
        name: "promo_break",
        apply: |line| {
            PROMO_MARKERS
                .iter()
                .any(|m| line.norm.contains(m))
                .then_some(Verdict::Stop)
        },
    },
    LineRule {
        name: "post_to_comments",
        apply: |line| {
            let m = POST_COMMENTS_RE.find(line.raw)?;
            Some(trim_to_prefix(line.raw, m.start()))
        },
    },
    LineRule {
        name: "post_and_comments",
        apply: |line| {
            if line.norm.contains("post") && line.norm.contains("comments") {
                let cut = POST_WORD_RE.find(line.raw).map_or(0, |m| m.start());
                Some(trim_to_prefix(line.raw, cut))
            } else {
                None
            }
        },
    },
    LineRule {
        name: "cycle_template",
        apply: |line| WEEKS_TEMPLATE_RE.is_match(&line.norm).then_some(Verdict::Stop),
    },
    LineRule {
        name: "exposure",
        apply: |line| {
            let m = EXPOSURE_WORD_RE.find(line.raw)?;
            Some(trim_to_prefix(line.raw, m.start()))
        },
    },
    LineRule {
        name: "whiteboard_recap",
        apply: |line| {
            (line.norm.contains("whiteboard") && line.norm.contains("yesterday"))
                .then_some(Verdict::Drop)
        },
    },
];

fn trim_to_prefix(raw: &str, cut: usize) -> Verdict {
    let prefix = raw[..cut].trim();
    if prefix.is_empty() {
        Verdict::Drop
    } else {
        Verdict::Rewrite(prefix.to_string())
    }
}

/// Future-looking lines lose only the sentences that mention the future
/// session; the rest of the line stays eligible. Biased toward recall: a
/// clean line is untouched, and a mixed line keeps its non-future sentences.
fn future_note(line: &LineCtx) -> Option<Verdict> {
    if !FUTURE_MARKERS.iter().any(|m| line.norm.contains(m)) {
        return None;
    }
    let kept: Vec<&str> = split_sentences(line.raw)
        .into_iter()
        .filter(|s| {
            let s_norm = LineCtx::new(s).norm;
            !FUTURE_MARKERS.iter().any(|m| s_norm.contains(m))
        })
        .collect();
    if kept.is_empty() {
        Some(Verdict::Drop)
    } else {
        Some(Verdict::Rewrite(kept.join(" ").trim().to_string()))
    }
}

fn split_sentences(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if matches!(bytes[i], b'.' | b'!' | b'?' | b';')
            && bytes.get(i + 1).map_or(true, |b| b.is_ascii_whitespace())
        {
            let s = text[start..=i].trim();
            if !s.is_empty() {
                sentences.push(s);
            }
            start = i + 1;
        }
        i += 1;
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Normalize separator boilerplate into line breaks so the text on either
/// side is evaluated independently.
pub fn normalize_separators(details: &str) -> String {
    let s = UNDERSCORE_RUN_RE.replace_all(details, "\n");
    let s = HYPHEN_RUN_RE.replace_all(&s, "\n");
    let s = POST_LOADS_RE.replace_all(&s, "\n");
    let s = POST_TO_COMMENTS_RE.replace_all(&s, "\n");
    EXPOSURE_RE.replace_all(&s, "\n").into_owned()
}

/// Run the pipeline over a component's details and return the text that is
/// eligible for movement matching.
pub fn filter_details(details: &str) -> String {
    let normalized = normalize_separators(details);
    let mut kept: Vec<String> = Vec::new();

    'lines: for raw_line in normalized.lines() {
        let raw_line = raw_line.trim();
        if raw_line.is_empty() {
            continue;
        }
        let ctx = LineCtx::new(raw_line);
        for rule in RULES {
            match (rule.apply)(&ctx) {
                None => continue,
                Some(Verdict::Keep) => break,
                Some(Verdict::Drop) => continue 'lines,
                Some(Verdict::Rewrite(text)) => {
                    if !text.is_empty() {
                        kept.push(text);
                    }
                    continue 'lines;
                }
                Some(Verdict::Stop) => break 'lines,
            }
        }
        kept.push(raw_line.to_string());
    }

    kept.join("\n")
}
