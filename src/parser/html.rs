use std::sync::LazyLock;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use tracing::debug;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap());
static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#x?[0-9A-Fa-f]+|[A-Za-z][A-Za-z0-9]*);").unwrap());

/// Block-level view of a rendered post body. Inline markup is dissolved into
/// its surrounding text; each block element becomes one `Text` node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Heading { level: u8, text: String },
    Text(String),
    Rule,
}

/// Parse rendered WordPress HTML into block nodes. Rendered bodies are mostly
/// well-formed, but old posts are not guaranteed to be; a body the event
/// reader cannot handle degrades to a single tag-stripped text node rather
/// than failing the post.
pub fn parse_body(html: &str) -> Vec<Node> {
    match parse_events(html) {
        Ok(nodes) => nodes,
        Err(e) => {
            debug!("event parse failed ({}), stripping tags instead", e);
            let blob = clean_text(&strip_tags(html));
            if blob.is_empty() {
                Vec::new()
            } else {
                vec![Node::Text(blob)]
            }
        }
    }
}

fn parse_events(html: &str) -> Result<Vec<Node>, quick_xml::Error> {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut nodes: Vec<Node> = Vec::new();
    let mut text = String::new();
    let mut heading: Option<(u8, String)> = None;
    let mut skip_depth = 0usize;

    fn flush(nodes: &mut Vec<Node>, text: &mut String) {
        let cleaned = clean_text(text);
        if !cleaned.is_empty() {
            nodes.push(Node::Text(cleaned));
        }
        text.clear();
    }

    fn close_heading(nodes: &mut Vec<Node>, heading: &mut Option<(u8, String)>) {
        if let Some((level, buf)) = heading.take() {
            let cleaned = clean_text(&buf);
            // Decorative headings (icons, empty anchors) produce no node at all.
            if !cleaned.is_empty() {
                nodes.push(Node::Heading {
                    level,
                    text: cleaned,
                });
            }
        }
    }

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.local_name();
                let name = name.as_ref();
                if is_skipped_tag(name) {
                    skip_depth += 1;
                    continue;
                }
                if skip_depth > 0 {
                    continue;
                }
                if let Some(level) = heading_level(name) {
                    flush(&mut nodes, &mut text);
                    close_heading(&mut nodes, &mut heading);
                    heading = Some((level, String::new()));
                } else if name == b"hr" {
                    flush(&mut nodes, &mut text);
                    close_heading(&mut nodes, &mut heading);
                    nodes.push(Node::Rule);
                } else if is_block_tag(name) {
                    flush(&mut nodes, &mut text);
                }
            }
            Event::End(e) => {
                let name = e.local_name();
                let name = name.as_ref();
                if is_skipped_tag(name) {
                    skip_depth = skip_depth.saturating_sub(1);
                    continue;
                }
                if skip_depth > 0 {
                    continue;
                }
                if heading_level(name).is_some() {
                    close_heading(&mut nodes, &mut heading);
                } else if is_block_tag(name) {
                    flush(&mut nodes, &mut text);
                }
            }
            Event::Text(e) => {
                if skip_depth > 0 {
                    continue;
                }
                let raw = String::from_utf8_lossy(&e);
                let decoded = decode_entities(&raw);
                match &mut heading {
                    Some((_, buf)) => buf.push_str(&decoded),
                    None => text.push_str(&decoded),
                }
            }
            Event::CData(e) => {
                if skip_depth > 0 {
                    continue;
                }
                let raw = String::from_utf8_lossy(&e);
                match &mut heading {
                    Some((_, buf)) => buf.push_str(&raw),
                    None => text.push_str(&raw),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    flush(&mut nodes, &mut text);
    close_heading(&mut nodes, &mut heading);
    Ok(nodes)
}

fn heading_level(name: &[u8]) -> Option<u8> {
    match name {
        b"h1" => Some(1),
        b"h2" => Some(2),
        b"h3" => Some(3),
        b"h4" => Some(4),
        b"h5" => Some(5),
        b"h6" => Some(6),
        _ => None,
    }
}

fn is_block_tag(name: &[u8]) -> bool {
    matches!(
        name,
        b"p" | b"div"
            | b"br"
            | b"li"
            | b"ul"
            | b"ol"
            | b"table"
            | b"thead"
            | b"tbody"
            | b"tr"
            | b"blockquote"
            | b"figure"
            | b"figcaption"
            | b"section"
            | b"article"
            | b"pre"
    )
}

fn is_skipped_tag(name: &[u8]) -> bool {
    matches!(name, b"script" | b"style")
}

/// Join all node text in document order, one line per block.
pub fn nodes_text(nodes: &[Node]) -> String {
    nodes
        .iter()
        .filter_map(|n| match n {
            Node::Heading { text, .. } => Some(text.as_str()),
            Node::Text(t) => Some(t.as_str()),
            Node::Rule => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse whitespace (including non-breaking spaces) inside a string.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_tags(html: &str) -> String {
    let no_scripts = SCRIPT_RE.replace_all(html, " ");
    let no_tags = TAG_RE.replace_all(&no_scripts, " ");
    decode_entities(&no_tags)
}

/// Resolve the handful of entities WordPress actually emits. Unknown names
/// are left as-is so no text is silently dropped.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures| resolve_entity(&caps[1]))
        .into_owned()
}

fn resolve_entity(name: &str) -> String {
    if let Some(num) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        if let Ok(code) = u32::from_str_radix(num, 16) {
            if let Some(c) = char::from_u32(code) {
                return c.to_string();
            }
        }
    } else if let Some(num) = name.strip_prefix('#') {
        if let Ok(code) = num.parse::<u32>() {
            if let Some(c) = char::from_u32(code) {
                return c.to_string();
            }
        }
    }
    match name {
        "amp" => "&".to_string(),
        "lt" => "<".to_string(),
        "gt" => ">".to_string(),
        "quot" => "\"".to_string(),
        "apos" => "'".to_string(),
        "nbsp" => " ".to_string(),
        "ndash" => "\u{2013}".to_string(),
        "mdash" => "\u{2014}".to_string(),
        "hellip" => "\u{2026}".to_string(),
        "lsquo" => "\u{2018}".to_string(),
        "rsquo" => "\u{2019}".to_string(),
        "ldquo" => "\u{201C}".to_string(),
        "rdquo" => "\u{201D}".to_string(),
        "times" => "\u{00D7}".to_string(),
        _ => format!("&{};", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_and_paragraphs() {
        let nodes = parse_body("<h2>Workout of the Day</h2><p>Run 5k</p><p>Then rest</p>");
        assert_eq!(
            nodes,
            vec![
                Node::Heading {
                    level: 2,
                    text: "Workout of the Day".into()
                },
                Node::Text("Run 5k".into()),
                Node::Text("Then rest".into()),
            ]
        );
    }

    #[test]
    fn inline_markup_dissolves() {
        let nodes = parse_body("<p>10 <strong>burpees</strong> and 20 <em>squats</em></p>");
        assert_eq!(nodes, vec![Node::Text("10 burpees and 20 squats".into())]);
    }

    #[test]
    fn hr_becomes_rule() {
        let nodes = parse_body("<p>work</p><hr/><p>blog</p>");
        assert_eq!(
            nodes,
            vec![
                Node::Text("work".into()),
                Node::Rule,
                Node::Text("blog".into())
            ]
        );
    }

    #[test]
    fn empty_heading_skipped() {
        let nodes = parse_body("<h3></h3><p>text</p>");
        assert_eq!(nodes, vec![Node::Text("text".into())]);
    }

    #[test]
    fn entities_decoded() {
        let nodes = parse_body("<p>Yesterday&#8217;s work &amp; today&rsquo;s</p>");
        assert_eq!(
            nodes,
            vec![Node::Text("Yesterday\u{2019}s work & today\u{2019}s".into())]
        );
    }

    #[test]
    fn nbsp_collapses_to_space() {
        let nodes = parse_body("<p>5&nbsp;rounds</p>");
        assert_eq!(nodes, vec![Node::Text("5 rounds".into())]);
    }

    #[test]
    fn script_content_ignored() {
        let nodes = parse_body("<script>var amrap = 1;</script><p>Deadlift 3x5</p>");
        assert_eq!(nodes, vec![Node::Text("Deadlift 3x5".into())]);
    }

    #[test]
    fn unclosed_br_tags_survive() {
        let nodes = parse_body("<p>Row 500m<br>Rest 1:00<br>Repeat</p>");
        let texts: Vec<_> = nodes
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["Row 500m", "Rest 1:00", "Repeat"]);
    }

    #[test]
    fn plain_text_body() {
        let nodes = parse_body("just some text, no markup");
        assert_eq!(nodes, vec![Node::Text("just some text, no markup".into())]);
    }

    #[test]
    fn strip_tags_fallback_keeps_content() {
        let blob = clean_text(&strip_tags("<p>Back <b>Squat</b> &amp; press</p>"));
        assert_eq!(blob, "Back Squat & press");
    }
}
