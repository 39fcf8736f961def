use super::html::Node;

const ANCHOR_TEXT: &str = "workout of the day";

/// One labeled section of a post body: heading text plus the block text that
/// follows it, one line per block.
#[derive(Debug, Clone)]
pub struct Component {
    pub level: u8,
    pub heading: String,
    pub details: String,
}

/// Split a post body into workout components.
///
/// Preferred path: find the "Workout of the Day" anchor heading and treat
/// every deeper heading under it as a component boundary, until a heading at
/// the anchor's level (or above) closes the section. Older posts rarely have
/// the anchor, so fall back to any-heading sections, and finally to the whole
/// body as a single "Workout" component so nothing is dropped.
pub fn segment(nodes: &[Node]) -> Vec<Component> {
    if let Some((anchor_idx, anchor_level)) = find_anchor(nodes) {
        let components = collect_components(&nodes[anchor_idx + 1..], |level, text| {
            level <= anchor_level && !text.to_lowercase().contains(ANCHOR_TEXT)
        });
        if !components.is_empty() {
            return components;
        }
        return whole_body_fallback(nodes);
    }

    let components = collect_components(nodes, |_, _| false);
    if !components.is_empty() {
        return components;
    }
    whole_body_fallback(nodes)
}

fn find_anchor(nodes: &[Node]) -> Option<(usize, u8)> {
    nodes.iter().enumerate().find_map(|(i, n)| match n {
        Node::Heading { level, text } if matches!(level, 2 | 3) => {
            text.to_lowercase().contains(ANCHOR_TEXT).then_some((i, *level))
        }
        _ => None,
    })
}

/// Walk nodes, opening a component at each non-empty heading and gathering
/// text until the next heading or rule. `ends_section` stops the walk
/// entirely (used to stay inside the anchor section).
fn collect_components(
    nodes: &[Node],
    ends_section: impl Fn(u8, &str) -> bool,
) -> Vec<Component> {
    let mut components: Vec<Component> = Vec::new();
    let mut current: Option<Component> = None;

    for node in nodes {
        match node {
            Node::Heading { level, text } => {
                if ends_section(*level, text) {
                    break;
                }
                if text.trim().is_empty() {
                    continue;
                }
                if let Some(c) = current.take() {
                    components.push(c);
                }
                current = Some(Component {
                    level: *level,
                    heading: text.clone(),
                    details: String::new(),
                });
            }
            Node::Text(t) => {
                if let Some(c) = &mut current {
                    if !c.details.is_empty() {
                        c.details.push('\n');
                    }
                    c.details.push_str(t);
                }
            }
            Node::Rule => {
                // A rule ends the current component but not the section.
                if let Some(c) = current.take() {
                    components.push(c);
                }
            }
        }
    }

    if let Some(c) = current.take() {
        components.push(c);
    }
    components
}

fn whole_body_fallback(nodes: &[Node]) -> Vec<Component> {
    let blob = super::html::nodes_text(nodes);
    if blob.trim().is_empty() {
        return Vec::new();
    }
    vec![Component {
        level: 0,
        heading: "Workout".to_string(),
        details: blob,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::html::parse_body;

    fn fixture(name: &str) -> Vec<Node> {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap();
        parse_body(&html)
    }

    #[test]
    fn structured_post_components() {
        let components = segment(&fixture("structured"));
        let headings: Vec<&str> = components.iter().map(|c| c.heading.as_str()).collect();
        assert_eq!(headings, vec!["Strength", "Conditioning", "Iron Maidens"]);
        assert!(components[0].details.contains("Back Squat"));
        assert!(components[1].details.contains("AMRAP 12"));
    }

    #[test]
    fn anchor_section_stops_at_next_major_heading() {
        let components = segment(&fixture("structured"));
        // "Community News" is an h2 after the anchor section
        assert!(components.iter().all(|c| !c.details.contains("potluck")));
    }

    #[test]
    fn legacy_post_falls_back_to_whole_body() {
        let components = segment(&fixture("legacy"));
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].heading, "Workout");
        assert!(components[0].details.contains("5 rounds for time"));
    }

    #[test]
    fn headed_post_without_anchor_uses_all_headings() {
        let nodes = parse_body("<h3>Strength</h3><p>Press 5x3</p><h3>Notes</h3><p>Sign up</p>");
        let components = segment(&nodes);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].heading, "Strength");
        assert_eq!(components[0].details, "Press 5x3");
    }

    #[test]
    fn decorative_heading_does_not_split_component() {
        let nodes = parse_body(
            "<h2>Workout of the Day</h2><h3>Conditioning</h3><p>Row 2k</p><h4> </h4><p>Rest well</p>",
        );
        let components = segment(&nodes);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].details, "Row 2k\nRest well");
    }

    #[test]
    fn components_partition_without_duplication() {
        let components = segment(&fixture("structured"));
        let squat_mentions = components
            .iter()
            .filter(|c| c.details.contains("Back Squat"))
            .count();
        assert_eq!(squat_mentions, 1);
    }

    #[test]
    fn empty_body() {
        assert!(segment(&[]).is_empty());
    }
}
