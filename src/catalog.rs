use std::path::Path;

use anyhow::{bail, Context, Result};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

/// One movement entry: any `patterns` hit tags the canonical `name`, unless
/// an `excludes` pattern also hits the same text.
#[derive(Debug)]
pub struct MovementRule {
    pub name: String,
    pub patterns: Vec<Regex>,
    pub excludes: Vec<Regex>,
}

#[derive(Debug)]
pub struct MovementCatalog {
    pub rules: Vec<MovementRule>,
}

#[derive(Deserialize)]
struct MovementsFile {
    #[serde(default)]
    movement: Vec<MovementEntry>,
}

#[derive(Deserialize)]
struct MovementEntry {
    name: String,
    patterns: Vec<String>,
    #[serde(default)]
    excludes: Vec<String>,
}

pub fn load_movements(path: &Path) -> Result<MovementCatalog> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read movement catalog: {}", path.display()))?;
    parse_movements(&raw).with_context(|| format!("Invalid movement catalog: {}", path.display()))
}

/// A rule that fails to compile is fatal: a silently dead pattern would
/// undercount that movement across the whole corpus.
pub fn parse_movements(raw: &str) -> Result<MovementCatalog> {
    let file: MovementsFile = toml::from_str(raw)?;
    if file.movement.is_empty() {
        bail!("movement catalog is empty");
    }
    let mut rules = Vec::with_capacity(file.movement.len());
    for entry in file.movement {
        if entry.patterns.is_empty() {
            bail!("movement '{}' has no patterns", entry.name);
        }
        let patterns = compile_all(&entry.name, &entry.patterns)?;
        let excludes = compile_all(&entry.name, &entry.excludes)?;
        rules.push(MovementRule {
            name: entry.name,
            patterns,
            excludes,
        });
    }
    Ok(MovementCatalog { rules })
}

fn compile_all(name: &str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("movement '{}': bad pattern '{}'", name, p))
        })
        .collect()
}

// ── Named workouts (Hero WODs + Girls) ──

#[derive(Debug)]
pub struct NamePattern {
    /// Display name, e.g. "Murph" or "Lumberjack 20".
    pub name: String,
    /// Lowercased alphanumeric form used for heading equality checks.
    pub norm: String,
    pub pattern: Regex,
}

#[derive(Debug)]
pub struct NamedCatalog {
    pub heroes: Vec<NamePattern>,
    pub girls: Vec<NamePattern>,
}

#[derive(Deserialize)]
struct NamedFile {
    heroes: Vec<String>,
    girls: Vec<String>,
}

pub fn load_named(path: &Path) -> Result<NamedCatalog> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read named-workout catalog: {}", path.display()))?;
    parse_named(&raw)
        .with_context(|| format!("Invalid named-workout catalog: {}", path.display()))
}

pub fn parse_named(raw: &str) -> Result<NamedCatalog> {
    let file: NamedFile = toml::from_str(raw)?;
    if file.heroes.is_empty() && file.girls.is_empty() {
        bail!("named-workout catalog is empty");
    }
    Ok(NamedCatalog {
        heroes: compile_names(&file.heroes)?,
        girls: compile_names(&file.girls)?,
    })
}

/// Compile each name to a whole-word pattern. Internal spaces match any
/// whitespace run so "lumberjack 20" still hits "Lumberjack  20".
fn compile_names(names: &[String]) -> Result<Vec<NamePattern>> {
    names
        .iter()
        .map(|name| {
            let escaped = name
                .split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+");
            let pattern = RegexBuilder::new(&format!(r"\b{}\b", escaped))
                .case_insensitive(true)
                .build()
                .with_context(|| format!("named workout '{}' did not compile", name))?;
            Ok(NamePattern {
                name: title_case(name),
                norm: normalize_name(name),
                pattern,
            })
        })
        .collect()
}

pub fn normalize_name(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with(' ') {
            out.push(' ');
        }
    }
    out.trim().to_string()
}

fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movements_parse() {
        let raw = r#"
            [[movement]]
            name = "deadlift"
            patterns = ['\bdead\s?lifts?\b']
            excludes = ['\bclean deadlifts?\b']

            [[movement]]
            name = "row"
            patterns = ['\brow(s|ing|ed)?\b']
        "#;
        let catalog = parse_movements(raw).unwrap();
        assert_eq!(catalog.rules.len(), 2);
        assert!(catalog.rules[0].patterns[0].is_match("3x5 Deadlift"));
        assert!(catalog.rules[0].excludes[0].is_match("clean deadlifts"));
    }

    #[test]
    fn bad_pattern_is_fatal() {
        let raw = r#"
            [[movement]]
            name = "broken"
            patterns = ['\b(unclosed']
        "#;
        let err = parse_movements(raw).unwrap_err();
        assert!(format!("{:#}", err).contains("broken"));
    }

    #[test]
    fn empty_catalog_rejected() {
        assert!(parse_movements("").is_err());
    }

    #[test]
    fn named_word_boundaries() {
        let raw = r#"
            heroes = ["dt", "lumberjack 20"]
            girls = ["fran"]
        "#;
        let catalog = parse_named(raw).unwrap();
        let dt = &catalog.heroes[0];
        assert_eq!(dt.name, "Dt");
        assert!(dt.pattern.is_match("today we do DT"));
        assert!(!dt.pattern.is_match("DTesting a new rig"));

        let lumberjack = &catalog.heroes[1];
        assert_eq!(lumberjack.name, "Lumberjack 20");
        assert!(lumberjack.pattern.is_match("Lumberjack  20 on saturday"));
    }

    #[test]
    fn normalize_strips_punctuation() {
        assert_eq!(normalize_name("Tommy V!"), "tommy v");
        assert_eq!(normalize_name("  DT  "), "dt");
    }

    #[test]
    fn shipped_catalogs_compile() {
        let movements = std::fs::read_to_string("config/movements.toml").unwrap();
        assert!(parse_movements(&movements).is_ok());
        let named = std::fs::read_to_string("config/named_workouts.toml").unwrap();
        let catalog = parse_named(&named).unwrap();
        assert!(catalog.heroes.iter().any(|n| n.name == "Murph"));
        assert!(catalog.girls.iter().any(|n| n.name == "Fran"));
    }
}
