//! `.vscode/settings.json` codec.
//!
//! Owns three rust-analyzer keys and leaves every other key in the file alone.
//! VS Code writes settings as JSON with comments, so the reader strips `//`
//! and `/* */` comments and trailing commas before parsing.

use serde_json::{Map, Value};

use super::{Codec, ParseOutcome};
use crate::target::{ProfileSettings, TargetProfile};

pub const TARGET_KEY: &str = "rust-analyzer.cargo.target";
pub const FEATURES_KEY: &str = "rust-analyzer.cargo.features";
pub const CHECK_TARGETS_KEY: &str = "rust-analyzer.check.targets";

/// Codec for VS Code workspace settings
#[derive(Debug, Clone, Copy, Default)]
pub struct VsCodeCodec;

impl Codec for VsCodeCodec {
    fn render(&self, profile: &TargetProfile) -> String {
        let mut map = Map::new();
        insert_owned(&mut map, profile);
        to_pretty(map)
    }

    fn merge(&self, existing: &str, profile: &TargetProfile) -> String {
        match parse_object(existing) {
            Some(mut map) => {
                insert_owned(&mut map, profile);
                to_pretty(map)
            }
            None => self.render(profile),
        }
    }

    fn parse(&self, text: &str) -> ParseOutcome {
        parse_object(text)
            .and_then(|map| extract(&map))
            .map(ParseOutcome::from_settings)
            .unwrap_or(ParseOutcome::Unrecognized)
    }
}

fn insert_owned(map: &mut Map<String, Value>, profile: &TargetProfile) {
    let target = profile
        .architecture_triple()
        .map(|t| Value::String(t.to_string()))
        .unwrap_or(Value::Null);
    let features = Value::Array(
        profile
            .features()
            .iter()
            .map(|f| Value::String(f.clone()))
            .collect(),
    );
    let check_targets = profile
        .check_targets()
        .map(|targets| Value::Array(targets.iter().map(|t| Value::String(t.clone())).collect()))
        .unwrap_or(Value::Null);

    map.insert(TARGET_KEY.to_string(), target);
    map.insert(FEATURES_KEY.to_string(), features);
    map.insert(CHECK_TARGETS_KEY.to_string(), check_targets);
}

fn to_pretty(map: Map<String, Value>) -> String {
    format!("{:#}\n", Value::Object(map))
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    let cleaned = strip_trailing_commas(&strip_comments(text));
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("settings.json is not valid JSON: {e}");
            None
        }
    }
}

fn extract(map: &Map<String, Value>) -> Option<ProfileSettings> {
    let architecture_triple = match map.get(TARGET_KEY)? {
        Value::Null => None,
        Value::String(triple) => Some(triple.clone()),
        _ => return None,
    };

    let features = string_array(map.get(FEATURES_KEY)?)?.into_iter().collect();

    let check_targets = match map.get(CHECK_TARGETS_KEY) {
        None | Some(Value::Null) => None,
        Some(value) => Some(string_array(value)?),
    };

    Some(ProfileSettings {
        architecture_triple,
        features,
        check_targets,
    })
}

fn string_array(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// Remove `//` and `/* */` comments outside of string literals
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Drop commas that directly precede a closing `}` or `]`
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }

        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}
