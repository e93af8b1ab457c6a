//! Parsing of pattern strings into substitution segments.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::is_valid_candidate;

/// `[field]`, `[C<N>_field]` or the counter token `[#]`.
static TOKEN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(?:C(\d+)_)?([#\w]+)\]").expect("token regex is valid"));

const COUNTER_TOKEN: &str = "[#]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    Counter,
    Field { name: String, limit: Option<usize> },
}

/// A parsed pattern.
#[derive(Debug, Clone)]
pub(crate) struct Template {
    pub source: String,
    pub segments: Vec<Segment>,
    pub has_counter: bool,
}

/// Why a template could not produce a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RenderError {
    MissingField(String),
}

impl Template {
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut last = 0;

        for captures in TOKEN_REGEX.captures_iter(source) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            if whole.start() > last {
                segments.push(Segment::Literal(source[last..whole.start()].to_string()));
            }
            last = whole.end();

            if whole.as_str() == COUNTER_TOKEN {
                segments.push(Segment::Counter);
                continue;
            }

            // A count too large for usize can't truncate anything anyway
            let limit = captures.get(1).map(|n| n.as_str().parse().unwrap_or(usize::MAX));
            segments.push(Segment::Field {
                name: captures[2].to_string(),
                limit,
            });
        }

        if last < source.len() {
            segments.push(Segment::Literal(source[last..].to_string()));
        }

        Self {
            source: source.to_string(),
            has_counter: source.contains(COUNTER_TOKEN),
            segments,
        }
    }

    /// First literal character that is not allowed in a username.
    pub fn invalid_literal_char(&self) -> Option<char> {
        self.segments.iter().find_map(|segment| match segment {
            Segment::Literal(text) => text.chars().find(|c| !is_valid_candidate(&c.to_string())),
            _ => None,
        })
    }

    /// Substitute every token left to right.
    ///
    /// `lookup` returns the sanitized value of a field. `counter` is advanced once
    /// per `[#]` token; the caller decides whether to keep the advanced value.
    pub fn render<'a, F>(&self, lookup: F, counter: &mut u64) -> Result<String, RenderError>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let mut out = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Counter => {
                    out.push_str(&counter.to_string());
                    *counter = counter.saturating_add(1);
                }
                Segment::Field { name, limit } => {
                    let value = lookup(name).ok_or_else(|| RenderError::MissingField(name.clone()))?;
                    match limit {
                        Some(n) => out.extend(value.chars().take(*n)),
                        None => out.push_str(value),
                    }
                }
            }
        }

        Ok(out)
    }
}
