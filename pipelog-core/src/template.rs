//! Format templates for destinations.
//!
//! A template is literal text with placeholders: `{date}`, `{time}`, `{clock}`,
//! `{thread}`, `{source}` and `{text}`. Anything else in braces, and a brace
//! without a partner, is kept as literal text.

use std::str::FromStr;

use crate::job::{InfoField, LogJob};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Date,
    Time,
    Clock,
    Thread,
    Source,
    Text,
}

impl Placeholder {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "date" => Placeholder::Date,
            "time" => Placeholder::Time,
            "clock" => Placeholder::Clock,
            "thread" => Placeholder::Thread,
            "source" => Placeholder::Source,
            "text" => Placeholder::Text,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Field(Placeholder),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(format: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = format;
        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find(|c: char| c == '{' || c == '}') {
                Some(close) if after.as_bytes()[close] == b'}' => {
                    let name = &after[..close];
                    match Placeholder::from_name(name) {
                        Some(field) => {
                            if !literal.is_empty() {
                                segments.push(Segment::Literal(std::mem::take(&mut literal)));
                            }
                            segments.push(Segment::Field(field));
                        }
                        None => {
                            literal.push('{');
                            literal.push_str(name);
                            literal.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                _ => {
                    literal.push('{');
                    rest = after;
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Renders `job` through the template. With `colored`, `{source}` is
    /// wrapped in terminal color codes.
    pub fn render(&self, job: &LogJob, colored: bool) -> String {
        let mut out = String::with_capacity(job.text.len() + 32);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => match field {
                    Placeholder::Date => out.push_str(job.info.get(InfoField::Date).unwrap_or("")),
                    Placeholder::Time => out.push_str(job.info.get(InfoField::Time).unwrap_or("")),
                    Placeholder::Clock => {
                        out.push_str(job.info.get(InfoField::Clock).unwrap_or(""))
                    }
                    Placeholder::Thread => {
                        out.push_str(job.info.get(InfoField::Thread).unwrap_or(""))
                    }
                    Placeholder::Source if colored => {
                        out.push_str(&job.source.colored().to_string())
                    }
                    Placeholder::Source => out.push_str(job.source.as_str()),
                    Placeholder::Text => out.push_str(&job.text),
                },
            }
        }
        out
    }
}

impl FromStr for Template {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for Template {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for Template {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}
