use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::references::{filter_references, ArticleReference};

pub const HOT_TOPIC_BATCH_SIZE: usize = 6;
pub const HOT_TOPIC_TITLE_MAX: usize = 100;
pub const HOT_TOPIC_DESCRIPTION_MAX: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Why model output was refused. Never partially applied.
#[derive(Debug, thiserror::Error)]
pub enum SummaryRejection {
    #[error("model output is empty")]
    Empty,
    #[error("model output is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),
    #[error("model output has the wrong shape: expected {0}")]
    WrongShape(&'static str),
    #[error("model output failed validation: {}", join(.0))]
    Fields(Vec<FieldError>),
}

fn join(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub headline: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub call_to_action: String,
    pub references: Vec<ArticleReference>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HotTopicIcon {
    Brain,
    TrendingUp,
    Zap,
    Cpu,
    Globe,
    Rocket,
}

impl HotTopicIcon {
    pub const ALL: [HotTopicIcon; 6] = [
        HotTopicIcon::Brain,
        HotTopicIcon::TrendingUp,
        HotTopicIcon::Zap,
        HotTopicIcon::Cpu,
        HotTopicIcon::Globe,
        HotTopicIcon::Rocket,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HotTopicIcon::Brain => "Brain",
            HotTopicIcon::TrendingUp => "TrendingUp",
            HotTopicIcon::Zap => "Zap",
            HotTopicIcon::Cpu => "Cpu",
            HotTopicIcon::Globe => "Globe",
            HotTopicIcon::Rocket => "Rocket",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|icon| icon.as_str() == raw)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotTopicDraft {
    pub icon: HotTopicIcon,
    pub title: String,
    pub description: String,
    pub query: String,
}

/// Strips a surrounding markdown code fence the model may add despite instructions.
pub fn unwrap_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if text
        .get(..7)
        .is_some_and(|head| head.eq_ignore_ascii_case("```json"))
    {
        text = &text[7..];
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn parse_json(raw: &str) -> Result<Value, SummaryRejection> {
    let text = unwrap_code_fence(raw);
    if text.is_empty() {
        return Err(SummaryRejection::Empty);
    }
    Ok(serde_json::from_str(text)?)
}

/// Collects per-field problems while walking one JSON object.
struct Checker<'a> {
    obj: &'a Map<String, Value>,
    prefix: String,
    errors: Vec<FieldError>,
}

impl<'a> Checker<'a> {
    fn new(obj: &'a Map<String, Value>, prefix: impl Into<String>) -> Self {
        Self {
            obj,
            prefix: prefix.into(),
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, field: &str, reason: impl Into<String>) {
        self.errors.push(FieldError {
            field: format!("{}{field}", self.prefix),
            reason: reason.into(),
        });
    }

    /// Required, non-blank string, optionally capped in characters.
    fn text(&mut self, field: &str, max_chars: Option<usize>) -> String {
        let obj = self.obj;
        match obj.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => {
                let s = s.trim();
                if let Some(max) = max_chars {
                    if s.chars().count() > max {
                        self.fail(field, format!("must be at most {max} characters"));
                    }
                }
                s.to_string()
            }
            Some(Value::String(_)) => {
                self.fail(field, "must not be empty");
                String::new()
            }
            None | Some(Value::Null) => {
                self.fail(field, "is required");
                String::new()
            }
            Some(_) => {
                self.fail(field, "must be a string");
                String::new()
            }
        }
    }

    /// Optional string; absent or null reads as empty.
    fn optional_text(&mut self, field: &str) -> String {
        let obj = self.obj;
        match obj.get(field) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(_) => {
                self.fail(field, "must be a string");
                String::new()
            }
        }
    }

    /// URLs only need to be strings here; blank or unparseable ones are dropped by
    /// the allow-list afterwards.
    fn link(&mut self, field: &str) -> String {
        let obj = self.obj;
        match obj.get(field) {
            Some(Value::String(s)) => s.trim().to_string(),
            None | Some(Value::Null) => {
                self.fail(field, "is required");
                String::new()
            }
            Some(_) => {
                self.fail(field, "must be a string");
                String::new()
            }
        }
    }

    fn key_points(&mut self) -> Vec<String> {
        let obj = self.obj;
        let items = match obj.get("key_points") {
            Some(Value::Array(items)) => items,
            None | Some(Value::Null) => {
                self.fail("key_points", "is required");
                return Vec::new();
            }
            Some(_) => {
                self.fail("key_points", "must be an array of strings");
                return Vec::new();
            }
        };
        if items.is_empty() {
            self.fail("key_points", "must contain at least one item");
        }
        let mut points = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) => points.push(s.trim().to_string()),
                None => self.fail(&format!("key_points[{i}]"), "must be a string"),
            }
        }
        points
    }

    fn references(&mut self) -> Vec<ArticleReference> {
        let obj = self.obj;
        let items = match obj.get("references") {
            None | Some(Value::Null) => return Vec::new(),
            Some(Value::Array(items)) => items,
            Some(_) => {
                self.fail("references", "must be an array");
                return Vec::new();
            }
        };
        let mut refs = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let Some(obj) = item.as_object() else {
                self.fail(&format!("references[{i}]"), "must be an object");
                continue;
            };
            let mut inner = Checker::new(obj, format!("{}references[{i}].", self.prefix));
            let reference = ArticleReference {
                title: inner.text("title", None),
                url: inner.link("url"),
                source: inner.optional_text("source"),
                date: inner.optional_text("date"),
            };
            if inner.errors.is_empty() {
                refs.push(reference);
            } else {
                self.errors.append(&mut inner.errors);
            }
        }
        refs
    }

    fn finish<T>(self, value: T) -> Result<T, Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self.errors)
        }
    }
}

/// Turns raw model text into a summary: unwrap, parse, check every field, keep only
/// known fields and trusted references.
pub fn validate_summary(raw: &str) -> Result<TrendSummary, SummaryRejection> {
    let value = parse_json(raw)?;
    let obj = value
        .as_object()
        .ok_or(SummaryRejection::WrongShape("a JSON object"))?;

    let mut check = Checker::new(obj, "");
    let summary = TrendSummary {
        headline: check.text("headline", None),
        summary: check.text("summary", None),
        key_points: check.key_points(),
        call_to_action: check.text("call_to_action", None),
        references: check.references(),
    };
    let mut summary = check.finish(summary).map_err(SummaryRejection::Fields)?;
    summary.references = filter_references(std::mem::take(&mut summary.references));
    Ok(summary)
}

/// A generated hot-topic batch: exactly six well-formed topics.
pub fn validate_hot_topics(raw: &str) -> Result<Vec<HotTopicDraft>, SummaryRejection> {
    let value = parse_json(raw)?;
    let items = value
        .as_array()
        .ok_or(SummaryRejection::WrongShape("a JSON array"))?;
    if items.len() != HOT_TOPIC_BATCH_SIZE {
        return Err(SummaryRejection::Fields(vec![FieldError {
            field: "topics".into(),
            reason: format!("expected {HOT_TOPIC_BATCH_SIZE} items, got {}", items.len()),
        }]));
    }

    let mut topics = Vec::with_capacity(items.len());
    let mut errors = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            errors.push(FieldError {
                field: format!("[{i}]"),
                reason: "must be an object".into(),
            });
            continue;
        };
        let mut check = Checker::new(obj, format!("[{i}]."));
        let icon_raw = check.text("icon", None);
        let icon = HotTopicIcon::parse(&icon_raw);
        if icon.is_none() && !icon_raw.is_empty() {
            check.fail("icon", format!("unknown icon {icon_raw:?}"));
        }
        let title = check.text("title", Some(HOT_TOPIC_TITLE_MAX));
        let description = check.text("description", Some(HOT_TOPIC_DESCRIPTION_MAX));
        let query = check.text("query", None);
        match check.finish(()) {
            Err(mut e) => errors.append(&mut e),
            Ok(()) => {
                if let Some(icon) = icon {
                    topics.push(HotTopicDraft {
                        icon,
                        title,
                        description,
                        query,
                    });
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(topics)
    } else {
        Err(SummaryRejection::Fields(errors))
    }
}
