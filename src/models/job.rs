use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Display;

/// Identifier a source assigns to a job, numeric or textual
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobId {
    Number(u64),
    Text(String),
}

impl Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobId::Number(id) => write!(f, "{}", id),
            JobId::Text(id) => write!(f, "{}", id),
        }
    }
}

/// A job matched to the user's resume, with a score and the reasons behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedJob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JobId>,
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, rename = "type")]
    pub job_type: Option<String>,
    #[serde(alias = "match_score")]
    pub match_score: f64,
    #[serde(default, alias = "short_description")]
    pub short_description: Option<String>,
    #[serde(default, alias = "match_reasons")]
    pub match_reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A job scraped from a public board, pointing back to its source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedJob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JobId>,
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    pub source: String,
    #[serde(default)]
    pub date: Option<String>,
    pub url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Any other job with at least a title; every other field stays in `extra`
///
/// Fields are left untyped so a record whose `company` or `location` is not a
/// string still parses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericJob {
    pub title: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GenericJob {
    /// A string field from `extra`, if present and a string
    pub fn text(&self, field: &str) -> Option<&str> {
        self.extra.get(field).and_then(Value::as_str)
    }
}

/// A job record validated at the boundary
///
/// The variant is picked once, from the fields the source supplied:
/// a match score makes it `Recommended`, a source and URL make it `Listing`,
/// anything else with a title is `Generic`. Downstream code matches on the
/// variant instead of probing keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobRecord {
    Recommended(RecommendedJob),
    Listing(ListedJob),
    Generic(GenericJob),
}

impl JobRecord {
    /// Validates one raw record from the worker
    pub fn from_value(value: Value) -> Result<Self, String> {
        let object = value
            .as_object()
            .ok_or_else(|| format!("expected a JSON object, got {}", kind_of(&value)))?;

        match object.get("title") {
            Some(Value::String(title)) if !title.trim().is_empty() => {}
            Some(Value::String(_)) => return Err("title is empty".to_string()),
            Some(other) => return Err(format!("title must be a string, got {}", kind_of(other))),
            None => return Err("missing title".to_string()),
        }

        serde_json::from_value(value).map_err(|e| e.to_string())
    }

    pub fn title(&self) -> &str {
        match self {
            JobRecord::Recommended(job) => &job.title,
            JobRecord::Listing(job) => &job.title,
            JobRecord::Generic(job) => &job.title,
        }
    }

    pub fn company(&self) -> Option<&str> {
        match self {
            JobRecord::Recommended(job) => job.company.as_deref(),
            JobRecord::Listing(job) => job.company.as_deref(),
            JobRecord::Generic(job) => job.text("company"),
        }
    }

    pub fn location(&self) -> Option<&str> {
        match self {
            JobRecord::Recommended(job) => job.location.as_deref(),
            JobRecord::Listing(_) => None,
            JobRecord::Generic(job) => job.text("location"),
        }
    }
}

impl Display for JobRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())?;
        if let Some(company) = self.company() {
            write!(f, " @ {}", company)?;
        }
        if let Some(location) = self.location() {
            write!(f, " ({})", location)?;
        }
        match self {
            JobRecord::Recommended(job) => write!(f, " [match {:.0}%]", job.match_score),
            JobRecord::Listing(job) => write!(f, " <{}>", job.url),
            JobRecord::Generic(_) => Ok(()),
        }
    }
}

/// Validates a whole result list, keeping the worker's order
pub fn parse_jobs(values: Vec<Value>) -> Result<Vec<JobRecord>, String> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            JobRecord::from_value(value).map_err(|e| format!("job record {}: {}", index, e))
        })
        .collect()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
