//! Document entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Editorial category of a document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Article,
    Analysis,
    Rules,
    Performance,
    News,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Article => "article",
            DocumentType::Analysis => "analysis",
            DocumentType::Rules => "rules",
            DocumentType::Performance => "performance",
            DocumentType::News => "news",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "article" => Ok(DocumentType::Article),
            "analysis" => Ok(DocumentType::Analysis),
            "rules" => Ok(DocumentType::Rules),
            "performance" => Ok(DocumentType::Performance),
            "news" => Ok(DocumentType::News),
            other => Err(format!("unknown document type '{}'", other)),
        }
    }
}

/// A stored document. Immutable once created; only deletion is supported.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,

    pub title: String,

    pub content: String,

    #[serde(rename = "type")]
    pub doc_type: DocumentType,

    pub source: Option<String>,

    pub url: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the caller when creating a document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub title: String,

    pub content: String,

    #[serde(rename = "type")]
    pub doc_type: DocumentType,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub url: Option<String>,
}

impl NewDocument {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        doc_type: DocumentType,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            doc_type,
            source: None,
            url: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}
