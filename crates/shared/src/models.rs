use serde::{Deserialize, Deserializer, Serialize};

/// Relevance flag on an article. Serialized as the integer 0 or 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Label {
    #[default]
    Irrelevant,
    Relevant,
}

impl Label {
    pub fn toggled(self) -> Self {
        match self {
            Label::Irrelevant => Label::Relevant,
            Label::Relevant => Label::Irrelevant,
        }
    }

    pub fn is_relevant(self) -> bool {
        self == Label::Relevant
    }
}

impl TryFrom<u8> for Label {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Label::Irrelevant),
            1 => Ok(Label::Relevant),
            other => Err(format!("label must be 0 or 1, got {}", other)),
        }
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> Self {
        match label {
            Label::Irrelevant => 0,
            Label::Relevant => 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One candidate news item. `url` is its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    pub url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, alias = "full_content", skip_serializing_if = "Option::is_none")]
    pub full_content: Option<String>,
    #[serde(default)]
    pub source: SourceRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_to_image: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub published_at: String,
    #[serde(default)]
    pub label: Label,
}

impl ArticleRecord {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            description: None,
            content: None,
            full_content: None,
            source: SourceRef::default(),
            author: None,
            url_to_image: None,
            published_at: String::new(),
            label: Label::Irrelevant,
        }
    }

    pub fn with_label(mut self, label: Label) -> Self {
        self.label = label;
        self
    }

    pub fn with_full_content(mut self, content: impl Into<String>) -> Self {
        self.full_content = Some(content.into());
        self
    }

    pub fn source_name(&self) -> &str {
        self.source.name.as_deref().unwrap_or("Unknown source")
    }

    /// Length in characters of the extracted body, zero if never extracted.
    pub fn full_content_len(&self) -> usize {
        self.full_content
            .as_deref()
            .map(|c| c.chars().count())
            .unwrap_or(0)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Serialized article collection handed to the classifier or the operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetExport {
    pub version: String,
    pub created_at: String,
    #[serde(default)]
    pub query: Option<String>,
    pub articles: Vec<ArticleRecord>,
}

impl DatasetExport {
    pub const VERSION: &'static str = "1.0";

    pub fn new(query: Option<String>, articles: Vec<ArticleRecord>) -> Self {
        Self {
            version: Self::VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            query,
            articles,
        }
    }

    pub fn relevant_count(&self) -> usize {
        self.articles
            .iter()
            .filter(|a| a.label.is_relevant())
            .count()
    }
}
