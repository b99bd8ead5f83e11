//! Records as submitted by producers and the command pairs they become.
use std::fmt::Debug;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use snafu::ResultExt;

use crate::error::{
    MissingDocumentIdSnafu, MissingIndexNameSnafu, MissingTypeNameSnafu, ParseSnafu, Result,
};

/// A single "index this document" request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// The index the document is written to.
    #[serde(default, alias = "index_name")]
    pub index: Option<String>,
    /// The logical document category.
    #[serde(default, rename = "type", alias = "type_name")]
    pub doc_type: Option<String>,
    /// The document id.
    #[serde(
        default,
        alias = "document_id",
        alias = "_id",
        deserialize_with = "string_or_number"
    )]
    pub id: Option<String>,
    /// The document body.
    #[serde(default)]
    pub data: Value,
}

/// Anything a producer can hand to [`IndexerClient::submit`](crate::IndexerClient::submit).
#[derive(Debug, Clone)]
pub enum Submission {
    Record(Record),
    Text(String),
}

/// The bulk action descriptor of a command pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAction {
    pub index: String,
    pub doc_type: String,
    pub id: String,
}

/// The unit stored in the buffer: an action descriptor and its document.
#[derive(Clone, PartialEq)]
pub struct CommandPair {
    pub action: BulkAction,
    pub document: Value,
    /// How many times the pair has been sent to the backend.
    pub(crate) attempts: u32,
}

impl Record {
    pub fn new(
        index: impl Into<String>,
        doc_type: impl Into<String>,
        id: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            index: Some(index.into()),
            doc_type: Some(doc_type.into()),
            id: Some(id.into()),
            data,
        }
    }

    /// Checks the identifying fields and converts the record into a command pair.
    ///
    /// Fields are checked in order: index, type, id. The first missing one is reported.
    pub fn into_command(self) -> Result<CommandPair> {
        let Record {
            index,
            doc_type,
            id,
            data,
        } = self;

        let Some(index) = index.filter(|s| !s.is_empty()) else {
            return MissingIndexNameSnafu { data }.fail();
        };
        let Some(doc_type) = doc_type.filter(|s| !s.is_empty()) else {
            return MissingTypeNameSnafu { data }.fail();
        };
        let Some(id) = id.filter(|s| !s.is_empty()) else {
            return MissingDocumentIdSnafu { data }.fail();
        };

        Ok(CommandPair::new(
            BulkAction {
                index,
                doc_type,
                id,
            },
            data,
        ))
    }
}

impl Submission {
    /// Decodes (if needed) and validates the submission.
    pub fn into_command(self) -> Result<CommandPair> {
        let record = match self {
            Submission::Record(record) => record,
            Submission::Text(text) => {
                serde_json::from_str::<Record>(&text).context(ParseSnafu { text })?
            }
        };

        record.into_command()
    }
}

impl CommandPair {
    pub fn new(action: BulkAction, document: Value) -> Self {
        Self {
            action,
            document,
            attempts: 0,
        }
    }

    /// Number of times this pair was dispatched.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl From<Record> for Submission {
    fn from(record: Record) -> Self {
        Submission::Record(record)
    }
}

impl From<String> for Submission {
    fn from(text: String) -> Self {
        Submission::Text(text)
    }
}

impl From<&str> for Submission {
    fn from(text: &str) -> Self {
        Submission::Text(text.to_string())
    }
}

impl Debug for CommandPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandPair")
            .field("index", &self.action.index)
            .field("type", &self.action.doc_type)
            .field("id", &self.action.id)
            .field("attempts", &self.attempts)
            .finish()
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number for id, got {other}"
        ))),
    }
}
