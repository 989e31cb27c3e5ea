//! Metabase REST API access.
//!
//! Provides a trait-based interface over the database, metadata and card
//! endpoints so the HTTP client can be swapped for an in-memory mock.

mod client;
mod mock;
mod responses;

pub use client::MetabaseClient;
pub use mock::{MockMetabase, RecordedRequest};
pub use responses::{parse_card_list, parse_database_list, parse_database_metadata};

use crate::error::{MikaError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Endpoint paths, relative to the configured base URL.
pub mod paths {
    use super::RemoteId;
    use crate::error::Result;

    /// List of databases.
    pub const DATABASES: &str = "/api/database";

    /// List of cards, and the card creation endpoint.
    pub const CARDS: &str = "/api/card";

    /// Table and field metadata for one database.
    pub fn database_metadata(id: &RemoteId) -> Result<String> {
        Ok(format!("{DATABASES}/{}/metadata", id.path_segment()?))
    }

    /// A single card.
    pub fn card(id: &RemoteId) -> Result<String> {
        Ok(format!("{CARDS}/{}", id.path_segment()?))
    }
}

/// HTTP method used for a Metabase request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    /// Returns the method as an uppercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }

    /// Returns true for methods that modify remote state.
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier assigned by Metabase to a database, table, field or card.
///
/// Metabase uses integers, but ids are treated as opaque and echoed back
/// in whatever JSON shape the remote produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteId {
    Number(i64),
    Text(String),
}

impl RemoteId {
    /// Extracts an id from a JSON value, accepting numbers and strings.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Number),
            Value::String(s) if !s.is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Renders the id as a single URL path segment.
    ///
    /// Text ids may only contain ASCII letters, digits, `-` and `_`, so an
    /// id can never add segments or climb out of its endpoint.
    pub fn path_segment(&self) -> Result<String> {
        match self {
            Self::Number(n) => Ok(n.to_string()),
            Self::Text(s)
                if !s.is_empty()
                    && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
            {
                Ok(s.clone())
            }
            Self::Text(s) => Err(MikaError::validation(format!("Invalid id: {s:?}"))),
        }
    }

    /// Converts the id back into a JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Number(n) => Value::from(*n),
            Self::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RemoteId {
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for RemoteId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

/// Trait defining the request/response surface of the Metabase REST API.
///
/// Implementations attach authentication, enforce timeouts and map HTTP
/// failures onto [`MikaError`](crate::error::MikaError). No call is retried.
#[async_trait]
pub trait MetabaseApi: Send + Sync {
    /// Issues a GET request and returns the decoded JSON body.
    async fn get(&self, path: &str) -> Result<Value>;

    /// Issues a POST request with a JSON body.
    async fn post(&self, path: &str, body: &Value) -> Result<Value>;

    /// Issues a PUT request with a JSON body.
    async fn put(&self, path: &str, body: &Value) -> Result<Value>;

    /// Base URL used to build user-facing links, if configured.
    fn base_url(&self) -> Option<&str>;
}

impl fmt::Debug for dyn MetabaseApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetabaseApi")
            .field("base_url", &self.base_url())
            .finish()
    }
}
