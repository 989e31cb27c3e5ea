//! Reply parsing.
//!
//! Extracts SQL from agent replies that may contain markdown code blocks.

use std::sync::LazyLock;

use regex::Regex;

static SQL_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```sql[^\n]*\n(.*?)```").expect("valid regex"));

static PLAIN_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[ \t]*\n(.*?)```").expect("valid regex"));

/// An agent reply split into prose and SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    /// Text outside the code block.
    pub text: String,
    /// SQL from the first code block, if any.
    pub sql: Option<String>,
}

impl ParsedReply {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sql: None,
        }
    }

    pub fn with_sql(text: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sql: Some(sql.into()),
        }
    }
}

/// Splits a reply into text and SQL.
///
/// A ```` ```sql ```` block wins over a block without a language; blocks in
/// any other language are ignored. Only the first matching block is used.
pub fn parse_reply(reply: &str) -> ParsedReply {
    for pattern in [&*SQL_BLOCK, &*PLAIN_BLOCK] {
        if let Some(captures) = pattern.captures(reply) {
            let (Some(block), Some(body)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let text = format!(
                "{}{}",
                reply[..block.start()].trim_end(),
                reply[block.end()..].trim_start()
            );
            return ParsedReply::with_sql(text.trim(), body.as_str().trim());
        }
    }

    ParsedReply::text_only(reply.trim())
}

/// Returns the SQL of the first code block in a reply.
pub fn extract_sql(reply: &str) -> Option<String> {
    parse_reply(reply).sql.filter(|sql| !sql.is_empty())
}
