//! Keyword-based SQL generation.
//!
//! Placeholder for a real natural-language-to-SQL model. The output for a
//! given prompt is fixed and must stay stable.

/// Query returned for prompts mentioning payment methods.
pub const PAYMENT_METHODS_SQL: &str =
    "SELECT payment_method, COUNT(*) FROM payments GROUP BY payment_method;";

/// Query returned for every other prompt.
pub const DEFAULT_SQL: &str = "SELECT * FROM users LIMIT 10;";

/// Maps a prompt to SQL by case-insensitive keyword match.
pub fn generate_sql(prompt: &str) -> String {
    if prompt.to_lowercase().contains("payment methods") {
        PAYMENT_METHODS_SQL.to_string()
    } else {
        DEFAULT_SQL.to_string()
    }
}
