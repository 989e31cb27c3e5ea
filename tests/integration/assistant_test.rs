//! Prompt turn integration tests.
//!
//! Runs the scripted agent end to end against the in-memory Metabase.

use std::sync::Arc;

use mika_sql::assistant::{Assistant, Conversation, Message, PromptReply, ScriptedAgent, APOLOGY};
use mika_sql::metabase::{MockMetabase, RemoteId};
use mika_sql::metadata::MetadataCache;
use mika_sql::sqlgen::{DEFAULT_SQL, PAYMENT_METHODS_SQL};
use mika_sql::tools::Toolbox;
use pretty_assertions::assert_eq;

async fn assistant_for(mock: Arc<MockMetabase>) -> Assistant {
    let cache = Arc::new(MetadataCache::new(mock.clone()));
    cache.spawn_warm_up().await.unwrap();
    Assistant::new(ScriptedAgent::new(), Arc::new(Toolbox::new(mock, cache)))
}

#[tokio::test]
async fn test_prompt_creates_card() {
    let mock = Arc::new(MockMetabase::sample());
    let assistant = assistant_for(mock.clone()).await;

    let reply = assistant
        .handle_prompt(r#"Save a bar chart of payment methods as "Payment Mix""#)
        .await;

    assert_eq!(reply.sql, PAYMENT_METHODS_SQL);
    assert_eq!(reply.viz_type, "bar");
    assert!(reply.reply.contains("http://metabase.test/card/2"));

    let card = mock.card(&RemoteId::from(2)).unwrap();
    assert_eq!(card["name"], "Payment Mix");
    assert_eq!(card["dataset_query"]["database"], 1);
}

#[tokio::test]
async fn test_prompt_without_card_uses_default_viz() {
    let mock = Arc::new(MockMetabase::sample());
    let assistant = assistant_for(mock.clone()).await;

    let reply = assistant.handle_prompt("who signed up last week?").await;

    assert_eq!(reply.sql, DEFAULT_SQL);
    assert_eq!(reply.viz_type, "bar");
    assert!(reply.reply.contains("```sql"));
    assert!(mock.write_requests().is_empty());
}

#[tokio::test]
async fn test_create_without_metadata_reports_failure() {
    let mock = Arc::new(MockMetabase::new());
    let assistant = assistant_for(mock.clone()).await;

    let reply = assistant.handle_prompt("create a pie chart of users").await;

    assert!(reply.reply.starts_with("Sorry, I couldn't create the card"));
    assert!(reply.reply.contains("No database available"));
    assert_eq!(reply.sql, DEFAULT_SQL);
    assert_eq!(reply.viz_type, "bar");
    assert!(mock.write_requests().is_empty());
}

#[tokio::test]
async fn test_multi_turn_history_answers_last_prompt() {
    let mock = Arc::new(MockMetabase::sample());
    let assistant = assistant_for(mock).await;

    let mut conversation = Conversation::new();
    conversation.add_user("show me the payment methods");
    let first = assistant.handle_messages(conversation.messages()).await;
    conversation.add_assistant(first.reply.clone());
    conversation.add_user("now update card 1 to a line chart");

    let second = assistant.handle_messages(conversation.messages()).await;

    assert_eq!(first.sql, PAYMENT_METHODS_SQL);
    assert_eq!(
        second.reply,
        "Updated card \"Q1 Sales Report\": http://metabase.test/card/1"
    );
    assert_eq!(second.sql, "");
}

#[tokio::test]
async fn test_goodbye_ends_conversation() {
    let assistant = assistant_for(Arc::new(MockMetabase::sample())).await;

    let reply = assistant.handle_prompt("thanks, bye!").await;

    assert!(reply.conversation_ended);
    assert_eq!(reply.reply, "Goodbye! Conversation ended.");
}

#[tokio::test]
async fn test_empty_history_apologizes() {
    let assistant = assistant_for(Arc::new(MockMetabase::sample())).await;

    let reply = assistant.handle_messages(&[Message::system("ignored")]).await;

    assert_eq!(reply, PromptReply::failed());
    assert_eq!(reply.reply, APOLOGY);
}

#[tokio::test]
async fn test_reply_serializes_like_the_http_api() {
    let reply = PromptReply {
        reply: "ok".to_string(),
        sql: "SELECT 1;".to_string(),
        viz_type: "bar".to_string(),
        conversation_ended: false,
    };

    let value = serde_json::to_value(&reply).unwrap();
    assert_eq!(value["reply"], "ok");
    assert_eq!(value["sql"], "SELECT 1;");
    assert_eq!(value["viz_type"], "bar");
}
