//! HTTP-level tests of the Azure Assistants backend against a mock server.

use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;

use lending_bot::assistants::backends::azure::AzureAssistantsClient;
use lending_bot::assistants::{
    Annotation, ApiError, AssistantSpec, AssistantsBackend, MessageContent, RunStatus, ToolOutput,
    VectorStoreStatus,
};
use lending_bot::config::{self, IndexingConfig, RunnerConfig};
use lending_bot::error::AppError;
use lending_bot::indexing::TempIndexer;
use lending_bot::pipeline::LendingBotPipeline;
use lending_bot::runner::AssistantRunner;
use lending_bot::tools::{ToolDispatcher, ToolRegistry};

const API_VERSION: &str = "2025-03-01-preview";
const API_KEY: &str = "test-key";

fn client(server: &MockServer) -> AzureAssistantsClient {
    AzureAssistantsClient::new(server.base_url(), API_VERSION.into(), 5, API_KEY.into()).unwrap()
}

#[tokio::test]
async fn create_thread_sends_key_and_version() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/openai/threads")
                .query_param("api-version", API_VERSION)
                .header("api-key", API_KEY);
            then.status(200).json_body(json!({ "id": "thread_abc", "object": "thread" }));
        })
        .await;

    let thread = client(&server).create_thread().await.unwrap();
    assert_eq!(thread.id, "thread_abc");
    mock.assert_async().await;
}

#[tokio::test]
async fn create_assistant_posts_tools_and_resources() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/openai/assistants")
                .body_contains("\"getRateSheet\"")
                .body_contains("\"vector_store_ids\":[\"vs_1\"]");
            then.status(200).json_body(json!({
                "id": "asst_1",
                "object": "assistant",
                "name": "Lending Copilot",
                "model": "GPT4O_DEPLOYMENT"
            }));
        })
        .await;

    let spec = AssistantSpec {
        name: "Lending Copilot".into(),
        model: "GPT4O_DEPLOYMENT".into(),
        instructions: "You answer lending questions.".into(),
        tools: ToolRegistry::default_lending().openai_tools(),
        tool_resources: json!({ "file_search": { "vector_store_ids": ["vs_1"] } }),
    };
    let assistant = client(&server).create_assistant(&spec).await.unwrap();
    assert_eq!(assistant.id, "asst_1");
    assert_eq!(assistant.name.as_deref(), Some("Lending Copilot"));
    mock.assert_async().await;
}

#[tokio::test]
async fn retrieve_run_decodes_required_action() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/openai/threads/thread_1/runs/run_1");
            then.status(200).json_body(json!({
                "id": "run_1",
                "object": "thread.run",
                "thread_id": "thread_1",
                "assistant_id": "asst_1",
                "status": "requires_action",
                "created_at": 1_700_000_000,
                "required_action": {
                    "type": "submit_tool_outputs",
                    "submit_tool_outputs": {
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": { "name": "webSearch", "arguments": "{\"query\":\"FHA limits\"}" }
                        }]
                    }
                },
                "last_error": null
            }));
        })
        .await;

    let run = client(&server).retrieve_run("thread_1", "run_1").await.unwrap();
    assert_eq!(run.status, RunStatus::RequiresAction);
    assert_eq!(run.created_at, 1_700_000_000);
    let calls = run.pending_tool_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].function.name, "webSearch");
    assert_eq!(calls[0].function.arguments, "{\"query\":\"FHA limits\"}");
}

#[tokio::test]
async fn unknown_run_status_is_tolerated() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/openai/threads/thread_1/runs/run_1");
            then.status(200).json_body(json!({ "id": "run_1", "status": "paused_for_review" }));
        })
        .await;

    let run = client(&server).retrieve_run("thread_1", "run_1").await.unwrap();
    assert_eq!(run.status, RunStatus::Unknown);
    assert!(!run.status.is_pending());
}

#[tokio::test]
async fn list_messages_ascending_with_citations() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/openai/threads/thread_1/messages")
                .query_param("order", "asc")
                .query_param("limit", "100")
                .query_param("api-version", API_VERSION);
            then.status(200).json_body(json!({
                "object": "list",
                "data": [
                    {
                        "id": "msg_1",
                        "role": "user",
                        "content": [{ "type": "text", "text": { "value": "Jumbo rate?", "annotations": [] } }]
                    },
                    {
                        "id": "msg_2",
                        "role": "assistant",
                        "content": [
                            {
                                "type": "text",
                                "text": {
                                    "value": "Jumbo loans start at 6.25% 【4:0†rates.md】",
                                    "annotations": [
                                        {
                                            "type": "file_citation",
                                            "text": "【4:0†rates.md】",
                                            "start_index": 28,
                                            "end_index": 41,
                                            "file_citation": { "file_id": "file_rates" }
                                        },
                                        { "type": "file_path", "text": "x", "file_path": { "file_id": "file_x" } }
                                    ]
                                }
                            },
                            { "type": "image_file", "image_file": { "file_id": "file_img" } }
                        ]
                    }
                ],
                "first_id": "msg_1",
                "last_id": "msg_2",
                "has_more": false
            }));
        })
        .await;

    let messages = client(&server).list_messages("thread_1").await.unwrap();
    mock.assert_async().await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, "assistant");
    assert!(matches!(messages[1].content[1], MessageContent::Other));
    match &messages[1].content[0] {
        MessageContent::Text { text } => {
            assert!(text.value.starts_with("Jumbo loans"));
            assert!(matches!(
                &text.annotations[0],
                Annotation::FileCitation { file_citation, .. } if file_citation.file_id == "file_rates"
            ));
            assert!(matches!(text.annotations[1], Annotation::Other));
        }
        MessageContent::Other => panic!("expected text content"),
    }
}

#[tokio::test]
async fn not_found_maps_to_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/openai/threads/thread_gone");
            then.status(404).json_body(json!({
                "error": { "message": "No thread found with id 'thread_gone'.", "code": null }
            }));
        })
        .await;

    let err = client(&server).retrieve_thread("thread_gone").await.unwrap_err();
    match err {
        ApiError::NotFound(msg) => assert_eq!(msg, "No thread found with id 'thread_gone'."),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn error_envelope_maps_to_http_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/openai/threads/thread_1/runs");
            then.status(429).json_body(json!({
                "error": { "message": "Rate limit exceeded", "code": "rate_limit_exceeded" }
            }));
        })
        .await;

    let err = client(&server).create_run("thread_1", "asst_1").await.unwrap_err();
    match &err {
        ApiError::Http { status, code, message } => {
            assert_eq!(*status, 429);
            assert_eq!(code.as_deref(), Some("rate_limit_exceeded"));
            assert_eq!(message, "Rate limit exceeded");
        }
        other => panic!("expected Http, got {other:?}"),
    }
    assert_eq!(err.to_string(), "HTTP 429 [code=rate_limit_exceeded]: Rate limit exceeded");
}

#[tokio::test]
async fn error_without_code_has_no_code_tag() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/openai/assistants");
            then.status(400).json_body(json!({
                "error": { "message": "Invalid model deployment", "code": null }
            }));
        })
        .await;

    let spec = AssistantSpec {
        name: "Lending Copilot".into(),
        model: "missing".into(),
        instructions: "i".into(),
        tools: vec![],
        tool_resources: json!({}),
    };
    let err = client(&server).create_assistant(&spec).await.unwrap_err();
    assert_eq!(err.to_string(), "HTTP 400: Invalid model deployment");
}

#[tokio::test]
async fn non_json_error_body_kept_verbatim() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/openai/threads");
            then.status(502).body("upstream unavailable");
        })
        .await;

    let err = client(&server).create_thread().await.unwrap_err();
    assert_eq!(err.to_string(), "HTTP 502: upstream unavailable");
}

#[tokio::test]
async fn malformed_success_body_is_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/openai/threads");
            then.status(200).body("not json");
        })
        .await;

    let err = client(&server).create_thread().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn submit_tool_outputs_posts_ids() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/openai/threads/thread_1/runs/run_1/submit_tool_outputs")
                .json_body(json!({
                    "tool_outputs": [{ "tool_call_id": "call_1", "output": "file_mock_B1_T9" }]
                }));
            then.status(200).json_body(json!({ "id": "run_1", "thread_id": "thread_1", "status": "queued" }));
        })
        .await;

    let outputs = [ToolOutput { tool_call_id: "call_1".into(), output: "file_mock_B1_T9".into() }];
    let run = client(&server)
        .submit_tool_outputs("thread_1", "run_1", &outputs)
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Queued);
    mock.assert_async().await;
}

#[tokio::test]
async fn upload_file_is_multipart_with_purpose() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("guidelines.md");
    std::fs::write(&path, "FHA loans require 3.5% down.").unwrap();

    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/openai/files")
                .header_exists("content-type")
                .body_contains("name=\"purpose\"")
                .body_contains("assistants")
                .body_contains("filename=\"guidelines.md\"")
                .body_contains("FHA loans require 3.5% down.");
            then.status(200).json_body(json!({
                "id": "file_1",
                "object": "file",
                "filename": "guidelines.md",
                "purpose": "assistants",
                "bytes": 28
            }));
        })
        .await;

    let file = client(&server).upload_file(&path).await.unwrap();
    assert_eq!(file.id, "file_1");
    assert_eq!(file.bytes, 28);
    mock.assert_async().await;
}

#[tokio::test]
async fn upload_missing_file_is_io_error() {
    let server = MockServer::start_async().await;
    let err = client(&server)
        .upload_file(std::path::Path::new("/definitely/not/here.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Io(_)));
}

#[tokio::test]
async fn vector_store_lifecycle() {
    let server = MockServer::start_async().await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/openai/vector_stores")
                .json_body(json!({ "name": "temp_vs", "file_ids": ["file_1", "file_2"] }));
            then.status(200).json_body(json!({
                "id": "vs_1",
                "name": "temp_vs",
                "status": "in_progress",
                "file_counts": { "in_progress": 2, "completed": 0, "failed": 0, "cancelled": 0, "total": 2 }
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/openai/vector_stores/vs_1");
            then.status(200).json_body(json!({
                "id": "vs_1",
                "status": "completed",
                "file_counts": { "in_progress": 0, "completed": 2, "failed": 0, "cancelled": 0, "total": 2 }
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/openai/vector_stores/vs_1");
            then.status(200).json_body(json!({ "id": "vs_1", "deleted": true }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/openai/files/file_1");
            then.status(200).json_body(json!({ "id": "file_1", "deleted": false }));
        })
        .await;

    let c = client(&server);
    let store = c
        .create_vector_store("temp_vs", &["file_1".to_string(), "file_2".to_string()])
        .await
        .unwrap();
    assert_eq!(store.status, VectorStoreStatus::InProgress);
    create.assert_async().await;

    let store = c.retrieve_vector_store("vs_1").await.unwrap();
    assert_eq!(store.status, VectorStoreStatus::Completed);
    assert_eq!(store.file_counts.completed, 2);

    c.delete_vector_store("vs_1").await.unwrap();
    assert!(matches!(c.delete_file("file_1").await, Err(ApiError::Request(_))));
}

#[tokio::test]
async fn runner_answers_tool_round_over_http() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/openai/threads");
            then.status(200).json_body(json!({ "id": "thread_1" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/openai/threads/thread_1/messages")
                .json_body(json!({ "role": "user", "content": "Price a jumbo loan" }));
            then.status(200).json_body(json!({ "id": "msg_1", "role": "user", "content": [] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/openai/threads/thread_1/runs")
                .json_body(json!({ "assistant_id": "asst_1", "stream": false }));
            then.status(200).json_body(json!({
                "id": "run_1",
                "thread_id": "thread_1",
                "status": "requires_action",
                "required_action": {
                    "type": "submit_tool_outputs",
                    "submit_tool_outputs": {
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {
                                "name": "getRateSheet",
                                "arguments": "{\"loanType\":\"jumbo\",\"fico\":760,\"ltv\":80}"
                            }
                        }]
                    }
                }
            }));
        })
        .await;
    let submit = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/openai/threads/thread_1/runs/run_1/submit_tool_outputs")
                .body_contains("call_1")
                .body_contains("RateSheet mock");
            then.status(200).json_body(json!({ "id": "run_1", "thread_id": "thread_1", "status": "completed" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/openai/threads/thread_1/messages");
            then.status(200).json_body(json!({
                "data": [
                    { "id": "msg_1", "role": "user", "content": [{ "type": "text", "text": { "value": "Price a jumbo loan", "annotations": [] } }] },
                    { "id": "msg_2", "role": "assistant", "content": [{ "type": "text", "text": { "value": "Jumbo at 760/80: 6.25%", "annotations": [] } }] }
                ]
            }));
        })
        .await;

    let runner = AssistantRunner::new(
        "asst_1".into(),
        AssistantsBackend::Azure(client(&server)),
        ToolDispatcher::new(),
        RunnerConfig { poll_interval: Duration::from_millis(1), run_timeout: Duration::from_secs(5) },
    );
    let reply = runner.run("Price a jumbo loan", None).await.unwrap();
    assert_eq!(reply.thread_id, "thread_1");
    assert_eq!(reply.run_id, "run_1");
    assert_eq!(reply.text, "Jumbo at 760/80: 6.25%");
    submit.assert_async().await;
}

#[tokio::test]
async fn cancel_run_posts_to_cancel_endpoint() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/openai/threads/thread_1/runs/run_1/cancel")
                .query_param("api-version", API_VERSION)
                .header("api-key", API_KEY);
            then.status(200).json_body(json!({ "id": "run_1", "thread_id": "thread_1", "status": "cancelling" }));
        })
        .await;

    let run = client(&server).cancel_run("thread_1", "run_1").await.unwrap();
    assert_eq!(run.status, RunStatus::Cancelling);
    mock.assert_async().await;
}

#[tokio::test]
async fn list_messages_follows_pages() {
    let server = MockServer::start_async().await;
    // Registered first so it wins for requests carrying `after`.
    let second = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/openai/threads/thread_1/messages")
                .query_param("after", "msg_2");
            then.status(200).json_body(json!({
                "data": [
                    { "id": "msg_3", "role": "assistant", "content": [{ "type": "text", "text": { "value": "newest", "annotations": [] } }] }
                ],
                "last_id": "msg_3",
                "has_more": false
            }));
        })
        .await;
    let first = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/openai/threads/thread_1/messages")
                .query_param("order", "asc");
            then.status(200).json_body(json!({
                "data": [
                    { "id": "msg_1", "role": "user", "content": [] },
                    { "id": "msg_2", "role": "assistant", "content": [] }
                ],
                "first_id": "msg_1",
                "last_id": "msg_2",
                "has_more": true
            }));
        })
        .await;

    let messages = client(&server).list_messages("thread_1").await.unwrap();
    let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["msg_1", "msg_2", "msg_3"]);
    first.assert_hits_async(1).await;
    second.assert_hits_async(1).await;
}

#[tokio::test]
async fn run_timeout_cancels_remote_run() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/openai/threads/thread_1");
            then.status(200).json_body(json!({ "id": "thread_1" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/openai/threads/thread_1/messages");
            then.status(200).json_body(json!({ "id": "msg_1", "role": "user", "content": [] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/openai/threads/thread_1/runs");
            then.status(200).json_body(json!({ "id": "run_1", "thread_id": "thread_1", "status": "queued" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/openai/threads/thread_1/runs/run_1");
            then.status(200).json_body(json!({ "id": "run_1", "thread_id": "thread_1", "status": "in_progress" }));
        })
        .await;
    let cancel = server
        .mock_async(|when, then| {
            when.method(POST).path("/openai/threads/thread_1/runs/run_1/cancel");
            then.status(200).json_body(json!({ "id": "run_1", "thread_id": "thread_1", "status": "cancelling" }));
        })
        .await;

    let runner = AssistantRunner::new(
        "asst_1".into(),
        AssistantsBackend::Azure(client(&server)),
        ToolDispatcher::new(),
        RunnerConfig { poll_interval: Duration::from_millis(5), run_timeout: Duration::from_millis(30) },
    );
    let err = runner.run("Still there?", Some("thread_1")).await.unwrap_err();
    assert!(matches!(err, AppError::RunTimeout { ref run_id, waited_secs: 1 } if run_id == "run_1"));
    cancel.assert_hits_async(1).await;
}

/// Upload, store creation and deletion mocks for a one-file index on `vs_1`.
/// Returns the (store delete, file delete) mocks.
async fn mock_index_setup<'a>(server: &'a MockServer, poll_status: &str) -> (httpmock::Mock<'a>, httpmock::Mock<'a>) {
    server
        .mock_async(|when, then| {
            when.method(POST).path("/openai/files");
            then.status(200).json_body(json!({ "id": "file_1", "filename": "rates.md", "purpose": "assistants", "bytes": 5 }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/openai/vector_stores");
            then.status(200).json_body(json!({ "id": "vs_1", "status": "in_progress" }));
        })
        .await;
    let status = poll_status.to_string();
    server
        .mock_async(move |when, then| {
            when.method(GET).path("/openai/vector_stores/vs_1");
            then.status(200).json_body(json!({
                "id": "vs_1",
                "status": status,
                "file_counts": { "in_progress": 1, "completed": 0, "failed": 0, "cancelled": 0, "total": 1 }
            }));
        })
        .await;
    let delete_store = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/openai/vector_stores/vs_1");
            then.status(200).json_body(json!({ "id": "vs_1", "deleted": true }));
        })
        .await;
    let delete_file = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/openai/files/file_1");
            then.status(200).json_body(json!({ "id": "file_1", "deleted": true }));
        })
        .await;
    (delete_store, delete_file)
}

fn fast_indexing(timeout: Duration) -> IndexingConfig {
    IndexingConfig {
        vector_store_name: "temp_vs".into(),
        poll_interval: Duration::from_millis(1),
        max_poll_interval: Duration::from_millis(4),
        timeout,
        cleanup: false,
    }
}

fn write_rates(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("rates.md");
    std::fs::write(&path, "6.5%!").unwrap();
    path
}

#[tokio::test]
async fn expired_store_is_deleted_with_its_files() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let (delete_store, delete_file) = mock_index_setup(&server, "expired").await;

    let indexer = TempIndexer::new(
        AssistantsBackend::Azure(client(&server)),
        fast_indexing(Duration::from_secs(5)),
    );
    let err = indexer.index(&[write_rates(&dir)]).await.unwrap_err();
    assert_eq!(err.to_string(), "indexing error: vector store vs_1 expired before indexing finished");
    delete_store.assert_hits_async(1).await;
    delete_file.assert_hits_async(1).await;
}

#[tokio::test]
async fn store_stuck_in_progress_times_out_and_is_deleted() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let (delete_store, delete_file) = mock_index_setup(&server, "in_progress").await;

    let indexer = TempIndexer::new(
        AssistantsBackend::Azure(client(&server)),
        fast_indexing(Duration::from_millis(50)),
    );
    let err = indexer.index(&[write_rates(&dir)]).await.unwrap_err();
    assert!(matches!(&err, AppError::Indexing(msg) if msg.contains("vs_1 not ready")), "{err}");
    delete_store.assert_hits_async(1).await;
    delete_file.assert_hits_async(1).await;
}

#[tokio::test]
async fn failed_assistant_creation_removes_temp_index() {
    let dir = TempDir::new().unwrap();
    let cfg_path = dir.path().join("azure.toml");
    std::fs::write(
        &cfg_path,
        "[indexing]\npoll_interval_ms = 1\nmax_poll_interval_ms = 4\ntimeout_seconds = 5\n",
    )
    .unwrap();
    let cfg = config::load_from(&cfg_path, None, None).unwrap();
    assert!(!cfg.indexing.cleanup);

    let server = MockServer::start_async().await;
    let (delete_store, delete_file) = mock_index_setup(&server, "completed").await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/openai/assistants");
            then.status(404).json_body(json!({
                "error": { "message": "The API deployment for this resource does not exist.", "code": "DeploymentNotFound" }
            }));
        })
        .await;

    let result = LendingBotPipeline::build(
        &cfg,
        AssistantsBackend::Azure(client(&server)),
        &[write_rates(&dir)],
    )
    .await;
    assert!(matches!(result, Err(AppError::Api(ApiError::NotFound(_)))));
    delete_store.assert_hits_async(1).await;
    delete_file.assert_hits_async(1).await;
}
