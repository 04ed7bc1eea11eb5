use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use copilot::ChatMessage;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::ollama::OllamaClient;
use crate::prompt::assemble_messages;
use crate::repair::validated_json;

#[derive(Debug)]
pub struct ShimState {
    pub ollama: OllamaClient,
    pub default_max_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub content: String,
}

pub fn build_router(state: Arc<ShimState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn chat(
    State(state): State<Arc<ShimState>>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatReply>, (StatusCode, Json<Value>)> {
    let num_predict = body
        .max_tokens
        .filter(|tokens| *tokens > 0)
        .unwrap_or(state.default_max_tokens);
    let messages = assemble_messages(&body.messages);

    let raw = state
        .ollama
        .chat(messages, num_predict)
        .await
        .map_err(|ollama_error| {
            error!(error = %ollama_error, "copilot_shim_ollama_failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "detail": format!("Ollama error: {ollama_error}") })),
            )
        })?;

    let content = match validated_json(&raw) {
        Ok(cleaned) => cleaned,
        Err(repair_error) => {
            warn!(error = %repair_error, "copilot_shim_json_fixup_failed");
            raw
        }
    };
    info!(content_len = content.len(), "copilot_shim_chat_served");
    Ok(Json(ChatReply { content }))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    /// Stands in for Ollama: records each request body and answers with `content`.
    async fn fake_ollama(content: &'static str) -> (String, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let app = Router::new().route(
            "/api/chat",
            post(move |Json(payload): Json<Value>| {
                let recorder = Arc::clone(&recorder);
                async move {
                    recorder.lock().expect("lock").push(payload);
                    Json(json!({ "message": { "role": "assistant", "content": content } }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let url = format!("http://{}/api/chat", listener.local_addr().expect("addr"));
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        (url, seen)
    }

    fn router_for(url: &str) -> Router {
        let ollama =
            OllamaClient::new(url, "test-model", Duration::from_secs(5)).expect("client");
        build_router(Arc::new(ShimState {
            ollama,
            default_max_tokens: 512,
        }))
    }

    async fn post_chat(router: Router, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        let response = router.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = router_for("http://127.0.0.1:9/api/chat")
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        assert_eq!(
            serde_json::from_slice::<Value>(&bytes).expect("json"),
            json!({ "ok": true })
        );
    }

    #[tokio::test]
    async fn chat_forwards_assembled_prompt_and_cleans_reply() {
        let (url, seen) =
            fake_ollama("```json\n{\"files\":[],\"actions\":[],\"explanation\":\"hi\",}\n```").await;
        let (status, body) = post_chat(
            router_for(&url),
            json!({ "messages": [{ "role": "user", "content": "make a tree" }] }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "content": r#"{"files":[],"actions":[],"explanation":"hi"}"# })
        );

        let payloads = seen.lock().expect("lock");
        let payload = &payloads[0];
        assert_eq!(payload["model"], "test-model");
        assert_eq!(payload["stream"], false);
        assert_eq!(payload["options"]["num_predict"], 512);
        let messages = payload["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[5]["content"], "make a tree");
    }

    #[tokio::test]
    async fn unrepairable_reply_is_passed_through_raw() {
        let (url, seen) = fake_ollama("I cannot do that.").await;
        let (status, body) = post_chat(
            router_for(&url),
            json!({ "messages": [{ "role": "user", "content": "x" }], "max_tokens": 64 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "content": "I cannot do that." }));
        assert_eq!(seen.lock().expect("lock")[0]["options"]["num_predict"], 64);
    }

    #[tokio::test]
    async fn unreachable_ollama_is_service_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let url = format!("http://{}/api/chat", listener.local_addr().expect("addr"));
        drop(listener);

        let (status, body) = post_chat(
            router_for(&url),
            json!({ "messages": [{ "role": "user", "content": "x" }] }),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let detail = body["detail"].as_str().expect("detail");
        assert!(detail.starts_with("Ollama error:"), "{detail}");
    }
}
