use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use tracing::Instrument;

use super::sse::sse_response;
use crate::error::Result;
use crate::server::state::AppState;
use crate::types::RelayRequest;

/// POST /api/chat - Relay a conversation to the upstream completions API.
///
/// Streams the reply as SSE when `stream` is true (the default), otherwise
/// returns the upstream body as is. Anything without a non-empty
/// `messages` array is answered with 400 before the upstream is touched.
pub async fn handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match RelayRequest::parse(&body) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    let span = tracing::info_span!(
        "a3s.playground.relay",
        "request_id" = %uuid::Uuid::new_v4(),
        "model" = %state.config.upstream.model,
        "stream" = request.stream,
        "messages" = request.messages.len(),
    );

    relay(state, request)
        .instrument(span)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn relay(state: AppState, request: RelayRequest) -> Result<Response> {
    let stream = request.stream;
    let upstream_request = request.into_upstream(&state.config.upstream.model);

    if stream {
        let chunks = state.client.complete_streaming(&upstream_request).await?;
        tracing::info!("Relaying streamed reply");
        Ok(sse_response(chunks).into_response())
    } else {
        let reply = state.client.complete(&upstream_request).await?;
        tracing::info!(bytes = reply.body.len(), "Relaying complete reply");
        Ok(([(CONTENT_TYPE, reply.content_type)], reply.body).into_response())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::config::PlaygroundConfig;
    use crate::error::PlaygroundError;
    use crate::server::router;
    use crate::server::state::AppState;
    use crate::types::{StreamChunk, UpstreamRequest};
    use crate::upstream::{ChunkStream, CompletionClient, UpstreamReply};

    /// Scripted upstream that records every request it receives.
    #[derive(Default)]
    struct MockClient {
        requests: Mutex<Vec<UpstreamRequest>>,
        fragments: Vec<&'static str>,
        fail_status: Option<u16>,
    }

    impl MockClient {
        fn recorded(&self) -> Vec<UpstreamRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn check(&self, request: &UpstreamRequest) -> crate::error::Result<()> {
            self.requests.lock().unwrap().push(request.clone());
            match self.fail_status {
                Some(status) => Err(PlaygroundError::Upstream {
                    status,
                    body: "upstream said no".to_string(),
                }),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for MockClient {
        async fn complete(&self, request: &UpstreamRequest) -> crate::error::Result<UpstreamReply> {
            self.check(request)?;
            let body = json!({
                "choices": [{"message": {"role": "assistant", "content": self.fragments.concat()}}]
            });
            Ok(UpstreamReply {
                content_type: "application/json".to_string(),
                body: body.to_string().into(),
            })
        }

        async fn complete_streaming(
            &self,
            request: &UpstreamRequest,
        ) -> crate::error::Result<ChunkStream> {
            self.check(request)?;
            let mut items: Vec<crate::error::Result<StreamChunk>> = self
                .fragments
                .iter()
                .map(|f| Ok(StreamChunk::Delta(f.to_string())))
                .collect();
            items.push(Ok(StreamChunk::Done));
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    fn app(client: Arc<MockClient>) -> axum::Router {
        router::build(AppState::new(Arc::new(PlaygroundConfig::default()), client))
    }

    async fn post(client: Arc<MockClient>, body: &str) -> (StatusCode, String, String) {
        let response = app(client)
            .oneshot(
                Request::post("/api/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_empty_messages_is_bad_request_without_upstream_call() {
        let client = Arc::new(MockClient::default());
        let (status, _, body) = post(client.clone(), r#"{"messages":[]}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Invalid or missing messages");
        assert!(client.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_missing_messages_is_bad_request() {
        let client = Arc::new(MockClient::default());
        let (status, _, _) = post(client.clone(), r#"{"stream":false}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(client.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_defaults_forwarded_once() {
        let client = Arc::new(MockClient {
            fragments: vec!["Hi"],
            ..Default::default()
        });
        let (status, _, _) = post(
            client.clone(),
            r#"{"messages":[{"role":"user","content":"hello"}],"stream":false}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let recorded = client.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].model, "sutra-v2");
        assert_eq!(recorded[0].messages[0].content, "hello");
        assert_eq!(recorded[0].temperature, 1.0);
        assert_eq!(recorded[0].max_tokens, 1024);
    }

    #[tokio::test]
    async fn test_non_stream_body_is_upstream_body() {
        let client = Arc::new(MockClient {
            fragments: vec!["Hello", " there"],
            ..Default::default()
        });
        let (status, content_type, body) = post(
            client,
            r#"{"messages":[{"role":"user","content":"hello"}],"stream":false}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "application/json");
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["choices"][0]["message"]["content"], "Hello there");
    }

    #[tokio::test]
    async fn test_stream_is_event_stream() {
        let client = Arc::new(MockClient {
            fragments: vec!["Hello", " there"],
            ..Default::default()
        });
        let (status, content_type, body) = post(
            client.clone(),
            r#"{"messages":[{"role":"user","content":"hello"}]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/event-stream"));
        assert!(body.ends_with("data: [DONE]\n\n"));
        assert!(client.recorded()[0].stream);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let client = Arc::new(MockClient {
            fail_status: Some(429),
            ..Default::default()
        });
        let (status, _, body) = post(
            client,
            r#"{"messages":[{"role":"user","content":"hello"}]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.contains("429"));
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(Arc::new(MockClient::default()))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
