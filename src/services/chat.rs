//! Chat bridge to the generative-AI completion endpoint.
//!
//! `GeminiClient` does the HTTP call; `ChatHistory` keeps a bounded,
//! lock-guarded transcript per user; `Chatbot` ties them together and maps
//! every failure class to a user-facing reply so the endpoint never
//! surfaces a provider error to the caller.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::error;

use crate::config::GeminiConfig;

/// Persona and topic constraints sent with every completion call.
const SYSTEM_PROMPT: &str = "You are a helpful movie booking assistant chatbot for a cinema. \
You help users with: movie recommendations, booking information and process, \
show timings and dates, pricing details, payment methods (Razorpay), \
ticket cancellation and refund policies, and general cinema FAQs. \
Keep responses concise, friendly, and relevant to movie booking. \
If asked about something unrelated to movies/cinema, politely redirect to movie booking topics.";

const TEMPERATURE: f32 = 0.7;
const MAX_OUTPUT_TOKENS: u32 = 500;

/// Retained messages per user; oldest are dropped first.
const MAX_TURNS: usize = 20;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("request to AI endpoint failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("AI quota exceeded")]
    QuotaExceeded,
    #[error("AI authentication failed")]
    Unauthorized,
    #[error("AI model not found")]
    ModelNotFound,
    #[error("AI endpoint error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("AI response contained no text")]
    EmptyResponse,
}

/// One retained message of a user's transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TurnRole {
    User,
    Model,
}

impl TurnRole {
    fn as_str(self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Model => "model",
        }
    }
}

// --- Completion API models ---

#[derive(Debug, Serialize)]
struct GenerateRequest {
    #[serde(rename = "systemInstruction")]
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Client for the generative-AI completion endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl GeminiClient {
    pub fn from_config(config: &GeminiConfig) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            model: config.model.clone(),
        }
    }

    /// One completion call: retained transcript plus the new user message,
    /// bounded output, fixed sampling temperature.
    pub async fn generate(
        &self,
        history: &[ChatTurn],
        user_message: &str,
    ) -> Result<String, ChatError> {
        let mut contents: Vec<Content> = history
            .iter()
            .map(|turn| Content {
                role: Some(turn.role.as_str().to_string()),
                parts: vec![Part {
                    text: turn.text.clone(),
                }],
            })
            .collect();
        contents.push(Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: user_message.to_string(),
            }],
        });

        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
            contents,
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        let response = self
            .http_client
            .post(format!(
                "{}/models/{}:generateContent",
                self.api_url, self.model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        match status.as_u16() {
            200 => {}
            429 => return Err(ChatError::QuotaExceeded),
            401 | 403 => return Err(ChatError::Unauthorized),
            404 => return Err(ChatError::ModelNotFound),
            code => {
                let message = response.text().await.unwrap_or_default();
                return Err(ChatError::Api { status: code, message });
            }
        }

        let body = response.json::<GenerateResponse>().await?;
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ChatError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Bounded per-user transcripts behind a lock. Concurrent requests from the
/// same user serialize on the mutex instead of racing on shared state.
#[derive(Debug, Default)]
pub struct ChatHistory {
    transcripts: Mutex<HashMap<i32, VecDeque<ChatTurn>>>,
}

impl ChatHistory {
    pub fn snapshot(&self, user_id: i32) -> Vec<ChatTurn> {
        let transcripts = self.transcripts.lock().unwrap();
        transcripts
            .get(&user_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Record a completed exchange, evicting the oldest turns past the cap.
    pub fn push_exchange(&self, user_id: i32, user_message: &str, model_reply: &str) {
        let mut transcripts = self.transcripts.lock().unwrap();
        let turns = transcripts.entry(user_id).or_default();
        turns.push_back(ChatTurn {
            role: TurnRole::User,
            text: user_message.to_string(),
        });
        turns.push_back(ChatTurn {
            role: TurnRole::Model,
            text: model_reply.to_string(),
        });
        while turns.len() > MAX_TURNS {
            turns.pop_front();
        }
    }

    pub fn clear(&self, user_id: i32) {
        let mut transcripts = self.transcripts.lock().unwrap();
        transcripts.remove(&user_id);
    }
}

/// The chatbot as the controller sees it: ask, get a string back, always.
#[derive(Clone)]
pub struct Chatbot {
    client: GeminiClient,
    history: Arc<ChatHistory>,
}

impl Chatbot {
    pub fn from_config(config: &GeminiConfig) -> Self {
        Self {
            client: GeminiClient::from_config(config),
            history: Arc::new(ChatHistory::default()),
        }
    }

    /// Answer a user message. Provider failures come back as user-facing
    /// text, never as an error.
    pub async fn get_response(&self, user_id: i32, message: &str) -> String {
        let history = self.history.snapshot(user_id);

        match self.client.generate(&history, message).await {
            Ok(reply) => {
                self.history.push_exchange(user_id, message, &reply);
                reply
            }
            Err(e) => {
                error!("AI completion failed for user {}: {}", user_id, e);
                friendly_message(&e)
            }
        }
    }

    pub fn clear_history(&self, user_id: i32) {
        self.history.clear(user_id);
    }
}

/// Distinct user-facing reply per failure class.
fn friendly_message(err: &ChatError) -> String {
    match err {
        ChatError::QuotaExceeded => "API quota exceeded! The free tier has a daily limit. \
             Please try again tomorrow or contact support."
            .to_string(),
        ChatError::Unauthorized => {
            "Authentication failed! Please check the AI API key configuration.".to_string()
        }
        ChatError::ModelNotFound => {
            "Model not found! Please update the configured AI model name.".to_string()
        }
        other => format!("Having trouble connecting to AI: {other}. Please try again later."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> GeminiClient {
        GeminiClient::from_config(&GeminiConfig {
            api_key: "test-key".to_string(),
            api_url: base_url.to_string(),
            model: "gemini-2.0-flash".to_string(),
        })
    }

    #[tokio::test]
    async fn returns_the_candidate_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": {"maxOutputTokens": 500}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "Dune shows at 18:00."}]}
                }]
            })))
            .mount(&server)
            .await;

        let reply = client(&server.uri())
            .generate(&[], "When is Dune showing?")
            .await
            .unwrap();

        assert_eq!(reply, "Dune shows at 18:00.");
    }

    #[tokio::test]
    async fn maps_quota_auth_and_missing_model_statuses() {
        for (status, expect_quota, expect_auth, expect_missing) in [
            (429u16, true, false, false),
            (401u16, false, true, false),
            (404u16, false, false, true),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let err = client(&server.uri()).generate(&[], "hi").await.unwrap_err();
            assert_eq!(matches!(err, ChatError::QuotaExceeded), expect_quota);
            assert_eq!(matches!(err, ChatError::Unauthorized), expect_auth);
            assert_eq!(matches!(err, ChatError::ModelNotFound), expect_missing);
        }
    }

    #[test]
    fn history_caps_retained_turns_oldest_first() {
        let history = ChatHistory::default();

        for i in 0..15 {
            history.push_exchange(1, &format!("q{i}"), &format!("a{i}"));
        }

        let turns = history.snapshot(1);
        assert_eq!(turns.len(), MAX_TURNS);
        // 15 exchanges = 30 messages; the first 10 were evicted.
        assert_eq!(turns[0].text, "q5");
        assert_eq!(turns.last().unwrap().text, "a14");
    }

    #[test]
    fn clear_empties_only_the_callers_transcript() {
        let history = ChatHistory::default();
        history.push_exchange(1, "hello", "hi there");
        history.push_exchange(2, "hola", "hey");

        history.clear(1);

        assert!(history.snapshot(1).is_empty());
        assert_eq!(history.snapshot(2).len(), 2);

        // Clearing again is a no-op, not an error.
        history.clear(1);
        assert!(history.snapshot(1).is_empty());
    }

    #[test]
    fn each_failure_class_gets_a_distinct_message() {
        let quota = friendly_message(&ChatError::QuotaExceeded);
        let auth = friendly_message(&ChatError::Unauthorized);
        let missing = friendly_message(&ChatError::ModelNotFound);
        let generic = friendly_message(&ChatError::EmptyResponse);

        let all = [&quota, &auth, &missing, &generic];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
