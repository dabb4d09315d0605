//! Activity suggestions from a chat-completion endpoint.
//!
//! A suggestion is one free-text answer to "does this plan make sense?".
//! It is shown once and never stored. Callers always get a string back;
//! failures are logged and replaced by a fixed message.

use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;

use crate::config::SuggestionConfig;

pub const NO_ACTIVITY: &str = "There is no activity yet. Please set an activity first.";
pub const SUGGESTION_FAILED: &str = "An error occurred while fetching suggestions.";

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Debug, Error)]
pub enum SuggestionError {
    #[error("Suggestion request failed: {0}")]
    Transport(String),
    #[error("Suggestion service returned HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("Failed to parse suggestion response: {0}")]
    Parse(String),
    #[error("Suggestion response contained no choices")]
    NoChoices,
}

/// What the suggestion is about.
#[derive(Debug, Clone, Default)]
pub struct SuggestionRequest {
    pub title: String,
    pub description: String,
    pub time: String,
    pub weather: String,
}

impl SuggestionRequest {
    fn prompt(&self) -> String {
        format!(
            "I am planning an activity with the title: \"{}\". \
             The description is: \"{}\". \
             The weather is: \"{}\". \
             The time is: \"{}\". \
             Does the activity make sense and is there any suggestions?",
            self.title, self.description, self.weather, self.time
        )
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Build the chat-completion request body
pub fn build_request_body(config: &SuggestionConfig, request: &SuggestionRequest) -> Value {
    json!({
        "model": config.model,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": request.prompt() },
        ],
        "repetition_penalty": config.repetition_penalty,
        "temperature": config.temperature,
        "top_p": config.top_p,
        "top_k": config.top_k,
        "max_tokens": config.max_tokens,
        "stop": config.stop,
    })
}

/// Extract the first choice's message content
pub fn parse_completion(body: &str) -> Result<String, SuggestionError> {
    let response: CompletionResponse =
        serde_json::from_str(body).map_err(|e| SuggestionError::Parse(e.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or(SuggestionError::NoChoices)
}

pub struct SuggestionClient {
    config: SuggestionConfig,
    agent: ureq::Agent,
}

impl SuggestionClient {
    pub fn new(config: SuggestionConfig) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Self {
            config,
            agent: builder.build(),
        }
    }

    /// Ask for a suggestion. Never fails: see [`NO_ACTIVITY`] and [`SUGGESTION_FAILED`].
    pub fn suggest(&self, request: &SuggestionRequest) -> String {
        if request.title.trim().is_empty() {
            return NO_ACTIVITY.to_string();
        }

        match self.request(request) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "error fetching suggestions");
                SUGGESTION_FAILED.to_string()
            }
        }
    }

    /// Send one completion request and return the raw first answer.
    pub fn request(&self, request: &SuggestionRequest) -> Result<String, SuggestionError> {
        let body = build_request_body(&self.config, request);
        tracing::debug!(
            endpoint = %self.config.endpoint,
            model = %self.config.model,
            "requesting suggestion"
        );

        let mut call = self
            .agent
            .post(&self.config.endpoint)
            .set("Content-Type", "application/json");
        if let Some(key) = self.config.resolved_api_key() {
            call = call.set("Authorization", &format!("Bearer {key}"));
        }

        let response = match call.send_json(body) {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(SuggestionError::Status { code, body });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(SuggestionError::Transport(transport.to_string()));
            }
        };

        let text = response
            .into_string()
            .map_err(|e| SuggestionError::Transport(e.to_string()))?;
        parse_completion(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SuggestionRequest {
        SuggestionRequest {
            title: "Picnic".to_string(),
            description: "Lunch at the park".to_string(),
            time: "12:30".to_string(),
            weather: "Scattered thunderstorms".to_string(),
        }
    }

    #[test]
    fn body_has_roles_and_sampling() {
        let config = SuggestionConfig::default();
        let body = build_request_body(&config, &request());

        assert_eq!(body["model"], config.model.as_str());
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], SYSTEM_PROMPT);
        assert_eq!(body["messages"][1]["role"], "user");

        let prompt = body["messages"][1]["content"].as_str().unwrap();
        assert!(prompt.contains("\"Picnic\""));
        assert!(prompt.contains("\"Lunch at the park\""));
        assert!(prompt.contains("\"Scattered thunderstorms\""));
        assert!(prompt.contains("\"12:30\""));

        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["top_k"], 40);
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["stop"][0], ".");
    }

    #[test]
    fn first_choice_wins() {
        let body = r#"{"choices": [
            {"message": {"role": "assistant", "content": "Bring an umbrella"}},
            {"message": {"role": "assistant", "content": "Stay home"}}
        ]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Bring an umbrella");
    }

    #[test]
    fn empty_or_malformed_responses_are_errors() {
        assert!(matches!(
            parse_completion(r#"{"choices": []}"#),
            Err(SuggestionError::NoChoices)
        ));
        assert!(matches!(
            parse_completion(r#"{"error": "quota"}"#),
            Err(SuggestionError::NoChoices)
        ));
        assert!(matches!(
            parse_completion("<html>"),
            Err(SuggestionError::Parse(_))
        ));
    }

    #[test]
    fn missing_title_short_circuits() {
        let client = SuggestionClient::new(SuggestionConfig::default());
        let blank = SuggestionRequest {
            title: " ".to_string(),
            ..request()
        };
        assert_eq!(client.suggest(&blank), NO_ACTIVITY);
    }

    #[test]
    fn unreachable_endpoint_yields_fixed_message() {
        let config = SuggestionConfig {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            timeout_secs: Some(1),
            ..SuggestionConfig::default()
        };
        let client = SuggestionClient::new(config);
        assert_eq!(client.suggest(&request()), SUGGESTION_FAILED);
    }
}
