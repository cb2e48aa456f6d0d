//! An OpenAI-compatible chat-completion implementation of
//! [`ScenarioGenerator`].
//!
//! The request asks for a JSON object matching [`ScenarioDraft`] and the
//! response is validated at this boundary. No retries happen here; a failed
//! or malformed completion surfaces as a [`GenerationError`] for the
//! executor to count against the job's attempts.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{GenerationContext, GenerationError, ScenarioDraft, ScenarioGenerator};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You write short roleplay scenarios for language \
learners practicing conversation. Respond with a single JSON object with the \
keys: title, summary, instructions, opening_line, key_phrases. The \
opening_line and key_phrases must be in the learner's target language; \
everything else in English.";

/// Chat-completion generation adapter.
pub struct OpenAiGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    /// Point the adapter at a compatible provider or a local test server.
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_owned(),
        }
    }

    pub fn with_model(self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self
        }
    }

    fn request_body(&self, context: &GenerationContext) -> serde_json::Value {
        json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt(context) },
            ],
        })
    }
}

fn user_prompt(context: &GenerationContext) -> String {
    let mut prompt = format!(
        "Target language: {}\nDifficulty: {}\nTheme: {}",
        context.language, context.difficulty, context.theme,
    );
    if let Some(profile) = &context.learner_profile {
        prompt.push_str("\nLearner profile: ");
        prompt.push_str(profile);
    }
    prompt
}

fn parse_draft(content: &str) -> Result<ScenarioDraft, GenerationError> {
    serde_json::from_str(content)
        .map_err(|err| GenerationError::InvalidResponse(format!("bad draft payload: {err}")))
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[async_trait]
impl ScenarioGenerator for OpenAiGenerator {
    async fn generate(&self, context: GenerationContext) -> Result<ScenarioDraft, GenerationError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(&context))
            .send()
            .await
            .map_err(|err| GenerationError::Provider(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Provider(format!(
                "provider responded with {status}"
            )));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|err| GenerationError::InvalidResponse(err.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::InvalidResponse("completion had no choices".into()))?;

        parse_draft(&content)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::generator::Difficulty;

    #[test]
    fn request_asks_for_json_mode() {
        let generator = OpenAiGenerator::new("key").with_model("test-model");
        let body = generator.request_body(&GenerationContext::mock());

        assert_eq!(body["model"], "test-model");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[test]
    fn user_prompt_includes_profile_when_present() {
        let context = GenerationContext {
            theme: "renting an apartment".to_owned(),
            difficulty: Difficulty::Advanced,
            language: "es".to_owned(),
            learner_profile: Some("moving to Madrid next month".to_owned()),
        };
        let prompt = user_prompt(&context);

        assert!(prompt.contains("Target language: es"));
        assert!(prompt.contains("Difficulty: advanced"));
        assert!(prompt.contains("moving to Madrid"));
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let generator = OpenAiGenerator::with_base_url("http://localhost:8080/", "key");
        assert_eq!(generator.base_url, "http://localhost:8080");
    }

    #[test]
    fn draft_parses_from_completion_content() {
        let draft = parse_draft(
            r#"{
                "title": "At the cafe",
                "summary": "Order a drink",
                "instructions": "Order a coffee and ask for the bill",
                "opening_line": "いらっしゃいませ！",
                "key_phrases": ["お願いします"]
            }"#,
        )
        .unwrap();

        assert_eq!(draft.title, "At the cafe");
        assert_eq!(draft.key_phrases.len(), 1);
    }

    #[test]
    fn malformed_content_is_an_invalid_response() {
        assert_matches!(
            parse_draft("the model ignored json mode"),
            Err(GenerationError::InvalidResponse(_))
        );
    }
}
