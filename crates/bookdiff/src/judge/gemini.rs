//! Gemini-backed page judge.
//!
//! One `generateContent` call per judgment, with page images inlined as
//! base64. The model is prompted to answer in JSON; since it often wraps
//! the JSON in prose, parsing extracts the first JSON object (or array)
//! from the reply before deserializing.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::Regex;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::model::{ExtractedQuestion, PageJudgment};

use super::{JudgeError, PageImage, PageJudge};

pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Maximum length for error bodies echoed into errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

const COMPARE_PROMPT: &str = "Compare these two book page images and tell me whether they are \
identical or different. If they are different, list the differences. Answer with JSON only, \
with the keys: similarity (a number from 0 to 1), isIdentical (true/false), differences \
(an array of strings).";

const TEXT_PROMPT: &str = "Extract all text from this page image, in every language present. \
Write the text exactly as it appears, without edits.";

const QUESTIONS_PROMPT: &str = "Find the exam questions on this page image and extract them. \
Answer with a JSON array of objects with the keys: question (the question text), type (one of \
multiple_choice, true_false, essay, fill_blank), options (the answer choices, for multiple \
choice). If there are no questions, return an empty array [].";

/// Page judge backed by the hosted Gemini vision model.
pub struct GeminiJudge {
    client: Client,
    api_base_url: String,
    model: String,
    api_key: SecretString,
}

impl GeminiJudge {
    /// Builds a judge with explicit endpoint and model.
    pub fn new(
        api_base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, JudgeError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base_url: api_base_url.into(),
            model: model.into(),
            api_key,
        })
    }

    /// Builds a judge against the default hosted endpoint and model.
    pub fn with_defaults(api_key: SecretString) -> Result<Self, JudgeError> {
        Self::new(
            DEFAULT_API_BASE_URL,
            DEFAULT_MODEL,
            api_key,
            Duration::from_secs(60),
        )
    }

    /// Sends one `generateContent` request and returns the first candidate's
    /// text.
    async fn generate(&self, parts: Vec<serde_json::Value>) -> Result<String, JudgeError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base_url,
            self.model,
            self.api_key.expose_secret()
        );

        let response = self
            .client
            .post(&url)
            .json(&json!({ "contents": [{ "parts": parts }] }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(JudgeError::BadStatus {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        // A 200 with a malformed envelope is the model misbehaving, not the
        // transport; report it as unparseable so callers can fall back.
        let payload: GenerateContentResponse =
            serde_json::from_str(&body).map_err(|e| JudgeError::Unparseable {
                reason: format!("response envelope: {}", e),
            })?;
        let text = payload
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| JudgeError::Unparseable {
                reason: "no candidates in reply".to_string(),
            })?;

        debug!(model = %self.model, reply_len = text.len(), "judge reply received");
        Ok(text)
    }

    fn inline_image(image: PageImage<'_>) -> serde_json::Value {
        json!({
            "inline_data": {
                "mime_type": image.mime_type,
                "data": BASE64.encode(image.bytes),
            }
        })
    }
}

#[async_trait]
impl PageJudge for GeminiJudge {
    async fn compare_pages(
        &self,
        old: PageImage<'_>,
        new: PageImage<'_>,
    ) -> Result<PageJudgment, JudgeError> {
        let text = self
            .generate(vec![
                json!({ "text": COMPARE_PROMPT }),
                Self::inline_image(old),
                Self::inline_image(new),
            ])
            .await?;
        parse_judgment(&text)
    }

    async fn extract_text(&self, image: PageImage<'_>) -> Result<String, JudgeError> {
        let text = self
            .generate(vec![json!({ "text": TEXT_PROMPT }), Self::inline_image(image)])
            .await?;
        Ok(text.trim().to_string())
    }

    async fn extract_questions(
        &self,
        image: PageImage<'_>,
    ) -> Result<Vec<ExtractedQuestion>, JudgeError> {
        let text = self
            .generate(vec![
                json!({ "text": QUESTIONS_PROMPT }),
                Self::inline_image(image),
            ])
            .await?;
        parse_questions(&text)
    }
}

/// Response shape of `generateContent`, reduced to the fields used here.
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

fn json_object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("literal regex"))
}

fn json_array_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\[.*\]").expect("literal regex"))
}

/// Extracts and decodes the judgment JSON from a model reply.
///
/// The self-reported similarity is clamped into [0, 1]; nothing else is
/// normalized.
pub fn parse_judgment(reply: &str) -> Result<PageJudgment, JudgeError> {
    let raw = json_object_re()
        .find(reply)
        .ok_or_else(|| JudgeError::Unparseable {
            reason: "no JSON object in reply".to_string(),
        })?;

    let mut judgment: PageJudgment =
        serde_json::from_str(raw.as_str()).map_err(|e| JudgeError::Unparseable {
            reason: e.to_string(),
        })?;

    judgment.similarity = judgment.similarity.clamp(0.0, 1.0);
    Ok(judgment)
}

/// Extracts and decodes the question array from a model reply.
pub fn parse_questions(reply: &str) -> Result<Vec<ExtractedQuestion>, JudgeError> {
    let raw = json_array_re()
        .find(reply)
        .ok_or_else(|| JudgeError::Unparseable {
            reason: "no JSON array in reply".to_string(),
        })?;

    serde_json::from_str(raw.as_str()).map_err(|e| JudgeError::Unparseable {
        reason: e.to_string(),
    })
}

/// Truncates an error body so failing responses cannot flood errors or logs.
fn truncate_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionType;

    #[test]
    fn test_parse_judgment_plain_json() {
        let judgment = parse_judgment(
            r#"{"similarity": 0.85, "isIdentical": false, "differences": ["exercise 3 rewritten"]}"#,
        )
        .unwrap();
        assert_eq!(judgment.similarity, 0.85);
        assert!(!judgment.is_identical);
        assert_eq!(judgment.differences, vec!["exercise 3 rewritten"]);
    }

    #[test]
    fn test_parse_judgment_wrapped_in_prose() {
        let reply = "Here is my analysis:\n```json\n{\"similarity\": 1.0, \"isIdentical\": true, \"differences\": []}\n```\nLet me know if you need more.";
        let judgment = parse_judgment(reply).unwrap();
        assert!(judgment.is_identical);
        assert!(judgment.differences.is_empty());
    }

    #[test]
    fn test_parse_judgment_clamps_similarity() {
        let judgment =
            parse_judgment(r#"{"similarity": 1.7, "isIdentical": true}"#).unwrap();
        assert_eq!(judgment.similarity, 1.0);

        let judgment =
            parse_judgment(r#"{"similarity": -0.3, "isIdentical": false}"#).unwrap();
        assert_eq!(judgment.similarity, 0.0);
    }

    #[test]
    fn test_parse_judgment_missing_differences_defaults_empty() {
        let judgment =
            parse_judgment(r#"{"similarity": 0.4, "isIdentical": false}"#).unwrap();
        assert!(judgment.differences.is_empty());
    }

    #[test]
    fn test_parse_judgment_rejects_prose_only() {
        let err = parse_judgment("The pages look mostly the same to me.").unwrap_err();
        assert!(err.is_unparseable());
    }

    #[test]
    fn test_parse_judgment_rejects_wrong_shape() {
        let err = parse_judgment(r#"{"verdict": "same"}"#).unwrap_err();
        assert!(err.is_unparseable());
    }

    #[test]
    fn test_parse_questions_array() {
        let questions = parse_questions(
            r#"Found these: [{"question": "What is 2+2?", "type": "multiple_choice", "options": ["3", "4", "5"]}]"#,
        )
        .unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question_type, QuestionType::MultipleChoice);
        assert_eq!(questions[0].options.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn test_parse_questions_empty_array() {
        let questions = parse_questions("No questions here: []").unwrap();
        assert!(questions.is_empty());
    }

    #[test]
    fn test_parse_questions_rejects_prose_only() {
        let err = parse_questions("This page has no questions.").unwrap_err();
        assert!(err.is_unparseable());
    }

    #[test]
    fn test_parse_questions_rejects_unknown_type() {
        let err =
            parse_questions(r#"[{"question": "Q?", "type": "matching"}]"#).unwrap_err();
        assert!(err.is_unparseable());
    }

    #[test]
    fn test_truncate_body() {
        let short = truncate_body("brief error");
        assert_eq!(short, "brief error");

        let long = truncate_body(&"x".repeat(500));
        assert!(long.len() < 500);
        assert!(long.ends_with("(truncated)"));
    }
}
