//! Dependency-injected client seams for external collaborators.
//!
//! The engine never constructs provider clients at module scope; every step
//! receives explicit handles. Production wires real providers behind these
//! traits, tests inject fakes.

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::state::SearchHit;

/// Errors surfaced by provider clients.
#[derive(Debug, Error, Diagnostic)]
pub enum ClientError {
    #[error("provider error ({provider}): {message}")]
    #[diagnostic(code(trendloom::clients::provider))]
    Provider {
        provider: &'static str,
        message: String,
    },

    #[error("provider response was not usable: {what}")]
    #[diagnostic(
        code(trendloom::clients::malformed_response),
        help("The model reply did not contain the expected JSON object.")
    )]
    MalformedResponse { what: String },
}

/// One model invocation: a system prompt plus a user message.
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>, temperature: f32) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature,
        }
    }
}

/// Language-model invocation capability.
///
/// Returns free text; callers that need structured output extract the JSON
/// object with [`extract_json_object`] and deserialize it themselves.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ClientError>;
}

/// Web-search capability: one keyword in, ranked results out.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ClientError>;
}

/// Extract the outermost `{…}` JSON object embedded in model output.
///
/// Models wrap JSON in prose and code fences; the original pipeline matched
/// the first `{` through the last `}` and parsed that span.
///
/// # Examples
///
/// ```
/// use trendloom::clients::extract_json_object;
///
/// let reply = "Sure! Here is the plan:\n```json\n{\"keywords\": [\"ai\"]}\n```";
/// assert_eq!(extract_json_object(reply), Some("{\"keywords\": [\"ai\"]}"));
/// assert_eq!(extract_json_object("no json here"), None);
/// ```
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parse the JSON object embedded in model output into a typed value.
pub fn parse_json_reply<T: serde::de::DeserializeOwned>(
    text: &str,
    what: &str,
) -> Result<T, ClientError> {
    let span = extract_json_object(text).ok_or_else(|| ClientError::MalformedResponse {
        what: format!("no JSON object found in {what} reply"),
    })?;
    serde_json::from_str(span).map_err(|e| ClientError::MalformedResponse {
        what: format!("{what} reply failed to parse: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_outermost_object() {
        let text = "prefix {\"a\": {\"b\": 1}} suffix";
        assert_eq!(extract_json_object(text), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn parse_json_reply_reports_missing_object() {
        let err = parse_json_reply::<serde_json::Value>("plain prose", "plan").unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse { .. }));
    }
}
