//! The streaming seam between the chat controller and the model service.
//!
//! [`StreamingClient`] is what the controller drives.  [`Advisor`] is the production
//! implementation: it wraps a [`Gemini`] client and an [`AdvisorConfig`] and turns each
//! prompt into a request carrying the advisor persona, the prior turns and the sampling
//! controls.

use std::pin::Pin;

use futures::Stream;
use futures::stream::StreamExt;

use crate::chat::AdvisorConfig;
use crate::client::{ChunkStream, Gemini};
use crate::error::{Error, Result};
use crate::types::{Content, GenerateContentRequest, Model};

/// A boxed stream of reply text fragments, in arrival order.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Something that can stream a reply to a prompt.
#[async_trait::async_trait]
pub trait StreamingClient: Send + Sync {
    /// Start streaming the reply to `prompt`, given the prior turns oldest first.
    ///
    /// Fails before any fragment if the stream cannot be opened.  Later failures arrive as
    /// `Err` items; fragments already yielded stay valid.
    async fn stream_reply(&self, prompt: &str, history: &[Content]) -> Result<FragmentStream>;
}

/// The academic advisor backed by the generative-language API.
#[derive(Debug, Clone)]
pub struct Advisor {
    client: Gemini,
    config: AdvisorConfig,
}

impl Advisor {
    /// Create an advisor over an existing client.
    pub fn new(client: Gemini, config: AdvisorConfig) -> Self {
        Self { client, config }
    }

    /// Create the client from the configuration's base URL and timeout.
    ///
    /// The API key is taken from `api_key` or the environment.
    pub fn from_config(api_key: Option<String>, config: AdvisorConfig) -> Result<Self> {
        let client = Gemini::with_options(
            api_key,
            config.base_url.clone(),
            Some(config.request_timeout),
        )?;
        Ok(Self::new(client, config))
    }

    /// The underlying client.
    pub fn client(&self) -> &Gemini {
        &self.client
    }

    /// The active configuration.
    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    /// The model requests are sent to.
    pub fn model(&self) -> &Model {
        &self.config.model
    }

    /// Build the request for `prompt` on top of `history`.
    pub fn request(&self, prompt: &str, history: &[Content]) -> Result<GenerateContentRequest> {
        if prompt.trim().is_empty() {
            return Err(Error::validation(
                "prompt must not be empty",
                Some("prompt".to_string()),
            ));
        }
        let mut contents = Vec::with_capacity(history.len() + 1);
        contents.extend_from_slice(history);
        contents.push(Content::user(prompt));

        let mut request = GenerateContentRequest::new(contents)
            .with_generation_config(self.config.generation_config());
        if let Some(instruction) = &self.config.system_instruction {
            request = request.with_system_instruction(instruction.clone());
        }
        Ok(request)
    }

    /// Answer `prompt` without streaming.
    pub async fn reply(&self, prompt: &str, history: &[Content]) -> Result<String> {
        let request = self.request(prompt, history)?;
        let response = self
            .client
            .generate_content(&self.config.model, &request)
            .await?;
        check_blocked(response.block_reason())?;
        Ok(response.text())
    }
}

#[async_trait::async_trait]
impl StreamingClient for Advisor {
    async fn stream_reply(&self, prompt: &str, history: &[Content]) -> Result<FragmentStream> {
        let request = self.request(prompt, history)?;
        let chunks = self
            .client
            .stream_generate_content(&self.config.model, &request)
            .await?;
        Ok(fragments(chunks))
    }
}

fn check_blocked(reason: Option<&str>) -> Result<()> {
    match reason {
        Some(reason) => Err(Error::bad_request(
            format!("prompt blocked: {reason}"),
            Some("contents".to_string()),
        )),
        None => Ok(()),
    }
}

/// Reduce a chunk stream to its non-empty text fragments.
///
/// Chunks that carry only usage or a finish reason yield nothing.  A chunk reporting a
/// blocked prompt becomes an error.
pub fn fragments(chunks: ChunkStream) -> FragmentStream {
    Box::pin(chunks.filter_map(|chunk| async move {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => return Some(Err(err)),
        };
        if let Err(err) = check_blocked(chunk.block_reason()) {
            return Some(Err(err));
        }
        let text = chunk.text();
        if text.is_empty() { None } else { Some(Ok(text)) }
    }))
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;
    use crate::types::{
        Candidate, FinishReason, GenerateContentResponse, GenerationConfig, KnownModel, Part,
        PromptFeedback, Role, UsageMetadata,
    };

    fn advisor(config: AdvisorConfig) -> Advisor {
        let client = Gemini::new(Some("test-key".to_string())).unwrap();
        Advisor::new(client, config)
    }

    fn chunk(text: &str) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content::model(text)),
                ..Candidate::default()
            }],
            ..GenerateContentResponse::default()
        }
    }

    async fn collect(chunks: Vec<Result<GenerateContentResponse>>) -> Vec<Result<String>> {
        fragments(Box::pin(stream::iter(chunks))).collect().await
    }

    #[test]
    fn request_appends_prompt_after_history() {
        let advisor = advisor(AdvisorConfig::new());
        let history = vec![Content::model("Hello!"), Content::user("hi"), Content::model("Hey")];
        let request = advisor.request("What is CGPA?", &history).unwrap();

        assert_eq!(request.contents.len(), 4);
        assert_eq!(&request.contents[..3], &history[..]);
        assert_eq!(request.contents[3], Content::user("What is CGPA?"));
        assert!(
            request
                .system_instruction
                .as_ref()
                .unwrap()
                .text()
                .starts_with("You are the DIU Student Portal Smart Advisor.")
        );
        assert!(request.generation_config.is_none());
    }

    #[test]
    fn request_carries_sampling_controls() {
        let config = AdvisorConfig::new()
            .with_temperature(Some(0.2))
            .with_max_output_tokens(Some(512))
            .with_system_instruction(None);
        let request = advisor(config).request("hi", &[]).unwrap();

        assert!(request.system_instruction.is_none());
        assert_eq!(
            request.generation_config,
            Some(GenerationConfig {
                temperature: Some(0.2),
                max_output_tokens: Some(512),
                ..GenerationConfig::default()
            })
        );
    }

    #[test]
    fn request_wire_shape() {
        let request = advisor(AdvisorConfig::new()).request("hi", &[]).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert!(json["systemInstruction"]["parts"][0]["text"].is_string());
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn empty_prompt_is_rejected() {
        let advisor = advisor(AdvisorConfig::new());
        assert!(advisor.request("   ", &[]).unwrap_err().is_validation());
    }

    #[test]
    fn default_model() {
        let advisor = advisor(AdvisorConfig::new());
        assert_eq!(advisor.model(), &Model::Known(KnownModel::Gemini25Flash));
    }

    #[tokio::test]
    async fn fragments_skip_empty_chunks() {
        let finish = GenerateContentResponse {
            candidates: vec![Candidate {
                finish_reason: Some(FinishReason::Stop),
                ..Candidate::default()
            }],
            usage_metadata: Some(UsageMetadata::new(10, 5)),
            ..GenerateContentResponse::default()
        };
        let out = collect(vec![Ok(chunk("CGPA ")), Ok(chunk("is ")), Ok(finish)]).await;
        let out: Vec<String> = out.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(out, vec!["CGPA ", "is "]);
    }

    #[tokio::test]
    async fn fragments_drop_thoughts() {
        let mixed = GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some(Role::Model),
                    parts: vec![
                        Part {
                            text: Some("planning".to_string()),
                            thought: Some(true),
                        },
                        Part::text("answer"),
                    ],
                }),
                ..Candidate::default()
            }],
            ..GenerateContentResponse::default()
        };
        let out = collect(vec![Ok(mixed)]).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap(), "answer");
    }

    #[tokio::test]
    async fn fragments_pass_errors_through() {
        let out = collect(vec![
            Ok(chunk("partial")),
            Err(Error::streaming("connection reset", None)),
        ])
        .await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), "partial");
        assert!(out[1].as_ref().unwrap_err().is_service_unavailable());
    }

    #[tokio::test]
    async fn blocked_prompt_is_an_error() {
        let blocked = GenerateContentResponse {
            prompt_feedback: Some(PromptFeedback {
                block_reason: Some("SAFETY".to_string()),
            }),
            ..GenerateContentResponse::default()
        };
        let out = collect(vec![Ok(blocked)]).await;
        let err = out[0].as_ref().unwrap_err();
        assert!(err.is_bad_request());
        assert!(err.to_string().contains("SAFETY"));
    }
}
