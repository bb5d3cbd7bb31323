//! Integration tests against the live service.
//! These tests require an API key in the environment to run.

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use smart_advisor::chat::{AdvisorConfig, ChatController, ControllerConfig};
    use smart_advisor::{Advisor, GenerationConfig, PlainTextRenderer, StreamingClient};

    fn api_key() -> Option<String> {
        let key = std::env::var("GEMINI_API_KEY").ok();
        if key.is_none() {
            eprintln!("Skipping test: GEMINI_API_KEY not set");
        }
        key
    }

    fn advisor(api_key: String) -> Advisor {
        let config = AdvisorConfig::new().with_max_output_tokens(Some(64));
        Advisor::from_config(Some(api_key), config).expect("Failed to create advisor")
    }

    #[tokio::test]
    async fn test_simple_reply() {
        let Some(api_key) = api_key() else {
            return;
        };
        let reply = advisor(api_key).reply("Say 'test passed'", &[]).await;
        assert!(reply.is_ok(), "Request should succeed with valid API key");
    }

    #[tokio::test]
    async fn test_streaming_reply() {
        let Some(api_key) = api_key() else {
            return;
        };
        let stream = advisor(api_key).stream_reply("Count to 3", &[]).await;
        assert!(stream.is_ok(), "Stream request should succeed");

        let fragments: Vec<_> = stream.unwrap().collect().await;
        assert!(fragments.iter().all(|f| f.is_ok()));
    }

    #[tokio::test]
    async fn test_controller_exchange() {
        let Some(api_key) = api_key() else {
            return;
        };
        let advisor = advisor(api_key);
        let controller = ChatController::new(advisor, ControllerConfig::default());
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        let mut input = "In one sentence, what is CGPA?".to_string();

        let outcome = controller.submit(&mut input, &mut renderer).await;
        assert!(outcome.is_completed(), "Exchange should complete: {outcome:?}");
        assert!(!controller.transcript().last().unwrap().text.is_empty());
    }

    #[tokio::test]
    async fn test_generation_config_is_accepted() {
        let Some(api_key) = api_key() else {
            return;
        };
        let advisor = advisor(api_key);
        let request = advisor
            .request("Say hi", &[])
            .unwrap()
            .with_generation_config(GenerationConfig {
                temperature: Some(0.0),
                max_output_tokens: Some(16),
                ..GenerationConfig::default()
            });
        let response = advisor
            .client()
            .generate_content(advisor.model(), &request)
            .await;
        assert!(response.is_ok());
    }
}
