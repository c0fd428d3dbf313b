use std::time::Duration;

use async_openai::{
	config::OpenAIConfig,
	types::{
		ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
		ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
		CreateChatCompletionResponse, Role,
	},
	Client,
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use tracing::{debug, error};

use crate::{
	generator::PromptMessage,
	models::{Models, Tokens},
	types::Credentials,
	GenerateError, Llm,
};

/// [`Llm`] backed by an OpenAI compatible chat completion API.
///
/// A client is built per prompt since every request may carry a different API key. Failed
/// requests are never retried, rate limits and quota errors come back as
/// [`GenerateError::FailedPromptOpenAI`] right away.
#[derive(Debug, Clone)]
pub struct OpenAiLlm {
	model: Models,
	api_base: String,
	http: reqwest::Client,
}

impl OpenAiLlm {
	pub fn new(model: Models, api_base: impl Into<String>, http: reqwest::Client) -> Self {
		Self { model, api_base: api_base.into(), http }
	}

	fn client(&self, credentials: &Credentials) -> Client<OpenAIConfig> {
		let config = OpenAIConfig::new()
			.with_api_key(credentials.expose())
			.with_api_base(self.api_base.trim_end_matches('/'));

		Client::with_config(config).with_http_client(self.http.clone()).with_backoff(
			ExponentialBackoffBuilder::new().with_max_elapsed_time(Some(Duration::ZERO)).build(),
		)
	}
}

#[async_trait]
impl Llm for OpenAiLlm {
	type Request = ChatCompletionRequestMessage;

	fn name(&self) -> &'static str {
		self.model.name()
	}

	fn max_context_tokens(&self) -> Tokens {
		self.model.max_context_tokens()
	}

	fn build_messages(&self, msgs: Vec<PromptMessage>) -> Result<Vec<Self::Request>, GenerateError> {
		msgs.into_iter()
			.map(|msg| {
				match msg.role {
					Role::System => ChatCompletionRequestSystemMessageArgs::default()
						.content(msg.content)
						.build()
						.map(ChatCompletionRequestMessage::from),
					_ => ChatCompletionRequestUserMessageArgs::default()
						.content(msg.content)
						.build()
						.map(ChatCompletionRequestMessage::from),
				}
				.map_err(|e| {
					error!("Failed to build chat completion message: {}", e);
					GenerateError::BuildRequest(e)
				})
			})
			.collect()
	}

	async fn prompt(
		&self,
		credentials: &Credentials,
		msgs: Vec<Self::Request>,
	) -> Result<String, GenerateError> {
		let request = CreateChatCompletionRequestArgs::default()
			.model(self.model.name())
			.messages(msgs)
			.build()
			.map_err(GenerateError::BuildRequest)?;

		let response = self.client(credentials).chat().create(request).await.map_err(|e| {
			error!("Failed to prompt OpenAI: {}", e);
			GenerateError::FailedPromptOpenAI(e)
		})?;

		debug!(usage = ?response.usage, "chat completion received");

		get_content(response)
	}
}

/// Content of the first choice, untouched.
fn get_content(res: CreateChatCompletionResponse) -> Result<String, GenerateError> {
	res.choices
		.into_iter()
		.next()
		.and_then(|choice| choice.message.content)
		.ok_or(GenerateError::FailedToGetContent)
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use wiremock::{
		matchers::{bearer_token, body_partial_json, method, path},
		Mock, MockServer, ResponseTemplate,
	};

	use super::*;

	fn completion(content: &str) -> serde_json::Value {
		serde_json::json!({
			"id": "chatcmpl-123",
			"object": "chat.completion",
			"created": 1700000000,
			"model": "gpt-4o-mini",
			"choices": [
				{
					"index": 0,
					"message": { "role": "assistant", "content": content },
					"finish_reason": "stop"
				},
				{
					"index": 1,
					"message": { "role": "assistant", "content": "graph LR; X-->Y;" },
					"finish_reason": "stop"
				}
			],
			"usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
		})
	}

	fn llm(server: &MockServer) -> OpenAiLlm {
		OpenAiLlm::new(
			Models::GPT4oMini,
			format!("{}/v1", server.uri()),
			crate::http_client().unwrap(),
		)
	}

	fn msgs(llm: &OpenAiLlm) -> Vec<ChatCompletionRequestMessage> {
		llm.build_messages(vec![
			PromptMessage::system("You generate diagrams."),
			PromptMessage::user("Repository structure:\n[]"),
		])
		.unwrap()
	}

	#[tokio::test]
	async fn extracts_first_choice_verbatim() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/chat/completions"))
			.and(bearer_token("sk-test"))
			.and(body_partial_json(serde_json::json!({
				"model": "gpt-4o-mini",
				"messages": [
					{ "role": "system", "content": "You generate diagrams." },
					{ "role": "user", "content": "Repository structure:\n[]" }
				]
			})))
			.respond_with(ResponseTemplate::new(200).set_body_json(completion("graph TD; A-->B;")))
			.expect(1)
			.mount(&server)
			.await;

		let llm = llm(&server);
		let markup = llm.prompt(&Credentials::new("sk-test"), msgs(&llm)).await.unwrap();

		assert_eq!(markup, "graph TD; A-->B;");
	}

	#[tokio::test]
	async fn rejected_key_is_an_error() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/chat/completions"))
			.respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
				"error": {
					"message": "Incorrect API key provided: sk-bad.",
					"type": "invalid_request_error",
					"param": null,
					"code": "invalid_api_key"
				}
			})))
			.mount(&server)
			.await;

		let llm = llm(&server);
		let err = llm.prompt(&Credentials::new("sk-bad"), msgs(&llm)).await.unwrap_err();

		assert!(matches!(err, GenerateError::FailedPromptOpenAI(_)));
		assert!(err.to_string().contains("Incorrect API key provided"));
	}

	#[tokio::test]
	async fn rate_limit_is_not_retried() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/chat/completions"))
			.respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
				"error": {
					"message": "Rate limit reached for gpt-4o-mini.",
					"type": "requests",
					"param": null,
					"code": "rate_limit_exceeded"
				}
			})))
			.expect(1)
			.mount(&server)
			.await;

		let llm = llm(&server);
		let err = tokio::time::timeout(
			Duration::from_secs(5),
			llm.prompt(&Credentials::new("sk-test"), msgs(&llm)),
		)
		.await
		.expect("rate limited prompt returns without retrying")
		.unwrap_err();

		assert!(matches!(err, GenerateError::FailedPromptOpenAI(_)));
		assert!(err.to_string().contains("Rate limit reached"));
	}

	#[tokio::test]
	async fn empty_choices_have_no_content() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/chat/completions"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"id": "chatcmpl-123",
				"object": "chat.completion",
				"created": 1700000000,
				"model": "gpt-4o-mini",
				"choices": []
			})))
			.mount(&server)
			.await;

		let llm = llm(&server);
		let err = llm.prompt(&Credentials::new("sk-test"), msgs(&llm)).await.unwrap_err();

		assert!(matches!(err, GenerateError::FailedToGetContent));
	}
}
