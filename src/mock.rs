use std::sync::{Arc, Mutex};

use async_openai::types::Role;
use async_trait::async_trait;

use crate::{
	generator::PromptMessage,
	models::Tokens,
	types::{Credentials, SYSTEM_ROLE, USER_ROLE},
	GenerateError, Llm,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockLlmRequest {
	pub role: String,
	pub content: String,
}

impl From<PromptMessage> for MockLlmRequest {
	fn from(msg: PromptMessage) -> Self {
		let role = match msg.role {
			Role::System => SYSTEM_ROLE,
			_ => USER_ROLE,
		};
		Self { role: role.to_string(), content: msg.content }
	}
}

#[derive(Debug, Default)]
struct MockState {
	calls: usize,
	last_request: Option<Vec<MockLlmRequest>>,
	last_credentials: Option<String>,
}

/// Deterministic [`Llm`] recording what it was prompted with.
#[derive(Debug, Clone)]
pub struct MockLlm {
	reply: Result<String, String>,
	max_context_tokens: Tokens,
	state: Arc<Mutex<MockState>>,
}

impl MockLlm {
	pub fn replying(markup: &str) -> Self {
		Self {
			reply: Ok(markup.to_string()),
			max_context_tokens: 1_000,
			state: Arc::default(),
		}
	}

	pub fn failing(error: &str) -> Self {
		Self { reply: Err(error.to_string()), ..Self::replying("") }
	}

	pub fn with_max_context_tokens(mut self, tokens: Tokens) -> Self {
		self.max_context_tokens = tokens;
		self
	}

	pub fn calls(&self) -> usize {
		self.state.lock().unwrap().calls
	}

	pub fn last_request(&self) -> Option<Vec<MockLlmRequest>> {
		self.state.lock().unwrap().last_request.clone()
	}

	pub fn last_credentials(&self) -> Option<String> {
		self.state.lock().unwrap().last_credentials.clone()
	}
}

#[async_trait]
impl Llm for MockLlm {
	type Request = MockLlmRequest;

	fn name(&self) -> &'static str {
		"MockLlm"
	}

	fn max_context_tokens(&self) -> Tokens {
		self.max_context_tokens
	}

	fn build_messages(&self, msgs: Vec<PromptMessage>) -> Result<Vec<Self::Request>, GenerateError> {
		Ok(msgs.into_iter().map(MockLlmRequest::from).collect())
	}

	async fn prompt(
		&self,
		credentials: &Credentials,
		msgs: Vec<Self::Request>,
	) -> Result<String, GenerateError> {
		{
			let mut state = self.state.lock().unwrap();
			state.calls += 1;
			state.last_request = Some(msgs);
			state.last_credentials = Some(credentials.expose().to_string());
		}

		self.reply.clone().map_err(GenerateError::Custom)
	}
}
