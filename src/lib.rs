//! Generate architecture diagrams of source code repositories with a large language model.
//!
//! The crate wires three I/O bound steps behind a single "generate" action:
//!
//! 1. [`source`] fetches the files of a GitHub repository (or takes an uploaded file) and turns
//!    them into a [`SourcePayload`].
//! 2. [`generator`] sends the payload together with fixed instructions to a chat completion
//!    endpoint through the [`Llm`] trait and keeps the returned diagram markup verbatim.
//! 3. [`render`] turns the markup into something a browser can display, either a container
//!    picked up by the browser side Mermaid script or an inline image fetched from a rendering
//!    service.
//!
//! The [`controller`] runs these steps in order for a [`Session`], collecting every failure as a
//! [`Notification`] instead of aborting. The binary serves a small web UI on top of it.
//!
//! Usage requires an [OpenAI](https://platform.openai.com/) API key, entered in the form or
//! pre-filled from the `OPENAI_API_KEY` environment variable.
//!
//! # Example
//!
//! ```ignore
//! use repo_diagram::{
//!     controller::{Controller, GenerateInput},
//!     models::Models,
//!     OpenAiLlm, Session, Settings,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::default();
//!     let http = repo_diagram::http_client()?;
//!     let llm = OpenAiLlm::new(Models::GPT4oMini, settings.llm.api_base.clone(), http.clone());
//!     let controller = Controller::new(&settings, llm, http);
//!
//!     let mut session = Session::default();
//!     let outcome = controller
//!         .generate(&mut session, GenerateInput::repository("https://github.com/acme/widgets", "sk-..."))
//!         .await;
//!
//!     println!("{}", outcome.view.text);
//!     Ok(())
//! }
//! ```

use std::fmt::Debug;

use async_trait::async_trait;

pub mod architecture;
pub mod config;
pub mod controller;
pub mod generator;
pub mod models;
pub mod render;
pub mod service;
pub mod session;
pub mod source;
pub mod types;

#[cfg(test)]
mod mock;

pub use config::Settings;
pub use controller::{Controller, PipelinePolicy, PipelineState};
pub use generator::{
	DiagramGenerator, DiagramKind, DiagramSyntax, GenerationRequest, GenerationResult, OpenAiLlm,
	PromptMessage,
};
pub use render::{DiagramRenderer, RenderStrategy, RenderedDiagram};
pub use session::{Session, SessionStore};
pub use source::{GithubSource, SourcePayload};
pub use types::{
	Credentials, DiagramError, GenerateError, Notification, NotificationLevel, RenderError,
	SourceError, ValidationError,
};

/// `User-Agent` sent with every outgoing request, GitHub rejects requests without one.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client shared by the repository source, the model and the renderer.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
	reqwest::Client::builder().user_agent(USER_AGENT).build()
}

/// Append path segments to a base URL, percent-encoding each of them.
///
/// Returns `None` for URLs that cannot be a base, such as `mailto:` URLs.
pub(crate) fn join_segments(base: &url::Url, segments: &[&str]) -> Option<url::Url> {
	let mut url = base.clone();
	url.path_segments_mut().ok()?.pop_if_empty().extend(segments);

	Some(url)
}

/// A chat model able to turn a conversation into diagram markup.
///
/// Implemented by [`OpenAiLlm`] for OpenAI compatible endpoints. Other providers only need to
/// convert [`PromptMessage`]s into their own request type and return the text of the first
/// answer.
#[async_trait]
pub trait Llm: Debug + Send + Sync + 'static {
	/// Request message type understood by the model's API.
	type Request: Send;

	/// Model identifier sent with each request.
	fn name(&self) -> &'static str;

	/// Maximum number of tokens the model accepts in a conversation.
	fn max_context_tokens(&self) -> models::Tokens;

	/// Build the request messages to prompt the model with.
	fn build_messages(&self, msgs: Vec<PromptMessage>) -> Result<Vec<Self::Request>, GenerateError>;

	/// Prompt the model and return the content of its first answer, untouched.
	async fn prompt(
		&self,
		credentials: &Credentials,
		msgs: Vec<Self::Request>,
	) -> Result<String, GenerateError>;
}
