//! Asking a chat model for diagram markup.

use serde::Serialize;
use tracing::{error, instrument, trace};

use crate::{source::SourcePayload, types::Credentials, GenerateError, Llm};

pub mod openai;
pub mod prompt;

pub use openai::OpenAiLlm;
pub use prompt::{DiagramKind, DiagramPrompt, DiagramSyntax, PromptMessage};

/// Everything needed for one diagram generation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
	pub payload: SourcePayload,
	pub kind: DiagramKind,
	pub syntax: DiagramSyntax,
	/// What is being diagrammed, quoted in the instructions.
	pub subject: String,
	pub credentials: Credentials,
}

/// Outcome of a generation.
///
/// At most one of the fields is set; both are unset before the first generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
	pub diagram_markup: Option<String>,
	pub error: Option<String>,
}

impl GenerationResult {
	pub fn markup(markup: impl Into<String>) -> Self {
		Self { diagram_markup: Some(markup.into()), error: None }
	}

	pub fn failed(error: impl ToString) -> Self {
		Self { diagram_markup: None, error: Some(error.to_string()) }
	}

	/// The markup, if any was generated and it is not empty.
	pub fn markup_str(&self) -> Option<&str> {
		self.diagram_markup.as_deref().filter(|m| !m.is_empty())
	}
}

impl From<Result<String, GenerateError>> for GenerationResult {
	fn from(res: Result<String, GenerateError>) -> Self {
		match res {
			Ok(markup) => Self::markup(markup),
			Err(e) => Self::failed(e),
		}
	}
}

/// Sends the payload and the fixed instructions to an [`Llm`] and returns its markup verbatim.
#[derive(Debug)]
pub struct DiagramGenerator<L: Llm> {
	llm: L,
}

impl<L: Llm> DiagramGenerator<L> {
	pub fn new(llm: L) -> Self {
		Self { llm }
	}

	pub fn llm(&self) -> &L {
		&self.llm
	}

	/// Generate a diagram, folding any failure into the returned [`GenerationResult`].
	pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
		self.try_generate(request).await.into()
	}

	/// Generate a diagram.
	///
	/// The content of the first choice is returned as is, without checking the diagram syntax.
	#[instrument(skip_all, fields(model = self.llm.name(), kind = ?request.kind, syntax = ?request.syntax))]
	pub async fn try_generate(&self, request: &GenerationRequest) -> Result<String, GenerateError> {
		let prompt =
			DiagramPrompt { kind: request.kind, syntax: request.syntax, subject: &request.subject };

		let msgs = self.llm.build_messages(prompt.build(&request.payload))?;

		trace!("Prompting LLM with {} messages", msgs.len());

		let markup = self.llm.prompt(&request.credentials, msgs).await.map_err(|e| {
			error!("Failed to prompt LLM: {}", e);
			e
		})?;

		trace!("Generated markup: {:?}", markup);

		Ok(markup)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::mock::MockLlm;

	fn request() -> GenerationRequest {
		GenerationRequest {
			payload: SourcePayload::default(),
			kind: DiagramKind::Flowchart,
			syntax: DiagramSyntax::Mermaid,
			subject: "the repository at https://github.com/acme/widgets".to_string(),
			credentials: Credentials::new("sk-test"),
		}
	}

	#[tokio::test]
	async fn returns_content_verbatim() {
		let generator = DiagramGenerator::new(MockLlm::replying("```mermaid\ngraph TD; A-->B;\n```"));

		let result = generator.generate(&request()).await;

		assert_eq!(result, GenerationResult::markup("```mermaid\ngraph TD; A-->B;\n```"));
	}

	#[tokio::test]
	async fn sends_system_instructions_and_payload() {
		let llm = MockLlm::replying("graph TD; A-->B;");
		let generator = DiagramGenerator::new(llm.clone());

		generator.generate(&request()).await;

		let sent = llm.last_request().expect("model was prompted");
		assert_eq!(sent.len(), 3);
		assert!(sent[0].content.contains("generates Mermaid diagrams"));
		assert!(sent[1].content.contains("Start the diagram with `flowchart TD`."));
		assert_eq!(sent[2].content, "Repository structure:\n[]");
		assert_eq!(llm.last_credentials().as_deref(), Some("sk-test"));
	}

	#[tokio::test]
	async fn failure_leaves_markup_unset() {
		let generator = DiagramGenerator::new(MockLlm::failing("Incorrect API key provided"));

		let result = generator.generate(&request()).await;

		assert_eq!(result.diagram_markup, None);
		assert_eq!(result.error.as_deref(), Some("Error: Incorrect API key provided"));
		assert_eq!(result.markup_str(), None);
	}
}
