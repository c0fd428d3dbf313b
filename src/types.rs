use std::fmt::{Debug, Display};

use async_openai::error::OpenAIError;
use serde::{Deserialize, Serialize};

pub const SYSTEM_ROLE: &str = "system";
pub const USER_ROLE: &str = "user";

/// Opaque API key handed to the completion provider.
///
/// The key is never printed, `Debug` only reveals whether it is blank.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credentials(String);

impl Credentials {
	pub fn new(key: impl Into<String>) -> Self {
		Self(key.into())
	}

	pub fn is_blank(&self) -> bool {
		self.0.trim().is_empty()
	}

	pub fn expose(&self) -> &str {
		self.0.trim()
	}
}

impl Debug for Credentials {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.is_blank() {
			true => write!(f, "Credentials(<blank>)"),
			false => write!(f, "Credentials(<redacted>)"),
		}
	}
}

/// Severity of a [`Notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
	Message,
	Warning,
	Error,
}

/// A user visible message produced while running the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
	pub level: NotificationLevel,
	pub text: String,
}

impl Notification {
	pub fn message(text: impl Into<String>) -> Self {
		Self { level: NotificationLevel::Message, text: text.into() }
	}

	pub fn warning(text: impl Into<String>) -> Self {
		Self { level: NotificationLevel::Warning, text: text.into() }
	}

	pub fn error(text: impl Into<String>) -> Self {
		Self { level: NotificationLevel::Error, text: text.into() }
	}
}

impl From<&DiagramError> for Notification {
	fn from(e: &DiagramError) -> Self {
		match e {
			DiagramError::Source(SourceError::TreeStatus { .. }) => Self::message(e.to_string()),
			_ => Self::error(e.to_string()),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum DiagramError {
	Validation(#[from] ValidationError),
	Source(#[from] SourceError),
	Generate(#[from] GenerateError),
	Render(#[from] RenderError),
}

impl Display for DiagramError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Validation(e) => write!(f, "{}", e),
			Self::Source(e) => write!(f, "{}", e),
			Self::Generate(e) => write!(f, "{}", e),
			Self::Render(e) => write!(f, "{}", e),
		}
	}
}

/// Missing user input. Always advisory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
	MissingApiKey,
	MissingRepositoryUrl,
}

impl Display for ValidationError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::MissingApiKey => write!(f, "Please enter your OpenAI API key."),
			Self::MissingRepositoryUrl => write!(f, "Please enter a GitHub repository URL."),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
	/// The URL does not point at a `<owner>/<repo>` on the configured host.
	BadRepositoryUrl(String),
	/// The tree listing answered with a non-success status.
	TreeStatus { status: u16 },
	/// The repository metadata answered with a non-success status.
	MetadataStatus { status: u16 },
	/// Network failure or malformed response body.
	Transport(#[from] reqwest::Error),
}

impl Display for SourceError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::BadRepositoryUrl(url) =>
				write!(f, "Error: '{}' is not a GitHub repository URL", url),
			Self::TreeStatus { status } => write!(
				f,
				"Error: Unable to fetch repository structure. Status code: {}",
				status
			),
			Self::MetadataStatus { status } => write!(
				f,
				"Error: Unable to fetch repository metadata. Status code: {}",
				status
			),
			Self::Transport(e) => write!(f, "Error: {}", e),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
	/// Failed to build the chat completion request.
	BuildRequest(OpenAIError),
	/// Failed to prompt the completion endpoint.
	FailedPromptOpenAI(OpenAIError),
	/// The response carried no choice or an empty message.
	FailedToGetContent,
	/// Any other model backend failure.
	Custom(String),
}

impl Display for GenerateError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::BuildRequest(e) => write!(f, "Error: Failed to build completion request: {}", e),
			Self::FailedPromptOpenAI(e) => write!(f, "Error: {}", e),
			Self::FailedToGetContent =>
				write!(f, "Error: Failed to get content from completion response"),
			Self::Custom(msg) => write!(f, "Error: {}", msg),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
	/// The rendering service answered with a non-success status.
	Status { status: u16 },
	/// The rendering service could not be reached.
	Transport(#[from] reqwest::Error),
	/// The rendering service did not return a known raster image.
	Decode(String),
	/// The configured service URL cannot be combined with the encoded markup.
	BadServiceUrl(String),
}

impl Display for RenderError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Status { status } =>
				write!(f, "Error: Unable to render diagram. Status code: {}", status),
			Self::Transport(e) => write!(f, "Error: Unable to render diagram: {}", e),
			Self::Decode(msg) => write!(f, "Error: Unable to decode diagram image: {}", msg),
			Self::BadServiceUrl(url) => write!(f, "Error: Bad rendering service URL: {}", url),
		}
	}
}
