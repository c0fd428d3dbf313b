//! Turning a user selection into the source text that is sent to the model.
//!
//! Two selections are supported: a GitHub repository URL, whose files are fetched one by one
//! through [`GithubSource`], and a single uploaded file taken as is.

use serde::{Deserialize, Serialize};

use crate::{models::Token, types::SourceError};

pub mod github;

pub use github::{GithubSource, RepositoryRef};

/// A single file of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
	pub path: String,
	pub content: String,
}

/// File uploaded from the browser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedFile {
	#[serde(default)]
	pub name: String,
	pub content: String,
}

/// Textual representation of source code sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourcePayload {
	/// Files in tree listing order.
	Files(Vec<SourceFile>),
	/// A single blob of text without path segmentation.
	Raw { name: String, text: String },
}

impl Default for SourcePayload {
	fn default() -> Self {
		Self::Files(Vec::new())
	}
}

impl SourcePayload {
	pub fn is_empty(&self) -> bool {
		match self {
			Self::Files(files) => files.is_empty(),
			Self::Raw { text, .. } => text.is_empty(),
		}
	}

	/// Paths of the files in the payload, in order.
	pub fn paths(&self) -> Vec<&str> {
		match self {
			Self::Files(files) => files.iter().map(|f| f.path.as_str()).collect(),
			Self::Raw { name, .. } => vec![name.as_str()],
		}
	}

	/// Serialize the payload into the text of the model message.
	pub fn to_prompt_text(&self) -> String {
		match self {
			Self::Files(files) => format!(
				"Repository structure:\n{}",
				serde_json::to_string_pretty(files).unwrap_or_else(|_| "[]".to_string())
			),
			Self::Raw { name, text } if name.is_empty() => format!("Uploaded file:\n{}", text),
			Self::Raw { name, text } => format!("Uploaded file {}:\n{}", name, text),
		}
	}

	/// Estimated number of tokens of [`SourcePayload::to_prompt_text`].
	pub fn count_tokens(&self) -> Option<crate::models::Tokens> {
		self.to_prompt_text().count_tokens()
	}
}

impl From<UploadedFile> for SourcePayload {
	fn from(file: UploadedFile) -> Self {
		Self::Raw { name: file.name, text: file.content }
	}
}

/// What the user picked as the origin of the source code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelector {
	RepositoryUrl(String),
	Upload(UploadedFile),
}

/// Why a file of the tree listing is missing from the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
	/// The raw content endpoint answered with a non-success status.
	Status(u16),
	/// The raw content could not be downloaded.
	Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
	pub path: String,
	pub reason: SkipReason,
}

/// Everything learned while fetching a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositorySnapshot {
	pub payload: SourcePayload,
	/// Branch the files were read from.
	pub branch: String,
	pub skipped: Vec<SkippedFile>,
	/// The host cut the tree listing short.
	pub truncated: bool,
}

impl RepositorySnapshot {
	/// Files dropped because of a transport failure, as opposed to a non-success status.
	pub fn failed_downloads(&self) -> impl Iterator<Item = &SkippedFile> {
		self.skipped.iter().filter(|s| matches!(s.reason, SkipReason::Transport(_)))
	}
}

/// Decode file bytes as UTF-8, falling back to the escaped raw bytes.
pub fn decode_content(bytes: Vec<u8>) -> String {
	String::from_utf8(bytes).unwrap_or_else(|e| e.into_bytes().escape_ascii().to_string())
}

/// Resolve a [`SourceSelector`] into a snapshot.
///
/// Uploads never fail, repositories go through [`GithubSource::fetch`].
pub async fn resolve(
	github: &GithubSource,
	selector: SourceSelector,
) -> Result<RepositorySnapshot, SourceError> {
	match selector {
		SourceSelector::Upload(file) =>
			Ok(RepositorySnapshot { payload: file.into(), ..Default::default() }),
		SourceSelector::RepositoryUrl(url) => github.fetch(&url).await,
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn decodes_utf8() {
		assert_eq!(decode_content("fn main() {}".as_bytes().to_vec()), "fn main() {}");
	}

	#[test]
	fn falls_back_to_raw_bytes() {
		assert_eq!(decode_content(vec![0xff, 0xfe, b'A']), "\\xff\\xfeA");
	}

	#[test]
	fn files_payload_prompt_text() {
		let payload = SourcePayload::Files(vec![SourceFile {
			path: "src/main.rs".to_string(),
			content: "fn main() {}".to_string(),
		}]);

		assert_eq!(
			payload.to_prompt_text(),
			"Repository structure:\n[\n  {\n    \"path\": \"src/main.rs\",\n    \"content\": \"fn main() {}\"\n  }\n]"
		);
	}

	#[test]
	fn upload_payload_keeps_text_whole() {
		let payload = SourcePayload::from(UploadedFile {
			name: "app.py".to_string(),
			content: "import os\nprint(os.name)\n".to_string(),
		});

		assert_eq!(payload.paths(), vec!["app.py"]);
		assert_eq!(payload.to_prompt_text(), "Uploaded file app.py:\nimport os\nprint(os.name)\n");
	}

	#[test]
	fn default_payload_is_empty() {
		assert!(SourcePayload::default().is_empty());
		assert_eq!(SourcePayload::default().to_prompt_text(), "Repository structure:\n[]");
	}
}
