//! The "generate" action: validate, fetch, generate, store, render.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{
	config::Settings,
	generator::{DiagramGenerator, DiagramKind, DiagramSyntax, GenerationRequest, GenerationResult},
	render::{DiagramRenderer, RenderedDiagram},
	session::Session,
	source::{self, GithubSource, RepositorySnapshot, SourceSelector, UploadedFile},
	types::{Credentials, DiagramError, Notification, ValidationError},
	Llm,
};

/// How the pipeline reacts to a failing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePolicy {
	/// Report the failure and keep going with whatever is available.
	#[default]
	BestEffort,
	/// Stop at the first failing stage, the model is never called with partial input.
	Strict,
}

/// Where a session is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
	#[default]
	Idle,
	Fetching,
	Generating,
	Rendered,
	Failed,
}

/// Form values of one "generate" action.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenerateInput {
	pub repo_url: String,
	pub api_key: Credentials,
	pub kind: DiagramKind,
	pub syntax: DiagramSyntax,
	/// Takes precedence over `repo_url` when present.
	pub upload: Option<UploadedFile>,
}

impl GenerateInput {
	pub fn repository(repo_url: impl Into<String>, api_key: impl Into<String>) -> Self {
		Self { repo_url: repo_url.into(), api_key: Credentials::new(api_key), ..Default::default() }
	}

	pub fn upload(file: UploadedFile, api_key: impl Into<String>) -> Self {
		Self { upload: Some(file), api_key: Credentials::new(api_key), ..Default::default() }
	}

	pub fn with_diagram(mut self, kind: DiagramKind, syntax: DiagramSyntax) -> Self {
		self.kind = kind;
		self.syntax = syntax;
		self
	}

	/// One error per missing field, API key first.
	pub fn validate(&self) -> Vec<ValidationError> {
		let mut errors = Vec::new();
		if self.api_key.is_blank() {
			errors.push(ValidationError::MissingApiKey);
		}
		if self.upload.is_none() && self.repo_url.trim().is_empty() {
			errors.push(ValidationError::MissingRepositoryUrl);
		}
		errors
	}

	fn selector(&self) -> Option<SourceSelector> {
		match (&self.upload, self.repo_url.trim()) {
			(Some(file), _) => Some(SourceSelector::Upload(file.clone())),
			(None, "") => None,
			(None, url) => Some(SourceSelector::RepositoryUrl(url.to_string())),
		}
	}

	/// What the instructions say the diagram is about.
	fn subject(&self) -> String {
		match &self.upload {
			Some(file) if file.name.is_empty() => "the uploaded file".to_string(),
			Some(file) => format!("the uploaded file {}", file.name),
			None => format!("the repository at {}", self.repo_url.trim()),
		}
	}
}

/// Everything published after a "generate" action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateOutcome {
	pub state: PipelineState,
	pub view: RenderedDiagram,
	pub notifications: Vec<Notification>,
}

/// Runs the pipeline stages in order for a session.
#[derive(Debug)]
pub struct Controller<L: Llm> {
	github: GithubSource,
	generator: DiagramGenerator<L>,
	renderer: DiagramRenderer,
	policy: PipelinePolicy,
}

impl<L: Llm> Controller<L> {
	pub fn new(settings: &Settings, llm: L, http: reqwest::Client) -> Self {
		Self {
			github: GithubSource::new(&settings.github, http.clone()),
			generator: DiagramGenerator::new(llm),
			renderer: DiagramRenderer::new(&settings.render, http),
			policy: settings.pipeline.policy,
		}
	}

	pub fn policy(&self) -> PipelinePolicy {
		self.policy
	}

	pub fn generator(&self) -> &DiagramGenerator<L> {
		&self.generator
	}

	/// Run the whole pipeline and replace the result stored in `session`.
	///
	/// Never fails: every problem ends up in the returned notifications. Under
	/// [`PipelinePolicy::BestEffort`] validation and fetch failures do not stop the run.
	#[instrument(skip_all, fields(kind = ?input.kind, syntax = ?input.syntax, policy = ?self.policy))]
	pub async fn generate(&self, session: &mut Session, input: GenerateInput) -> GenerateOutcome {
		session.state = PipelineState::Idle;
		session.syntax = input.syntax;
		let mut notifications = Vec::new();

		let invalid = input.validate();
		for e in invalid.iter().cloned() {
			warn!("Invalid input: {}", e);
			notifications.push(Notification::from(&DiagramError::from(e)));
		}
		if !invalid.is_empty() && self.policy == PipelinePolicy::Strict {
			return self.abort(session, notifications, "missing input").await
		}

		session.state = PipelineState::Fetching;
		let snapshot = match input.selector() {
			Some(selector) => match source::resolve(&self.github, selector).await {
				Ok(snapshot) => {
					notifications.extend(snapshot_warnings(&snapshot));
					snapshot
				},
				Err(e) => {
					let e = DiagramError::from(e);
					notifications.push(Notification::from(&e));
					if self.policy == PipelinePolicy::Strict {
						return self.abort(session, notifications, &e.to_string()).await
					}
					RepositorySnapshot::default()
				},
			},
			None => RepositorySnapshot::default(),
		};

		if let Some(warning) = self.token_warning(&snapshot) {
			notifications.push(warning);
		}

		session.state = PipelineState::Generating;
		let request = GenerationRequest {
			subject: input.subject(),
			payload: snapshot.payload,
			kind: input.kind,
			syntax: input.syntax,
			credentials: input.api_key,
		};
		let result = self.generator.generate(&request).await;
		if let Some(error) = &result.error {
			notifications.push(Notification::error(error.clone()));
		}

		session.result = Some(result);
		session.generated_at = Some(Utc::now());

		let view = self.view(session).await;
		if let Some(error) = &view.error {
			notifications.push(Notification::error(error.clone()));
		}

		session.state = match view.error.is_none() && !view.html.is_empty() {
			true => PipelineState::Rendered,
			false => PipelineState::Failed,
		};

		info!(state = ?session.state, notifications = notifications.len(), "generation finished");

		GenerateOutcome { state: session.state, view, notifications }
	}

	/// Render the result stored in `session`.
	pub async fn view(&self, session: &Session) -> RenderedDiagram {
		self.renderer.render(session.result.as_ref(), session.syntax).await
	}

	async fn abort(
		&self,
		session: &mut Session,
		notifications: Vec<Notification>,
		reason: &str,
	) -> GenerateOutcome {
		warn!("Stopping pipeline: {}", reason);

		session.result = Some(GenerationResult::failed(reason));
		session.generated_at = Some(Utc::now());
		session.state = PipelineState::Failed;

		GenerateOutcome { state: session.state, view: self.view(session).await, notifications }
	}

	fn token_warning(&self, snapshot: &RepositorySnapshot) -> Option<Notification> {
		let tokens = snapshot.payload.count_tokens()?;
		let max = self.generator.llm().max_context_tokens();

		match tokens > max {
			true => Some(Notification::warning(format!(
				"The source is about {} tokens, more than the {} tokens {} accepts. The request \
				 may be rejected.",
				tokens,
				max,
				self.generator.llm().name()
			))),
			false => None,
		}
	}
}

fn snapshot_warnings(snapshot: &RepositorySnapshot) -> Vec<Notification> {
	let mut warnings = Vec::new();

	if snapshot.truncated {
		warnings.push(Notification::warning(
			"The repository tree listing was truncated by GitHub, some files are missing.",
		));
	}

	let failed = snapshot.failed_downloads().map(|s| s.path.as_str()).collect::<Vec<_>>();
	if !failed.is_empty() {
		warnings.push(Notification::warning(format!(
			"Failed to download {} file(s): {}",
			failed.len(),
			failed.join(", ")
		)));
	}

	warnings
}
