use std::{net::SocketAddr, path::Path};

use config::{Config as LibConfig, Environment, File};
use serde::Deserialize;
use url::Url;

use crate::{controller::PipelinePolicy, render::RenderStrategy};

/// Environment variable prefix, nested keys are separated by `__`
/// (`REPO_DIAGRAM__SERVER__ADDR`).
pub const ENV_PREFIX: &str = "REPO_DIAGRAM";
/// Fallback source of the default API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
	pub server: ServerSettings,
	pub github: GithubSettings,
	pub llm: LlmSettings,
	pub render: RenderSettings,
	pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
	pub addr: SocketAddr,
	/// Largest accepted JSON body, uploads included.
	pub max_payload_bytes: usize,
	/// Sessions idle for longer than this are dropped.
	pub session_ttl_secs: u64,
}

impl Default for ServerSettings {
	fn default() -> Self {
		Self {
			addr: SocketAddr::from(([127, 0, 0, 1], 8050)),
			max_payload_bytes: 10 * 1024 * 1024,
			session_ttl_secs: 60 * 60,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GithubSettings {
	/// REST API serving repository metadata and tree listings.
	pub api_url: Url,
	/// Raw content mirror.
	pub raw_url: Url,
	/// Host of the repository URLs entered by users.
	pub web_url: Url,
	/// Pin every fetch to this branch instead of the repository's default branch.
	pub branch: Option<String>,
	/// Branch used when the default branch cannot be resolved.
	pub fallback_branch: String,
}

impl Default for GithubSettings {
	fn default() -> Self {
		Self {
			api_url: Url::parse("https://api.github.com/").expect("valid url"),
			raw_url: Url::parse("https://raw.githubusercontent.com/").expect("valid url"),
			web_url: Url::parse("https://github.com/").expect("valid url"),
			branch: None,
			fallback_branch: "main".to_string(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmSettings {
	/// Base URL of an OpenAI compatible chat completion API.
	pub api_base: String,
	/// Default API key pre-filled in the form.
	pub api_key: Option<String>,
}

impl Default for LlmSettings {
	fn default() -> Self {
		Self { api_base: "https://api.openai.com/v1".to_string(), api_key: None }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSettings {
	pub strategy: RenderStrategy,
	pub mermaid_ink_url: Url,
	pub plantuml_url: Url,
}

impl Default for RenderSettings {
	fn default() -> Self {
		Self {
			strategy: RenderStrategy::default(),
			mermaid_ink_url: Url::parse("https://mermaid.ink/").expect("valid url"),
			plantuml_url: Url::parse("https://www.plantuml.com/plantuml/").expect("valid url"),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
	pub policy: PipelinePolicy,
	/// Repository pre-filled in the form.
	pub example_repo_url: String,
}

impl Default for PipelineSettings {
	fn default() -> Self {
		Self {
			policy: PipelinePolicy::default(),
			example_repo_url: "https://github.com/parmsam/yt-dl-pipeline".to_string(),
		}
	}
}

impl Settings {
	/// Layer the optional settings file and `REPO_DIAGRAM__*` environment variables over the
	/// defaults.
	pub fn new(config_path: &Path) -> Result<Self, config::ConfigError> {
		let mut builder = LibConfig::builder();
		if config_path.exists() {
			builder = builder.add_source(File::from(config_path));
		}
		builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

		builder.build()?.try_deserialize()
	}

	/// API key pre-filled in the form: `llm.api_key`, then `OPENAI_API_KEY`, then empty.
	pub fn default_api_key(&self) -> String {
		self.llm
			.api_key
			.clone()
			.filter(|key| !key.trim().is_empty())
			.or_else(|| std::env::var(OPENAI_API_KEY_ENV).ok())
			.unwrap_or_default()
	}
}
