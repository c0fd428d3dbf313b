use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info, instrument, trace, warn};
use url::Url;

use crate::{
	config::GithubSettings,
	source::{decode_content, RepositorySnapshot, SkipReason, SkippedFile, SourceFile, SourcePayload},
	types::SourceError,
};

/// `<owner>/<repo>` pair identifying a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
	pub owner: String,
	pub repo: String,
}

impl RepositoryRef {
	/// Parse `owner/repo` out of a repository URL on `web_url`'s host.
	///
	/// Accepts `https://github.com/<owner>/<repo>` with an optional `.git` suffix, trailing slash
	/// or further path segments (`/tree/<branch>`), as well as `github.com/<owner>/<repo>` and a
	/// bare `<owner>/<repo>`.
	pub fn parse(url: &str, web_url: &Url) -> Result<Self, SourceError> {
		let bad_url = || SourceError::BadRepositoryUrl(url.to_string());
		let trimmed = url.trim();

		let parsed = match Url::parse(trimmed) {
			Ok(parsed) => parsed,
			Err(url::ParseError::RelativeUrlWithoutBase) => {
				let relative = trimmed.trim_start_matches('/');
				let relative = match relative.split_once('/') {
					Some((host, rest)) if Some(host) == web_url.host_str() => rest,
					// Owners cannot contain dots, anything else is a foreign host.
					Some((host, _)) if host.contains('.') => return Err(bad_url()),
					_ => relative,
				};
				web_url.join(relative).map_err(|_| bad_url())?
			},
			Err(_) => return Err(bad_url()),
		};

		if parsed.host_str() != web_url.host_str() {
			return Err(bad_url())
		}

		let mut segments =
			parsed.path_segments().into_iter().flatten().filter(|segment| !segment.is_empty());
		let owner = segments.next().ok_or_else(bad_url)?;
		let repo = segments.next().map(|r| r.trim_end_matches(".git")).ok_or_else(bad_url)?;
		if repo.is_empty() {
			return Err(bad_url())
		}

		Ok(Self { owner: owner.to_string(), repo: repo.to_string() })
	}
}

impl std::fmt::Display for RepositoryRef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}/{}", self.owner, self.repo)
	}
}

#[derive(Debug, Deserialize)]
struct RepositoryMetadata {
	default_branch: String,
}

#[derive(Debug, Deserialize)]
struct TreeListing {
	#[serde(default)]
	tree: Vec<TreeEntry>,
	#[serde(default)]
	truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
	path: String,
	#[serde(rename = "type")]
	kind: String,
}

impl TreeEntry {
	fn is_file(&self) -> bool {
		self.kind == "blob"
	}
}

/// Fetches the files of a GitHub repository through the REST API and the raw content mirror.
#[derive(Debug, Clone)]
pub struct GithubSource {
	http: Client,
	api_url: Url,
	raw_url: Url,
	web_url: Url,
	branch: Option<String>,
	fallback_branch: String,
}

impl GithubSource {
	pub fn new(settings: &GithubSettings, http: Client) -> Self {
		Self {
			http,
			api_url: settings.api_url.clone(),
			raw_url: settings.raw_url.clone(),
			web_url: settings.web_url.clone(),
			branch: settings.branch.clone().filter(|b| !b.trim().is_empty()),
			fallback_branch: settings.fallback_branch.clone(),
		}
	}

	/// Fetch every file of the repository behind `url`.
	///
	/// Directories are left out, files answering with a non-success status are skipped. Only a
	/// bad URL or a failing tree listing abort the fetch.
	#[instrument(skip(self))]
	pub async fn fetch(&self, url: &str) -> Result<RepositorySnapshot, SourceError> {
		let repo = RepositoryRef::parse(url, &self.web_url)?;
		let branch = self.resolve_branch(&repo).await;

		let listing = self.fetch_tree(&repo, &branch).await?;
		if listing.truncated {
			warn!("Tree listing of {} was truncated by the host", repo);
		}

		let mut files = Vec::new();
		let mut skipped = Vec::new();

		for entry in listing.tree.into_iter().filter(TreeEntry::is_file) {
			match self.fetch_file(&repo, &branch, &entry.path).await {
				Ok(content) => files.push(SourceFile { path: entry.path, content }),
				Err(reason) => {
					debug!("Skipping {}: {:?}", entry.path, reason);
					skipped.push(SkippedFile { path: entry.path, reason });
				},
			}
		}

		info!(
			repository = %repo,
			branch = %branch,
			files = files.len(),
			skipped = skipped.len(),
			"fetched repository"
		);

		Ok(RepositorySnapshot {
			payload: SourcePayload::Files(files),
			branch,
			skipped,
			truncated: listing.truncated,
		})
	}

	/// Branch to read from: the pinned branch, else the repository's default branch, else the
	/// fallback branch.
	async fn resolve_branch(&self, repo: &RepositoryRef) -> String {
		if let Some(branch) = &self.branch {
			return branch.clone()
		}

		match self.fetch_default_branch(repo).await {
			Ok(branch) => branch,
			Err(e) => {
				warn!(
					"Failed to resolve default branch of {}, using {}: {}",
					repo, self.fallback_branch, e
				);
				self.fallback_branch.clone()
			},
		}
	}

	async fn fetch_default_branch(&self, repo: &RepositoryRef) -> Result<String, SourceError> {
		let url = endpoint(&self.api_url, &["repos", &repo.owner, &repo.repo])?;
		trace!("Fetching repository metadata from {}", url);

		let response = self.http.get(url).send().await?;
		if !response.status().is_success() {
			return Err(SourceError::MetadataStatus { status: response.status().as_u16() })
		}

		let metadata: RepositoryMetadata = response.json().await?;
		Ok(metadata.default_branch)
	}

	async fn fetch_tree(
		&self,
		repo: &RepositoryRef,
		branch: &str,
	) -> Result<TreeListing, SourceError> {
		let mut url =
			endpoint(&self.api_url, &["repos", &repo.owner, &repo.repo, "git", "trees", branch])?;
		url.set_query(Some("recursive=1"));
		trace!("Fetching tree listing from {}", url);

		let response = self.http.get(url).send().await.map_err(|e| {
			error!("Failed to request tree listing of {}: {}", repo, e);
			e
		})?;

		if !response.status().is_success() {
			error!("Tree listing of {} answered with {}", repo, response.status());
			return Err(SourceError::TreeStatus { status: response.status().as_u16() })
		}

		response.json().await.map_err(|e| {
			error!("Failed to parse tree listing of {}: {}", repo, e);
			e.into()
		})
	}

	async fn fetch_file(
		&self,
		repo: &RepositoryRef,
		branch: &str,
		path: &str,
	) -> Result<String, SkipReason> {
		let mut segments = vec![repo.owner.as_str(), repo.repo.as_str()];
		segments.extend(branch.split('/'));
		segments.extend(path.split('/'));
		let url = endpoint(&self.raw_url, &segments)
			.map_err(|e| SkipReason::Transport(e.to_string()))?;

		let response =
			self.http.get(url).send().await.map_err(|e| SkipReason::Transport(e.to_string()))?;

		if !response.status().is_success() {
			return Err(SkipReason::Status(response.status().as_u16()))
		}

		let bytes = response.bytes().await.map_err(|e| SkipReason::Transport(e.to_string()))?;

		Ok(decode_content(bytes.to_vec()))
	}
}

fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, SourceError> {
	crate::join_segments(base, segments)
		.ok_or_else(|| SourceError::BadRepositoryUrl(base.to_string()))
}
