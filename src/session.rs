//! Per browser session state.

use std::{
	collections::HashMap,
	sync::Arc,
	time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::{
	controller::PipelineState,
	generator::{DiagramSyntax, GenerationResult},
};

/// State of one browser session.
///
/// The result of the latest "generate" action replaces the previous one, nothing is shared
/// between sessions.
#[derive(Debug, Clone, Default)]
pub struct Session {
	pub result: Option<GenerationResult>,
	/// Syntax of the stored result, needed to render it again.
	pub syntax: DiagramSyntax,
	pub state: PipelineState,
	pub generated_at: Option<DateTime<Utc>>,
}

/// A session locked for the duration of a generation.
pub type SharedSession = Arc<tokio::sync::Mutex<Session>>;

#[derive(Debug)]
struct Entry {
	session: SharedSession,
	last_seen: Instant,
}

/// In-process sessions keyed by an opaque id, dropped after `ttl` without activity.
#[derive(Debug)]
pub struct SessionStore {
	ttl: Duration,
	sessions: Mutex<HashMap<String, Entry>>,
}

impl SessionStore {
	pub fn new(ttl: Duration) -> Self {
		Self { ttl, sessions: Mutex::new(HashMap::new()) }
	}

	/// Session behind `id`, or a new one under a fresh id when `id` is unknown or expired.
	pub fn get_or_create(&self, id: Option<&str>) -> (String, SharedSession) {
		let now = Instant::now();
		let mut sessions = self.sessions.lock();
		self.prune(&mut sessions, now);

		if let Some(id) = id {
			if let Some(entry) = sessions.get_mut(id) {
				entry.last_seen = now;
				return (id.to_string(), entry.session.clone())
			}
		}

		let id = Uuid::new_v4().to_string();
		let session = SharedSession::default();
		debug!("Created session {}", id);
		sessions.insert(id.clone(), Entry { session: session.clone(), last_seen: now });

		(id, session)
	}

	/// Existing session behind `id`.
	pub fn get(&self, id: &str) -> Option<SharedSession> {
		let now = Instant::now();
		let mut sessions = self.sessions.lock();
		self.prune(&mut sessions, now);

		sessions.get_mut(id).map(|entry| {
			entry.last_seen = now;
			entry.session.clone()
		})
	}

	pub fn len(&self) -> usize {
		self.sessions.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn prune(&self, sessions: &mut HashMap<String, Entry>, now: Instant) {
		let before = sessions.len();
		sessions.retain(|_, entry| now.duration_since(entry.last_seen) < self.ttl);

		if sessions.len() < before {
			debug!("Pruned {} idle sessions", before - sessions.len());
		}
	}
}
