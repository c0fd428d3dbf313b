use std::time::Duration;

use actix_web::{
	cookie::{Cookie, SameSite},
	error::InternalError,
	http::header::ContentType,
	web, App, HttpRequest, HttpResponse, HttpServer,
};
use serde::Serialize;
use tracing::{info, instrument, warn};
use tracing_actix_web::TracingLogger;

use crate::{
	config::Settings,
	controller::{Controller, GenerateInput, GenerateOutcome, PipelineState},
	generator::{DiagramKind, DiagramSyntax},
	render::RenderedDiagram,
	session::SessionStore,
	types::Notification,
	Llm,
};

/// Cookie holding the session id.
pub const SESSION_COOKIE: &str = "repo_diagram_session";

const INDEX_HTML: &str = include_str!("../../assets/index.html");

/// Shared state of the HTTP workers.
#[derive(Debug)]
pub struct AppState<L: Llm> {
	controller: Controller<L>,
	sessions: SessionStore,
	defaults: Defaults,
	max_payload_bytes: usize,
}

impl<L: Llm> AppState<L> {
	pub fn new(settings: &Settings, controller: Controller<L>) -> Self {
		Self {
			controller,
			sessions: SessionStore::new(Duration::from_secs(settings.server.session_ttl_secs)),
			defaults: Defaults::new(settings),
			max_payload_bytes: settings.server.max_payload_bytes,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
struct Choice {
	value: &'static str,
	label: &'static str,
}

/// Values pre-filled in the form.
#[derive(Debug, Clone, Serialize)]
struct Defaults {
	repo_url: String,
	api_key: String,
	kinds: Vec<Choice>,
	syntaxes: Vec<Choice>,
}

impl Defaults {
	fn new(settings: &Settings) -> Self {
		Self {
			repo_url: settings.pipeline.example_repo_url.clone(),
			api_key: settings.default_api_key(),
			kinds: DiagramKind::ALL
				.iter()
				.map(|kind| Choice { value: kind.value(), label: kind.to_pretty() })
				.collect(),
			syntaxes: DiagramSyntax::ALL
				.iter()
				.map(|syntax| Choice { value: syntax.value(), label: syntax.name() })
				.collect(),
		}
	}
}

#[derive(Debug, Serialize)]
struct DiagramResponse {
	state: PipelineState,
	html: String,
	text: String,
	render_error: Option<String>,
	notifications: Vec<Notification>,
}

impl DiagramResponse {
	fn new(state: PipelineState, view: RenderedDiagram, notifications: Vec<Notification>) -> Self {
		Self { state, html: view.html, text: view.text, render_error: view.error, notifications }
	}
}

impl From<GenerateOutcome> for DiagramResponse {
	fn from(outcome: GenerateOutcome) -> Self {
		Self::new(outcome.state, outcome.view, outcome.notifications)
	}
}

async fn index() -> HttpResponse {
	HttpResponse::Ok().content_type(ContentType::html()).body(INDEX_HTML)
}

async fn health() -> HttpResponse {
	HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

async fn defaults<L: Llm>(state: web::Data<AppState<L>>) -> HttpResponse {
	HttpResponse::Ok().json(&state.defaults)
}

#[instrument(skip_all)]
async fn generate<L: Llm>(
	req: HttpRequest,
	state: web::Data<AppState<L>>,
	input: web::Json<GenerateInput>,
) -> HttpResponse {
	let cookie = req.cookie(SESSION_COOKIE);
	let (id, session) = state.sessions.get_or_create(cookie.as_ref().map(|c| c.value()));

	let mut session = match session.try_lock() {
		Ok(session) => session,
		Err(_) => {
			warn!("Session {} is already generating a diagram", id);
			// No view, the page keeps the diagram it shows.
			return HttpResponse::Conflict().cookie(session_cookie(id)).json(serde_json::json!({
				"state": PipelineState::Generating,
				"notifications": [Notification::warning("A diagram generation is already running.")],
			}))
		},
	};

	let outcome = state.controller.generate(&mut session, input.into_inner()).await;

	HttpResponse::Ok().cookie(session_cookie(id)).json(DiagramResponse::from(outcome))
}

/// Render the diagram stored in the caller's session again.
async fn diagram<L: Llm>(req: HttpRequest, state: web::Data<AppState<L>>) -> HttpResponse {
	let session = req.cookie(SESSION_COOKIE).and_then(|cookie| state.sessions.get(cookie.value()));

	let body = match session {
		Some(session) => {
			let session = session.lock().await;
			DiagramResponse::new(session.state, state.controller.view(&session).await, Vec::new())
		},
		None => DiagramResponse::new(PipelineState::Idle, RenderedDiagram::empty(), Vec::new()),
	};

	HttpResponse::Ok().json(body)
}

fn session_cookie(id: String) -> Cookie<'static> {
	Cookie::build(SESSION_COOKIE, id).path("/").http_only(true).same_site(SameSite::Lax).finish()
}

/// Register the routes of the UI and the JSON API.
pub fn configure<L: Llm>(cfg: &mut web::ServiceConfig, state: web::Data<AppState<L>>) {
	let json = web::JsonConfig::default().limit(state.max_payload_bytes).error_handler(|err, _| {
		let body = serde_json::json!({ "notifications": [Notification::error(err.to_string())] });
		InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
	});

	cfg.app_data(state)
		.app_data(json)
		.route("/", web::get().to(index))
		.route("/health", web::get().to(health))
		.service(
			web::scope("/api")
				.route("/defaults", web::get().to(defaults::<L>))
				.route("/generate", web::post().to(generate::<L>))
				.route("/diagram", web::get().to(diagram::<L>)),
		);
}

/// Serve the UI until the process is stopped.
pub async fn run<L: Llm>(settings: &Settings, controller: Controller<L>) -> std::io::Result<()> {
	let addr = settings.server.addr;
	let state = web::Data::new(AppState::new(settings, controller));

	info!(task = "http_server", addr = %addr, "serving on http://{}", addr);

	HttpServer::new(move || {
		App::new().wrap(TracingLogger::default()).configure(|cfg| configure(cfg, state.clone()))
	})
	.bind(addr)?
	.run()
	.await
}
