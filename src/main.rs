use std::{error::Error, path::PathBuf};

use clap::Parser;
use repo_diagram::{models::Models, service::server, Controller, OpenAiLlm, Settings};
use tracing::{info, Level};
use tracing_subscriber::fmt;

#[derive(Parser, Debug)]
#[command(about = "Generate architecture diagrams of GitHub repositories with an LLM")]
struct Args {
	/// Optional TOML settings file, overridden by `REPO_DIAGRAM__*` environment variables.
	#[arg(long, default_value = "config.toml")]
	config_path: PathBuf,
	/// Log level
	#[arg(long, default_value = "info")]
	log_level: Level,
	/// Chat model generating the diagrams.
	#[arg(long, value_enum, default_value_t = Models::default())]
	model: Models,
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let args = Args::parse();

	let subscriber = fmt::Subscriber::builder().with_max_level(args.log_level).finish();
	tracing::subscriber::set_global_default(subscriber)?;

	info!(task = "tracing_setup", result = "success", "tracing successfully set up");

	dotenvy::dotenv().ok();

	info!(task = "dotenv_setup", result = "success", "dotenv loaded successfully");

	let settings = Settings::new(&args.config_path)?;

	info!(
		task = "settings_setup",
		result = "success",
		config_path = %args.config_path.display(),
		"settings loaded successfully"
	);

	let http = repo_diagram::http_client()?;
	let llm = OpenAiLlm::new(args.model, settings.llm.api_base.clone(), http.clone());
	let controller = Controller::new(&settings, llm, http);

	info!(
		task = "controller_setup",
		result = "success",
		model = args.model.name(),
		policy = ?controller.policy(),
		"controller set up"
	);

	server::run(&settings, controller).await?;

	Ok(())
}
