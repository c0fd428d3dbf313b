use async_trait::async_trait;
use repo_diagram::{
	controller::GenerateInput, models::Tokens, source::UploadedFile, Controller, Credentials,
	DiagramKind, DiagramSyntax, GenerateError, Llm, PromptMessage, Session, Settings,
};

// A model that answers without calling any API, listing the lines of the uploaded file.
#[derive(Debug, Default, Clone, Copy)]
struct OfflineLlm;

#[async_trait]
impl Llm for OfflineLlm {
	type Request = String;

	fn name(&self) -> &'static str {
		"offline"
	}

	fn max_context_tokens(&self) -> Tokens {
		4_096
	}

	fn build_messages(&self, msgs: Vec<PromptMessage>) -> Result<Vec<Self::Request>, GenerateError> {
		Ok(msgs.into_iter().map(|msg| msg.content).collect())
	}

	async fn prompt(
		&self,
		_credentials: &Credentials,
		msgs: Vec<Self::Request>,
	) -> Result<String, GenerateError> {
		let source = msgs.last().ok_or(GenerateError::FailedToGetContent)?;
		let nodes = source
			.lines()
			.skip(1)
			.filter(|line| !line.trim().is_empty())
			.enumerate()
			.map(|(i, line)| format!("    n{}[\"{}\"]", i, line.trim().replace('"', "'")))
			.collect::<Vec<_>>();

		Ok(format!("flowchart TD\n{}", nodes.join("\n")))
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let settings = Settings::default();
	let controller = Controller::new(&settings, OfflineLlm, repo_diagram::http_client()?);

	let upload = UploadedFile {
		name: "pipeline.py".to_string(),
		content: "download()\nconvert()\nupload()\n".to_string(),
	};
	let input = GenerateInput::upload(upload, "not-a-real-key")
		.with_diagram(DiagramKind::Flowchart, DiagramSyntax::Mermaid);

	let mut session = Session::default();
	let outcome = controller.generate(&mut session, input).await;

	println!("state: {:?}", outcome.state);
	println!("{}", outcome.view.text);
	for notification in outcome.notifications {
		println!("{:?}: {}", notification.level, notification.text);
	}

	Ok(())
}
