//! Turning diagram markup into something the browser can display.
//!
//! Mermaid markup is handed to the Mermaid script running in the page by default. PlantUML has no
//! browser engine, so it is always rendered remotely into an inline image, which Mermaid can opt
//! into as well.

use base64::{
	engine::general_purpose::{STANDARD, URL_SAFE},
	Engine as _,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};
use url::Url;

use crate::{
	config::RenderSettings,
	generator::{DiagramSyntax, GenerationResult},
	types::RenderError,
};

/// Text view shown when there is no markup.
pub const NO_DIAGRAM: &str = "No diagram generated.";

/// How Mermaid markup is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStrategy {
	/// Embed the markup in a container rendered by the Mermaid script of the page.
	#[default]
	Client,
	/// Fetch an image of the diagram from a rendering service and inline it.
	Remote,
}

/// Displayable form of a [`GenerationResult`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderedDiagram {
	/// HTML fragment to insert in the page, empty when there is nothing to show.
	pub html: String,
	/// Raw markup, or [`NO_DIAGRAM`].
	pub text: String,
	pub error: Option<String>,
}

impl RenderedDiagram {
	pub fn empty() -> Self {
		Self { html: String::new(), text: NO_DIAGRAM.to_string(), error: None }
	}
}

#[derive(Debug, Clone)]
pub struct DiagramRenderer {
	strategy: RenderStrategy,
	http: reqwest::Client,
	mermaid_ink_url: Url,
	plantuml_url: Url,
}

impl DiagramRenderer {
	pub fn new(settings: &RenderSettings, http: reqwest::Client) -> Self {
		Self {
			strategy: settings.strategy,
			http,
			mermaid_ink_url: settings.mermaid_ink_url.clone(),
			plantuml_url: settings.plantuml_url.clone(),
		}
	}

	/// Strategy actually used for `syntax`.
	pub fn strategy_for(&self, syntax: DiagramSyntax) -> RenderStrategy {
		match syntax {
			DiagramSyntax::Mermaid => self.strategy,
			DiagramSyntax::PlantUml => RenderStrategy::Remote,
		}
	}

	/// Render the markup of `result`, if any.
	///
	/// Rendering failures end up as a text error in the returned HTML, never as an image.
	#[instrument(skip_all, fields(syntax = ?syntax))]
	pub async fn render(
		&self,
		result: Option<&GenerationResult>,
		syntax: DiagramSyntax,
	) -> RenderedDiagram {
		let Some(markup) = result.and_then(GenerationResult::markup_str) else {
			return RenderedDiagram::empty()
		};

		let html = match self.strategy_for(syntax) {
			RenderStrategy::Client => Ok(client_side_html(markup)),
			RenderStrategy::Remote => self.fetch_image(markup, syntax).await.map(|data_uri| {
				format!("<img class=\"diagram\" alt=\"Generated diagram\" src=\"{}\"/>", data_uri)
			}),
		};

		match html {
			Ok(html) => RenderedDiagram { html, text: markup.to_string(), error: None },
			Err(e) => {
				error!("Failed to render diagram: {}", e);
				RenderedDiagram {
					html: format!("<pre class=\"render-error\">{}</pre>", escape_html(&e.to_string())),
					text: markup.to_string(),
					error: Some(e.to_string()),
				}
			},
		}
	}

	/// URL of the image of `markup` on the rendering service for `syntax`.
	///
	/// Mermaid goes to `mermaid.ink` as URL safe base64, PlantUML to a PlantUML server in its
	/// `~h` hex form.
	pub fn image_url(&self, markup: &str, syntax: DiagramSyntax) -> Result<Url, RenderError> {
		let (base, segments) = match syntax {
			DiagramSyntax::Mermaid =>
				(&self.mermaid_ink_url, ["img".to_string(), URL_SAFE.encode(markup)]),
			DiagramSyntax::PlantUml =>
				(&self.plantuml_url, ["png".to_string(), format!("~h{}", hex::encode(markup))]),
		};

		let mut url = crate::join_segments(base, &[&segments[0], &segments[1]])
			.ok_or_else(|| RenderError::BadServiceUrl(base.to_string()))?;
		if syntax == DiagramSyntax::Mermaid {
			url.set_query(Some("type=png"));
		}

		Ok(url)
	}

	async fn fetch_image(&self, markup: &str, syntax: DiagramSyntax) -> Result<String, RenderError> {
		let url = self.image_url(markup, syntax)?;
		debug!("Fetching diagram image from {}", url);

		let response = self.http.get(url).send().await?;
		if !response.status().is_success() {
			return Err(RenderError::Status { status: response.status().as_u16() })
		}

		let bytes = response.bytes().await?;

		data_uri(&bytes)
	}
}

/// Container picked up by the Mermaid script of the page. The markup is inserted verbatim.
pub fn client_side_html(markup: &str) -> String {
	format!("<div class=\"mermaid\">\n{}\n</div>", markup)
}

/// Re-encode raster image bytes as a base64 data URI.
pub fn data_uri(bytes: &[u8]) -> Result<String, RenderError> {
	let mime = image_mime(bytes).ok_or_else(|| {
		RenderError::Decode(format!("unrecognised image data ({} bytes)", bytes.len()))
	})?;

	Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
}

/// MIME type of the raster image in `bytes`, based on its signature.
fn image_mime(bytes: &[u8]) -> Option<&'static str> {
	match bytes {
		[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, ..] => Some("image/png"),
		[0xff, 0xd8, 0xff, ..] => Some("image/jpeg"),
		[b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
		[b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
		_ => None,
	}
}

fn escape_html(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	for ch in text.chars() {
		match ch {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&#39;"),
			_ => out.push(ch),
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use wiremock::{
		matchers::{method, path, query_param},
		Mock, MockServer, ResponseTemplate,
	};

	use super::*;

	const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0x0d];

	fn renderer(strategy: RenderStrategy, server_uri: &str) -> DiagramRenderer {
		DiagramRenderer::new(
			&RenderSettings {
				strategy,
				mermaid_ink_url: Url::parse(&format!("{server_uri}/ink/")).unwrap(),
				plantuml_url: Url::parse(&format!("{server_uri}/plantuml/")).unwrap(),
			},
			crate::http_client().unwrap(),
		)
	}

	#[tokio::test]
	async fn client_side_embeds_markup_verbatim() {
		let result = GenerationResult::markup("graph TD; A-->B;");

		let rendered = renderer(RenderStrategy::Client, "http://localhost")
			.render(Some(&result), DiagramSyntax::Mermaid)
			.await;

		assert_eq!(rendered.html, "<div class=\"mermaid\">\ngraph TD; A-->B;\n</div>");
		assert_eq!(rendered.text, "graph TD; A-->B;");
		assert_eq!(rendered.error, None);
	}

	#[tokio::test]
	async fn nothing_to_render() {
		let renderer = renderer(RenderStrategy::Client, "http://localhost");

		for result in [None, Some(GenerationResult::default()), Some(GenerationResult::failed("boom"))]
		{
			let rendered = renderer.render(result.as_ref(), DiagramSyntax::Mermaid).await;
			assert_eq!(rendered, RenderedDiagram::empty());
			assert_eq!(rendered.html, "");
			assert_eq!(rendered.text, "No diagram generated.");
		}
	}

	#[tokio::test]
	async fn remote_mermaid_becomes_data_uri() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path(format!("/ink/img/{}", URL_SAFE.encode("graph TD; A-->B;"))))
			.and(query_param("type", "png"))
			.respond_with(ResponseTemplate::new(200).set_body_bytes(PNG.to_vec()))
			.expect(1)
			.mount(&server)
			.await;

		let rendered = renderer(RenderStrategy::Remote, &server.uri())
			.render(Some(&GenerationResult::markup("graph TD; A-->B;")), DiagramSyntax::Mermaid)
			.await;

		assert_eq!(
			rendered.html,
			format!(
				"<img class=\"diagram\" alt=\"Generated diagram\" src=\"data:image/png;base64,{}\"/>",
				STANDARD.encode(PNG)
			)
		);
		assert_eq!(rendered.error, None);
	}

	#[tokio::test]
	async fn plantuml_always_renders_remotely() {
		let markup = "@startuml\nA -> B\n@enduml";
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path(format!("/plantuml/png/~h{}", hex::encode(markup))))
			.respond_with(ResponseTemplate::new(200).set_body_bytes(PNG.to_vec()))
			.expect(1)
			.mount(&server)
			.await;

		let renderer = renderer(RenderStrategy::Client, &server.uri());
		assert_eq!(renderer.strategy_for(DiagramSyntax::PlantUml), RenderStrategy::Remote);

		let rendered =
			renderer.render(Some(&GenerationResult::markup(markup)), DiagramSyntax::PlantUml).await;

		assert!(rendered.html.starts_with("<img class=\"diagram\""));
		assert_eq!(rendered.text, markup);
	}

	#[tokio::test]
	async fn failures_are_reported_as_text() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path(format!("/ink/img/{}", URL_SAFE.encode("graph TD; A-->B;"))))
			.respond_with(ResponseTemplate::new(200).set_body_string("<html>not an image</html>"))
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path(format!("/ink/img/{}", URL_SAFE.encode("graph TD; B-->C;"))))
			.respond_with(ResponseTemplate::new(503))
			.mount(&server)
			.await;
		let renderer = renderer(RenderStrategy::Remote, &server.uri());

		let rendered = renderer
			.render(Some(&GenerationResult::markup("graph TD; A-->B;")), DiagramSyntax::Mermaid)
			.await;
		assert_eq!(
			rendered.error.as_deref(),
			Some("Error: Unable to decode diagram image: unrecognised image data (25 bytes)")
		);
		assert!(rendered.html.starts_with("<pre class=\"render-error\">"));
		assert!(!rendered.html.contains("<img"));

		let rendered = renderer
			.render(Some(&GenerationResult::markup("graph TD; B-->C;")), DiagramSyntax::Mermaid)
			.await;
		assert_eq!(rendered.error.as_deref(), Some("Error: Unable to render diagram. Status code: 503"));
	}

	#[test]
	fn sniffs_image_signatures() {
		assert_eq!(image_mime(PNG), Some("image/png"));
		assert_eq!(image_mime(&[0xff, 0xd8, 0xff, 0xe0]), Some("image/jpeg"));
		assert_eq!(image_mime(b"GIF89a"), Some("image/gif"));
		assert_eq!(image_mime(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
		assert_eq!(image_mime(b"<svg"), None);
	}
}
