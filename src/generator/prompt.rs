use async_openai::types::Role;
use serde::{Deserialize, Serialize};

use crate::source::SourcePayload;

/// Kind of diagram the model is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagramKind {
	Flowchart,
	Sequence,
	EntityRelationship,
	Class,
	Mindmap,
	State,
	#[default]
	Generic,
}

impl DiagramKind {
	pub const ALL: [Self; 7] = [
		Self::Generic,
		Self::Flowchart,
		Self::Sequence,
		Self::EntityRelationship,
		Self::Class,
		Self::Mindmap,
		Self::State,
	];

	/// Identifier used by the HTTP API.
	pub fn value(&self) -> &'static str {
		match self {
			Self::Flowchart => "flowchart",
			Self::Sequence => "sequence",
			Self::EntityRelationship => "entity-relationship",
			Self::Class => "class",
			Self::Mindmap => "mindmap",
			Self::State => "state",
			Self::Generic => "generic",
		}
	}

	/// Label shown in the kind selector.
	pub fn to_pretty(&self) -> &'static str {
		match self {
			Self::Flowchart => "Flowchart",
			Self::Sequence => "Sequence diagram",
			Self::EntityRelationship => "Entity relationship diagram",
			Self::Class => "Class diagram",
			Self::Mindmap => "Mindmap",
			Self::State => "State diagram",
			Self::Generic => "Architecture diagram",
		}
	}

	fn noun(&self) -> &'static str {
		match self {
			Self::Flowchart => "flowchart",
			Self::Sequence => "sequence diagram",
			Self::EntityRelationship => "entity-relationship diagram",
			Self::Class => "class diagram",
			Self::Mindmap => "mindmap",
			Self::State => "state diagram",
			Self::Generic => "diagram",
		}
	}
}

/// Diagram language the markup is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramSyntax {
	#[default]
	Mermaid,
	#[serde(alias = "plant-uml")]
	PlantUml,
}

impl DiagramSyntax {
	pub const ALL: [Self; 2] = [Self::Mermaid, Self::PlantUml];

	pub fn value(&self) -> &'static str {
		match self {
			Self::Mermaid => "mermaid",
			Self::PlantUml => "plantuml",
		}
	}

	pub fn name(&self) -> &'static str {
		match self {
			Self::Mermaid => "Mermaid",
			Self::PlantUml => "PlantUML",
		}
	}

	/// First line the markup of `kind` has to start with, if the syntax requires one.
	pub fn header(&self, kind: DiagramKind) -> Option<&'static str> {
		match (self, kind) {
			(Self::Mermaid, DiagramKind::Flowchart) => Some("flowchart TD"),
			(Self::Mermaid, DiagramKind::Sequence) => Some("sequenceDiagram"),
			(Self::Mermaid, DiagramKind::EntityRelationship) => Some("erDiagram"),
			(Self::Mermaid, DiagramKind::Class) => Some("classDiagram"),
			(Self::Mermaid, DiagramKind::Mindmap) => Some("mindmap"),
			(Self::Mermaid, DiagramKind::State) => Some("stateDiagram-v2"),
			(Self::Mermaid, DiagramKind::Generic) => None,
			(Self::PlantUml, DiagramKind::Mindmap) => Some("@startmindmap"),
			(Self::PlantUml, _) => Some("@startuml"),
		}
	}
}

/// A single message of the conversation sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptMessage {
	pub role: Role,
	pub content: String,
}

impl PromptMessage {
	pub fn system(content: impl Into<String>) -> Self {
		Self { role: Role::System, content: content.into() }
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self { role: Role::User, content: content.into() }
	}
}

/// Typed builder of the diagram generation conversation.
#[derive(Debug, Clone, Copy)]
pub struct DiagramPrompt<'a> {
	pub kind: DiagramKind,
	pub syntax: DiagramSyntax,
	/// What is being diagrammed, e.g. `the repository at https://github.com/acme/widgets`.
	pub subject: &'a str,
}

impl DiagramPrompt<'_> {
	pub fn system(&self) -> String {
		format!(
			"You are an AI that generates {} diagrams based on GitHub repository structures.",
			self.syntax.name()
		)
	}

	pub fn instructions(&self) -> String {
		let syntax = self.syntax.name();
		let mut lines = vec![
			format!(
				"Generate a {} {} for the architecture of {}.",
				syntax,
				self.kind.noun(),
				self.subject
			),
			" - Focus on the main components and their relationships.".to_string(),
		];
		if let Some(header) = self.syntax.header(self.kind) {
			lines.push(format!(" - Start the diagram with `{}`.", header));
		}
		lines.push(format!(" - Just include the {} code.", syntax));
		lines.push(format!(
			" - Don't include the triple backticks (like ```{} ```). Just give me the code.",
			self.syntax.value()
		));
		lines.push(format!(" - Ensure it is compliant with {} syntax rules.", syntax));

		lines.join("\n")
	}

	/// The full conversation: system role, instructions, then the payload.
	pub fn build(&self, payload: &SourcePayload) -> Vec<PromptMessage> {
		vec![
			PromptMessage::system(self.system()),
			PromptMessage::user(self.instructions()),
			PromptMessage::user(payload.to_prompt_text()),
		]
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::source::SourceFile;

	#[test]
	fn generic_mermaid_instructions() {
		let prompt = DiagramPrompt {
			kind: DiagramKind::Generic,
			syntax: DiagramSyntax::Mermaid,
			subject: "the repository at https://github.com/acme/widgets",
		};

		assert_eq!(
			prompt.system(),
			"You are an AI that generates Mermaid diagrams based on GitHub repository structures."
		);
		assert_eq!(
			prompt.instructions(),
			"Generate a Mermaid diagram for the architecture of the repository at https://github.com/acme/widgets.\n \
			 - Focus on the main components and their relationships.\n \
			 - Just include the Mermaid code.\n \
			 - Don't include the triple backticks (like ```mermaid ```). Just give me the code.\n \
			 - Ensure it is compliant with Mermaid syntax rules."
		);
	}

	#[test]
	fn kind_adds_header_hint() {
		let prompt = DiagramPrompt {
			kind: DiagramKind::Sequence,
			syntax: DiagramSyntax::Mermaid,
			subject: "the uploaded file app.py",
		};
		assert!(prompt.instructions().contains("Generate a Mermaid sequence diagram for"));
		assert!(prompt.instructions().contains("Start the diagram with `sequenceDiagram`."));

		let prompt = DiagramPrompt { syntax: DiagramSyntax::PlantUml, ..prompt };
		assert!(prompt.instructions().contains("Start the diagram with `@startuml`."));
		assert!(prompt.instructions().contains("(like ```plantuml ```)"));
	}

	#[test]
	fn conversation_ends_with_payload() {
		let payload = SourcePayload::Files(vec![SourceFile {
			path: "a.rs".to_string(),
			content: "fn a() {}".to_string(),
		}]);
		let prompt = DiagramPrompt {
			kind: DiagramKind::Class,
			syntax: DiagramSyntax::Mermaid,
			subject: "the repository at https://github.com/acme/widgets",
		};

		let msgs = prompt.build(&payload);

		assert_eq!(msgs.len(), 3);
		assert_eq!(msgs[0].role, Role::System);
		assert_eq!(msgs[1].role, Role::User);
		assert_eq!(msgs[2], PromptMessage::user(payload.to_prompt_text()));
	}

	#[test]
	fn kinds_deserialize_from_kebab_case() {
		for kind in DiagramKind::ALL {
			let parsed: DiagramKind =
				serde_json::from_value(serde_json::Value::String(kind.value().to_string()))
					.unwrap();
			assert_eq!(parsed, kind);
		}
		let syntax: DiagramSyntax = serde_json::from_str("\"plantuml\"").unwrap();
		assert_eq!(syntax, DiagramSyntax::PlantUml);
	}
}
