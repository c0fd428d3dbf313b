/// The following diagram shows how a "generate" action flows through the crate.
///
/// Every stage reports failures as [`Notification`](crate::Notification)s collected by the
/// [`Controller`](crate::Controller), which decides from its
/// [`PipelinePolicy`](crate::PipelinePolicy) whether the next stage still runs.
#[cfg_attr(doc, aquamarine::aquamarine)]
/// ```mermaid
/// graph TB
///     subgraph Browser
///         form[Form]
///         mermaid_js[Mermaid script]
///     end
///     form-- POST /api/generate -->server
///     subgraph repo-diagram
///         server[service::server]-- lock session -->store[SessionStore]
///         server-- generate -->controller[Controller]
///         controller-- resolve -->source[GithubSource]
///         controller-- payload -->generator[DiagramGenerator]
///         controller-- stored result -->renderer[DiagramRenderer]
///         generator-. impl .- llm>Llm]
///     end
///     source-- tree listing, raw files -->github[GitHub]
///     llm-- chat completion -->openai[OpenAI]
///     renderer-- remote strategy -->images[mermaid.ink / PlantUML]
///     renderer-- client strategy -->mermaid_js
/// ```
///
/// Applications embedding the library only need an [`Llm`](crate::Llm) implementation;
/// [`OpenAiLlm`](crate::OpenAiLlm) covers OpenAI compatible endpoints.
pub struct Diagram;
