//! Prompt definitions shipped with the binary.
//!
//! Each can be replaced per workspace by a YAML file with the same id.

use crate::types::{PromptDefinition, PromptOutputSpec};

/// Long, detailed answer grounded in retrieved context.
pub const RAG_DETAILED: &str = "rag.detailed";

/// Short answer grounded in retrieved context.
pub const RAG_CONCISE: &str = "rag.concise";

/// Direct code generation, no retrieval.
pub const CODEGEN_DEFAULT: &str = "codegen.default";

const RAG_DETAILED_TEMPLATE: &str = "Use the following pieces of context to answer the question \
at the end. Give a very detailed, long answer.

{{context}}

Question: {{query}}
Answer:";

const RAG_CONCISE_TEMPLATE: &str = "Use the following pieces of context to answer the question \
at the end. If the context does not contain the answer, say that you don't know. Keep the \
answer short.

{{context}}

Question: {{query}}
Answer:";

/// Look up a built-in prompt by id.
pub fn builtin_prompt(id: &str) -> Option<PromptDefinition> {
    let (title, system, variables, template, format) = match id {
        RAG_DETAILED => (
            "Detailed retrieval answer",
            None,
            vec!["context", "query"],
            RAG_DETAILED_TEMPLATE,
            "markdown",
        ),
        RAG_CONCISE => (
            "Concise retrieval answer",
            None,
            vec!["context", "query"],
            RAG_CONCISE_TEMPLATE,
            "markdown",
        ),
        CODEGEN_DEFAULT => (
            "Code generation",
            Some("You write correct, idiomatic code for the customer's request."),
            vec!["query"],
            "{{query}}",
            "code",
        ),
        _ => return None,
    };

    Some(PromptDefinition {
        id: id.to_string(),
        title: title.to_string(),
        api_version: "1.0".to_string(),
        system: system.map(str::to_string),
        variables: variables.into_iter().map(str::to_string).collect(),
        template: template.to_string(),
        output: PromptOutputSpec {
            format: format.to_string(),
        },
    })
}
