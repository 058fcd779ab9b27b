
pub mod classify;
pub mod policy;

use serde::Serialize;
use tracing::{debug, info};

use crate::Result;
use crate::config::Config;
use crate::index::{RetrievedMatch, VectorIndexClient};
use crate::openai::OpenAiClient;

pub use classify::{ChatAction, UNKNOWN_ANSWER, classify};
pub use policy::GuardrailPolicy;

/// Separator placed between retrieved passages in the assembled context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Substitute context when the index returns nothing usable.
pub const NO_CONTEXT_SENTINEL: &str =
    "No relevant context was found in the reference files.";

/// Final answer returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub action: ChatAction,
}

/// The retrieval-augmented answer pipeline: guardrail, embed, retrieve,
/// assemble, generate, classify.
#[derive(Debug, Clone)]
pub struct ChatPipeline {
    openai: OpenAiClient,
    index: VectorIndexClient,
    policy: GuardrailPolicy,
}

impl ChatPipeline {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            openai: OpenAiClient::new(config)?,
            index: VectorIndexClient::new(config)?,
            policy: GuardrailPolicy::current(),
        })
    }

    /// Answer a question. The guardrail short-circuits before any upstream
    /// call; everything after it is one embed, one index query, and one
    /// completion, none of them retried.
    #[inline]
    pub async fn answer(&self, question: &str) -> Result<ChatAnswer> {
        if self.policy.is_blocked(question) {
            info!("Guardrail rejected question (policy {})", self.policy.version);
            return Ok(ChatAnswer {
                answer: self.policy.refusal_answer().to_string(),
                action: ChatAction::None,
            });
        }

        let context = self.assemble_context(question).await?;
        let user_prompt = format!("Question:\n{}\n\nCONTEXT:\n{}", question, context);

        let raw_answer = self
            .openai
            .complete(self.policy.system_prompt(), &user_prompt)
            .await?;

        Ok(finalize(question, raw_answer))
    }

    /// Embed the question, fetch the nearest chunks, and join their passages.
    async fn assemble_context(&self, question: &str) -> Result<String> {
        let vector = self.openai.embed(question).await?;
        let matches = self.index.query(&vector).await?;
        Ok(assemble_context(&matches))
    }
}

/// Concatenate retrieved passages in index order, falling back to the
/// sentinel when no match carries text. Deterministic for identical inputs.
#[inline]
pub fn assemble_context(matches: &[RetrievedMatch]) -> String {
    let passages: Vec<&str> = matches
        .iter()
        .filter_map(|m| m.metadata.text.as_deref())
        .filter(|text| !text.is_empty())
        .collect();

    if passages.is_empty() {
        debug!("No usable passages retrieved, using sentinel context");
        NO_CONTEXT_SENTINEL.to_string()
    } else {
        passages.join(CONTEXT_SEPARATOR)
    }
}

/// Apply the action classifier and normalize unknown answers to the canonical
/// contact suggestion.
#[inline]
pub fn finalize(question: &str, answer: String) -> ChatAnswer {
    match classify(question, &answer) {
        ChatAction::OpenContactForm => ChatAnswer {
            answer,
            action: ChatAction::OpenContactForm,
        },
        ChatAction::SuggestContact => ChatAnswer {
            answer: UNKNOWN_ANSWER.to_string(),
            action: ChatAction::SuggestContact,
        },
        ChatAction::None => ChatAnswer {
            answer,
            action: ChatAction::None,
        },
    }
}
