use serde::{Deserialize, Serialize};

/// Structured action signal attached to every chat answer. Derived from the
/// exchange, never requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatAction {
    #[default]
    None,
    OpenContactForm,
    SuggestContact,
}

/// Replacement answer used when the model admits the context was
/// insufficient, kept identical across sessions for UI consistency.
pub const UNKNOWN_ANSWER: &str = "Jof doesn't say, why not send him an email to clarify?";

/// Question vocabulary that signals the user wants to get in touch.
const CONTACT_TERMS: &[&str] = &[
    "contact",
    "email",
    "reach out",
    "reach him",
    "get in touch",
    "hire",
    "hiring",
    "enquiry",
    "inquiry",
];

/// Answer phrasings that signal the retrieved context had no answer.
const UNKNOWN_PHRASES: &[&str] = &[
    "doesn't say",
    "does not say",
    "not provided",
    "no relevant context",
    "not mentioned",
    "i don't have",
];

/// Classify an exchange into an action signal. Pure function: contact intent
/// in the question wins over everything; otherwise an unknown-answer phrasing
/// in the generated text suggests contact; otherwise no action.
#[inline]
pub fn classify(question: &str, answer: &str) -> ChatAction {
    let question = question.to_lowercase();
    if CONTACT_TERMS.iter().any(|term| question.contains(term)) {
        return ChatAction::OpenContactForm;
    }

    let answer = answer.to_lowercase();
    if UNKNOWN_PHRASES.iter().any(|phrase| answer.contains(phrase)) {
        return ChatAction::SuggestContact;
    }

    ChatAction::None
}
