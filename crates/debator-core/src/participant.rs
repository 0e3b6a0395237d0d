//! Debate participants: a role, its instructions, and a generation backend.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::generation::{FragmentStream, GenerationBackend, GenerationError};

const EXPLAINER_NAME: &str = "Explainer A";
const REVIEWER_NAME: &str = "Reviewer B";

const EXPLAINER_INSTRUCTIONS: &str = "You are Explainer A. Provide clear, grounded explanations \
of the scientific paper. Reference the paper text and cite pages using [p.X] annotations.";

const REVIEWER_INSTRUCTIONS: &str = "You are Reviewer B. Critically evaluate Explainer A's \
claims, demanding evidence and citations. Highlight weak arguments and ensure every assertion \
is grounded and cited as [p.X].";

/// Debate stance of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Explains the paper and cites it.
    Explainer,
    /// Challenges claims and demands evidence.
    Reviewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explainer => write!(f, "explainer"),
            Self::Reviewer => write!(f, "reviewer"),
        }
    }
}

/// One side of the debate.
///
/// Holds no turn state; the debate loop owns the transcript and passes the
/// rendered history into every call. Two participants may share one backend.
#[derive(Clone)]
pub struct Participant {
    role: Role,
    name: String,
    instructions: String,
    backend: Arc<dyn GenerationBackend>,
}

impl Participant {
    pub fn new(
        role: Role,
        name: impl Into<String>,
        instructions: impl Into<String>,
        backend: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self {
            role,
            name: name.into(),
            instructions: instructions.into(),
            backend,
        }
    }

    /// "Explainer A": explains the paper and cites pages.
    pub fn explainer(backend: Arc<dyn GenerationBackend>) -> Self {
        Self::new(
            Role::Explainer,
            EXPLAINER_NAME,
            EXPLAINER_INSTRUCTIONS,
            backend,
        )
    }

    /// "Reviewer B": challenges the explainer and demands citations.
    pub fn reviewer(backend: Arc<dyn GenerationBackend>) -> Self {
        Self::new(Role::Reviewer, REVIEWER_NAME, REVIEWER_INSTRUCTIONS, backend)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// Instructions, optional `Context:` section, then the `Message:` section.
    pub fn build_prompt(&self, message: &str, context: &str) -> String {
        let mut parts = vec![self.instructions.clone()];
        if !context.is_empty() {
            parts.push(format!("Context:\n{}", context));
        }
        parts.push(format!("Message:\n{}", message));
        parts.join("\n\n")
    }

    pub async fn respond(
        &self,
        message: &str,
        context: &str,
        history: &[String],
    ) -> Result<String, GenerationError> {
        let prompt = self.build_prompt(message, context);
        self.backend.generate(&prompt, history).await
    }

    /// Streaming counterpart of [`respond`](Self::respond).
    pub fn respond_stream<'a>(
        &'a self,
        message: &str,
        context: &str,
        history: &'a [String],
    ) -> FragmentStream<'a> {
        let prompt = self.build_prompt(message, context);
        self.backend.generate_stream(prompt, history)
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("role", &self.role)
            .field("name", &self.name)
            .field("model", &self.backend.model())
            .finish()
    }
}
