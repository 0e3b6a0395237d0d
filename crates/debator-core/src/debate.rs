//! Round-based debate loop.
//!
//! Drives a fixed number of rounds between an explainer and a reviewer.
//! Each round is one explainer turn followed by one reviewer turn:
//!
//! ```text
//! NotStarted ─▶ Turn(1, Explainer) ─▶ Turn(1, Reviewer) ─▶ … ─▶ Turn(N, Reviewer) ─▶ Finished
//! ```
//!
//! # Per-turn protocol
//!
//! 1. The prompt is the previous turn's reply (the topic for turn 1).
//! 2. Context is retrieved fresh for that prompt.
//! 3. The acting participant replies given the prompt, the context, and the
//!    transcript so far as `speaker: message` lines.
//! 4. The reply is appended to the transcript with the context's citations.
//! 5. The reply becomes the next prompt.
//!
//! Generation failures abort the run; no partial transcript is returned.

use std::fmt;

use futures::StreamExt;
use thiserror::Error;

use crate::context::{ContextAssembler, RetrievedContext};
use crate::generation::GenerationError;
use crate::models::ConversationTurn;
use crate::participant::{Participant, Role};
use crate::transcript::Transcript;

pub const DEFAULT_ROUNDS: usize = 3;

/// Position of the debate state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebatePhase {
    NotStarted,
    /// `round` is 1-based.
    Turn { round: usize, role: Role },
    Finished,
}

impl DebatePhase {
    /// The phase after this one in a debate of `rounds` rounds.
    pub fn next(self, rounds: usize) -> DebatePhase {
        match self {
            Self::NotStarted if rounds == 0 => Self::Finished,
            Self::NotStarted => Self::Turn {
                round: 1,
                role: Role::Explainer,
            },
            Self::Turn {
                round,
                role: Role::Explainer,
            } => Self::Turn {
                round,
                role: Role::Reviewer,
            },
            Self::Turn {
                round,
                role: Role::Reviewer,
            } if round < rounds => Self::Turn {
                round: round + 1,
                role: Role::Explainer,
            },
            Self::Turn { .. } | Self::Finished => Self::Finished,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Finished
    }
}

impl fmt::Display for DebatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Turn { round, role } => write!(f, "round_{}_{}", round, role),
            Self::Finished => write!(f, "finished"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DebateError {
    #[error("turn {turn} ({speaker}) failed: {source}")]
    Generation {
        turn: usize,
        speaker: String,
        #[source]
        source: GenerationError,
    },
}

/// How replies are pulled from the backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// One call per turn, full reply at once.
    #[default]
    Complete,
    /// Fragments consumed in order as the backend produces them.
    Streaming,
}

/// Receives turn progress as the debate runs.
///
/// With [`Delivery::Complete`] each turn reports its whole reply as a single
/// fragment.
pub trait TurnObserver {
    fn turn_started(&mut self, _turn: usize, _speaker: &str) {}
    fn fragment(&mut self, _text: &str) {}
    fn turn_finished(&mut self, _turn: &ConversationTurn) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl TurnObserver for NoopObserver {}

/// The explainer/reviewer debate driver.
pub struct DebateLoop<'a> {
    explainer: Participant,
    reviewer: Participant,
    rounds: usize,
    assembler: ContextAssembler<'a>,
    delivery: Delivery,
}

impl<'a> DebateLoop<'a> {
    pub fn new(
        explainer: Participant,
        reviewer: Participant,
        rounds: usize,
        assembler: ContextAssembler<'a>,
    ) -> Self {
        Self {
            explainer,
            reviewer,
            rounds,
            assembler,
            delivery: Delivery::default(),
        }
    }

    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    fn participant(&self, role: Role) -> &Participant {
        match role {
            Role::Explainer => &self.explainer,
            Role::Reviewer => &self.reviewer,
        }
    }

    pub async fn run(&self, topic: &str) -> Result<Transcript, DebateError> {
        self.run_observed(topic, &mut NoopObserver).await
    }

    pub async fn run_observed(
        &self,
        topic: &str,
        observer: &mut dyn TurnObserver,
    ) -> Result<Transcript, DebateError> {
        tracing::info!(
            rounds = self.rounds,
            explainer = self.explainer.model(),
            reviewer = self.reviewer.model(),
            "starting debate"
        );

        let mut transcript = Transcript::new(topic, self.rounds);
        let mut prompt = topic.to_string();
        let mut phase = DebatePhase::NotStarted.next(self.rounds);
        let mut turn_no = 0usize;

        while let DebatePhase::Turn { round, role } = phase {
            turn_no += 1;
            let participant = self.participant(role);

            let context = self.assembler.assemble(&prompt).await;
            tracing::debug!(
                turn = turn_no,
                %phase,
                citations = ?context.citations,
                "context assembled"
            );

            let history = transcript.history_lines();
            observer.turn_started(turn_no, participant.name());
            let message = self
                .take_turn(participant, &prompt, &context, &history, observer)
                .await
                .map_err(|source| DebateError::Generation {
                    turn: turn_no,
                    speaker: participant.name().to_string(),
                    source,
                })?;

            let turn = ConversationTurn::new(participant.name(), message, context.citations);
            observer.turn_finished(&turn);
            tracing::info!(
                turn = turn_no,
                round,
                speaker = participant.name(),
                chars = turn.message.chars().count(),
                "turn complete"
            );
            prompt = turn.message.clone();
            transcript.push(turn);

            phase = phase.next(self.rounds);
        }

        Ok(transcript)
    }

    async fn take_turn(
        &self,
        participant: &Participant,
        prompt: &str,
        context: &RetrievedContext,
        history: &[String],
        observer: &mut dyn TurnObserver,
    ) -> Result<String, GenerationError> {
        match self.delivery {
            Delivery::Complete => {
                let reply = participant.respond(prompt, &context.text, history).await?;
                observer.fragment(&reply);
                Ok(reply)
            }
            Delivery::Streaming => {
                let mut reply = String::new();
                let mut stream = participant.respond_stream(prompt, &context.text, history);
                while let Some(fragment) = stream.next().await {
                    let fragment = fragment?;
                    observer.fragment(&fragment);
                    reply.push_str(&fragment);
                }
                Ok(reply)
            }
        }
    }
}
