//! Validation Gate
//!
//! Bounded, sequential retry loop around the decomposition collaborator:
//! draft → validate → feed the violations back → draft again. Structural and
//! referential violations are retried; lifecycle and planning violations
//! stop the loop at once. Nothing partially valid ever leaves the gate.

use crate::config::MAX_ATTEMPTS;
use crate::error::{DecomposeError, GateError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ssot_model::{has_fatal, normalize, Diagnostic, ErrorCode};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use tracing::{info, warn};

/// Context assembled for the collaborator on every attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecompositionContext {
    /// Every id the store currently holds
    pub existing_ids: Vec<String>,
    /// Registered domain ids
    pub domains: Vec<String>,
    /// `(from, kind, to)` triples of the trace graph
    pub trace_edges: Vec<(String, String, String)>,
    /// JSON schemas by kind stem
    pub schemas: BTreeMap<String, serde_json::Value>,
}

/// One call to the collaborator
#[derive(Debug)]
pub struct DecompositionRequest<'a, I> {
    pub context: &'a DecompositionContext,
    pub input: &'a I,
    /// Violations of the previous attempt; empty on the first
    pub feedback: &'a [Diagnostic],
    pub attempt: u32,
}

/// The decomposition collaborator
///
/// Treated as an opaque, possibly failing function. Output is validated by
/// the gate, never trusted.
pub trait Decomposer {
    type Input;
    type Draft;

    /// Propose drafts for `request.input`
    ///
    /// # Errors
    /// Returns error if the collaborator produced no usable output
    fn decompose(&mut self, request: &DecompositionRequest<'_, Self::Input>) -> Result<Self::Draft, DecomposeError>;
}

/// Decomposer that serves recorded drafts, one per attempt
///
/// Once the recording runs out the last draft is served again.
#[derive(Debug, Clone)]
pub struct ReplayDecomposer<I, D> {
    drafts: Vec<D>,
    served: usize,
    _input: PhantomData<fn(&I)>,
}

impl<I, D> ReplayDecomposer<I, D> {
    #[must_use]
    pub fn new(drafts: Vec<D>) -> Self {
        Self {
            drafts,
            served: 0,
            _input: PhantomData,
        }
    }

    /// Number of drafts handed out so far
    #[must_use]
    pub fn served(&self) -> usize {
        self.served
    }
}

/// Recorded collaborator output: one document, or `attempts: [...]`
#[derive(Deserialize)]
#[serde(untagged)]
enum Recording<D> {
    Attempts { attempts: Vec<D> },
    Single(D),
}

impl<I, D: DeserializeOwned> ReplayDecomposer<I, D> {
    /// Load a recording from YAML
    ///
    /// # Errors
    /// Returns error if the text is not a recording of `D`
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        let drafts = match serde_yaml::from_str::<Recording<D>>(text)? {
            Recording::Attempts { attempts } => attempts,
            Recording::Single(draft) => vec![draft],
        };
        Ok(Self::new(drafts))
    }
}

impl<I, D: Clone> Decomposer for ReplayDecomposer<I, D> {
    type Input = I;
    type Draft = D;

    fn decompose(&mut self, _request: &DecompositionRequest<'_, I>) -> Result<D, DecomposeError> {
        let draft = self
            .drafts
            .get(self.served)
            .or_else(|| self.drafts.last())
            .cloned()
            .ok_or_else(|| DecomposeError::new("no recorded drafts"))?;
        self.served += 1;
        Ok(draft)
    }
}

/// Violations found on one attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub number: u32,
    pub diagnostics: Vec<Diagnostic>,
}

/// Accepted drafts plus the attempts it took
#[derive(Debug, Clone)]
pub struct GateOutcome<D> {
    pub draft: D,
    pub attempts: u32,
    /// Rejected attempts, in order
    pub history: Vec<Attempt>,
}

/// Retry loop with a hard bound of three attempts
#[derive(Debug, Clone, Copy)]
pub struct ValidationGate {
    max_attempts: u32,
}

impl Default for ValidationGate {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl ValidationGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With attempt bound, clamped to `1..=3`
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.clamp(1, MAX_ATTEMPTS);
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Draft and validate until the drafts pass or the budget runs out
    ///
    /// `validate` returns the violations of one draft; an empty list accepts
    /// it. A collaborator failure counts as a retryable structural violation.
    ///
    /// # Errors
    /// Returns error on a fatal violation or after the last failed attempt
    pub fn run<D, V>(
        &self,
        decomposer: &mut D,
        context: &DecompositionContext,
        input: &D::Input,
        mut validate: V,
    ) -> Result<GateOutcome<D::Draft>, GateError>
    where
        D: Decomposer,
        V: FnMut(&D::Draft) -> Vec<Diagnostic>,
    {
        let mut history: Vec<Attempt> = Vec::new();
        for number in 1..=self.max_attempts {
            let feedback = history.last().map_or(&[][..], |a| a.diagnostics.as_slice());
            let request = DecompositionRequest {
                context,
                input,
                feedback,
                attempt: number,
            };
            let mut diagnostics = match decomposer.decompose(&request) {
                Ok(draft) => {
                    let diagnostics = validate(&draft);
                    if diagnostics.is_empty() {
                        info!(attempt = number, "validation gate accepted drafts");
                        return Ok(GateOutcome {
                            draft,
                            attempts: number,
                            history,
                        });
                    }
                    diagnostics
                }
                Err(e) => vec![Diagnostic::new(ErrorCode::CollaboratorFailure, "collaborator", e.to_string())],
            };
            normalize(&mut diagnostics);

            if has_fatal(&diagnostics) {
                warn!(attempt = number, violations = diagnostics.len(), "fatal violations, not retrying");
                return Err(GateError::Fatal {
                    attempt: number,
                    diagnostics,
                });
            }
            warn!(attempt = number, violations = diagnostics.len(), "drafts rejected, retrying with feedback");
            history.push(Attempt { number, diagnostics });
        }
        Err(GateError::Exhausted {
            attempts: self.max_attempts,
            history,
        })
    }
}
