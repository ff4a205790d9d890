//! Call State Machine
//!
//! Applies one input (a canonical event or a local command) to one call and
//! returns the next call state plus the side effects the caller must apply.
//! Nothing here touches storage; the caller persists `AppliedTransition::call`
//! with a compare-and-set on `version` and applies the counter delta only if
//! that write wins.
//!
//! ```text
//! queued ──► ringing ──► active
//!    │          │          │
//!    └──────────┴──────────┴──► completed | failed | canceled   (sticky)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::{Call, CallDetails, CanonicalEvent};
use crate::domain::errors::DomainError;
use crate::domain::value_objects::{CallStatus, EventKind};

/// Something that can move a call forward
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallInput {
    Ringing,
    Active { external_call_id: Option<String> },
    TranscriptChunk(String),
    Completed(CallDetails),
    Failed { error: String, details: CallDetails },
    /// Only issued locally: user stop or watchdog cancellation
    Canceled { reason: String },
    /// Fill-only media update (manual transcript fetch)
    Enrich(CallDetails),
}

impl CallInput {
    /// Build the input for a canonical event
    ///
    /// Returns `None` for unrecognized kinds and for transcript chunks
    /// without text.
    pub fn from_event(event: &CanonicalEvent) -> Option<Self> {
        match &event.kind {
            EventKind::Ringing => Some(CallInput::Ringing),
            EventKind::Active => Some(CallInput::Active {
                external_call_id: event.identity.external_call_id.clone(),
            }),
            EventKind::TranscriptChunk => event
                .transcript
                .as_deref()
                .and_then(non_blank)
                .map(|text| CallInput::TranscriptChunk(text.to_string())),
            EventKind::Completed => Some(CallInput::Completed(event.details())),
            EventKind::Failed => Some(CallInput::Failed {
                error: event
                    .error_message
                    .clone()
                    .or_else(|| event.status_hint.clone())
                    .unwrap_or_else(|| "Provider reported call failure".to_string()),
                details: event.details(),
            }),
            EventKind::Unrecognized(_) => None,
        }
    }

    /// Status this input tries to move the call into, if any
    pub fn target_status(&self) -> Option<CallStatus> {
        match self {
            CallInput::Ringing => Some(CallStatus::Ringing),
            CallInput::Active { .. } => Some(CallStatus::Active),
            CallInput::Completed(_) => Some(CallStatus::Completed),
            CallInput::Failed { .. } => Some(CallStatus::Failed),
            CallInput::Canceled { .. } => Some(CallStatus::Canceled),
            CallInput::TranscriptChunk(_) | CallInput::Enrich(_) => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CallInput::Ringing => "ringing",
            CallInput::Active { .. } => "active",
            CallInput::TranscriptChunk(_) => "transcript_chunk",
            CallInput::Completed(_) => "completed",
            CallInput::Failed { .. } => "failed",
            CallInput::Canceled { .. } => "canceled",
            CallInput::Enrich(_) => "enrich",
        }
    }
}

/// Increments owed to the batch counters by one transition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterDelta {
    pub success: i32,
    pub failure: i32,
}

impl CounterDelta {
    pub const NONE: CounterDelta = CounterDelta {
        success: 0,
        failure: 0,
    };
    pub const SUCCESS: CounterDelta = CounterDelta {
        success: 1,
        failure: 0,
    };
    pub const FAILURE: CounterDelta = CounterDelta {
        success: 0,
        failure: 1,
    };

    pub fn is_zero(&self) -> bool {
        self.success == 0 && self.failure == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionEffects {
    pub previous_status: CallStatus,
    pub new_status: CallStatus,
    pub counter_delta: CounterDelta,
    pub requires_batch_completion_check: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedTransition {
    /// Next state of the call; `version` still holds the value it was read with
    pub call: Call,
    pub effects: TransitionEffects,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Applied(AppliedTransition),
    /// Terminal input on a call already in that terminal status
    AlreadyTerminal { status: CallStatus },
    /// Harmless no-op (duplicate or stale non-terminal event)
    Ignored { status: CallStatus, reason: String },
}

/// Pure state machine for a single call's lifecycle
#[derive(Debug, Clone, Copy, Default)]
pub struct CallStateMachine;

impl CallStateMachine {
    pub fn new() -> Self {
        Self
    }

    /// Apply `input` to `call` at time `now`
    ///
    /// Terminal statuses are sticky: re-entering the same terminal status
    /// yields `AlreadyTerminal`, while leaving it or switching to another
    /// terminal status yields `DomainError::IllegalTransition`. Callers treat
    /// both as no-ops.
    pub fn apply(
        &self,
        call: &Call,
        input: &CallInput,
        now: DateTime<Utc>,
    ) -> Result<Transition, DomainError> {
        if call.is_terminal() {
            return Self::apply_terminal(call, input);
        }

        let mut next = call.clone();
        let previous = call.status;

        let transition = match input {
            CallInput::Ringing => match previous {
                CallStatus::Queued => {
                    next.status = CallStatus::Ringing;
                    next.started_at.get_or_insert(now);
                    Self::applied(next, previous, CounterDelta::NONE)
                }
                CallStatus::Ringing => ignored(previous, "duplicate ringing event"),
                _ => ignored(previous, "stale ringing event after call became active"),
            },

            CallInput::Active { external_call_id } => {
                let filled_id = fill(&mut next.external_call_id, external_call_id.as_deref());
                match previous {
                    CallStatus::Queued | CallStatus::Ringing => {
                        next.status = CallStatus::Active;
                        next.started_at.get_or_insert(now);
                        Self::applied(next, previous, CounterDelta::NONE)
                    }
                    _ if filled_id => Self::applied(next, previous, CounterDelta::NONE),
                    _ => ignored(previous, "call already active"),
                }
            }

            CallInput::TranscriptChunk(text) => match non_blank(text) {
                None => ignored(previous, "empty transcript chunk"),
                Some(text) => {
                    next.live_transcript = Some(match next.live_transcript.as_deref() {
                        Some(existing) if !existing.is_empty() => format!("{existing}\n{text}"),
                        _ => text.to_string(),
                    });
                    if matches!(previous, CallStatus::Queued | CallStatus::Ringing) {
                        next.status = CallStatus::Active;
                        next.started_at.get_or_insert(now);
                    }
                    Self::applied(next, previous, CounterDelta::NONE)
                }
            },

            CallInput::Completed(details) => {
                merge_details(&mut next, details);
                Self::terminate(next, previous, CallStatus::Completed, None, now)
            }

            CallInput::Failed { error, details } => {
                merge_details(&mut next, details);
                Self::terminate(next, previous, CallStatus::Failed, Some(error), now)
            }

            CallInput::Canceled { reason } => {
                promote_live_transcript(&mut next);
                Self::terminate(next, previous, CallStatus::Canceled, Some(reason), now)
            }

            CallInput::Enrich(details) => {
                if fill_live_details(&mut next, details) {
                    Self::applied(next, previous, CounterDelta::NONE)
                } else {
                    ignored(previous, "no new details")
                }
            }
        };

        Ok(transition)
    }

    fn apply_terminal(call: &Call, input: &CallInput) -> Result<Transition, DomainError> {
        let status = call.status;
        let mut next = call.clone();

        match input {
            CallInput::TranscriptChunk(_) => Ok(ignored(
                status,
                "transcript chunk dropped for terminal call",
            )),
            // A late completion may still carry media the first one lacked
            CallInput::Completed(details) if status == CallStatus::Completed => {
                if fill_details(&mut next, details) {
                    Ok(Self::applied(next, status, CounterDelta::NONE))
                } else {
                    Ok(Transition::AlreadyTerminal { status })
                }
            }
            CallInput::Enrich(details) => {
                if fill_details(&mut next, details) {
                    Ok(Self::applied(next, status, CounterDelta::NONE))
                } else {
                    Ok(Transition::AlreadyTerminal { status })
                }
            }
            CallInput::Active {
                external_call_id: Some(id),
            } if call.external_call_id.is_none() => {
                next.external_call_id = Some(id.clone());
                Ok(Self::applied(next, status, CounterDelta::NONE))
            }
            other => match other.target_status() {
                Some(target) if target == status => Ok(Transition::AlreadyTerminal { status }),
                Some(target) => Err(DomainError::IllegalTransition {
                    from: status,
                    to: target,
                }),
                None => Ok(Transition::AlreadyTerminal { status }),
            },
        }
    }

    fn terminate(
        mut next: Call,
        previous: CallStatus,
        status: CallStatus,
        error: Option<&String>,
        now: DateTime<Utc>,
    ) -> Transition {
        next.status = status;
        next.started_at.get_or_insert(now);
        next.completed_at = Some(now);
        if let Some(error) = error {
            next.error_message = Some(error.clone());
        }
        let delta = if status == CallStatus::Completed {
            CounterDelta::SUCCESS
        } else {
            CounterDelta::FAILURE
        };
        Self::applied(next, previous, delta)
    }

    fn applied(call: Call, previous: CallStatus, counter_delta: CounterDelta) -> Transition {
        let new_status = call.status;
        Transition::Applied(AppliedTransition {
            call,
            effects: TransitionEffects {
                previous_status: previous,
                new_status,
                counter_delta,
                requires_batch_completion_check: new_status.is_terminal()
                    && !previous.is_terminal(),
            },
        })
    }
}

fn ignored(status: CallStatus, reason: &str) -> Transition {
    Transition::Ignored {
        status,
        reason: reason.to_string(),
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Write `value` into `slot` only if the slot is empty
fn fill(slot: &mut Option<String>, value: Option<&str>) -> bool {
    match (slot.as_ref(), value.and_then(non_blank)) {
        (None, Some(v)) => {
            *slot = Some(v.to_string());
            true
        }
        _ => false,
    }
}

fn fill_details(call: &mut Call, details: &CallDetails) -> bool {
    let changed = fill(&mut call.final_transcript, details.transcript.as_deref());
    fill_media(call, details) || changed
}

/// Details of a call still in progress: the transcript is only a snapshot
/// so far, and `final_transcript` stays open for the terminal event
fn fill_live_details(call: &mut Call, details: &CallDetails) -> bool {
    let changed = match details.transcript.as_deref().and_then(non_blank) {
        Some(text)
            if call
                .live_transcript
                .as_deref()
                .map_or(true, |live| text.len() > live.len()) =>
        {
            call.live_transcript = Some(text.to_string());
            true
        }
        _ => false,
    };
    fill_media(call, details) || changed
}

fn fill_media(call: &mut Call, details: &CallDetails) -> bool {
    let mut changed = fill(&mut call.recording_url, details.recording_url.as_deref());
    if call.duration_seconds.is_none() {
        if let Some(duration) = details.duration_seconds {
            call.duration_seconds = Some(duration);
            changed = true;
        }
    }
    changed
}

/// Merge terminal-event details; the live transcript stands in for a missing final one
fn merge_details(call: &mut Call, details: &CallDetails) {
    fill_details(call, details);
    promote_live_transcript(call);
}

fn promote_live_transcript(call: &mut Call) {
    if call.final_transcript.is_none() {
        let live = call.live_transcript.clone();
        fill(&mut call.final_transcript, live.as_deref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{CallIdentity, NewCall};
    use uuid::Uuid;

    fn queued_call() -> Call {
        Call::new(
            Uuid::new_v4(),
            NewCall {
                phone_number: "+15550001".to_string(),
                reg_no: Some("KA01AB1234".to_string()),
                message: None,
            },
        )
    }

    fn with_status(status: CallStatus) -> Call {
        let machine = CallStateMachine::new();
        let mut call = queued_call();
        let input = match status {
            CallStatus::Queued => return call,
            CallStatus::Ringing => CallInput::Ringing,
            CallStatus::Active => CallInput::Active {
                external_call_id: Some("ext-1".to_string()),
            },
            CallStatus::Completed => CallInput::Completed(CallDetails::default()),
            CallStatus::Failed => CallInput::Failed {
                error: "busy".to_string(),
                details: CallDetails::default(),
            },
            CallStatus::Canceled => CallInput::Canceled {
                reason: "stopped".to_string(),
            },
        };
        match machine.apply(&call, &input, Utc::now()).unwrap() {
            Transition::Applied(applied) => call = applied.call,
            other => panic!("setup transition failed: {other:?}"),
        }
        call
    }

    fn applied(t: Result<Transition, DomainError>) -> AppliedTransition {
        match t {
            Ok(Transition::Applied(a)) => a,
            other => panic!("Expected applied transition, got {other:?}"),
        }
    }

    fn completion(transcript: Option<&str>) -> CallInput {
        CallInput::Completed(CallDetails {
            transcript: transcript.map(str::to_string),
            recording_url: Some("https://rec.example/1.mp3".to_string()),
            duration_seconds: Some(42),
            status: None,
        })
    }

    #[test]
    fn test_queued_to_ringing_sets_started_at() {
        let call = queued_call();
        let result = applied(CallStateMachine::new().apply(&call, &CallInput::Ringing, Utc::now()));

        assert_eq!(result.call.status, CallStatus::Ringing);
        assert!(result.call.started_at.is_some());
        assert!(result.effects.counter_delta.is_zero());
        assert!(!result.effects.requires_batch_completion_check);
    }

    #[test]
    fn test_active_records_external_id() {
        let call = with_status(CallStatus::Ringing);
        let input = CallInput::Active {
            external_call_id: Some("prov-99".to_string()),
        };
        let result = applied(CallStateMachine::new().apply(&call, &input, Utc::now()));

        assert_eq!(result.call.status, CallStatus::Active);
        assert_eq!(result.call.external_call_id.as_deref(), Some("prov-99"));
    }

    #[test]
    fn test_completion_sets_terminal_fields_and_success_delta() {
        let call = with_status(CallStatus::Active);
        let result =
            applied(CallStateMachine::new().apply(&call, &completion(Some("hello")), Utc::now()));

        assert_eq!(result.call.status, CallStatus::Completed);
        assert!(result.call.completed_at.is_some());
        assert_eq!(result.call.final_transcript.as_deref(), Some("hello"));
        assert_eq!(result.call.duration_seconds, Some(42));
        assert_eq!(result.effects.counter_delta, CounterDelta::SUCCESS);
        assert!(result.effects.requires_batch_completion_check);
    }

    #[test]
    fn test_queued_can_fail_directly() {
        let call = queued_call();
        let input = CallInput::Failed {
            error: "trigger rejected".to_string(),
            details: CallDetails::default(),
        };
        let result = applied(CallStateMachine::new().apply(&call, &input, Utc::now()));

        assert_eq!(result.call.status, CallStatus::Failed);
        assert_eq!(result.call.error_message.as_deref(), Some("trigger rejected"));
        assert_eq!(result.effects.counter_delta, CounterDelta::FAILURE);
    }

    #[test]
    fn test_cancel_counts_as_failure() {
        let call = with_status(CallStatus::Active);
        let input = CallInput::Canceled {
            reason: "Stopped by user".to_string(),
        };
        let result = applied(CallStateMachine::new().apply(&call, &input, Utc::now()));

        assert_eq!(result.call.status, CallStatus::Canceled);
        assert_eq!(result.effects.counter_delta, CounterDelta::FAILURE);
        assert!(result.effects.requires_batch_completion_check);
    }

    #[test]
    fn test_duplicate_completion_is_already_terminal() {
        let call = with_status(CallStatus::Active);
        let machine = CallStateMachine::new();
        let first = applied(machine.apply(&call, &completion(Some("hello")), Utc::now()));
        let second = machine
            .apply(&first.call, &completion(Some("hello")), Utc::now())
            .unwrap();

        assert_eq!(
            second,
            Transition::AlreadyTerminal {
                status: CallStatus::Completed
            }
        );
    }

    #[test]
    fn test_terminal_statuses_never_regress() {
        let machine = CallStateMachine::new();
        let inputs = vec![
            CallInput::Ringing,
            CallInput::Active {
                external_call_id: None,
            },
            CallInput::TranscriptChunk("late words".to_string()),
            completion(Some("other")),
            CallInput::Failed {
                error: "late".to_string(),
                details: CallDetails::default(),
            },
            CallInput::Canceled {
                reason: "late".to_string(),
            },
        ];

        for status in [CallStatus::Completed, CallStatus::Failed, CallStatus::Canceled] {
            let call = with_status(status);
            for input in &inputs {
                match machine.apply(&call, input, Utc::now()) {
                    Ok(Transition::Applied(a)) => {
                        // Only fill-only media updates on completed calls are allowed
                        assert_eq!(a.call.status, status);
                        assert_eq!(a.call.completed_at, call.completed_at);
                        assert_eq!(a.call.error_message, call.error_message);
                        assert!(a.effects.counter_delta.is_zero());
                        assert!(!a.effects.requires_batch_completion_check);
                    }
                    Ok(_) => {}
                    Err(DomainError::IllegalTransition { from, .. }) => assert_eq!(from, status),
                    Err(e) => panic!("unexpected error {e}"),
                }
            }
        }
    }

    #[test]
    fn test_terminal_to_other_terminal_is_illegal() {
        let call = with_status(CallStatus::Failed);
        let result = CallStateMachine::new().apply(&call, &completion(None), Utc::now());

        assert!(matches!(
            result,
            Err(DomainError::IllegalTransition {
                from: CallStatus::Failed,
                to: CallStatus::Completed
            })
        ));
    }

    #[test]
    fn test_final_transcript_is_never_overwritten() {
        let call = with_status(CallStatus::Active);
        let machine = CallStateMachine::new();
        let first = applied(machine.apply(&call, &completion(Some("good transcript")), Utc::now()));
        let second = machine
            .apply(&first.call, &completion(Some("")), Utc::now())
            .unwrap();

        assert_eq!(
            second,
            Transition::AlreadyTerminal {
                status: CallStatus::Completed
            }
        );
        assert_eq!(
            first.call.final_transcript.as_deref(),
            Some("good transcript")
        );
    }

    #[test]
    fn test_late_completion_fills_missing_media_only() {
        let call = with_status(CallStatus::Completed);
        let result = applied(CallStateMachine::new().apply(&call, &completion(Some("hi")), Utc::now()));

        assert_eq!(result.call.final_transcript.as_deref(), Some("hi"));
        assert_eq!(result.call.completed_at, call.completed_at);
        assert!(result.effects.counter_delta.is_zero());
    }

    #[test]
    fn test_enrich_mid_call_keeps_final_transcript_open() {
        let machine = CallStateMachine::new();
        let call = with_status(CallStatus::Active);
        let snapshot = CallInput::Enrich(CallDetails {
            transcript: Some("agent: hi".to_string()),
            ..CallDetails::default()
        });

        let enriched = applied(machine.apply(&call, &snapshot, Utc::now()));
        assert_eq!(enriched.call.status, CallStatus::Active);
        assert_eq!(enriched.call.live_transcript.as_deref(), Some("agent: hi"));
        assert!(enriched.call.final_transcript.is_none());

        let done = applied(machine.apply(
            &enriched.call,
            &completion(Some("agent: hi\nuser: hello")),
            Utc::now(),
        ));
        assert_eq!(
            done.call.final_transcript.as_deref(),
            Some("agent: hi\nuser: hello")
        );
    }

    #[test]
    fn test_transcript_chunk_promotes_and_appends() {
        let machine = CallStateMachine::new();
        let call = with_status(CallStatus::Ringing);
        let first = applied(machine.apply(
            &call,
            &CallInput::TranscriptChunk("Agent: hello".to_string()),
            Utc::now(),
        ));
        assert_eq!(first.call.status, CallStatus::Active);

        let second = applied(machine.apply(
            &first.call,
            &CallInput::TranscriptChunk("User: hi".to_string()),
            Utc::now(),
        ));
        assert_eq!(
            second.call.live_transcript.as_deref(),
            Some("Agent: hello\nUser: hi")
        );
        assert_eq!(second.call.status, CallStatus::Active);
    }

    #[test]
    fn test_completion_without_transcript_promotes_live_one() {
        let machine = CallStateMachine::new();
        let call = with_status(CallStatus::Active);
        let chunked = applied(machine.apply(
            &call,
            &CallInput::TranscriptChunk("partial words".to_string()),
            Utc::now(),
        ));
        let done = applied(machine.apply(&chunked.call, &completion(None), Utc::now()));

        assert_eq!(done.call.final_transcript.as_deref(), Some("partial words"));
    }

    #[test]
    fn test_stale_ringing_after_active_is_ignored() {
        let call = with_status(CallStatus::Active);
        let result = CallStateMachine::new()
            .apply(&call, &CallInput::Ringing, Utc::now())
            .unwrap();

        assert!(matches!(
            result,
            Transition::Ignored {
                status: CallStatus::Active,
                ..
            }
        ));
    }

    #[test]
    fn test_from_event_maps_failed_with_error() {
        let event = CanonicalEvent {
            kind: EventKind::Failed,
            identity: CallIdentity::default(),
            status_hint: Some("busy".to_string()),
            transcript: None,
            recording_url: None,
            duration_seconds: None,
            error_message: None,
        };

        match CallInput::from_event(&event) {
            Some(CallInput::Failed { error, .. }) => assert_eq!(error, "busy"),
            other => panic!("Expected Failed input, got {other:?}"),
        }
    }
}
