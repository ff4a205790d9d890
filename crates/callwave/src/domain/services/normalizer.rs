//! Event Normalizer
//!
//! Maps whatever JSON the provider sends into a `CanonicalEvent`. The
//! provider's webhook contract has changed shape across versions (flat
//! fields, nested `metadata`, nested `workflow.node.output`, renamed keys),
//! so every lookup here walks an ordered list of places a field may live and
//! an ordered list of names it may go by.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::entities::{CallDetails, CallIdentity, CanonicalEvent};
use crate::domain::value_objects::EventKind;

/// Objects that may hold event fields, most specific last is NOT implied:
/// lookups take the first hit in this order.
const CONTEXT_PATHS: &[&[&str]] = &[
    &[],
    &["data"],
    &["call"],
    &["message"],
    &["payload"],
    &["workflow", "node", "output"],
    &["data", "call"],
    &["message", "call"],
    &["customer"],
    &["data", "customer"],
];

/// Contexts in which a bare `id` is a provider call id
const CALL_OBJECT_PATHS: &[&[&str]] = &[&["call"], &["data", "call"], &["message", "call"]];

const METADATA_KEYS: &[&str] = &["metadata", "meta", "custom_data", "customData"];

const INTERNAL_ID_KEYS: &[&str] = &[
    "internal_call_id",
    "internalCallId",
    "callwave_call_id",
    "call_id",
    "callId",
];

const EXTERNAL_ID_KEYS: &[&str] = &[
    "call_id",
    "callId",
    "call_sid",
    "callSid",
    "CallSid",
    "session_id",
    "sessionId",
    "conversation_id",
    "conversationId",
    "execution_id",
    "executionId",
];

const EVENT_TYPE_KEYS: &[&str] = &[
    "event",
    "event_type",
    "eventType",
    "event_name",
    "eventName",
    "webhook_type",
    "type",
];

const STATUS_KEYS: &[&str] = &[
    "status",
    "call_status",
    "callStatus",
    "CallStatus",
    "state",
    "call_state",
    "disposition",
];

const TRANSCRIPT_KEYS: &[&str] = &[
    "transcript",
    "transcription",
    "final_transcript",
    "finalTranscript",
    "transcript_text",
    "chunk",
    "text",
];

const RECORDING_KEYS: &[&str] = &[
    "recording_url",
    "recordingUrl",
    "recording",
    "audio_url",
    "audioUrl",
    "recording_link",
];

const DURATION_SECS_KEYS: &[&str] = &[
    "duration_seconds",
    "durationSeconds",
    "duration",
    "call_duration",
    "callDuration",
    "call_length",
    "duration_secs",
];

const DURATION_MS_KEYS: &[&str] = &["duration_ms", "durationMs"];

const REG_NO_KEYS: &[&str] = &[
    "reg_no",
    "regNo",
    "registration_number",
    "registrationNumber",
    "registration_no",
    "reg_number",
    "vehicle_number",
    "vehicleNumber",
];

const ERROR_KEYS: &[&str] = &[
    "error_message",
    "errorMessage",
    "error",
    "failure_reason",
    "ended_reason",
    "endedReason",
    "reason",
];

/// Normalize an inbound provider payload
///
/// Returns `None` when the payload carries nothing that could identify a
/// call. Unknown event kinds still produce an event with
/// `EventKind::Unrecognized` so the caller can acknowledge and drop it.
pub fn normalize_event(payload: &Value) -> Option<CanonicalEvent> {
    let contexts = contexts(payload);
    let metadata = metadata_contexts(&contexts);

    let identity = CallIdentity {
        internal_call_id: find_uuid(&metadata, INTERNAL_ID_KEYS)
            .or_else(|| find_uuid(&contexts, &["internal_call_id", "internalCallId"])),
        external_call_id: find_external_id(payload, &contexts),
        reg_no: find_string(&metadata, REG_NO_KEYS).or_else(|| find_string(&contexts, REG_NO_KEYS)),
    };

    if identity.is_empty() {
        return None;
    }

    let status_hint = find_string(&contexts, STATUS_KEYS);
    let transcript = find_transcript(&contexts);

    let event_kind = find_string(&contexts, EVENT_TYPE_KEYS)
        .as_deref()
        .and_then(EventKind::from_provider);
    let status_kind = status_hint.as_deref().and_then(EventKind::from_provider);
    let kind = resolve_kind(event_kind, status_kind, transcript.is_some());

    Some(CanonicalEvent {
        kind,
        identity,
        status_hint,
        transcript,
        recording_url: find_recording(&contexts),
        duration_seconds: find_duration(&contexts),
        error_message: find_error(&contexts),
    })
}

/// Pull the provider call id out of a provider response body
///
/// Unlike webhook payloads, a bare top-level `id` counts here.
pub fn extract_external_call_id(body: &Value) -> Option<String> {
    let contexts = contexts(body);
    find_external_id(body, &contexts).or_else(|| {
        let root: Vec<_> = body.as_object().into_iter().collect();
        find_string(&root, &["id", "sid"])
    })
}

/// Pull transcript, recording, duration and status out of a call-detail body
pub fn extract_call_details(body: &Value) -> CallDetails {
    let contexts = contexts(body);
    CallDetails {
        transcript: find_transcript(&contexts),
        recording_url: find_recording(&contexts),
        duration_seconds: find_duration(&contexts),
        status: find_string(&contexts, STATUS_KEYS),
    }
}

fn resolve_kind(
    event_kind: Option<EventKind>,
    status_kind: Option<EventKind>,
    has_transcript: bool,
) -> EventKind {
    match (event_kind, status_kind) {
        // "call ended" with a failure status is a failure
        (Some(EventKind::Completed), Some(EventKind::Failed)) => EventKind::Failed,
        (Some(kind), _) if kind.is_recognized() => kind,
        (Some(unrecognized), Some(status)) => {
            if status.is_recognized() {
                status
            } else {
                unrecognized
            }
        }
        (None, Some(status)) => status,
        (Some(unrecognized), None) => unrecognized,
        (None, None) if has_transcript => EventKind::TranscriptChunk,
        (None, None) => EventKind::Unrecognized(String::new()),
    }
}

fn contexts(payload: &Value) -> Vec<&Map<String, Value>> {
    CONTEXT_PATHS
        .iter()
        .filter_map(|path| object_at(payload, path))
        .collect()
}

fn metadata_contexts<'a>(contexts: &[&'a Map<String, Value>]) -> Vec<&'a Map<String, Value>> {
    contexts
        .iter()
        .copied()
        .flat_map(|ctx| METADATA_KEYS.iter().filter_map(move |key| ctx.get(*key)))
        .filter_map(Value::as_object)
        .collect()
}

fn object_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Map<String, Value>> {
    path.iter()
        .try_fold(value, |current, key| current.get(*key))
        .and_then(Value::as_object)
}

fn find_external_id(payload: &Value, contexts: &[&Map<String, Value>]) -> Option<String> {
    find_string(contexts, EXTERNAL_ID_KEYS).or_else(|| {
        let call_objects: Vec<_> = CALL_OBJECT_PATHS
            .iter()
            .filter_map(|path| object_at(payload, path))
            .collect();
        find_string(&call_objects, &["id"])
    })
}

/// First non-empty scalar under any alias, scanning contexts in order
fn find_string(contexts: &[&Map<String, Value>], keys: &[&str]) -> Option<String> {
    contexts.iter().find_map(|ctx| {
        keys.iter()
            .find_map(|key| ctx.get(*key).and_then(scalar_string))
    })
}

fn find_uuid(contexts: &[&Map<String, Value>], keys: &[&str]) -> Option<Uuid> {
    contexts.iter().find_map(|ctx| {
        keys.iter().find_map(|key| {
            ctx.get(*key)
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s.trim()).ok())
        })
    })
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn find_transcript(contexts: &[&Map<String, Value>]) -> Option<String> {
    contexts.iter().find_map(|ctx| {
        TRANSCRIPT_KEYS
            .iter()
            .find_map(|key| ctx.get(*key).and_then(transcript_text))
    })
}

/// Transcripts arrive as plain text, as `{text}` objects, or as turn lists
fn transcript_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(turns) => {
            let lines: Vec<String> = turns.iter().filter_map(turn_line).collect();
            (!lines.is_empty()).then(|| lines.join("\n"))
        }
        Value::Object(obj) => ["text", "content", "transcript"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(transcript_text)),
        _ => None,
    }
}

fn turn_line(turn: &Value) -> Option<String> {
    if let Some(text) = turn.as_str() {
        return (!text.trim().is_empty()).then(|| text.trim().to_string());
    }
    let obj = turn.as_object()?;
    let text = ["text", "content", "message", "transcript"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|t| !t.is_empty())?;
    let speaker = ["role", "speaker", "user"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str));
    Some(match speaker {
        Some(speaker) => format!("{speaker}: {text}"),
        None => text.to_string(),
    })
}

fn find_recording(contexts: &[&Map<String, Value>]) -> Option<String> {
    contexts.iter().find_map(|ctx| {
        RECORDING_KEYS.iter().find_map(|key| match ctx.get(*key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Object(obj) => obj.get("url").and_then(scalar_string),
            _ => None,
        })
    })
}

fn find_duration(contexts: &[&Map<String, Value>]) -> Option<i32> {
    let seconds = contexts.iter().find_map(|ctx| {
        DURATION_SECS_KEYS
            .iter()
            .find_map(|key| ctx.get(*key).and_then(number))
    });
    let seconds = seconds.or_else(|| {
        contexts.iter().find_map(|ctx| {
            DURATION_MS_KEYS
                .iter()
                .find_map(|key| ctx.get(*key).and_then(number))
                .map(|ms| ms / 1000.0)
        })
    })?;
    (seconds.is_finite() && seconds >= 0.0).then(|| seconds.round() as i32)
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn find_error(contexts: &[&Map<String, Value>]) -> Option<String> {
    contexts.iter().find_map(|ctx| {
        ERROR_KEYS.iter().find_map(|key| match ctx.get(*key)? {
            Value::Object(obj) => obj.get("message").and_then(scalar_string),
            other => scalar_string(other),
        })
    })
}
