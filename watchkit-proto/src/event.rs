//! Watch events and the envelope codec that puts them on the wire.
//!
//! One event is one frame payload: `{"type": "ADDED", "object": {...}}` for
//! change kinds, `{"type": "ERROR", "status": {...}}` for in-band errors.

use crate::codec::JsonCodec;
use crate::meta::Status;
use crate::resources::Object;
use crate::scheme::Scheme;
use crate::{Result, WatchError};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fmt;
use std::sync::Arc;

/// Change classification of a watch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "ADDED")]
    Added,
    #[serde(rename = "MODIFIED")]
    Modified,
    #[serde(rename = "DELETED")]
    Deleted,
    #[serde(rename = "ERROR")]
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Added => "ADDED",
            EventKind::Modified => "MODIFIED",
            EventKind::Deleted => "DELETED",
            EventKind::Error => "ERROR",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "ADDED" => Ok(EventKind::Added),
            "MODIFIED" => Ok(EventKind::Modified),
            "DELETED" => Ok(EventKind::Deleted),
            "ERROR" => Ok(EventKind::Error),
            other => Err(WatchError::UnknownEventKind(other.to_string())),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One change notification. Immutable once constructed; corresponds to exactly
/// one frame on the wire.
///
/// An `Error` event carries a [`Status`] and no typed object. It is a
/// successful decode result, not a decode failure: the remote peer reported an
/// application-level problem over a healthy stream, and only the caller can
/// decide what that means for their use of the watch.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Added(Object),
    Modified(Object),
    Deleted(Object),
    Error(Status),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Added(_) => EventKind::Added,
            Event::Modified(_) => EventKind::Modified,
            Event::Deleted(_) => EventKind::Deleted,
            Event::Error(_) => EventKind::Error,
        }
    }

    pub fn object(&self) -> Option<&Object> {
        match self {
            Event::Added(obj) | Event::Modified(obj) | Event::Deleted(obj) => Some(obj),
            Event::Error(_) => None,
        }
    }

    /// The resource version stamped on the carried object, if any. Callers
    /// track this as their resumption checkpoint.
    pub fn resource_version(&self) -> Option<&str> {
        self.object()
            .map(|obj| obj.resource_version())
            .filter(|rv| !rv.is_empty())
    }
}

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    #[serde(rename = "type")]
    kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    object: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'a Status>,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    object: Option<Box<RawValue>>,
    #[serde(default)]
    status: Option<Status>,
}

/// Wraps and unwraps (kind, object) pairs into frame payloads.
#[derive(Clone)]
pub struct EventCodec {
    codec: JsonCodec,
}

impl EventCodec {
    pub fn new(scheme: Arc<Scheme>) -> Self {
        Self {
            codec: JsonCodec::new(scheme),
        }
    }

    pub fn scheme(&self) -> &Arc<Scheme> {
        self.codec.scheme()
    }

    /// Produces one frame payload embedding the event kind and, for change
    /// kinds, the serialized object with its resolved type tag.
    pub fn encode_event(&self, event: &Event) -> Result<Vec<u8>> {
        let envelope = match event {
            Event::Error(status) => EnvelopeOut {
                kind: EventKind::Error,
                object: None,
                status: Some(status),
            },
            _ => {
                // kind() rules out Error here, so object() is always present
                let object = event
                    .object()
                    .ok_or_else(|| WatchError::MalformedEnvelope("event has no object".into()))?;
                EnvelopeOut {
                    kind: event.kind(),
                    object: Some(self.codec.encode_value(object)?),
                    status: None,
                }
            }
        };
        Ok(serde_json::to_vec(&envelope)?)
    }

    /// Reverses [`encode_event`](Self::encode_event). Never fatal: every
    /// failure here is a per-frame decode error and the stream may continue.
    pub fn decode_event(&self, payload: &[u8]) -> Result<Event> {
        let envelope: EnvelopeIn =
            serde_json::from_slice(payload).map_err(WatchError::MalformedPayload)?;
        let kind = EventKind::parse(&envelope.kind)?;

        if kind == EventKind::Error {
            let status = envelope.status.ok_or_else(|| {
                WatchError::MalformedEnvelope("ERROR event carries no status".into())
            })?;
            return Ok(Event::Error(status));
        }

        let raw = envelope.object.ok_or_else(|| {
            WatchError::MalformedEnvelope(format!("{kind} event carries no object"))
        })?;
        let object = self.codec.decode(raw.get().as_bytes(), None)?;

        Ok(match kind {
            EventKind::Added => Event::Added(object),
            EventKind::Modified => Event::Modified(object),
            EventKind::Deleted => Event::Deleted(object),
            EventKind::Error => unreachable!("handled above"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::ObjectMeta;
    use crate::resources::Pod;

    fn codec() -> EventCodec {
        EventCodec::new(Arc::new(Scheme::all_groups().unwrap()))
    }

    fn pod(name: &str) -> Object {
        Object::Pod(Pod {
            metadata: ObjectMeta::named(name),
            ..Pod::default()
        })
    }

    #[test]
    fn test_event_round_trip() {
        let codec = codec();
        for event in [
            Event::Added(pod("foo")),
            Event::Modified(pod("foo")),
            Event::Deleted(pod("foo")),
        ] {
            let payload = codec.encode_event(&event).unwrap();
            let decoded = codec.decode_event(&payload).unwrap();
            assert_eq!(decoded, event);
        }
    }

    #[test]
    fn test_error_event_round_trip() {
        let codec = codec();
        let status = Status::expired("too old resource version: 1 (5)".to_string());
        let payload = codec.encode_event(&Event::Error(status.clone())).unwrap();

        let decoded = codec.decode_event(&payload).unwrap();
        assert_eq!(decoded.kind(), EventKind::Error);
        assert!(decoded.object().is_none());
        assert_eq!(decoded, Event::Error(status));
    }

    #[test]
    fn test_error_wire_shape_uses_status_field() {
        let payload = codec()
            .encode_event(&Event::Error(Status::heartbeat()))
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["type"], "ERROR");
        assert!(value.get("object").is_none());
        assert_eq!(value["status"]["reason"], "Heartbeat");
    }

    #[test]
    fn test_unknown_event_kind() {
        let err = codec()
            .decode_event(br#"{"type":"BOOKMARK","object":{}}"#)
            .unwrap_err();
        assert!(matches!(err, WatchError::UnknownEventKind(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_unknown_object_type_is_recoverable() {
        let payload = br#"{"type":"ADDED","object":{"apiVersion":"v9","kind":"Gadget"}}"#;
        let err = codec().decode_event(payload).unwrap_err();
        assert!(matches!(err, WatchError::UnknownType(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_missing_object_field() {
        let err = codec().decode_event(br#"{"type":"ADDED"}"#).unwrap_err();
        assert!(matches!(err, WatchError::MalformedEnvelope(_)));
    }

    #[test]
    fn test_error_event_missing_status() {
        let err = codec().decode_event(br#"{"type":"ERROR"}"#).unwrap_err();
        assert!(matches!(err, WatchError::MalformedEnvelope(_)));
    }
}
