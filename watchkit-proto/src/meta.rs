use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifies a registered object type by API group, version, and kind.
///
/// The empty group is the legacy core group, so `Pod` lives at `v1, Kind=Pod`
/// while `Deployment` lives at `apps/v1, Kind=Deployment`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeTag {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl TypeTag {
    pub fn new(group: &str, version: &str, kind: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        }
    }

    /// The `apiVersion` string as it appears on the wire: `v1` for the core
    /// group, `group/version` otherwise.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Parses a wire `apiVersion` plus kind back into a tag.
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, kind),
            None => Self::new("", api_version, kind),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}, Kind={}", self.version, self.kind)
        } else {
            write!(f, "{}/{}, Kind={}", self.group, self.version, self.kind)
        }
    }
}

/// Self-describing type header embedded in every serialized object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeMeta {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
}

impl TypeMeta {
    pub fn from_tag(tag: &TypeTag) -> Self {
        Self {
            api_version: tag.api_version(),
            kind: tag.kind.clone(),
        }
    }

    pub fn tag(&self) -> TypeTag {
        TypeTag::from_api_version(&self.api_version, &self.kind)
    }
}

/// Standard metadata shared by every resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Opaque version stamp set by the server on every change; carried back by
    /// clients as a resumption checkpoint, never interpreted by the protocol.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Structured in-band failure carried by an Error-kind event.
///
/// A `Status` terminates the meaning of one event, not the stream: it is data
/// reported by the remote peer, delivered to the caller as a normal decode
/// result rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl Status {
    /// The server's resumption checkpoint for the request is no longer in its
    /// history; the client must re-list instead of resuming.
    pub const REASON_EXPIRED: &'static str = "Expired";
    /// Keep-alive event; application-level no-op.
    pub const REASON_HEARTBEAT: &'static str = "Heartbeat";
    /// The watch request itself was unacceptable.
    pub const REASON_BAD_REQUEST: &'static str = "BadRequest";

    pub fn new(code: i32, reason: &str, message: String) -> Self {
        Self {
            code,
            reason: reason.to_string(),
            message,
        }
    }

    pub fn expired(message: String) -> Self {
        Self::new(410, Self::REASON_EXPIRED, message)
    }

    pub fn heartbeat() -> Self {
        Self::new(0, Self::REASON_HEARTBEAT, String::new())
    }

    pub fn bad_request(message: String) -> Self {
        Self::new(400, Self::REASON_BAD_REQUEST, message)
    }

    pub fn is_heartbeat(&self) -> bool {
        self.reason == Self::REASON_HEARTBEAT
    }
}
