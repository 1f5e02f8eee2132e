//! The opening frame of a watch connection.

use crate::{Result, WatchError};
use serde::{Deserialize, Serialize};

/// Parameters a client sends as the first frame to open a watch stream.
///
/// `resource_version` is the resumption checkpoint: the protocol carries it
/// opaquely and never interprets it. A client resuming after a terminated
/// stream supplies the last version it observed; a client starting fresh
/// omits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchRequest {
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl WatchRequest {
    pub fn new(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            namespace: None,
            resource_version: None,
        }
    }

    pub fn with_namespace(mut self, namespace: String) -> Self {
        self.namespace = Some(namespace);
        self
    }

    pub fn with_resource_version(mut self, resource_version: String) -> Self {
        self.resource_version = Some(resource_version);
        self
    }

    pub fn to_frame(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_frame(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(WatchError::MalformedPayload)
    }
}
