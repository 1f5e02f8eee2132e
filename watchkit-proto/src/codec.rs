//! JSON object codec: one self-describing object to or from one byte block.

use crate::meta::{TypeMeta, TypeTag};
use crate::resources::Object;
use crate::scheme::Scheme;
use crate::{Result, WatchError};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Partial parse that extracts only the embedded type header, if any.
#[derive(Deserialize)]
struct TypeProbe {
    #[serde(rename = "apiVersion", default)]
    api_version: Option<String>,
    #[serde(default)]
    kind: Option<String>,
}

/// Encodes and decodes single objects as JSON with an embedded type tag.
///
/// Encoding is deterministic for identical logical input: struct fields
/// serialize in declaration order and maps are `BTreeMap`-backed.
#[derive(Clone)]
pub struct JsonCodec {
    scheme: Arc<Scheme>,
}

impl JsonCodec {
    pub fn new(scheme: Arc<Scheme>) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> &Arc<Scheme> {
        &self.scheme
    }

    /// Serializes `object` to a JSON value carrying its `apiVersion`/`kind`
    /// header. Fails with `UnknownType` if the object is not registered in
    /// this codec's scheme.
    pub fn encode_value(&self, object: &Object) -> Result<Value> {
        let tag = self.scheme.tag_of(object)?;
        let mut value = match object {
            Object::Pod(pod) => serde_json::to_value(pod)?,
            Object::ConfigMap(cm) => serde_json::to_value(cm)?,
            Object::Deployment(dep) => serde_json::to_value(dep)?,
        };
        if let Value::Object(map) = &mut value {
            let meta = TypeMeta::from_tag(&tag);
            map.insert("apiVersion".to_string(), Value::String(meta.api_version));
            map.insert("kind".to_string(), Value::String(meta.kind));
        }
        Ok(value)
    }

    pub fn encode(&self, object: &Object) -> Result<Vec<u8>> {
        let value = self.encode_value(object)?;
        Ok(serde_json::to_vec(&value)?)
    }

    /// Decodes one object. The embedded type header is authoritative; `hint`
    /// constrains target selection only when the payload carries no header.
    pub fn decode(&self, data: &[u8], hint: Option<&TypeTag>) -> Result<Object> {
        let probe: TypeProbe =
            serde_json::from_slice(data).map_err(WatchError::MalformedPayload)?;

        let tag = match (probe.api_version, probe.kind) {
            (Some(api_version), Some(kind)) => TypeTag::from_api_version(&api_version, &kind),
            _ => match hint {
                Some(hint) => hint.clone(),
                None => return Err(WatchError::MissingTypeMeta),
            },
        };

        let decode = self
            .scheme
            .resolve(&tag)
            .ok_or(WatchError::UnknownType(tag))?;
        decode(data)
    }
}
