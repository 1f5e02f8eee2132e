//! Resource types the protocol can carry, as a closed sum.
//!
//! Each API group contributes its kinds to a [`SchemeBuilder`](crate::scheme::SchemeBuilder)
//! through its `register` function at startup; the protocol core never inspects
//! runtime types beyond matching on [`Object`].

use crate::meta::{ObjectMeta, TypeTag};
use crate::scheme::SchemeBuilder;
use crate::{Result, WatchError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DeploymentSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    #[serde(default)]
    pub replicas: i32,
}

/// Every type a watch stream can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Pod(Pod),
    ConfigMap(ConfigMap),
    Deployment(Deployment),
}

impl Object {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Object::Pod(_) => core_v1::pod(),
            Object::ConfigMap(_) => core_v1::config_map(),
            Object::Deployment(_) => apps_v1::deployment(),
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Object::Pod(pod) => &pod.metadata,
            Object::ConfigMap(cm) => &cm.metadata,
            Object::Deployment(dep) => &dep.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Object::Pod(pod) => &mut pod.metadata,
            Object::ConfigMap(cm) => &mut cm.metadata,
            Object::Deployment(dep) => &mut dep.metadata,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata().name
    }

    pub fn resource_version(&self) -> &str {
        &self.metadata().resource_version
    }
}

/// Core API group, `v1`.
pub mod core_v1 {
    use super::*;

    pub const GROUP_VERSION: &str = "v1";

    pub fn pod() -> TypeTag {
        TypeTag::new("", "v1", "Pod")
    }

    pub fn config_map() -> TypeTag {
        TypeTag::new("", "v1", "ConfigMap")
    }

    pub fn register(builder: &mut SchemeBuilder) -> Result<()> {
        builder.register(pod(), decode_pod)?;
        builder.register(config_map(), decode_config_map)?;
        Ok(())
    }

    fn decode_pod(data: &[u8]) -> Result<Object> {
        let pod: Pod = serde_json::from_slice(data).map_err(WatchError::MalformedPayload)?;
        Ok(Object::Pod(pod))
    }

    fn decode_config_map(data: &[u8]) -> Result<Object> {
        let cm: ConfigMap = serde_json::from_slice(data).map_err(WatchError::MalformedPayload)?;
        Ok(Object::ConfigMap(cm))
    }
}

/// Apps API group, `apps/v1`.
pub mod apps_v1 {
    use super::*;

    pub const GROUP_VERSION: &str = "apps/v1";

    pub fn deployment() -> TypeTag {
        TypeTag::new("apps", "v1", "Deployment")
    }

    pub fn register(builder: &mut SchemeBuilder) -> Result<()> {
        builder.register(deployment(), decode_deployment)?;
        Ok(())
    }

    fn decode_deployment(data: &[u8]) -> Result<Object> {
        let dep: Deployment =
            serde_json::from_slice(data).map_err(WatchError::MalformedPayload)?;
        Ok(Object::Deployment(dep))
    }
}
