//! Demo change producer: drives a rolling set of resources through the store
//! so connected watchers always have something to see.

use crate::store::Store;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use watchkit_proto::meta::ObjectMeta;
use watchkit_proto::resources::{ConfigMap, Container, Deployment, DeploymentSpec, Object, Pod, PodSpec};

fn demo_pod(index: u64, node: Option<&str>) -> Object {
    Object::Pod(Pod {
        metadata: ObjectMeta {
            name: format!("web-{index}"),
            namespace: "default".to_string(),
            creation_timestamp: Some(chrono::Utc::now()),
            ..ObjectMeta::default()
        },
        spec: PodSpec {
            node_name: node.unwrap_or_default().to_string(),
            containers: vec![Container {
                name: "web".to_string(),
                image: "nginx:1.25".to_string(),
            }],
        },
    })
}

fn demo_config_map(generation: u64) -> Object {
    let mut data = BTreeMap::new();
    data.insert("generation".to_string(), generation.to_string());
    Object::ConfigMap(ConfigMap {
        metadata: ObjectMeta {
            name: "web-settings".to_string(),
            namespace: "default".to_string(),
            ..ObjectMeta::default()
        },
        data,
    })
}

fn demo_deployment(replicas: i32) -> Object {
    Object::Deployment(Deployment {
        metadata: ObjectMeta {
            name: "web".to_string(),
            namespace: "default".to_string(),
            ..ObjectMeta::default()
        },
        spec: DeploymentSpec { replicas },
    })
}

/// Applies one scripted change every `interval`, forever.
pub async fn run(store: Arc<Store>, interval: Duration) {
    info!("Starting change simulation (one change every {:?})", interval);
    let mut ticker = tokio::time::interval(interval);
    let mut step: u64 = 0;

    loop {
        ticker.tick().await;
        match step % 6 {
            0 => {
                store.add(demo_pod(step / 6, None)).await;
            }
            1 => {
                store.modify(demo_pod(step / 6, Some("node-1"))).await;
            }
            2 => {
                store.modify(demo_config_map(step / 6 + 1)).await;
            }
            3 => {
                store.modify(demo_deployment((step / 6 % 5) as i32 + 1)).await;
            }
            4 => {
                store.delete(demo_pod(step / 6, Some("node-1"))).await;
            }
            _ => {
                store.add(demo_config_map(step / 6 + 1)).await;
            }
        }
        step += 1;
    }
}
