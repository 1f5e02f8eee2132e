use crate::store::{Change, Store};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use watchkit_proto::meta::{Status, TypeTag};
use watchkit_proto::resources::{apps_v1, core_v1};
use watchkit_proto::{Event, FrameReader, Scheme, WatchEncoder, WatchRequest};

/// How long a client may take to send its watch request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maps a collection name from a watch request to the type it carries.
fn resource_tag(resource: &str) -> Option<TypeTag> {
    match resource {
        "pods" => Some(core_v1::pod()),
        "configmaps" => Some(core_v1::config_map()),
        "deployments" => Some(apps_v1::deployment()),
        _ => None,
    }
}

fn change_matches(change: &Change, tag: &TypeTag, namespace: Option<&str>) -> bool {
    let Some(object) = change.event.object() else {
        return false;
    };
    if object.type_tag() != *tag {
        return false;
    }
    match namespace {
        Some(ns) => object.metadata().namespace == ns,
        None => true,
    }
}

pub struct ConnectionHandler {
    store: Arc<Store>,
    scheme: Arc<Scheme>,
    max_frame_bytes: u32,
    heartbeat: Duration,
}

impl ConnectionHandler {
    pub fn new(
        store: Arc<Store>,
        scheme: Arc<Scheme>,
        max_frame_bytes: u32,
        heartbeat_secs: u64,
    ) -> Self {
        Self {
            store,
            scheme,
            max_frame_bytes,
            heartbeat: Duration::from_secs(heartbeat_secs),
        }
    }

    /// Handles one watch connection: read the request, replay history from the
    /// client's checkpoint, then forward live changes until either side closes.
    pub async fn handle<S>(&self, stream: S, remote_addr: String)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        info!("Connection from {}", remote_addr);

        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = FrameReader::with_max_frame_size(read_half, self.max_frame_bytes);
        let encoder = Arc::new(WatchEncoder::with_max_frame_size(
            write_half,
            self.scheme.clone(),
            self.max_frame_bytes,
        ));

        let request = match timeout(REQUEST_TIMEOUT, reader.read_frame()).await {
            Ok(Ok(Some(frame))) => match WatchRequest::from_frame(&frame) {
                Ok(request) => request,
                Err(e) => {
                    warn!("Bad watch request from {}: {}", remote_addr, e);
                    self.send_bad_request(&encoder, format!("unparseable watch request: {e}"))
                        .await;
                    return;
                }
            },
            Ok(Ok(None)) => {
                debug!("{} closed before sending a watch request", remote_addr);
                return;
            }
            Ok(Err(e)) => {
                warn!("Transport error from {} before watch request: {}", remote_addr, e);
                return;
            }
            Err(_) => {
                warn!("{} sent no watch request within {:?}", remote_addr, REQUEST_TIMEOUT);
                self.send_bad_request(&encoder, "no watch request received".to_string())
                    .await;
                return;
            }
        };

        let Some(tag) = resource_tag(&request.resource) else {
            self.send_bad_request(&encoder, format!("unknown resource {:?}", request.resource))
                .await;
            return;
        };

        let checkpoint = match request
            .resource_version
            .as_deref()
            .map(str::parse::<u64>)
            .transpose()
        {
            Ok(checkpoint) => checkpoint,
            Err(_) => {
                self.send_bad_request(
                    &encoder,
                    "resourceVersion must be an unsigned integer".to_string(),
                )
                .await;
                return;
            }
        };

        let (replay, rx) = match self.store.subscribe_from(checkpoint).await {
            Ok(subscription) => subscription,
            Err(expired) => {
                info!(
                    "{} asked for expired version {} (oldest retained: {})",
                    remote_addr, expired.requested, expired.oldest
                );
                let status = Status::expired(format!(
                    "too old resource version: {} ({})",
                    expired.requested, expired.oldest
                ));
                let _ = encoder.encode(&Event::Error(status)).await;
                return;
            }
        };

        info!(
            "{} watching {} (namespace: {:?}, from version: {:?}, replaying {} changes)",
            remote_addr,
            request.resource,
            request.namespace,
            checkpoint,
            replay.len()
        );

        // Keep-alive producer sharing the serialized write path with the
        // event forwarder below.
        let hb_encoder = encoder.clone();
        let hb_interval = self.heartbeat;
        let heartbeat = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(hb_interval);
            ticker.tick().await; // the first tick fires immediately
            loop {
                ticker.tick().await;
                if hb_encoder
                    .encode(&Event::Error(Status::heartbeat()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        let result = self
            .stream_events(&mut reader, &encoder, replay, rx, &request, &tag)
            .await;
        heartbeat.abort();

        match result {
            Ok(()) => info!("Watch from {} ended", remote_addr),
            Err(e) => debug!("Watch from {} ended: {}", remote_addr, e),
        }
    }

    async fn stream_events<S>(
        &self,
        reader: &mut FrameReader<ReadHalf<S>>,
        encoder: &WatchEncoder<WriteHalf<S>>,
        replay: Vec<Change>,
        mut rx: broadcast::Receiver<Change>,
        request: &WatchRequest,
        tag: &TypeTag,
    ) -> watchkit_proto::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let namespace = request.namespace.as_deref();

        for change in &replay {
            if change_matches(change, tag, namespace) {
                encoder.encode(&change.event).await?;
            }
        }

        loop {
            tokio::select! {
                change = rx.recv() => match change {
                    Ok(change) => {
                        if change_matches(&change, tag, namespace) {
                            encoder.encode(&change.event).await?;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Watcher of {} fell {} changes behind", request.resource, missed);
                        let status = Status::expired(format!(
                            "watch fell behind by {missed} changes"
                        ));
                        encoder.encode(&Event::Error(status)).await?;
                        return Ok(());
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                },
                inbound = reader.read_frame() => match inbound {
                    // Frames after the watch request carry no meaning here
                    Ok(Some(_)) => {}
                    Ok(None) | Err(_) => return Ok(()),
                },
            }
        }
    }

    async fn send_bad_request<W>(&self, encoder: &WatchEncoder<W>, message: String)
    where
        W: AsyncWrite + Unpin,
    {
        let _ = encoder
            .encode(&Event::Error(Status::bad_request(message)))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchkit_proto::meta::ObjectMeta;
    use watchkit_proto::resources::{Object, Pod};
    use watchkit_proto::{EventKind, WatchDecoder};

    fn handler(store: Arc<Store>) -> ConnectionHandler {
        let scheme = Arc::new(Scheme::all_groups().unwrap());
        // Long heartbeat so it never fires inside a test
        ConnectionHandler::new(store, scheme, watchkit_proto::DEFAULT_MAX_FRAME_SIZE, 3600)
    }

    fn pod(name: &str, namespace: &str) -> Object {
        Object::Pod(Pod {
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: namespace.to_string(),
                ..ObjectMeta::default()
            },
            ..Pod::default()
        })
    }

    /// Connects a fake client over a duplex pipe and sends `request`.
    async fn open_watch(
        store: Arc<Store>,
        request: WatchRequest,
    ) -> WatchDecoder<ReadHalf<tokio::io::DuplexStream>> {
        let (client_side, server_side) = tokio::io::duplex(64 * 1024);
        let h = handler(store);
        tokio::spawn(async move {
            h.handle(server_side, "test".to_string()).await;
        });

        let (read_half, write_half) = tokio::io::split(client_side);
        let writer = watchkit_proto::FrameWriter::new(write_half);
        writer.write_frame(&request.to_frame().unwrap()).await.unwrap();

        WatchDecoder::new(read_half, Arc::new(Scheme::all_groups().unwrap()))
    }

    #[tokio::test]
    async fn test_replay_then_live_forwarding() {
        let store = Arc::new(Store::new(64));
        store.add(pod("web-0", "default")).await;
        store.add(pod("web-1", "default")).await;

        let request = WatchRequest::new("pods").with_resource_version("0".to_string());
        let mut decoder = open_watch(store.clone(), request).await;
        // Lands in the replay or on the live channel depending on timing;
        // either way it must arrive, in order
        store.add(pod("web-2", "default")).await;

        for (version, name) in [(1, "web-0"), (2, "web-1"), (3, "web-2")] {
            let event = decoder.next().await.unwrap().unwrap();
            assert_eq!(event.kind(), EventKind::Added);
            assert_eq!(event.object().unwrap().name(), name);
            assert_eq!(event.resource_version(), Some(version.to_string().as_str()));
        }
    }

    #[tokio::test]
    async fn test_resume_from_checkpoint_replays_history() {
        let store = Arc::new(Store::new(64));
        store.add(pod("web-0", "default")).await;
        store.add(pod("web-1", "default")).await;

        let request = WatchRequest::new("pods").with_resource_version("1".to_string());
        let mut decoder = open_watch(store, request).await;

        let event = decoder.next().await.unwrap().unwrap();
        assert_eq!(event.object().unwrap().name(), "web-1");
        assert_eq!(event.resource_version(), Some("2"));
    }

    #[tokio::test]
    async fn test_namespace_filter() {
        let store = Arc::new(Store::new(64));
        store.add(pod("a", "kube-system")).await;
        store.add(pod("b", "default")).await;

        let request = WatchRequest::new("pods")
            .with_namespace("default".to_string())
            .with_resource_version("0".to_string());
        let mut decoder = open_watch(store, request).await;

        let event = decoder.next().await.unwrap().unwrap();
        assert_eq!(event.object().unwrap().name(), "b");
    }

    #[tokio::test]
    async fn test_unknown_resource_gets_bad_request_status() {
        let store = Arc::new(Store::new(64));
        let mut decoder = open_watch(store, WatchRequest::new("gadgets")).await;

        match decoder.next().await.unwrap().unwrap() {
            Event::Error(status) => {
                assert_eq!(status.reason, Status::REASON_BAD_REQUEST);
                assert_eq!(status.code, 400);
            }
            other => panic!("expected ERROR event, got {other:?}"),
        }
        // Server closes after rejecting the request
        assert!(decoder.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_checkpoint_gets_expired_status() {
        let store = Arc::new(Store::new(1));
        for i in 0..4 {
            store.add(pod(&format!("p-{i}"), "default")).await;
        }

        let request = WatchRequest::new("pods").with_resource_version("1".to_string());
        let mut decoder = open_watch(store, request).await;

        match decoder.next().await.unwrap().unwrap() {
            Event::Error(status) => {
                assert_eq!(status.reason, Status::REASON_EXPIRED);
                assert_eq!(status.code, 410);
            }
            other => panic!("expected ERROR event, got {other:?}"),
        }
        assert!(decoder.next().await.unwrap().is_none());
    }
}
