use crate::config::ClientConfig;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};
use watchkit_proto::meta::Status;
use watchkit_proto::{Event, FrameWriter, Scheme, WatchDecoder, WatchRequest};

/// Why one watch session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Server closed cleanly; resume from the checkpoint.
    CleanClose,
    /// Server reported our checkpoint is gone; start over without one.
    Expired,
}

/// Drives watch sessions against one server, owning the reconnect policy the
/// protocol core deliberately leaves to the caller.
///
/// Three outcomes are kept distinct and handled differently: stream
/// termination (reconnect, resuming from the last observed resource version),
/// per-frame decode failures (skip and continue), and in-band `Error` events
/// (application decisions, such as dropping the checkpoint on `Expired`).
pub struct WatchClient {
    config: ClientConfig,
    scheme: Arc<Scheme>,
    checkpoint: Option<String>,
}

impl WatchClient {
    pub fn new(config: ClientConfig, scheme: Arc<Scheme>) -> Self {
        Self {
            config,
            scheme,
            checkpoint: None,
        }
    }

    /// Watches forever, reconnecting with exponential backoff.
    pub async fn run(&mut self) {
        let initial = Duration::from_millis(self.config.timeouts.initial_backoff_ms);
        let max = Duration::from_millis(self.config.timeouts.max_backoff_ms);
        let mut backoff = initial;

        loop {
            match self.watch_once().await {
                Ok(SessionEnd::CleanClose) => {
                    info!("Watch stream closed, reconnecting");
                    backoff = initial;
                }
                Ok(SessionEnd::Expired) => {
                    warn!("Checkpoint expired, restarting watch from scratch");
                    self.checkpoint = None;
                    backoff = initial;
                }
                Err(e) => {
                    warn!("Watch session failed: {}", e);
                }
            }

            debug!("Reconnecting in {:?}", backoff);
            sleep(backoff).await;
            backoff = (backoff * 2).min(max);
        }
    }

    /// One full session: connect, send the watch request, decode until the
    /// stream ends one way or another.
    async fn watch_once(&mut self) -> anyhow::Result<SessionEnd> {
        let addr = format!(
            "{}:{}",
            self.config.client.server_addr, self.config.client.server_port
        );
        let connect_timeout = Duration::from_secs(self.config.timeouts.connect_timeout_secs);

        let stream = timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| anyhow::anyhow!("connection to {} timed out", addr))??;
        info!("Connected to {}", addr);

        let (read_half, write_half) = stream.into_split();

        let mut request = WatchRequest::new(&self.config.watch.resource);
        if let Some(namespace) = &self.config.watch.namespace {
            request = request.with_namespace(namespace.clone());
        }
        if let Some(checkpoint) = &self.checkpoint {
            request = request.with_resource_version(checkpoint.clone());
        }
        info!(
            "Watching {} (from version: {:?})",
            request.resource, request.resource_version
        );

        let writer = FrameWriter::new(write_half);
        writer.write_frame(&request.to_frame()?).await?;

        let mut decoder = WatchDecoder::new(read_half, self.scheme.clone());
        loop {
            match decoder.next().await {
                Ok(Some(event)) => {
                    if let Some(end) = self.observe(event) {
                        return Ok(end);
                    }
                }
                Ok(None) => return Ok(SessionEnd::CleanClose),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    // One bad frame; the stream is still healthy
                    warn!("Skipping undecodable event: {}", e);
                }
            }
        }
    }

    /// Applies one decoded event, returning `Some` when it ends the session.
    fn observe(&mut self, event: Event) -> Option<SessionEnd> {
        match event {
            Event::Error(status) if status.is_heartbeat() => {
                debug!("Heartbeat from server");
            }
            Event::Error(status) if status.reason == Status::REASON_EXPIRED => {
                warn!("Server reports expired checkpoint: {}", status.message);
                return Some(SessionEnd::Expired);
            }
            Event::Error(status) => {
                warn!(
                    "Server reported error {} ({}): {}",
                    status.code, status.reason, status.message
                );
            }
            event => {
                if let Some(object) = event.object() {
                    info!(
                        "{} {} {}/{} (version {})",
                        event.kind(),
                        object.type_tag().kind,
                        object.metadata().namespace,
                        object.name(),
                        object.resource_version()
                    );
                }
                if let Some(version) = event.resource_version() {
                    self.checkpoint = Some(version.to_string());
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchkit_proto::meta::ObjectMeta;
    use watchkit_proto::resources::{Object, Pod};

    fn client() -> WatchClient {
        WatchClient::new(
            ClientConfig::default_config(),
            Arc::new(Scheme::all_groups().unwrap()),
        )
    }

    fn added(name: &str, version: &str) -> Event {
        Event::Added(Object::Pod(Pod {
            metadata: ObjectMeta {
                name: name.to_string(),
                resource_version: version.to_string(),
                ..ObjectMeta::default()
            },
            ..Pod::default()
        }))
    }

    #[test]
    fn test_events_advance_the_checkpoint() {
        let mut client = client();
        assert!(client.observe(added("a", "4")).is_none());
        assert_eq!(client.checkpoint.as_deref(), Some("4"));

        assert!(client.observe(added("b", "7")).is_none());
        assert_eq!(client.checkpoint.as_deref(), Some("7"));
    }

    #[test]
    fn test_heartbeat_is_a_no_op() {
        let mut client = client();
        client.checkpoint = Some("4".to_string());
        assert!(client.observe(Event::Error(Status::heartbeat())).is_none());
        assert_eq!(client.checkpoint.as_deref(), Some("4"));
    }

    #[test]
    fn test_expired_status_ends_session() {
        let mut client = client();
        client.checkpoint = Some("4".to_string());

        let end = client.observe(Event::Error(Status::expired("gone".to_string())));
        assert_eq!(end, Some(SessionEnd::Expired));
    }

    #[test]
    fn test_other_server_errors_do_not_end_session() {
        let mut client = client();
        let status = Status::new(500, "InternalError", "hiccup".to_string());
        assert!(client.observe(Event::Error(status)).is_none());
    }
}
