pub mod codec;
pub mod event;
pub mod framing;
pub mod meta;
pub mod request;
pub mod resources;
pub mod scheme;
pub mod watch;

pub use codec::JsonCodec;
pub use event::{Event, EventCodec, EventKind};
pub use framing::{FrameCodec, FrameReader, FrameWriter, DEFAULT_MAX_FRAME_SIZE, MAX_FRAME_SIZE};
pub use meta::{ObjectMeta, Status, TypeMeta, TypeTag};
pub use request::WatchRequest;
pub use resources::{ConfigMap, Deployment, Object, Pod};
pub use scheme::{Scheme, SchemeBuilder};
pub use watch::{WatchDecoder, WatchEncoder};

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Connection-level failure: reset, timeout, truncated frame. Fatal to the
    /// decoder or encoder instance that observed it.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Oversized frames cannot be skipped without losing stream position, so
    /// these are fatal like transport failures.
    #[error("frame too large: {0} bytes (max: {1})")]
    FrameTooLarge(u32, u32),

    /// Frame bytes do not parse under the declared format. Recoverable: the
    /// stream may continue with the next frame.
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// Envelope parsed but is structurally invalid (e.g. missing object field).
    /// Recoverable.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Type tag not present in the scheme. Recoverable.
    #[error("no type registered for {0}")]
    UnknownType(meta::TypeTag),

    /// Event kind outside the protocol enum. Recoverable.
    #[error("unknown event kind: {0:?}")]
    UnknownEventKind(String),

    /// Payload carried no embedded type tag and no decode hint was supplied.
    /// Recoverable.
    #[error("object carries no type information and no hint was given")]
    MissingTypeMeta,

    /// A tag was registered twice while building a scheme.
    #[error("duplicate registration for {0}")]
    DuplicateType(meta::TypeTag),

    /// A scheme was requested for an API group/version this build does not know.
    #[error("unsupported API group version: {0:?}")]
    UnsupportedGroupVersion(String),
}

impl WatchError {
    /// True for failures that invalidate the stream: the decoder or encoder
    /// that returned them must be discarded and the connection re-established.
    /// Everything else is a per-frame failure; the stream remains usable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WatchError::Transport(_) | WatchError::FrameTooLarge(_, _))
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;
