//! End-to-end protocol fidelity tests: encode through a transport, decode the
//! wire bytes back, and check the stream-level guarantees.

use std::io::Cursor;
use std::sync::Arc;

use watchkit_proto::meta::{ObjectMeta, Status};
use watchkit_proto::resources::{apps_v1, core_v1, ConfigMap, Deployment, Object, Pod};
use watchkit_proto::{
    Event, EventKind, FrameReader, FrameWriter, Scheme, WatchDecoder, WatchEncoder, WatchError,
};

fn scheme() -> Arc<Scheme> {
    Arc::new(Scheme::all_groups().unwrap())
}

fn pod(name: &str) -> Object {
    Object::Pod(Pod {
        metadata: ObjectMeta::named(name),
        ..Pod::default()
    })
}

#[tokio::test]
async fn encode_decode_round_trip() {
    let cases = vec![
        Event::Added(pod("foo")),
        Event::Modified(Object::ConfigMap(ConfigMap {
            metadata: ObjectMeta::named("settings"),
            data: [("retries".to_string(), "3".to_string())].into(),
        })),
        Event::Deleted(Object::Deployment(Deployment {
            metadata: ObjectMeta::named("api"),
            spec: watchkit_proto::resources::DeploymentSpec { replicas: 2 },
        })),
    ];

    for (i, event) in cases.iter().enumerate() {
        let encoder = WatchEncoder::new(Vec::new(), scheme());
        encoder.encode(event).await.unwrap();

        let mut decoder = WatchDecoder::new(Cursor::new(encoder.into_inner()), scheme());
        let decoded = decoder
            .next()
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("case {i}: stream ended early"));
        assert_eq!(&decoded, event, "case {i}");
        assert!(decoder.next().await.unwrap().is_none(), "case {i}");
    }
}

#[tokio::test]
async fn added_then_deleted_then_end_of_stream() {
    let encoder = WatchEncoder::new(Vec::new(), scheme());
    encoder.encode(&Event::Added(pod("foo"))).await.unwrap();
    encoder.encode(&Event::Deleted(pod("foo"))).await.unwrap();

    let mut decoder = WatchDecoder::new(Cursor::new(encoder.into_inner()), scheme());
    assert_eq!(decoder.next().await.unwrap(), Some(Event::Added(pod("foo"))));
    assert_eq!(decoder.next().await.unwrap(), Some(Event::Deleted(pod("foo"))));
    assert!(decoder.next().await.unwrap().is_none());
}

#[tokio::test]
async fn error_event_round_trip_carries_status_only() {
    let status = Status::expired("too old resource version: 1 (5)".to_string());

    let encoder = WatchEncoder::new(Vec::new(), scheme());
    encoder.encode(&Event::Error(status.clone())).await.unwrap();

    let mut decoder = WatchDecoder::new(Cursor::new(encoder.into_inner()), scheme());
    let event = decoder.next().await.unwrap().unwrap();
    assert_eq!(event.kind(), EventKind::Error);
    assert!(event.object().is_none());
    assert_eq!(event, Event::Error(status));
}

#[tokio::test]
async fn frame_boundaries_survive_back_to_back_writes() {
    // Payload sizes straddle the interesting boundaries: empty, single byte,
    // and larger than any internal buffer.
    let sizes = [0usize, 1, 3, 256 * 1024];

    let writer = FrameWriter::new(Vec::new());
    for (i, &size) in sizes.iter().enumerate() {
        writer.write_frame(&vec![i as u8; size]).await.unwrap();
    }

    let mut reader = FrameReader::new(Cursor::new(writer.into_inner()));
    for (i, &size) in sizes.iter().enumerate() {
        let frame = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(frame.len(), size, "frame {i}");
        assert!(frame.iter().all(|&b| b == i as u8), "frame {i}");
    }
    assert!(reader.read_frame().await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_type_is_isolated_between_valid_events() {
    // Encode with the full scheme, decode with one that lacks apps/v1.
    let full = scheme();
    let core_only = Arc::new(Scheme::for_groups(&[core_v1::GROUP_VERSION]).unwrap());

    let encoder = WatchEncoder::new(Vec::new(), full);
    encoder.encode(&Event::Added(pod("before"))).await.unwrap();
    encoder
        .encode(&Event::Modified(Object::Deployment(Deployment::default())))
        .await
        .unwrap();
    encoder.encode(&Event::Added(pod("after"))).await.unwrap();

    let mut decoder = WatchDecoder::new(Cursor::new(encoder.into_inner()), core_only);

    assert_eq!(decoder.next().await.unwrap(), Some(Event::Added(pod("before"))));

    match decoder.next().await {
        Err(WatchError::UnknownType(tag)) => {
            assert_eq!(tag, apps_v1::deployment());
        }
        other => panic!("expected UnknownType, got {other:?}"),
    }
    assert!(!decoder.is_terminated());

    assert_eq!(decoder.next().await.unwrap(), Some(Event::Added(pod("after"))));
    assert!(decoder.next().await.unwrap().is_none());
}

#[tokio::test]
async fn clean_close_after_k_frames_is_never_a_transport_error() {
    let k = 5;
    let encoder = WatchEncoder::new(Vec::new(), scheme());
    for i in 0..k {
        encoder
            .encode(&Event::Added(pod(&format!("pod-{i}"))))
            .await
            .unwrap();
    }

    let mut decoder = WatchDecoder::new(Cursor::new(encoder.into_inner()), scheme());
    for i in 0..k {
        let event = decoder.next().await.unwrap().unwrap();
        assert_eq!(event.object().unwrap().name(), format!("pod-{i}"));
    }
    assert!(decoder.next().await.unwrap().is_none());
}

#[tokio::test]
async fn live_stream_over_duplex_connection() {
    let (client_side, server_side) = tokio::io::duplex(64 * 1024);

    let producer_scheme = scheme();
    let producer = tokio::spawn(async move {
        let encoder = WatchEncoder::new(server_side, producer_scheme);
        encoder.encode(&Event::Added(pod("foo"))).await.unwrap();
        encoder.encode(&Event::Deleted(pod("foo"))).await.unwrap();
        // Dropping the encoder closes the connection cleanly
    });

    let mut decoder = WatchDecoder::new(client_side, scheme());
    assert_eq!(decoder.next().await.unwrap(), Some(Event::Added(pod("foo"))));
    assert_eq!(decoder.next().await.unwrap(), Some(Event::Deleted(pod("foo"))));
    assert!(decoder.next().await.unwrap().is_none());

    producer.await.unwrap();
}
