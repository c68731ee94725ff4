//! Property tests for byte delivery
//!
//! However the device's writes are chunked, the consumer sees the same bytes
//! in the same order, and every chunk is no larger than the read buffer.

use std::time::Duration;

use proptest::prelude::*;
use sermon_config::PortConfiguration;
use sermon_session::{PortSession, SessionEvent, SessionOptions, VirtualBus};
use tokio::sync::mpsc;

fn deliver(writes: Vec<Vec<u8>>, read_buffer_size: usize) -> (Vec<u8>, usize) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async move {
        let bus = VirtualBus::new();
        let device = bus.add_port("vcom0");
        let session = PortSession::with_backend(
            bus,
            PortConfiguration::new("vcom0"),
            SessionOptions {
                read_buffer_size,
                ..Default::default()
            },
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        session.connect(tx).await.unwrap();

        let total: usize = writes.iter().map(Vec::len).sum();
        for write in &writes {
            device.send(write).await.unwrap();
        }

        let mut received = Vec::new();
        let mut largest_chunk = 0;
        while received.len() < total {
            let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            if let SessionEvent::BytesReceived(chunk) = event {
                largest_chunk = largest_chunk.max(chunk.len());
                received.extend(chunk);
            }
        }
        (received, largest_chunk)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn bytes_arrive_in_order(
        writes in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..200), 1..20),
        read_buffer_size in 1usize..64,
    ) {
        let expected: Vec<u8> = writes.concat();
        let (received, largest_chunk) = deliver(writes, read_buffer_size);
        prop_assert_eq!(received, expected);
        prop_assert!(largest_chunk <= read_buffer_size);
    }
}
