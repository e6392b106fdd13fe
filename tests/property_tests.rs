//! Property-based tests for fragmentation, reassembly, the object pool and
//! the TLV decoder.

use std::cell::Cell;
use std::sync::{Arc, Mutex};

use btp_link::codec::{TlvHandler, TlvReader, TlvWriter, TLV_MAGIC};
use btp_link::link::{MemoryLink, RadioLink};
use btp_link::pool::ObjectPool;
use btp_link::protocol::{
    BtpConfig, BtpTransport, ChunkLayout, ReassemblyBuffer, TransportEvent, DEFAULT_MTU,
};
use btp_link::BtpError;
use bytes::Bytes;
use proptest::prelude::*;
use tokio::time::Instant;

/// Deterministic payload of `len` bytes
fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// Send `data` across a lossless link; return what arrived and frames sent
fn transfer(data: &[u8]) -> (Option<Bytes>, usize) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    runtime.block_on(async {
        let (device_link, phone_link) = MemoryLink::pair();
        let device_dyn: Arc<dyn RadioLink> = device_link.clone();
        let phone_dyn: Arc<dyn RadioLink> = phone_link;

        let device = Arc::new(BtpTransport::new(device_dyn, BtpConfig::default()));
        let phone = Arc::new(BtpTransport::new(phone_dyn, BtpConfig::default()));
        device.begin("device").unwrap();
        phone.begin("phone").unwrap();

        let delivered = Arc::new(Mutex::new(None));
        let sink = delivered.clone();
        phone.on_event(move |event| {
            if let TransportEvent::Delivered(data) = event {
                *sink.lock().unwrap() = Some(data);
            }
        });

        device.send(data).await.unwrap();
        let arrived = delivered.lock().unwrap().take();
        (arrived, device_link.frames_sent())
    })
}

/// Operations for the pool model
#[derive(Debug, Clone)]
enum PoolOp {
    Acquire,
    Release(usize),
}

fn arb_pool_op() -> impl Strategy<Value = PoolOp> {
    prop_oneof![
        Just(PoolOp::Acquire),
        (0usize..16).prop_map(PoolOp::Release),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: any message up to 64 KiB arrives byte-for-byte in
    /// exactly chunk_count(n) frames
    #[test]
    fn fragmentation_round_trip(len in 1usize..=64 * 1024, seed in any::<u8>()) {
        let data = payload(len, seed);
        let (arrived, frames) = transfer(&data);

        let layout = ChunkLayout::for_mtu(DEFAULT_MTU);
        prop_assert_eq!(frames, layout.chunk_count(len));
        prop_assert_eq!(arrived.as_deref(), Some(&data[..]));
    }
}

proptest! {
    /// Property: chunks inserted in any order, with duplicates, rebuild the
    /// original message
    #[test]
    fn reassembly_is_order_independent(
        (len, order) in (1usize..4000).prop_flat_map(|len| {
            let chunks = ChunkLayout::for_mtu(DEFAULT_MTU).chunk_count(len);
            (Just(len), Just((0..chunks).chain(0..chunks / 2).collect::<Vec<_>>()).prop_shuffle())
        }),
        seed in any::<u8>(),
    ) {
        let layout = ChunkLayout::for_mtu(DEFAULT_MTU);
        let data = payload(len, seed);
        let now = Instant::now();
        let mut buffer = ReassemblyBuffer::new(len, layout, now);

        for &seq in &order {
            let start = layout.offset(seq);
            let end = (start + layout.capacity(seq)).min(len);
            prop_assert!(buffer.insert(seq as u16, &data[start..end], now));
        }

        prop_assert!(buffer.is_complete());
        prop_assert_eq!(buffer.received_bytes(), len);
        prop_assert_eq!(&buffer.into_bytes()[..], &data[..]);
    }

    /// Property: available slots always equal capacity minus held slots, and
    /// an exhausted pool hands out nothing
    #[test]
    fn pool_conservation(
        capacity in 0usize..8,
        ops in prop::collection::vec(arb_pool_op(), 0..64),
    ) {
        let pool: ObjectPool<u32> = ObjectPool::new(capacity);
        let mut held = Vec::new();

        for op in ops {
            match op {
                PoolOp::Acquire => match pool.acquire() {
                    Some(slot) => held.push(slot),
                    None => prop_assert_eq!(held.len(), capacity),
                },
                PoolOp::Release(i) => {
                    if !held.is_empty() {
                        let slot = held.swap_remove(i % held.len());
                        slot.release();
                    }
                }
            }
            prop_assert_eq!(pool.available(), capacity - held.len());
        }

        drop(held);
        prop_assert_eq!(pool.available(), capacity);
    }

    /// Property: arbitrary input never panics and never reaches a fixed-width
    /// handler with the wrong width
    #[test]
    fn tlv_reader_survives_arbitrary_input(
        body in prop::collection::vec(any::<u8>(), 0..600),
        with_magic in any::<bool>(),
    ) {
        let mut input = Vec::new();
        if with_magic {
            input.extend_from_slice(&TLV_MAGIC);
        }
        input.extend_from_slice(&body);

        let calls = Cell::new(0usize);
        let mut reader = TlvReader::from_slice(&input);
        reader.register_handler(1, TlvHandler::u8(|_, _| calls.set(calls.get() + 1)));
        reader.register_handler(2, TlvHandler::u32(|_, _| calls.set(calls.get() + 1)));
        reader.register_handler(3, TlvHandler::u64(|_, _| calls.set(calls.get() + 1)));
        reader.register_handler(4, TlvHandler::string(|_, _| calls.set(calls.get() + 1)));
        let result = reader.read_all();
        drop(reader);

        if !with_magic && !body.starts_with(&TLV_MAGIC) {
            prop_assert!(matches!(result, Err(BtpError::InvalidMagic)));
            prop_assert_eq!(calls.get(), 0);
        }
    }

    /// Property: a cut-off message fails unless the cut lands between records
    #[test]
    fn tlv_reader_detects_truncation(
        values in prop::collection::vec(any::<u32>(), 1..20),
        cut in any::<prop::sample::Index>(),
    ) {
        let mut writer = TlvWriter::new();
        let mut boundaries = vec![TLV_MAGIC.len()];
        for &value in &values {
            writer.write_u32(7, value);
            boundaries.push(writer.len());
        }
        let full = writer.into_bytes();
        let cut = cut.index(full.len());

        let seen = Cell::new(0usize);
        let mut reader = TlvReader::from_slice(&full[..cut]);
        reader.register_handler(7, TlvHandler::u32(|_, v| {
            assert_eq!(v, values[seen.get()]);
            seen.set(seen.get() + 1);
        }));
        let result = reader.read_all();
        drop(reader);

        if cut < TLV_MAGIC.len() {
            prop_assert!(matches!(result, Err(BtpError::InvalidMagic)));
        } else if boundaries.contains(&cut) {
            prop_assert!(result.is_ok());
            prop_assert_eq!(seen.get(), boundaries.iter().position(|&b| b == cut).unwrap());
        } else {
            let is_truncated = matches!(result, Err(BtpError::Truncated { .. }));
            prop_assert!(is_truncated);
        }
    }
}
