use ringbuffer::{
    BusySpinIdleStrategy, IdleStrategy, POISON_MSG_TYPE_ID, Reader, Region, RingBufferError,
    TRAILER_LENGTH, Writer, YieldingIdleStrategy,
};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

/// Ten 8-byte messages then poison over a 1KB ring.
///
/// Tests:
/// - Handler sees values 0..9 for type 1, in order
/// - Poison (type 42, value 42) is seen last, exactly once
/// - 11 messages dispatched in total
#[test]
fn test_ten_messages_then_poison() {
    let (mut writer, mut reader) = ringbuffer::channel(Region::allocate(1024).unwrap());

    for value in 0..10i64 {
        assert!(writer.try_write(1, &value.to_le_bytes()).unwrap());
    }
    assert!(writer.send_poison(42).unwrap());

    let mut values = Vec::new();
    let mut poison = None;
    let mut dispatched = 0;

    while poison.is_none() {
        dispatched += reader.read(|message| {
            let value = message.read_i64().unwrap();
            if message.type_id == POISON_MSG_TYPE_ID {
                poison = Some(value);
            } else {
                assert_eq!(message.type_id, 1);
                assert_eq!(message.length(), 8);
                values.push(value);
            }
        });
    }

    assert_eq!(values, (0..10).collect::<Vec<_>>());
    assert_eq!(poison, Some(42));
    assert_eq!(dispatched, 11);
    assert_eq!(reader.read(|_| panic!("nothing after poison")), 0);
}

/// Writer keeps getting `false` while the ring is full, then succeeds as soon
/// as the reader frees room.
#[test]
fn test_backpressure_until_reader_frees_space() {
    let (mut writer, mut reader) = ringbuffer::channel(Region::allocate(1024).unwrap());
    let payload = [0xABu8; 120]; // 128-byte records, 8 of them fill the ring

    for _ in 0..8 {
        assert!(writer.try_write(7, &payload).unwrap());
    }
    assert_eq!(writer.size(), 1024);

    for _ in 0..3 {
        assert!(
            !writer.try_write(7, &payload).unwrap(),
            "write must be refused while full"
        );
    }
    assert_eq!(writer.producer_position(), 1024);

    assert_eq!(reader.read_limited(|_| {}, 1), 1);
    assert!(writer.try_write(7, &payload).unwrap());
    assert!(!writer.try_write(7, &payload).unwrap());
}

/// A wrapping record leaves exactly one padding record in the trailing bytes
/// and the reader never sees it.
#[test]
fn test_wrap_around_skips_padding() {
    let (mut writer, mut reader) = ringbuffer::channel(Region::allocate(1024).unwrap());

    // 7 records of 136 bytes: tail at 952, 72 bytes left before the end.
    let filler = [1u8; 128];
    for _ in 0..7 {
        assert!(writer.try_write(3, &filler[..128]).unwrap());
    }
    assert_eq!(reader.read(|_| {}), 7);
    assert_eq!(writer.producer_position(), 952);

    // 100-byte payload needs 112 bytes: padding 72, record at offset 0.
    let payload: Vec<u8> = (0..100u8).collect();
    assert!(writer.try_write(5, &payload).unwrap());
    assert_eq!(writer.producer_position(), 952 + 72 + 112);

    let mut seen = Vec::new();
    let count = reader.read(|message| {
        seen.push((message.type_id, message.index, message.payload.to_vec()));
    });

    assert_eq!(count, 1);
    assert_eq!(seen, vec![(5, 8, payload)]);
    assert_eq!(reader.consumer_position(), writer.producer_position());
}

/// An oversize message is refused without touching any counter.
#[test]
fn test_oversize_message_rejected() {
    let (mut writer, reader) = ringbuffer::channel(Region::allocate(1024).unwrap());
    let payload = vec![0u8; writer.max_msg_length() + 1];

    match writer.try_write(1, &payload) {
        Err(RingBufferError::MessageTooLarge { length, max }) => {
            assert_eq!(length, 129);
            assert_eq!(max, 128);
        }
        other => panic!("Expected MessageTooLarge, got {:?}", other),
    }
    assert_eq!(writer.producer_position(), 0);
    assert_eq!(reader.consumer_position(), 0);
}

/// Invalid capacity is a construction-time error.
#[test]
fn test_invalid_capacity_rejected() {
    for capacity in [0, 48, 1000, 1023] {
        assert!(
            matches!(
                Region::allocate(capacity),
                Err(RingBufferError::InvalidCapacity { .. })
            ),
            "capacity {} should be rejected",
            capacity
        );
    }
}

/// Producer and consumer on separate threads exchange many messages.
///
/// Tests:
/// - FIFO order with no loss or duplication
/// - Repeated wrap-around under backpressure
/// - Termination on poison
#[test]
fn test_concurrent_producer_consumer() {
    const NUM_MESSAGES: u64 = 200_000;

    let (mut writer, mut reader) = ringbuffer::channel(Region::allocate(1024).unwrap());

    let producer = thread::spawn(move || {
        let mut idle = YieldingIdleStrategy;
        for i in 0..NUM_MESSAGES {
            // Vary the size so records straddle the end at different offsets.
            let mut payload = vec![0u8; 8 + (i % 13) as usize];
            payload[..8].copy_from_slice(&i.to_le_bytes());
            writer.write_with_idle(1, &payload, &mut idle).unwrap();
        }
        writer
            .write_with_idle(POISON_MSG_TYPE_ID, &(NUM_MESSAGES as i64).to_le_bytes(), &mut idle)
            .unwrap();
        assert!(writer.is_closed());
    });

    let consumer = thread::spawn(move || {
        let mut idle = BusySpinIdleStrategy;
        let mut expected = 0u64;
        let mut poison_value = None;
        let start = Instant::now();

        while poison_value.is_none() {
            assert!(
                start.elapsed() < Duration::from_secs(30),
                "Consumer timeout: only saw {} messages",
                expected
            );

            let count = reader.read(|message| {
                if message.is_poison() {
                    poison_value = message.read_i64();
                    return;
                }
                let value = u64::from_le_bytes(message.payload[..8].try_into().unwrap());
                assert_eq!(value, expected, "messages must arrive in order");
                assert_eq!(message.length(), 8 + (value % 13) as usize);
                expected += 1;
            });
            idle.idle_work(count);

            let size = reader.size();
            assert!(size <= reader.capacity(), "size {} exceeds capacity", size);
        }

        (expected, poison_value)
    });

    producer.join().expect("Producer thread panicked");
    let (received, poison_value) = consumer.join().expect("Consumer thread panicked");

    assert_eq!(received, NUM_MESSAGES);
    assert_eq!(poison_value, Some(NUM_MESSAGES as i64));
}

/// Writer and reader on two independent mappings of the same file, as two
/// processes would use it.
#[test]
fn test_mapped_region_shared_between_mappings() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ring.mmap");

    // Each side owns its mapping and is the only one of its kind.
    let mut writer = unsafe { Writer::from_region(Region::create(&path, 4096).unwrap()) };
    let mut reader = unsafe { Reader::from_region(Region::open(&path).unwrap()) };

    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        (4096 + TRAILER_LENGTH) as u64
    );

    for i in 0..100i64 {
        assert!(writer.try_write(9, &i.to_le_bytes()).unwrap());
        if i % 10 == 9 {
            let mut values = Vec::new();
            reader.read(|message| values.push(message.read_i64().unwrap()));
            assert_eq!(values, ((i - 9)..=i).collect::<Vec<_>>());
        }
    }

    reader.set_consumer_heartbeat_time(99);
    assert_eq!(writer.consumer_heartbeat_time(), 99);
}

/// A restarted writer picks up the positions left in the file.
#[test]
fn test_reopened_region_preserves_positions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("restart.mmap");

    {
        let mut writer = unsafe { Writer::from_region(Region::create(&path, 1024).unwrap()) };
        assert!(writer.try_write(1, b"first").unwrap());
    }

    let mut writer = unsafe { Writer::from_region(Region::open(&path).unwrap()) };
    assert_eq!(writer.producer_position(), 16);
    assert!(writer.try_write(1, b"second").unwrap());

    let mut reader = unsafe { Reader::from_region(Region::open(&path).unwrap()) };
    let mut payloads = Vec::new();
    reader.read(|message| payloads.push(message.payload.to_vec()));
    assert_eq!(payloads, vec![b"first".to_vec(), b"second".to_vec()]);
}

/// Correlation ids stay unique when both sides draw from the counter.
#[test]
fn test_correlation_ids_unique_across_threads() {
    const IDS_PER_THREAD: i64 = 100_000;

    let (writer, reader) = ringbuffer::channel(Region::allocate(1024).unwrap());

    let a = thread::spawn(move || {
        for _ in 0..IDS_PER_THREAD {
            writer.next_correlation_id();
        }
        writer
    });
    let b = thread::spawn(move || {
        for _ in 0..IDS_PER_THREAD {
            reader.next_correlation_id();
        }
        reader
    });

    let writer = a.join().unwrap();
    let _reader = b.join().unwrap();
    assert_eq!(writer.next_correlation_id(), IDS_PER_THREAD * 2);
}

/// Writer and reader in separate threads, each over its own mapping of one
/// file, the way two processes attach to a ring.
///
/// Tests:
/// - Every message arrives exactly once and in order
/// - Nothing is lost across repeated wrap-around
#[test]
fn test_separate_mappings_exchange_without_loss() {
    const NUM_MESSAGES: i64 = 100_000;

    let dir = tempdir().unwrap();
    let path = dir.path().join("cross.mmap");

    let mut writer = unsafe { Writer::from_region(Region::create(&path, 1024).unwrap()) };
    let mut reader = unsafe { Reader::from_region(Region::open(&path).unwrap()) };

    let producer = thread::spawn(move || {
        let mut idle = YieldingIdleStrategy;
        for i in 0..NUM_MESSAGES {
            writer.write_with_idle(1, &i.to_le_bytes(), &mut idle).unwrap();
        }
        writer.write_with_idle(POISON_MSG_TYPE_ID, &NUM_MESSAGES.to_le_bytes(), &mut idle).unwrap();
    });

    let mut idle = YieldingIdleStrategy;
    let mut expected = 0i64;
    let start = Instant::now();
    while !reader.has_received_poison() {
        assert!(
            start.elapsed() < Duration::from_secs(30),
            "Consumer timeout: only saw {} messages",
            expected
        );
        let count = reader.read(|message| {
            if !message.is_poison() {
                assert_eq!(message.read_i64(), Some(expected), "lost or reordered message");
                expected += 1;
            }
        });
        idle.idle_work(count);
    }

    producer.join().expect("Producer thread panicked");
    assert_eq!(expected, NUM_MESSAGES);
}
