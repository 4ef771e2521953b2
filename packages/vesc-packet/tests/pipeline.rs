use vesc_packet::{
    commands::{cmds, GetValuesSelectivePacket},
    encode_packet,
    telemetry::ValuesMask,
    Encode, FirmwareVersion, Framer, Reply, RingBuffer, Telemetry,
};

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0; payload.len() + 6];
    let size = encode_packet(payload, &mut out).unwrap();
    out.truncate(size);
    out
}

/// Moves bytes through a small ring buffer in bursts, the way a serial driver would.
fn pump(bytes: &[u8], framer: &mut Framer, telemetry: &mut Telemetry) -> Vec<Reply> {
    let mut ring = RingBuffer::new([0u8; 32]);
    let mut replies = Vec::new();

    for burst in bytes.chunks(20) {
        ring.store(burst);
        while let Some(byte) = ring.pop() {
            framer.push(byte, |payload| {
                if let Ok(reply) = telemetry.consume(payload) {
                    replies.push(reply);
                }
            });
        }
    }

    replies
}

#[test]
fn replies_flow_into_telemetry() {
    let mut stream = vec![0x00, 0x7F];
    stream.extend(frame(&[cmds::FW_VERSION, 6, 2, b'4', b'1', b'0']));

    let mut selective = vec![cmds::GET_VALUES_SELECTIVE];
    selective.extend_from_slice(&(1u32 << 8).to_be_bytes());
    selective.extend_from_slice(&483i16.to_be_bytes());
    stream.extend(frame(&selective));

    let mut framer = Framer::new();
    let mut telemetry = Telemetry::new();
    let replies = pump(&stream, &mut framer, &mut telemetry);

    assert_eq!(
        replies,
        [
            Reply::FirmwareVersion(FirmwareVersion::new(6, 2)),
            Reply::Values(ValuesMask::INPUT_VOLTAGE),
        ]
    );
    assert_eq!(telemetry.values.input_voltage, 48.3);
    assert_eq!(framer.stats().packets, 2);
    assert_eq!(framer.stats().discarded_bytes, 2);
}

#[test]
fn commands_are_readable_by_the_framer() {
    let packet = GetValuesSelectivePacket::new(ValuesMask::all());
    let mut encoded = vec![0; packet.size()];
    packet.encode(&mut encoded);

    let mut framer: Framer = Framer::new();
    let mut payloads = Vec::new();
    framer.extend(&encoded, |payload| payloads.push(payload.to_vec()));

    assert_eq!(payloads, [vec![cmds::GET_VALUES_SELECTIVE, 0x00, 0x07, 0xFF, 0xFF]]);
}
