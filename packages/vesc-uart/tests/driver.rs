use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use thiserror::Error;
use vesc_uart::{
    protocol::{
        commands::cmds,
        encode_packet,
        telemetry::{FaultCode, ValuesMask},
        EncodeError, FirmwareVersion,
    },
    Transport, Vesc,
};

#[derive(Debug, Error)]
enum MockError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("Link is down")]
    LinkDown,
}

/// In-memory transport: tests queue controller bytes in `incoming` and inspect `written`.
#[derive(Debug, Default)]
struct MockTransport {
    baud_rate: Option<u32>,
    incoming: VecDeque<u8>,
    written: Vec<u8>,
    link_down: bool,
}

impl MockTransport {
    fn receive(&mut self, bytes: &[u8]) {
        self.incoming.extend(bytes);
    }
}

impl Transport for MockTransport {
    type Error = MockError;

    fn begin(&mut self, baud_rate: u32) -> Result<(), MockError> {
        self.baud_rate = Some(baud_rate);
        Ok(())
    }

    fn available(&mut self) -> Result<usize, MockError> {
        if self.link_down {
            return Err(MockError::LinkDown);
        }
        Ok(self.incoming.len())
    }

    fn read(&mut self) -> Option<u8> {
        self.incoming.pop_front()
    }

    fn write(&mut self, data: &[u8]) -> Result<(), MockError> {
        if self.link_down {
            return Err(MockError::LinkDown);
        }
        self.written.extend_from_slice(data);
        Ok(())
    }
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0; payload.len() + 6];
    let size = encode_packet(payload, &mut out).unwrap();
    out.truncate(size);
    out
}

fn vesc() -> Vesc<MockTransport> {
    Vesc::new(MockTransport::default())
}

fn selective_reply(rpm: i32) -> Vec<u8> {
    let mut payload = vec![cmds::GET_VALUES_SELECTIVE];
    payload.extend_from_slice(&((1u32 << 2) | (1 << 7)).to_be_bytes());
    payload.extend_from_slice(&1234i32.to_be_bytes());
    payload.extend_from_slice(&rpm.to_be_bytes());
    frame(&payload)
}

#[test]
fn begin_opens_transport() {
    let mut vesc = vesc();
    vesc.begin(115200).unwrap();
    assert_eq!(vesc.transport().baud_rate, Some(115200));
}

#[test]
fn firmware_version_round_trip() {
    let mut vesc = vesc();
    assert_eq!(vesc.ask_fw_version().unwrap(), 6);
    assert_eq!(
        vesc.transport().written,
        [0x02, 0x01, 0x00, 0x00, 0x00, 0x03]
    );

    assert!(!vesc.fw_version().is_known());
    vesc.transport_mut().receive(&frame(&[cmds::FW_VERSION, 5, 2]));
    assert_eq!(vesc.poll().unwrap(), 1);
    assert_eq!(vesc.fw_version(), FirmwareVersion::new(5, 2));
}

#[test]
fn values_callback_runs_for_each_values_reply() {
    let mut vesc = vesc();
    let seen = Arc::new(Mutex::new(Vec::new()));
    vesc.set_values_callback({
        let seen = seen.clone();
        move |telemetry| seen.lock().unwrap().push(telemetry.values.rpm)
    });

    let mut bytes = selective_reply(1000);
    bytes.extend(frame(&[cmds::FW_VERSION, 6, 0]));
    bytes.extend(selective_reply(-2000));
    vesc.transport_mut().receive(&bytes);

    assert_eq!(vesc.poll().unwrap(), 3);
    assert_eq!(*seen.lock().unwrap(), [1000.0, -2000.0]);
    assert_eq!(vesc.values().avg_motor_current, 12.34);
    assert_eq!(vesc.fw_version(), FirmwareVersion::new(6, 0));
}

#[test]
fn short_full_reply_does_not_reach_callback() {
    let mut vesc = vesc();
    let calls = Arc::new(Mutex::new(0));
    vesc.set_values_callback({
        let calls = calls.clone();
        move |_| *calls.lock().unwrap() += 1
    });

    let mut payload = vec![cmds::GET_VALUES];
    payload.extend_from_slice(&[0x01; 20]);
    vesc.transport_mut().receive(&frame(&payload));

    // The packet itself is valid, only its contents are rejected.
    assert_eq!(vesc.poll().unwrap(), 1);
    assert_eq!(*calls.lock().unwrap(), 0);
    assert_eq!(vesc.values().temp_fet, 0.0);
}

#[test]
fn full_values_reply() {
    let mut vesc = vesc();

    let mut payload = vec![cmds::GET_VALUES];
    payload.extend_from_slice(&[0; 44]);
    payload.extend_from_slice(&1500i32.to_be_bytes()); // tachometer
    payload.extend_from_slice(&1500i32.to_be_bytes()); // tachometer_abs
    payload.push(2); // fault
    assert_eq!(payload.len(), 54);
    vesc.transport_mut().receive(&frame(&payload));

    assert_eq!(vesc.poll().unwrap(), 1);
    assert_eq!(vesc.values().tachometer, 1500);
    assert_eq!(vesc.values().fault, FaultCode::UnderVoltage);
}

#[test]
fn clearing_the_callback() {
    let mut vesc = vesc();
    let calls = Arc::new(Mutex::new(0));
    vesc.set_values_callback({
        let calls = calls.clone();
        move |_| *calls.lock().unwrap() += 1
    });

    vesc.transport_mut().receive(&selective_reply(1));
    vesc.poll().unwrap();
    vesc.clear_values_callback();
    vesc.transport_mut().receive(&selective_reply(2));
    vesc.poll().unwrap();

    assert_eq!(*calls.lock().unwrap(), 1);
    assert_eq!(vesc.values().rpm, 2.0);
}

#[test]
fn packet_split_across_polls() {
    let mut vesc = vesc();
    let bytes = selective_reply(42);
    let (head, tail) = bytes.split_at(7);

    vesc.transport_mut().receive(head);
    assert_eq!(vesc.poll().unwrap(), 0);
    assert_eq!(vesc.values().rpm, 0.0);

    vesc.transport_mut().receive(tail);
    assert_eq!(vesc.poll().unwrap(), 1);
    assert_eq!(vesc.values().rpm, 42.0);
}

#[test]
fn noise_and_corruption_are_skipped() {
    let mut vesc = vesc();

    let mut corrupted = selective_reply(7);
    corrupted[9] ^= 0x10;

    let mut bytes = vec![0xFF, 0x00, 0x42];
    bytes.extend(corrupted);
    bytes.extend(selective_reply(99));
    vesc.transport_mut().receive(&bytes);

    assert_eq!(vesc.poll().unwrap(), 1);
    assert_eq!(vesc.values().rpm, 99.0);

    let stats = vesc.stats();
    assert_eq!(stats.packets, 1);
    assert_eq!(stats.checksum_errors, 1);
    assert!(stats.discarded_bytes >= 3);
}

#[test]
fn unsupported_reply_is_ignored() {
    let mut vesc = vesc();
    vesc.transport_mut().receive(&frame(&[0x99, 1, 2, 3]));
    assert_eq!(vesc.poll().unwrap(), 1);
    assert_eq!(*vesc.values(), Default::default());
}

#[test]
fn larger_staging_buffer_accepts_long_packets() {
    let mut vesc: Vesc<MockTransport, 512> = Vesc::new(MockTransport::default());
    let mut payload = vec![cmds::FW_VERSION, 6, 5];
    payload.resize(300, 0xAA);
    vesc.transport_mut().receive(&frame(&payload));

    assert_eq!(vesc.poll().unwrap(), 1);
    assert_eq!(vesc.fw_version(), FirmwareVersion::new(6, 5));
}

#[test]
fn setters_write_big_endian_payloads() {
    let cases: [(fn(&mut Vesc<MockTransport>) -> Result<usize, MockError>, Vec<u8>); 9] = [
        (|v| v.set_current(1234), vec![cmds::SET_CURRENT, 0x00, 0x00, 0x04, 0xD2]),
        (|v| v.set_current_brake(-1), vec![cmds::SET_CURRENT_BRAKE, 0xFF, 0xFF, 0xFF, 0xFF]),
        (|v| v.set_duty(-50_000), vec![cmds::SET_DUTY, 0xFF, 0xFF, 0x3C, 0xB0]),
        (|v| v.set_rpm(12_000), vec![cmds::SET_RPM, 0x00, 0x00, 0x2E, 0xE0]),
        (|v| v.set_pos(90_000_000), vec![cmds::SET_POS, 0x05, 0x5D, 0x4A, 0x80]),
        (|v| v.set_handbrake(5_000), vec![cmds::SET_HANDBRAKE, 0x00, 0x00, 0x13, 0x88]),
        (|v| v.ask_values(), vec![cmds::GET_VALUES]),
        (|v| v.ping_alive(), vec![cmds::ALIVE]),
        (
            |v| v.ask_values_selective(ValuesMask::RPM | ValuesMask::INPUT_VOLTAGE),
            vec![cmds::GET_VALUES_SELECTIVE, 0x00, 0x00, 0x01, 0x80],
        ),
    ];

    for (send, payload) in cases {
        let mut vesc = vesc();
        let written = send(&mut vesc).unwrap();
        let expected = frame(&payload);
        assert_eq!(written, expected.len());
        assert_eq!(vesc.transport().written, expected);
    }
}

#[test]
fn raw_commands() {
    let mut vesc = vesc();
    assert!(matches!(
        vesc.send_command(&[]),
        Err(MockError::Encode(EncodeError::EmptyPayload))
    ));
    assert!(vesc.transport().written.is_empty());

    let mut payload = vec![0x42];
    payload.resize(300, 0x03);
    assert_eq!(vesc.send_command(&payload).unwrap(), 306);

    let written = &vesc.transport().written;
    assert_eq!(&written[..3], &[0x03, 0x01, 0x2C]);
    assert_eq!(written.last(), Some(&0x03));
}

#[test]
fn transport_errors_propagate() {
    let mut vesc = vesc();
    vesc.transport_mut().link_down = true;

    assert!(matches!(vesc.set_rpm(1), Err(MockError::LinkDown)));
    assert!(matches!(vesc.poll(), Err(MockError::LinkDown)));
}
