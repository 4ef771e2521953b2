//! Command packets sent to the controller.

use crate::{
    encode::Encode,
    packet::{frame_packet, packet_size},
    telemetry::ValuesMask,
};

/// Command ids.
///
/// These are the first payload byte of every packet, in both directions.
/// This module is non-exhaustive.
pub mod cmds {
    pub const FW_VERSION: u8 = 0;
    pub const GET_VALUES: u8 = 4;
    pub const SET_DUTY: u8 = 5;
    pub const SET_CURRENT: u8 = 6;
    pub const SET_CURRENT_BRAKE: u8 = 7;
    pub const SET_RPM: u8 = 8;
    pub const SET_POS: u8 = 9;
    pub const SET_HANDBRAKE: u8 = 10;
    pub const ALIVE: u8 = 30;
    pub const GET_VALUES_SELECTIVE: u8 = 50;
}

use cmds::{
    ALIVE, FW_VERSION, GET_VALUES, GET_VALUES_SELECTIVE, SET_CURRENT, SET_CURRENT_BRAKE, SET_DUTY,
    SET_HANDBRAKE, SET_POS, SET_RPM,
};

/// Controller-bound command packet.
///
/// The payload is the command id followed by the encoded `P`, framed as
/// described in [`packet`](crate::packet). `P` must encode to fewer than
/// 65535 bytes.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CommandPacket<const CMD: u8, P: Encode> {
    payload: P,
}

impl<const CMD: u8, P: Encode> CommandPacket<CMD, P> {
    /// Creates a new command packet with a given generic payload type.
    pub fn new(payload: P) -> Self {
        Self { payload }
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }
}

impl<const CMD: u8, P: Encode> Encode for CommandPacket<CMD, P> {
    fn size(&self) -> usize {
        packet_size(1 + self.payload.size())
    }

    fn encode(&self, data: &mut [u8]) {
        frame_packet(1 + self.payload.size(), data, |buf| {
            buf[0] = CMD;
            self.payload.encode(&mut buf[1..]);
        });
    }
}

/// Requests a [`FirmwareVersion`](crate::FirmwareVersion) reply.
pub type GetFwVersionPacket = CommandPacket<FW_VERSION, ()>;

/// Requests the full telemetry reply.
pub type GetValuesPacket = CommandPacket<GET_VALUES, ()>;

/// Requests a telemetry reply containing only the fields in the mask.
pub type GetValuesSelectivePacket = CommandPacket<GET_VALUES_SELECTIVE, ValuesMask>;

/// Duty cycle, scaled so that `±100_000` is `±1.0`.
pub type SetDutyPacket = CommandPacket<SET_DUTY, i32>;

/// Motor current in milliamps.
pub type SetCurrentPacket = CommandPacket<SET_CURRENT, i32>;

/// Braking current in milliamps.
pub type SetCurrentBrakePacket = CommandPacket<SET_CURRENT_BRAKE, i32>;

/// Electrical RPM.
pub type SetRpmPacket = CommandPacket<SET_RPM, i32>;

/// Position in millionths of a degree.
pub type SetPosPacket = CommandPacket<SET_POS, i32>;

/// Handbrake current in milliamps.
pub type SetHandbrakePacket = CommandPacket<SET_HANDBRAKE, i32>;

/// Keeps the controller's command timeout from stopping the motor.
pub type AlivePacket = CommandPacket<ALIVE, ()>;
