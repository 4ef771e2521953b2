//! Interpretation of controller replies.
//!
//! Fixed-point fields are sent as big-endian signed integers and scaled on
//! arrival:
//!
//! | Field                         | Wire  | Scale      |
//! |-------------------------------|-------|------------|
//! | FET and motor temperature     | `i16` | 1/10 °C    |
//! | Motor, input, d and q current | `i32` | 1/100 A    |
//! | Duty cycle                    | `i16` | 1/1000     |
//! | RPM                           | `i32` | 1          |
//! | Input voltage                 | `i16` | 1/10 V     |
//! | Amp and watt hours            | `i32` | 1/10000    |
//! | Tachometer                    | `i32` | raw        |
//! | Fault code                    | `i8`  | raw        |
//! | PID position                  | `i32` | 1/1000000  |
//! | Controller id                 | `i8`  | raw        |
//! | MOSFET temperatures (three)   | `i16` | 1/10 °C    |

use bitflags::bitflags;

use crate::{
    commands::cmds::{FW_VERSION, GET_VALUES, GET_VALUES_SELECTIVE},
    decode::{Decode, DecodeError, DecodeErrorKind},
    encode::Encode,
    version::FirmwareVersion,
};

bitflags! {
    /// Field selection for [`GetValuesSelectivePacket`](crate::commands::GetValuesSelectivePacket).
    ///
    /// Replies carry the selected fields in bit order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ValuesMask: u32 {
        const TEMP_FET = 1 << 0;
        const TEMP_MOTOR = 1 << 1;
        const AVG_MOTOR_CURRENT = 1 << 2;
        const AVG_INPUT_CURRENT = 1 << 3;
        const AVG_ID = 1 << 4;
        const AVG_IQ = 1 << 5;
        const DUTY_CYCLE = 1 << 6;
        const RPM = 1 << 7;
        const INPUT_VOLTAGE = 1 << 8;
        const AMP_HOURS = 1 << 9;
        const AMP_HOURS_CHARGED = 1 << 10;
        const WATT_HOURS = 1 << 11;
        const WATT_HOURS_CHARGED = 1 << 12;
        const TACHOMETER = 1 << 13;
        const TACHOMETER_ABS = 1 << 14;
        const FAULT = 1 << 15;
        const PID_POS = 1 << 16;
        const CONTROLLER_ID = 1 << 17;
        const TEMP_MOS = 1 << 18;
    }
}

impl Encode for ValuesMask {
    fn size(&self) -> usize {
        4
    }

    fn encode(&self, data: &mut [u8]) {
        self.bits().encode(data);
    }
}

impl Decode for ValuesMask {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self::from_bits_retain(u32::decode(data)?))
    }
}

/// Fields in wire order, with their encoded widths.
const FIELDS: [(ValuesMask, usize); 19] = [
    (ValuesMask::TEMP_FET, 2),
    (ValuesMask::TEMP_MOTOR, 2),
    (ValuesMask::AVG_MOTOR_CURRENT, 4),
    (ValuesMask::AVG_INPUT_CURRENT, 4),
    (ValuesMask::AVG_ID, 4),
    (ValuesMask::AVG_IQ, 4),
    (ValuesMask::DUTY_CYCLE, 2),
    (ValuesMask::RPM, 4),
    (ValuesMask::INPUT_VOLTAGE, 2),
    (ValuesMask::AMP_HOURS, 4),
    (ValuesMask::AMP_HOURS_CHARGED, 4),
    (ValuesMask::WATT_HOURS, 4),
    (ValuesMask::WATT_HOURS_CHARGED, 4),
    (ValuesMask::TACHOMETER, 4),
    (ValuesMask::TACHOMETER_ABS, 4),
    (ValuesMask::FAULT, 1),
    (ValuesMask::PID_POS, 4),
    (ValuesMask::CONTROLLER_ID, 1),
    (ValuesMask::TEMP_MOS, 6),
];

/// Size of a full values reply (after the command id) up to and including the
/// fault code. Later fields are only sent by newer firmware.
pub const FULL_VALUES_SIZE: usize = 53;

/// Controller fault state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCode {
    #[default]
    None,
    OverVoltage,
    UnderVoltage,
    Drv,
    AbsOverCurrent,
    OverTempFet,
    OverTempMotor,
    /// A code this crate does not know about.
    Unknown(i8),
}

impl From<i8> for FaultCode {
    fn from(code: i8) -> Self {
        match code {
            0 => Self::None,
            1 => Self::OverVoltage,
            2 => Self::UnderVoltage,
            3 => Self::Drv,
            4 => Self::AbsOverCurrent,
            5 => Self::OverTempFet,
            6 => Self::OverTempMotor,
            other => Self::Unknown(other),
        }
    }
}

impl Decode for FaultCode {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        i8::decode(data).map(Self::from)
    }
}

/// Last known controller telemetry.
///
/// Every field starts at zero and keeps its value until a reply updates it.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Values {
    pub temp_fet: f32,
    pub temp_motor: f32,
    pub avg_motor_current: f32,
    pub avg_input_current: f32,
    pub avg_id: f32,
    pub avg_iq: f32,
    pub duty_cycle: f32,
    pub rpm: f32,
    pub input_voltage: f32,
    pub amp_hours: f32,
    pub amp_hours_charged: f32,
    pub watt_hours: f32,
    pub watt_hours_charged: f32,
    pub tachometer: i32,
    pub tachometer_abs: i32,
    pub fault: FaultCode,
    pub pid_pos: f32,
    pub controller_id: i8,
    pub temp_mos: [f32; 3],
}

fn fixed16(data: &mut &[u8], scale: f32) -> Result<f32, DecodeError> {
    Ok(i16::decode(data)? as f32 / scale)
}

fn fixed32(data: &mut &[u8], scale: f32) -> Result<f32, DecodeError> {
    Ok(i32::decode(data)? as f32 / scale)
}

impl Values {
    fn decode_field(&mut self, field: ValuesMask, data: &mut &[u8]) -> Result<(), DecodeError> {
        if field == ValuesMask::TEMP_FET {
            self.temp_fet = fixed16(data, 10.0)?;
        } else if field == ValuesMask::TEMP_MOTOR {
            self.temp_motor = fixed16(data, 10.0)?;
        } else if field == ValuesMask::AVG_MOTOR_CURRENT {
            self.avg_motor_current = fixed32(data, 100.0)?;
        } else if field == ValuesMask::AVG_INPUT_CURRENT {
            self.avg_input_current = fixed32(data, 100.0)?;
        } else if field == ValuesMask::AVG_ID {
            self.avg_id = fixed32(data, 100.0)?;
        } else if field == ValuesMask::AVG_IQ {
            self.avg_iq = fixed32(data, 100.0)?;
        } else if field == ValuesMask::DUTY_CYCLE {
            self.duty_cycle = fixed16(data, 1000.0)?;
        } else if field == ValuesMask::RPM {
            self.rpm = fixed32(data, 1.0)?;
        } else if field == ValuesMask::INPUT_VOLTAGE {
            self.input_voltage = fixed16(data, 10.0)?;
        } else if field == ValuesMask::AMP_HOURS {
            self.amp_hours = fixed32(data, 10_000.0)?;
        } else if field == ValuesMask::AMP_HOURS_CHARGED {
            self.amp_hours_charged = fixed32(data, 10_000.0)?;
        } else if field == ValuesMask::WATT_HOURS {
            self.watt_hours = fixed32(data, 10_000.0)?;
        } else if field == ValuesMask::WATT_HOURS_CHARGED {
            self.watt_hours_charged = fixed32(data, 10_000.0)?;
        } else if field == ValuesMask::TACHOMETER {
            self.tachometer = i32::decode(data)?;
        } else if field == ValuesMask::TACHOMETER_ABS {
            self.tachometer_abs = i32::decode(data)?;
        } else if field == ValuesMask::FAULT {
            self.fault = FaultCode::decode(data)?;
        } else if field == ValuesMask::PID_POS {
            self.pid_pos = fixed32(data, 1_000_000.0)?;
        } else if field == ValuesMask::CONTROLLER_ID {
            self.controller_id = i8::decode(data)?;
        } else if field == ValuesMask::TEMP_MOS {
            for temp in self.temp_mos.iter_mut() {
                *temp = fixed16(data, 10.0)?;
            }
        }

        Ok(())
    }

    /// Decodes a full values reply body, returning the fields it contained.
    ///
    /// Fields past the fault code are decoded only when present in full.
    pub fn decode_full(&mut self, mut data: &[u8]) -> Result<ValuesMask, DecodeError> {
        if data.len() < FULL_VALUES_SIZE {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedEnd));
        }

        let mut updated = ValuesMask::empty();
        for (field, width) in FIELDS {
            if data.len() < width {
                break;
            }
            self.decode_field(field, &mut data)?;
            updated |= field;
        }

        Ok(updated)
    }

    /// Decodes the fields selected by `mask`, in bit order.
    ///
    /// Unknown bits are ignored, along with any bytes following the known fields.
    pub fn decode_selective(
        &mut self,
        mut data: &[u8],
        mask: ValuesMask,
    ) -> Result<ValuesMask, DecodeError> {
        let mut updated = ValuesMask::empty();
        for (field, _) in FIELDS {
            if mask.contains(field) {
                self.decode_field(field, &mut data)?;
                updated |= field;
            }
        }

        Ok(updated)
    }
}

/// What a consumed reply updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    FirmwareVersion(FirmwareVersion),
    /// Telemetry fields that were refreshed.
    Values(ValuesMask),
    /// A well-formed payload with a command id this crate does not interpret.
    Unsupported(u8),
}

/// Telemetry state fed by validated reply payloads.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Telemetry {
    pub values: Values,
    pub fw_version: FirmwareVersion,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a validated payload (command id first) to the stored state.
    ///
    /// A payload that fails to decode leaves the state untouched.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the payload is empty or shorter than its
    /// command requires.
    pub fn consume(&mut self, payload: &[u8]) -> Result<Reply, DecodeError> {
        let (&cmd, mut data) = payload
            .split_first()
            .ok_or_else(|| DecodeError::new::<Self>(DecodeErrorKind::UnexpectedEnd))?;

        match cmd {
            FW_VERSION => {
                self.fw_version = FirmwareVersion::decode(&mut data)?;
                log::debug!("Controller firmware version {}", self.fw_version);
                Ok(Reply::FirmwareVersion(self.fw_version))
            }
            GET_VALUES => {
                let mut values = self.values;
                let updated = values.decode_full(data)?;
                self.values = values;
                Ok(Reply::Values(updated))
            }
            GET_VALUES_SELECTIVE => {
                let mask = ValuesMask::decode(&mut data)?;
                let mut values = self.values;
                let updated = values.decode_selective(data, mask)?;
                self.values = values;
                Ok(Reply::Values(updated))
            }
            other => {
                log::trace!("Ignoring reply with command id {other}");
                Ok(Reply::Unsupported(other))
            }
        }
    }
}
