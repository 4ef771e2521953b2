//! Crate for commanding and polling VESC motor controllers over UART.

pub use vesc_packet as protocol;

use log::{debug, trace};

use vesc_packet::{
    commands::{
        AlivePacket, GetFwVersionPacket, GetValuesPacket, GetValuesSelectivePacket,
        SetCurrentBrakePacket, SetCurrentPacket, SetDutyPacket, SetHandbrakePacket, SetPosPacket,
        SetRpmPacket,
    },
    packet::Frame,
    telemetry::{Values, ValuesMask},
    Encode, EncodeError, FirmwareVersion, Framer, FramerStats, Reply, Telemetry,
    DEFAULT_STAGING_SIZE,
};

#[cfg(feature = "serial")]
pub mod serial;

/// A byte stream to a controller.
///
/// Reads are split in two: [`available`](Transport::available) moves whatever
/// has arrived into the transport's receive buffer and reports its length, and
/// [`read`](Transport::read) pops single bytes out of it. Neither may block.
pub trait Transport {
    type Error: std::error::Error + From<EncodeError>;

    /// Opens the link at the given baud rate.
    fn begin(&mut self, baud_rate: u32) -> Result<(), Self::Error>;

    /// Returns the number of received bytes ready to be read.
    fn available(&mut self) -> Result<usize, Self::Error>;

    /// Pops the oldest received byte.
    fn read(&mut self) -> Option<u8>;

    /// Writes all of `data`.
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;
}

type ValuesCallback = Box<dyn FnMut(&Telemetry) + Send>;

/// Protocol driver for a single controller.
///
/// The driver owns its transport and a staging buffer of `N` bytes, which bounds
/// the largest packet it can receive. Replies are applied to an internal
/// [`Telemetry`] as they arrive during [`poll`](Vesc::poll).
pub struct Vesc<T: Transport, const N: usize = DEFAULT_STAGING_SIZE> {
    transport: T,
    framer: Framer<N>,
    telemetry: Telemetry,
    on_values: Option<ValuesCallback>,
}

impl<T: Transport, const N: usize> Vesc<T, N> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            framer: Framer::new(),
            telemetry: Telemetry::new(),
            on_values: None,
        }
    }

    /// Opens the underlying transport.
    pub fn begin(&mut self, baud_rate: u32) -> Result<(), T::Error> {
        self.transport.begin(baud_rate)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Latest telemetry values.
    pub fn values(&self) -> &Values {
        &self.telemetry.values
    }

    /// Firmware version, `0.0` until the controller has answered
    /// [`ask_fw_version`](Vesc::ask_fw_version).
    pub fn fw_version(&self) -> FirmwareVersion {
        self.telemetry.fw_version
    }

    pub fn stats(&self) -> FramerStats {
        self.framer.stats()
    }

    /// Registers a function called after every successfully decoded values reply.
    ///
    /// The callback runs inside [`poll`](Vesc::poll), before the next received
    /// byte is processed.
    pub fn set_values_callback(&mut self, callback: impl FnMut(&Telemetry) + Send + 'static) {
        self.on_values = Some(Box::new(callback));
    }

    pub fn clear_values_callback(&mut self) {
        self.on_values = None;
    }

    /// Processes every byte the transport has received so far.
    ///
    /// Returns the number of valid packets found. Corrupt data is skipped and
    /// only shows up in [`stats`](Vesc::stats).
    pub fn poll(&mut self) -> Result<usize, T::Error> {
        let Self {
            transport,
            framer,
            telemetry,
            on_values,
        } = self;

        let mut packets = 0;
        while transport.available()? > 0 {
            while let Some(byte) = transport.read() {
                packets += framer.push(byte, |payload| {
                    trace!("received payload: {:x?}", payload);

                    match telemetry.consume(payload) {
                        Ok(Reply::Values(updated)) => {
                            trace!("Updated values: {:?}", updated);
                            if let Some(callback) = on_values.as_mut() {
                                callback(&*telemetry);
                            }
                        }
                        Ok(Reply::FirmwareVersion(_)) => {}
                        Ok(Reply::Unsupported(id)) => {
                            debug!("Ignoring reply with unsupported command id {}", id);
                        }
                        Err(e) => debug!("Ignoring malformed reply: {}", e),
                    }
                });
            }
        }

        Ok(packets)
    }

    /// Encodes and writes a packet, returning the number of bytes written.
    pub fn send(&mut self, packet: impl Encode) -> Result<usize, T::Error> {
        let mut encoded = vec![0; packet.size()];
        packet.encode(&mut encoded);

        trace!("sent packet: {:x?}", encoded);
        self.transport.write(&encoded)?;

        Ok(encoded.len())
    }

    /// Frames and writes a raw payload whose first byte is the command id.
    pub fn send_command(&mut self, payload: &[u8]) -> Result<usize, T::Error> {
        let frame = Frame::new(payload)?;
        self.send(frame)
    }

    pub fn ask_fw_version(&mut self) -> Result<usize, T::Error> {
        self.send(GetFwVersionPacket::new(()))
    }

    pub fn ask_values(&mut self) -> Result<usize, T::Error> {
        self.send(GetValuesPacket::new(()))
    }

    /// Asks for the telemetry fields in `mask` only.
    pub fn ask_values_selective(&mut self, mask: ValuesMask) -> Result<usize, T::Error> {
        self.send(GetValuesSelectivePacket::new(mask))
    }

    /// Resets the controller's command timeout without changing its output.
    pub fn ping_alive(&mut self) -> Result<usize, T::Error> {
        self.send(AlivePacket::new(()))
    }

    /// Sets the motor current in milliamps.
    pub fn set_current(&mut self, milliamps: i32) -> Result<usize, T::Error> {
        self.send(SetCurrentPacket::new(milliamps))
    }

    /// Sets the braking current in milliamps.
    pub fn set_current_brake(&mut self, milliamps: i32) -> Result<usize, T::Error> {
        self.send(SetCurrentBrakePacket::new(milliamps))
    }

    /// Sets the duty cycle, where `±100_000` maps to `±1.0`.
    pub fn set_duty(&mut self, duty: i32) -> Result<usize, T::Error> {
        self.send(SetDutyPacket::new(duty))
    }

    /// Sets the target electrical RPM.
    pub fn set_rpm(&mut self, erpm: i32) -> Result<usize, T::Error> {
        self.send(SetRpmPacket::new(erpm))
    }

    /// Sets the target position in millionths of a degree.
    pub fn set_pos(&mut self, position: i32) -> Result<usize, T::Error> {
        self.send(SetPosPacket::new(position))
    }

    /// Sets the handbrake current in milliamps.
    pub fn set_handbrake(&mut self, milliamps: i32) -> Result<usize, T::Error> {
        self.send(SetHandbrakePacket::new(milliamps))
    }
}
