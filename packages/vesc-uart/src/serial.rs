//! Implements discovering, opening, and talking to VESC controllers over a serial port.
//!
//! The port is opened in non-blocking mode so that [`Vesc::poll`](crate::Vesc::poll)
//! never waits on the line.

use std::{
    io::{ErrorKind, Read, Write},
    time::Duration,
};

use log::{debug, trace, warn};
use serialport::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortInfo, SerialPortType,
    StopBits,
};
use thiserror::Error;
use vesc_packet::{EncodeError, RingBuffer};

use crate::Transport;

/// The USB vendor ID of the VESC's native USB port
pub const VESC_USB_VID: u16 = 0x0483;

/// The USB product ID of the VESC's native USB port
pub const VESC_USB_PID: u16 = 0x5740;

/// Baud rate the controller firmware uses out of the box.
pub const VESC_DEFAULT_BAUDRATE: u32 = 115200;

/// Baud rates accepted by [`SerialTransport::begin`].
pub const STANDARD_BAUD_RATES: [u32; 18] = [
    50, 75, 110, 134, 150, 200, 300, 600, 1200, 1800, 2400, 4800, 9600, 19200, 38400, 57600,
    115200, 230400,
];

/// Size of the receive ring buffer.
pub const RX_BUFFER_SIZE: usize = 256;

/// Largest number of bytes moved from the OS in a single read.
pub const READ_CHUNK_SIZE: usize = 100;

/// Finds all serial ports belonging to a VESC's native USB interface.
///
/// Controllers wired through a USB-UART adapter can't be told apart from any other
/// adapter and have to be opened by path.
pub fn find_ports() -> Result<Vec<SerialPortInfo>, SerialError> {
    let mut vesc_ports = Vec::new();

    for port in serialport::available_ports()? {
        let SerialPortType::UsbPort(ref info) = port.port_type else {
            continue;
        };

        if info.vid != VESC_USB_VID || info.pid != VESC_USB_PID {
            continue;
        }

        if cfg!(target_os = "macos") && port.port_name.starts_with("/dev/tty.") {
            // https://pbxbook.com/other/mac-tty.html
            debug!(
                "Ignoring port named {:?} because it is a call-in device",
                port.port_name
            );
            continue;
        }

        debug!("Found a VESC serial port at {:?}", port.port_name);
        vesc_ports.push(port);
    }

    Ok(vesc_ports)
}

/// A serial connection to a controller, set up for 8N1 without flow control.
pub struct SerialTransport {
    path: String,
    port: Option<Box<dyn SerialPort>>,
    rx: RingBuffer<[u8; RX_BUFFER_SIZE]>,
}

impl SerialTransport {
    /// Creates a transport for the port at `path`. Nothing is opened until
    /// [`begin`](Transport::begin) is called.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            port: None,
            rx: RingBuffer::default(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl Transport for SerialTransport {
    type Error = SerialError;

    fn begin(&mut self, baud_rate: u32) -> Result<(), SerialError> {
        if !STANDARD_BAUD_RATES.contains(&baud_rate) {
            return Err(SerialError::UnsupportedBaudRate(baud_rate));
        }

        let port = serialport::new(&self.path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::ZERO)
            .open()?;

        // Drop anything left over from before the port was opened.
        port.clear(ClearBuffer::All)?;
        self.rx.clear();

        debug!("Opened {} at {} baud", self.path, baud_rate);
        self.port = Some(port);

        Ok(())
    }

    fn available(&mut self) -> Result<usize, SerialError> {
        let port = self.port.as_mut().ok_or(SerialError::NotOpen)?;
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            let pending = port.bytes_to_read()? as usize;
            if pending == 0 {
                break;
            }

            let free = self.rx.free_space();
            if free == 0 {
                warn!(
                    "Receive buffer full with {} bytes still pending, poll more often",
                    pending
                );
                break;
            }

            let want = pending.min(free).min(READ_CHUNK_SIZE);
            let got = match port.read(&mut chunk[..want]) {
                Ok(got) => got,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    0
                }
                Err(e) => return Err(e.into()),
            };

            if got == 0 {
                break;
            }

            trace!("read {} bytes: {:x?}", got, &chunk[..got]);
            self.rx.store(&chunk[..got]);
        }

        Ok(self.rx.len())
    }

    fn read(&mut self) -> Option<u8> {
        self.rx.pop()
    }

    fn write(&mut self, data: &[u8]) -> Result<(), SerialError> {
        let port = self.port.as_mut().ok_or(SerialError::NotOpen)?;

        // `write_all` already retries on `Interrupted`.
        port.write_all(data)?;
        port.flush()?;

        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialport Error: {0}")]
    SerialportError(#[from] serialport::Error),

    #[error("Baud rate {0} is not a standard speed")]
    UnsupportedBaudRate(u32),

    #[error("Serial port is not open")]
    NotOpen,

    #[error("Packet encoding error: {0}")]
    EncodeError(#[from] EncodeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nonstandard_baud_rate() {
        let mut transport = SerialTransport::new("/dev/does-not-exist");
        let err = transport.begin(12345).unwrap_err();
        assert!(matches!(err, SerialError::UnsupportedBaudRate(12345)));
        assert!(!transport.is_open());
    }

    #[test]
    fn unopened_port() {
        let mut transport = SerialTransport::new("/dev/does-not-exist");
        assert_eq!(transport.path(), "/dev/does-not-exist");
        assert!(matches!(transport.available(), Err(SerialError::NotOpen)));
        assert!(matches!(transport.write(&[1, 2, 3]), Err(SerialError::NotOpen)));
        assert_eq!(transport.read(), None);
    }

    #[test]
    fn default_baud_rate_is_standard() {
        assert!(STANDARD_BAUD_RATES.contains(&VESC_DEFAULT_BAUDRATE));
    }
}
