//! Fixed-size packet framing shared by the Yepkit protocols.
//!
//! Every exchange opens the device, writes one padded report, reads one
//! report and closes the device again. Holding the handle open between calls
//! makes the next read come back empty on these devices.

use std::time::Duration;

use tracing::{debug, instrument, trace};

use super::constants::{SENTINEL_BYTE, USB_PACKET_PAYLOAD_SIZE, USB_PACKET_SIZE, USB_TIMEOUT_MS};
use crate::transport::{HidTransport, TransportError};

/// Packet layout of one protocol variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framing {
    /// Size the outgoing report is padded to.
    pub packet_size: usize,
    /// Maximum number of bytes requested from the device.
    pub read_size: usize,
    /// Number of response bytes handed to the protocol layer.
    pub payload_size: usize,
    /// Send the command twice before the padding (YKUSH firmware quirk).
    pub repeat_command: bool,
    pub timeout: Duration,
}

impl Framing {
    /// Layout used by the YKUR relay board.
    pub const BOARD: Framing = Framing {
        packet_size: USB_PACKET_SIZE,
        read_size: USB_PACKET_SIZE,
        payload_size: USB_PACKET_PAYLOAD_SIZE,
        repeat_command: false,
        timeout: Duration::from_millis(USB_TIMEOUT_MS),
    };

    /// Layout used by the YKUSH hubs.
    pub const HUB: Framing = Framing {
        packet_size: USB_PACKET_SIZE,
        read_size: USB_PACKET_SIZE + 1,
        payload_size: USB_PACKET_PAYLOAD_SIZE,
        repeat_command: true,
        timeout: Duration::from_millis(USB_TIMEOUT_MS),
    };

    /// Build the outgoing report for `command`.
    pub fn encode(&self, command: &[u8]) -> Vec<u8> {
        let padding = self.packet_size.saturating_sub(command.len());
        let mut packet = Vec::with_capacity(command.len() * 2 + padding);
        packet.extend_from_slice(command);
        if self.repeat_command {
            packet.extend_from_slice(command);
        }
        packet.resize(packet.len() + padding, 0x00);
        packet
    }

    /// Reduce a raw response to the payload, or the sentinel if it is unusable.
    pub fn decode(&self, response: Option<Vec<u8>>) -> Vec<u8> {
        match response {
            Some(mut bytes) if bytes.len() >= self.payload_size => {
                bytes.truncate(self.payload_size);
                bytes
            }
            _ => self.sentinel(),
        }
    }

    /// Payload substituted for absent or short responses.
    pub fn sentinel(&self) -> Vec<u8> {
        vec![SENTINEL_BYTE; self.payload_size]
    }
}

/// Run one request/response exchange.
///
/// A missing or short answer is not an error: the caller gets the sentinel
/// payload and decides from its content. Only faults that prevent the
/// exchange itself (open, write) are returned as errors.
#[instrument(level = "debug", skip(transport, framing), fields(command = ?command))]
pub fn exchange<T: HidTransport + ?Sized>(
    transport: &T,
    framing: &Framing,
    command: &[u8],
) -> Result<Vec<u8>, TransportError> {
    let packet = framing.encode(command);
    let connection = transport.open()?;
    connection.write(&packet)?;
    let response = match connection.read(framing.read_size, framing.timeout) {
        Ok(response) => response,
        Err(e) => {
            debug!(error = %e, "Read failed, substituting sentinel");
            None
        }
    };
    drop(connection);

    if response.as_ref().is_none_or(|r| r.len() < framing.payload_size) {
        debug!("No usable response from device");
    }
    let payload = framing.decode(response);
    trace!(payload = ?payload, "Exchange complete");
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    #[test]
    fn test_board_packet_is_padded() {
        let packet = Framing::BOARD.encode(&[0x03, 0x11]);
        assert_eq!(packet.len(), USB_PACKET_SIZE);
        assert_eq!(&packet[..2], &[0x03, 0x11]);
        assert!(packet[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_hub_packet_repeats_command() {
        let packet = Framing::HUB.encode(&[0x2A]);
        assert_eq!(packet.len(), USB_PACKET_SIZE + 1);
        assert_eq!(&packet[..3], &[0x2A, 0x2A, 0x00]);
    }

    #[test]
    fn test_short_response_yields_sentinel() {
        let payload = Framing::BOARD.decode(Some(vec![0x03, 0x00, 0x01]));
        assert_eq!(payload, vec![0xFF; USB_PACKET_PAYLOAD_SIZE]);
    }

    #[test]
    fn test_absent_response_yields_sentinel() {
        assert_eq!(
            Framing::HUB.decode(None),
            vec![0xFF; USB_PACKET_PAYLOAD_SIZE]
        );
    }

    #[test]
    fn test_long_response_is_truncated() {
        let mut raw = vec![0x01; USB_PACKET_SIZE];
        raw[0] = 0x42;
        let payload = Framing::BOARD.decode(Some(raw));
        assert_eq!(payload.len(), USB_PACKET_PAYLOAD_SIZE);
        assert_eq!(payload[0], 0x42);
    }

    #[test]
    fn test_exchange_opens_and_closes_once() {
        let mock = MockTransport::new();
        mock.queue_response(&[0x03, 0x00, 0x01]);

        let payload = exchange(&mock, &Framing::BOARD, &[0x03, 0x01]).unwrap();

        assert_eq!(payload[..3], [0x03, 0x00, 0x01]);
        assert_eq!(mock.open_count(), 1);
        assert_eq!(mock.close_count(), 1);
        assert_eq!(mock.get_writes()[0].len(), USB_PACKET_SIZE);
    }

    #[test]
    fn test_exchange_timeout_is_not_an_error() {
        let mock = MockTransport::new();
        let payload = exchange(&mock, &Framing::BOARD, &[0x03, 0x01]).unwrap();
        assert_eq!(payload, Framing::BOARD.sentinel());
        assert_eq!(mock.close_count(), 1);
    }

    #[test]
    fn test_exchange_closes_on_write_error() {
        let mock = MockTransport::new();
        mock.fail_writes(true);
        assert!(exchange(&mock, &Framing::BOARD, &[0x03, 0x01]).is_err());
        assert_eq!(mock.open_count(), 1);
        assert_eq!(mock.close_count(), 1);
    }
}
