//! Datagram transport abstraction
//!
//! The gateway shares one socket between the receive thread (`recv_from`) and
//! whichever thread sends commands (`send_to`). This relies on the OS datagram
//! socket allowing concurrent send and receive on the same descriptor, which
//! holds for UDP sockets on Linux, macOS and Windows.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

mod mock;
pub use mock::MockSocket;

/// Datagram socket used by the robot link
pub trait DatagramSocket: Send + Sync {
    /// Send one datagram, returns number of bytes sent
    fn send_to(&self, data: &[u8], target: SocketAddr) -> io::Result<usize>;

    /// Receive one datagram into `buffer`
    ///
    /// Returns `WouldBlock` or `TimedOut` when the read timeout expires.
    fn recv_from(&self, buffer: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// Set the receive timeout
    fn set_read_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    /// Local address, when bound to one
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl DatagramSocket for UdpSocket {
    fn send_to(&self, data: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, data, target)
    }

    fn recv_from(&self, buffer: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buffer)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        UdpSocket::set_read_timeout(self, timeout)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}

/// Whether a receive error only means "nothing arrived before the timeout"
pub fn is_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

/// WSAEMSGSIZE: datagram larger than the receive buffer
#[cfg(windows)]
const WSAEMSGSIZE: i32 = 10040;

/// Whether a receive error concerns one datagram rather than the socket
///
/// An ICMP port-unreachable for an earlier `send_to` surfaces on the next
/// `recv_from` as a reset or refusal (always on Windows, on Linux for
/// connected sockets). Windows also fails oversized datagrams instead of
/// truncating them. The socket stays usable in all these cases.
pub fn is_datagram_error(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
    ) || is_oversized(error)
}

#[cfg(windows)]
fn is_oversized(error: &io::Error) -> bool {
    error.raw_os_error() == Some(WSAEMSGSIZE)
}

#[cfg(not(windows))]
fn is_oversized(_error: &io::Error) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let timeout = io::Error::from(io::ErrorKind::WouldBlock);
        assert!(is_timeout(&timeout));
        assert!(!is_datagram_error(&timeout));

        for kind in [io::ErrorKind::ConnectionReset, io::ErrorKind::ConnectionRefused] {
            let err = io::Error::from(kind);
            assert!(is_datagram_error(&err), "{:?}", kind);
            assert!(!is_timeout(&err));
        }

        for kind in [io::ErrorKind::NotConnected, io::ErrorKind::PermissionDenied] {
            let err = io::Error::from(kind);
            assert!(!is_datagram_error(&err) && !is_timeout(&err), "{:?}", kind);
        }
    }

    #[cfg(windows)]
    #[test]
    fn test_oversized_datagram_is_not_fatal() {
        assert!(is_datagram_error(&io::Error::from_raw_os_error(WSAEMSGSIZE)));
    }
}
