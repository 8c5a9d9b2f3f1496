//! In-memory datagram socket for tests and dry runs

use super::DatagramSocket;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Mock datagram socket
///
/// Clones share state, so a test can keep one handle while the gateway owns another.
#[derive(Clone)]
pub struct MockSocket {
    inner: Arc<Mutex<MockSocketInner>>,
}

struct MockSocketInner {
    local: SocketAddr,
    inbound: VecDeque<Inbound>,
    sent: Vec<(Vec<u8>, SocketAddr)>,
    unreachable: HashSet<SocketAddr>,
    read_timeout: Option<Duration>,
    closed: bool,
}

/// Queued result for one `recv_from` call
type Inbound = std::result::Result<(Vec<u8>, SocketAddr), io::ErrorKind>;

/// Idle wait when no datagram is queued and no read timeout is set
const DEFAULT_IDLE_WAIT: Duration = Duration::from_millis(5);

impl MockSocket {
    /// Create a new mock socket "bound" to `local`
    pub fn new(local: SocketAddr) -> Self {
        MockSocket {
            inner: Arc::new(Mutex::new(MockSocketInner {
                local,
                inbound: VecDeque::new(),
                sent: Vec::new(),
                unreachable: HashSet::new(),
                read_timeout: None,
                closed: false,
            })),
        }
    }

    /// Queue a datagram to be returned by `recv_from`
    pub fn inject(&self, data: &[u8], from: SocketAddr) {
        self.inner.lock().inbound.push_back(Ok((data.to_vec(), from)));
    }

    /// Make the next `recv_from` in line fail once with `kind`
    pub fn inject_error(&self, kind: io::ErrorKind) {
        self.inner.lock().inbound.push_back(Err(kind));
    }

    /// All datagrams sent so far
    pub fn sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.inner.lock().sent.clone()
    }

    /// Clear recorded datagrams
    pub fn clear_sent(&self) {
        self.inner.lock().sent.clear();
    }

    /// Make sends to `target` fail with `HostUnreachable`
    pub fn fail_sends_to(&self, target: SocketAddr) {
        self.inner.lock().unreachable.insert(target);
    }

    /// Close the socket: every later call fails
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    /// Number of queued inbound datagrams and errors
    pub fn pending(&self) -> usize {
        self.inner.lock().inbound.len()
    }
}

impl DatagramSocket for MockSocket {
    fn send_to(&self, data: &[u8], target: SocketAddr) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "socket closed"));
        }
        if inner.unreachable.contains(&target) {
            return Err(io::Error::new(
                io::ErrorKind::HostUnreachable,
                format!("{} unreachable", target),
            ));
        }
        inner.sent.push((data.to_vec(), target));
        Ok(data.len())
    }

    fn recv_from(&self, buffer: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let wait = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(io::Error::new(io::ErrorKind::NotConnected, "socket closed"));
            }
            match inner.inbound.pop_front() {
                Some(Ok((data, from))) => {
                    // Truncate like a real datagram socket
                    let len = data.len().min(buffer.len());
                    buffer[..len].copy_from_slice(&data[..len]);
                    return Ok((len, from));
                }
                Some(Err(kind)) => return Err(io::Error::new(kind, "injected receive error")),
                None => {}
            }
            inner.read_timeout.unwrap_or(DEFAULT_IDLE_WAIT)
        };

        std::thread::sleep(wait);
        Err(io::Error::new(io::ErrorKind::WouldBlock, "no datagram"))
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.inner.lock().read_timeout = timeout;
        Ok(())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.inner.lock().local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_inject_and_receive() {
        let socket = MockSocket::new(addr("127.0.0.1:8000"));
        socket.inject(b"hello", addr("10.0.0.5:8000"));

        let mut buf = [0u8; 3];
        let (len, from) = socket.recv_from(&mut buf).unwrap();
        assert_eq!(len, 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(from, addr("10.0.0.5:8000"));
        assert_eq!(socket.pending(), 0);
    }

    #[test]
    fn test_injected_error_is_one_shot() {
        let socket = MockSocket::new(addr("127.0.0.1:8000"));
        socket.inject_error(io::ErrorKind::ConnectionReset);
        socket.inject(b"after", addr("10.0.0.5:8000"));
        assert_eq!(socket.pending(), 2);

        let mut buf = [0u8; 16];
        let err = socket.recv_from(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(socket.recv_from(&mut buf).unwrap().0, 5);
    }

    #[test]
    fn test_empty_receive_times_out() {
        let socket = MockSocket::new(addr("127.0.0.1:8000"));
        socket
            .set_read_timeout(Some(Duration::from_millis(1)))
            .unwrap();
        let mut buf = [0u8; 16];
        let err = socket.recv_from(&mut buf).unwrap_err();
        assert!(crate::transport::is_timeout(&err));
    }

    #[test]
    fn test_unreachable_and_closed() {
        let socket = MockSocket::new(addr("127.0.0.1:8000"));
        let target = addr("10.0.0.9:8000");
        socket.fail_sends_to(target);
        assert!(socket.send_to(b"x", target).is_err());
        assert!(socket.send_to(b"x", addr("10.0.0.8:8000")).is_ok());
        assert_eq!(socket.sent().len(), 1);
        socket.clear_sent();
        assert!(socket.sent().is_empty());

        socket.close();
        let mut buf = [0u8; 4];
        assert!(socket.recv_from(&mut buf).is_err());
    }
}
