use std::io::ErrorKind;
use std::net::{ToSocketAddrs, UdpSocket};
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("timed out waiting for a datagram")]
    Timeout,
    #[error("could not resolve {0}")]
    Resolve(String),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blocking datagram transport used by a registration session.
pub trait Transport {
    fn send_to(&mut self, payload: &[u8], host: &str, port: u16) -> Result<(), TransportError>;

    /// Wait for one datagram of at most `max_len` bytes. Returns
    /// [`TransportError::Timeout`] when nothing arrives in time.
    fn recv_from(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send_to(&mut self, payload: &[u8], host: &str, port: u16) -> Result<(), TransportError> {
        (**self).send_to(payload, host, port)
    }

    fn recv_from(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        (**self).recv_from(max_len)
    }
}

/// UDP socket bound to an ephemeral port. Closed on drop.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub fn bind(timeout: Duration) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_read_timeout(Some(timeout))?;
        log::debug!("SIP socket bound to {:?}", socket.local_addr());
        Ok(Self { socket })
    }
}

impl Transport for UdpTransport {
    fn send_to(&mut self, payload: &[u8], host: &str, port: u16) -> Result<(), TransportError> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|_| TransportError::Resolve(format!("{host}:{port}")))?
            .next()
            .ok_or_else(|| TransportError::Resolve(format!("{host}:{port}")))?;
        let sent = self.socket.send_to(payload, addr)?;
        log::debug!("sent {sent} bytes to {addr}");
        Ok(())
    }

    fn recv_from(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; max_len];
        match self.socket.recv_from(&mut buf) {
            Ok((len, addr)) => {
                log::debug!("received {len} bytes from {addr}");
                buf.truncate(len);
                Ok(buf)
            }
            // Read timeouts surface as WouldBlock on Unix and TimedOut on Windows.
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Err(TransportError::Timeout)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        log::debug!("closing SIP socket {:?}", self.socket.local_addr());
    }
}
