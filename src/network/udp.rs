//! UDP socket construction

use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;

use crate::error::NetworkError;

/// Bind a non-blocking UDP socket with an enlarged receive buffer and hand it to tokio.
/// Must be called from within a tokio runtime.
pub fn create_socket(addr: SocketAddr, recv_buffer: usize) -> Result<tokio::net::UdpSocket, NetworkError> {
    let bind_err = |source| NetworkError::BindFailed { addr: addr.to_string(), source };

    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    if let Err(e) = socket.set_recv_buffer_size(recv_buffer) {
        tracing::warn!("Could not set receive buffer to {} bytes on {}: {}", recv_buffer, addr, e);
    }
    socket.set_nonblocking(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;

    let std_socket: std::net::UdpSocket = socket.into();
    tokio::net::UdpSocket::from_std(std_socket).map_err(bind_err)
}
