//! Conexão TCP com timeout sobre nomes resolvidos.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Tenta cada endereço resolvido de `addr` até um aceitar a conexão.
pub fn connect(addr: &str, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for sock_addr in addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&sock_addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, format!("{addr} não resolve"))
    }))
}
