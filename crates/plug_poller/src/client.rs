//! Cliente TCP da tomada.
//!
//! Uma conexão por consulta: conecta, envia o frame do comando, lê o
//! cabeçalho de 4 bytes e exatamente o corpo declarado, decodifica.
//! Conexão, leitura e escrita têm timeout para não travar o agendamento.

use crate::error::PollError;
use crate::net;
use plug_core::codec::{self, CodecError, HEADER_SIZE, MAX_FRAME_LEN};
use plug_core::command::Command;
use plug_core::config::DeviceConfig;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;
use tracing::debug;

pub struct DeviceClient {
    addr: String,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl DeviceClient {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            addr: config.addr(),
            connect_timeout: config.connect_timeout(),
            io_timeout: config.io_timeout(),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Envia `command` e devolve o payload decodificado.
    pub fn query(&self, command: Command) -> Result<Vec<u8>, PollError> {
        let mut stream = net::connect(&self.addr, self.connect_timeout)
            .map_err(|e| self.unreachable("connect", e))?;
        stream
            .set_read_timeout(Some(self.io_timeout))
            .and_then(|_| stream.set_write_timeout(Some(self.io_timeout)))
            .map_err(|e| self.unreachable("connect", e))?;

        let request = codec::encode_frame(command.payload().as_bytes());
        stream
            .write_all(&request)
            .map_err(|e| self.unreachable("write", e))?;
        debug!("→ {} ({} bytes) para {}", command, request.len(), self.addr);

        let frame = self.read_frame(&mut stream)?;
        let _ = stream.shutdown(Shutdown::Both);
        debug!("← {} bytes de {}", frame.len(), self.addr);

        codec::decode_frame(&frame).map_err(|source| PollError::Frame {
            addr: self.addr.clone(),
            source,
        })
    }

    /// Como [`query`](Self::query), mas devolve o texto (UTF-8 com perdas).
    pub fn query_text(&self, command: Command) -> Result<String, PollError> {
        let payload = self.query(command)?;
        Ok(String::from_utf8_lossy(&payload).into_owned())
    }

    fn read_frame(&self, stream: &mut TcpStream) -> Result<Vec<u8>, PollError> {
        let mut frame = Vec::with_capacity(2048);
        read_up_to(stream, &mut frame, HEADER_SIZE).map_err(|e| self.unreachable("read", e))?;
        if frame.len() < HEADER_SIZE {
            return Err(self.bad_frame(CodecError::TooShort(frame.len())));
        }

        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&frame);
        let declared = codec::frame_len(&header);
        if declared > MAX_FRAME_LEN {
            return Err(self.bad_frame(CodecError::Oversized(declared)));
        }

        read_up_to(stream, &mut frame, declared).map_err(|e| self.unreachable("read", e))?;
        Ok(frame)
    }

    fn unreachable(&self, phase: &'static str, source: io::Error) -> PollError {
        PollError::DeviceUnreachable {
            addr: self.addr.clone(),
            phase,
            source,
        }
    }

    fn bad_frame(&self, source: CodecError) -> PollError {
        PollError::Frame {
            addr: self.addr.clone(),
            source,
        }
    }
}

/// Lê até `want` bytes ou EOF, anexando em `buf`.
fn read_up_to(stream: &mut TcpStream, buf: &mut Vec<u8>, want: usize) -> io::Result<()> {
    stream.take(want as u64).read_to_end(buf)?;
    Ok(())
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
