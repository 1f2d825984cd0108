//! Envio das métricas ao coletor Graphite (plaintext, porta 2003).
//!
//! Nova conexão a cada ciclo, sem pool. O socket é liberado no drop em
//! qualquer caminho de saída.

use crate::error::PollError;
use crate::net;
use plug_core::config::CollectorConfig;
use plug_core::metrics::MetricRecord;
use std::io::{self, Write};
use std::net::Shutdown;
use std::time::Duration;
use tracing::debug;

pub struct Forwarder {
    addr: String,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            addr: config.addr(),
            timeout: config.timeout(),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Escreve uma linha por registro.
    pub fn forward(&self, records: &[MetricRecord]) -> Result<(), PollError> {
        let mut stream =
            net::connect(&self.addr, self.timeout).map_err(|e| self.unreachable("connect", e))?;
        stream
            .set_write_timeout(Some(self.timeout))
            .map_err(|e| self.unreachable("connect", e))?;

        for record in records {
            stream
                .write_all(record.to_line().as_bytes())
                .map_err(|e| self.unreachable("send", e))?;
        }
        stream.flush().map_err(|e| self.unreachable("send", e))?;
        let _ = stream.shutdown(Shutdown::Write);

        debug!("{} métricas enviadas para {}", records.len(), self.addr);
        Ok(())
    }

    fn unreachable(&self, phase: &'static str, source: io::Error) -> PollError {
        PollError::CollectorUnreachable {
            addr: self.addr.clone(),
            phase,
            source,
        }
    }
}
