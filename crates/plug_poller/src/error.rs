//! Falhas de um ciclo de polling.
//!
//! Todas são locais ao ciclo: o loop registra e segue para o próximo tick.

use plug_core::codec::CodecError;
use plug_core::telemetry::TelemetryError;
use std::fmt;
use std::io;

/// Classe da falha, para logs e para a decisão de fail-fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    DeviceUnreachable,
    Protocol,
    FieldMissing,
    DeviceError,
    CollectorUnreachable,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::DeviceUnreachable => "device_unreachable",
            FailureKind::Protocol => "protocol",
            FailureKind::FieldMissing => "field_missing",
            FailureKind::DeviceError => "device_error",
            FailureKind::CollectorUnreachable => "collector_unreachable",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Tomada {addr} inacessível ({phase}): {source}")]
    DeviceUnreachable {
        addr: String,
        phase: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Frame inválido de {addr}: {source}")]
    Frame {
        addr: String,
        #[source]
        source: CodecError,
    },

    #[error("Resposta inválida de {addr}: {source}")]
    Payload {
        addr: String,
        #[source]
        source: TelemetryError,
    },

    #[error("Coletor {addr} inacessível ({phase}): {source}")]
    CollectorUnreachable {
        addr: String,
        phase: &'static str,
        #[source]
        source: io::Error,
    },
}

impl PollError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PollError::DeviceUnreachable { .. } => FailureKind::DeviceUnreachable,
            PollError::Frame { .. } => FailureKind::Protocol,
            PollError::Payload { source, .. } => match source {
                TelemetryError::FieldMissing(_) => FailureKind::FieldMissing,
                TelemetryError::Device { .. } => FailureKind::DeviceError,
                TelemetryError::Literal(_) | TelemetryError::Structure(_) => FailureKind::Protocol,
            },
            PollError::CollectorUnreachable { .. } => FailureKind::CollectorUnreachable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_errors_are_classified() {
        let missing = PollError::Payload {
            addr: "10.0.0.7:9999".into(),
            source: TelemetryError::FieldMissing("current_ma"),
        };
        assert_eq!(missing.kind(), FailureKind::FieldMissing);

        let structure = PollError::Payload {
            addr: "10.0.0.7:9999".into(),
            source: TelemetryError::Structure("emeter"),
        };
        assert_eq!(structure.kind(), FailureKind::Protocol);
    }

    #[test]
    fn message_carries_address_and_phase() {
        let err = PollError::DeviceUnreachable {
            addr: "10.0.0.7:9999".into(),
            phase: "connect",
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        let msg = err.to_string();
        assert!(msg.contains("10.0.0.7:9999"));
        assert!(msg.contains("connect"));
        assert_eq!(err.kind(), FailureKind::DeviceUnreachable);
    }
}
