//! Registros no protocolo de linha do Graphite/Carbon (porta 2003).
//!
//! Uma métrica por linha: `"<série> <valor> <timestamp unix>\n"`.

use crate::telemetry::TelemetryReading;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Um ponto de série temporal pronto para envio.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub name: String,
    pub value: f64,
    pub timestamp: u64,
}

impl MetricRecord {
    /// Os três registros de um ciclo, na ordem tensão, corrente, potência.
    pub fn from_reading(prefix: &str, reading: &TelemetryReading, timestamp: u64) -> [Self; 3] {
        let record = |suffix: &str, value: f64| MetricRecord {
            name: format!("{prefix}.{suffix}"),
            value,
            timestamp,
        };
        [
            record("voltage", reading.voltage_v),
            record("current", reading.current_a),
            record("power", reading.power_w),
        ]
    }

    /// Linha terminada em `\n`.
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MetricRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {} {}", self.name, self.value, self.timestamp)
    }
}

/// Segundos desde a época Unix (0 se o relógio estiver antes de 1970).
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
