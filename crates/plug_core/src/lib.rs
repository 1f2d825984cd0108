//! # Plug Core
//!
//! Crate compartilhada com o protocolo da tomada inteligente (HS100/HS110),
//! a tabela de comandos, a interpretação das leituras do medidor e a
//! configuração TOML. Não faz I/O de rede.
//!
//! ## Módulos
//! - [`codec`] – Ofuscação XOR autossincronizante + prefixo de tamanho
//! - [`command`] – Comandos conhecidos e seus payloads JSON
//! - [`literal`] – Parser tolerante para o texto de resposta
//! - [`telemetry`] – Extração de potência/tensão/corrente
//! - [`metrics`] – Linhas do protocolo plaintext do Graphite
//! - [`config`] – Configuração unificada via TOML

pub mod codec;
pub mod command;
pub mod config;
pub mod literal;
pub mod metrics;
pub mod telemetry;

// Re-exports convenientes
pub use codec::{CodecError, decode_frame, encode_frame};
pub use command::Command;
pub use config::{AppConfig, CollectorConfig, DeviceConfig, PollConfig};
pub use metrics::MetricRecord;
pub use telemetry::{TelemetryError, TelemetryReading, parse_realtime};
