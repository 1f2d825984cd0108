//! Configuração unificada via TOML.
//!
//! Um único `config.toml` com o agendamento, as tomadas monitoradas e o
//! coletor Graphite. Campos ausentes caem no valor padrão.

use crate::command::Command;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Agendamento do loop de polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Período entre ciclos em segundos
    pub interval_secs: f64,
    /// Comando enviado a cada ciclo
    pub command: Command,
    /// Encerra o processo na primeira falha de ciclo
    pub fail_fast: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10.0,
            command: Command::Energy,
            fail_fast: false,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        secs_or(self.interval_secs, 10.0)
    }
}

/// Maior timeout aceito (segundos).
const MAX_TIMEOUT_SECS: f64 = 3600.0;

/// `Duration` a partir de segundos; valores que não cabem viram `fallback`.
fn secs_or(secs: f64, fallback: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or_else(|_| Duration::from_secs_f64(fallback))
}

fn valid_timeout(secs: f64) -> bool {
    secs.is_finite() && secs > 0.0 && secs <= MAX_TIMEOUT_SECS
}

/// Uma tomada monitorada.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Nome usado nos logs e no nome da thread
    pub name: String,
    /// IP da tomada
    pub host: String,
    /// Porta TCP (9999 no firmware)
    pub port: u16,
    /// Timeout de conexão (segundos)
    pub connect_timeout_secs: f64,
    /// Timeout de leitura/escrita (segundos)
    pub io_timeout_secs: f64,
    /// Prefixo das séries no Graphite
    pub series_prefix: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "hs110".into(),
            host: "192.168.1.230".into(),
            port: 9999,
            connect_timeout_secs: 10.0,
            io_timeout_secs: 10.0,
            series_prefix: "hs110-tv".into(),
        }
    }
}

impl DeviceConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        secs_or(self.connect_timeout_secs, 10.0)
    }

    pub fn io_timeout(&self) -> Duration {
        secs_or(self.io_timeout_secs, 10.0)
    }
}

/// Coletor Graphite (Carbon plaintext).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub host: String,
    pub port: u16,
    /// Timeout de conexão e escrita (segundos)
    pub timeout_secs: f64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 2003,
            timeout_secs: 5.0,
        }
    }
}

impl CollectorConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        secs_or(self.timeout_secs, 5.0)
    }
}

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub poll: PollConfig,
    pub devices: Vec<DeviceConfig>,
    pub collector: CollectorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            devices: vec![DeviceConfig::default()],
            collector: CollectorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !(0.5..=3600.0).contains(&self.poll.interval_secs) {
            errors.push(format!(
                "Intervalo de polling inválido: {} (0.5–3600.0)",
                self.poll.interval_secs
            ));
        }
        if !self.poll.command.is_read_only() {
            errors.push(format!(
                "Comando de polling {} altera o estado da tomada",
                self.poll.command
            ));
        }
        if self.devices.is_empty() {
            errors.push("Nenhuma tomada configurada".into());
        }

        let mut names = HashSet::new();
        for dev in &self.devices {
            if !names.insert(dev.name.as_str()) {
                errors.push(format!("Nome de tomada duplicado: {}", dev.name));
            }
            if dev.host.is_empty() {
                errors.push(format!("[{}] host vazio", dev.name));
            }
            if dev.port == 0 {
                errors.push(format!("[{}] porta não pode ser 0", dev.name));
            }
            if !valid_timeout(dev.connect_timeout_secs) || !valid_timeout(dev.io_timeout_secs) {
                errors.push(format!(
                    "[{}] timeouts devem estar em (0, {MAX_TIMEOUT_SECS}]",
                    dev.name
                ));
            }
            if dev.series_prefix.trim().is_empty() || dev.series_prefix.contains(' ') {
                errors.push(format!(
                    "[{}] prefixo de série inválido: {:?}",
                    dev.name, dev.series_prefix
                ));
            }
        }

        if self.collector.port == 0 {
            errors.push("Porta do coletor não pode ser 0".into());
        }
        if !valid_timeout(self.collector.timeout_secs) {
            errors.push(format!("Timeout do coletor deve estar em (0, {MAX_TIMEOUT_SECS}]"));
        }

        errors
    }
}
