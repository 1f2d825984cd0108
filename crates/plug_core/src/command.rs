//! Tabela fixa de comandos da tomada.
//!
//! Cada comando é um literal JSON `{módulo: {ação: {params}}}` imutável.
//! Só o que está aqui pode ser enviado; nada de chave arbitrária vinda de fora.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Comandos conhecidos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Info,
    On,
    Off,
    LedOn,
    LedOff,
    CloudInfo,
    WlanScan,
    Time,
    Schedule,
    Countdown,
    AntiTheft,
    Reboot,
    Reset,
    #[default]
    Energy,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Comando desconhecido: {0:?}")]
pub struct UnknownCommand(pub String);

impl Command {
    pub const ALL: [Command; 14] = [
        Command::Info,
        Command::On,
        Command::Off,
        Command::LedOn,
        Command::LedOff,
        Command::CloudInfo,
        Command::WlanScan,
        Command::Time,
        Command::Schedule,
        Command::Countdown,
        Command::AntiTheft,
        Command::Reboot,
        Command::Reset,
        Command::Energy,
    ];

    /// Nome curto usado na CLI e no config.
    pub fn name(self) -> &'static str {
        match self {
            Command::Info => "info",
            Command::On => "on",
            Command::Off => "off",
            Command::LedOn => "ledon",
            Command::LedOff => "ledoff",
            Command::CloudInfo => "cloudinfo",
            Command::WlanScan => "wlanscan",
            Command::Time => "time",
            Command::Schedule => "schedule",
            Command::Countdown => "countdown",
            Command::AntiTheft => "antitheft",
            Command::Reboot => "reboot",
            Command::Reset => "reset",
            Command::Energy => "energy",
        }
    }

    /// Só consulta, não altera o estado da tomada.
    pub fn is_read_only(self) -> bool {
        !matches!(
            self,
            Command::On
                | Command::Off
                | Command::LedOn
                | Command::LedOff
                | Command::Reboot
                | Command::Reset
        )
    }

    /// Payload JSON enviado ao dispositivo.
    pub fn payload(self) -> &'static str {
        match self {
            Command::Info => r#"{"system":{"get_sysinfo":{}}}"#,
            Command::On => r#"{"system":{"set_relay_state":{"state":1}}}"#,
            Command::Off => r#"{"system":{"set_relay_state":{"state":0}}}"#,
            Command::LedOn => r#"{"system":{"set_led_off":{"off":0}}}"#,
            Command::LedOff => r#"{"system":{"set_led_off":{"off":1}}}"#,
            Command::CloudInfo => r#"{"cnCloud":{"get_info":{}}}"#,
            Command::WlanScan => r#"{"netif":{"get_scaninfo":{"refresh":0}}}"#,
            Command::Time => r#"{"time":{"get_time":{}}}"#,
            Command::Schedule => r#"{"schedule":{"get_rules":{}}}"#,
            Command::Countdown => r#"{"count_down":{"get_rules":{}}}"#,
            Command::AntiTheft => r#"{"anti_theft":{"get_rules":{}}}"#,
            Command::Reboot => r#"{"system":{"reboot":{"delay":1}}}"#,
            Command::Reset => r#"{"system":{"reset":{"delay":1}}}"#,
            Command::Energy => r#"{"emeter":{"get_realtime":{}}}"#,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Command::ALL
            .into_iter()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}
