//! Leitura do medidor de energia (`emeter.get_realtime`).
//!
//! O firmware atual reporta em mili-unidades (`power_mw`, `voltage_mv`,
//! `current_ma`, `total_wh`). Revisões antigas do hardware mandam `power`,
//! `voltage`, `current` e `total` já em W/V/A/kWh; essas chaves são usadas
//! quando a versão em mili-unidades não existe.

use crate::literal::{LiteralError, parse_literal};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Uma leitura convertida para W, V, A e kWh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    /// Potência ativa (W)
    pub power_w: f64,
    /// Tensão RMS (V)
    pub voltage_v: f64,
    /// Corrente RMS (A)
    pub current_a: f64,
    /// Energia acumulada (kWh)
    pub total_kwh: Option<f64>,
    /// Código de erro reportado pelo dispositivo
    pub err_code: Option<i64>,
}

/// Erros ao interpretar a resposta.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TelemetryError {
    #[error(transparent)]
    Literal(#[from] LiteralError),

    #[error("Resposta sem {0}")]
    Structure(&'static str),

    #[error("Campo ausente ou não numérico: {0}")]
    FieldMissing(&'static str),

    #[error("Dispositivo retornou err_code {code}: {msg}")]
    Device { code: i64, msg: String },
}

/// Campo medido: chave em mili-unidade e chave legada em unidade cheia.
struct Field {
    milli: &'static str,
    legacy: &'static str,
}

const POWER: Field = Field {
    milli: "power_mw",
    legacy: "power",
};
const VOLTAGE: Field = Field {
    milli: "voltage_mv",
    legacy: "voltage",
};
const CURRENT: Field = Field {
    milli: "current_ma",
    legacy: "current",
};
const TOTAL: Field = Field {
    milli: "total_wh",
    legacy: "total",
};

impl Field {
    fn read(&self, realtime: &Value) -> Option<f64> {
        realtime
            .get(self.milli)
            .and_then(Value::as_f64)
            .map(|v| v / 1000.0)
            .or_else(|| realtime.get(self.legacy).and_then(Value::as_f64))
    }

    fn require(&self, realtime: &Value) -> Result<f64, TelemetryError> {
        self.read(realtime)
            .ok_or(TelemetryError::FieldMissing(self.milli))
    }
}

/// Interpreta o texto decodificado de uma resposta a `energy`.
pub fn parse_realtime(text: &str) -> Result<TelemetryReading, TelemetryError> {
    let root = parse_literal(text)?;
    if !root.is_object() {
        return Err(TelemetryError::Structure("objeto raiz"));
    }
    let emeter = root.get("emeter").ok_or(TelemetryError::Structure("emeter"))?;
    let realtime = emeter
        .get("get_realtime")
        .filter(|v| v.is_object())
        .ok_or(TelemetryError::Structure("emeter.get_realtime"))?;

    let err_code = realtime.get("err_code").and_then(Value::as_i64);
    if let Some(code) = err_code.filter(|&c| c != 0) {
        if POWER.read(realtime).is_none() {
            let msg = realtime
                .get("err_msg")
                .and_then(Value::as_str)
                .unwrap_or("sem mensagem")
                .to_string();
            return Err(TelemetryError::Device { code, msg });
        }
    }

    Ok(TelemetryReading {
        power_w: POWER.require(realtime)?,
        voltage_v: VOLTAGE.require(realtime)?,
        current_a: CURRENT.require(realtime)?,
        total_kwh: TOTAL.read(realtime),
        err_code,
    })
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn converts_milli_units() {
        let r = parse_realtime(
            r#"{"emeter":{"get_realtime":{"power_mw":1500,"voltage_mv":230000,"current_ma":6.5,"total_wh":12345,"err_code":0}}}"#,
        )
        .unwrap();
        assert!(approx(r.power_w, 1.5));
        assert!(approx(r.voltage_v, 230.0));
        assert!(approx(r.current_a, 0.0065));
        assert!(approx(r.total_kwh.unwrap(), 12.345));
        assert_eq!(r.err_code, Some(0));
    }

    #[test]
    fn accepts_python_literal_form() {
        let r = parse_realtime(
            "{'emeter': {'get_realtime': {'power_mw': 1500, 'voltage_mv': 230000, 'current_ma': 6.5}}}",
        )
        .unwrap();
        assert!(approx(r.voltage_v, 230.0));
        assert_eq!(r.total_kwh, None);
        assert_eq!(r.err_code, None);
    }

    #[test]
    fn legacy_hardware_keys() {
        let r = parse_realtime(
            r#"{"emeter":{"get_realtime":{"power":61.2,"voltage":229.4,"current":0.31,"total":0.05,"err_code":0}}}"#,
        )
        .unwrap();
        assert!(approx(r.power_w, 61.2));
        assert!(approx(r.voltage_v, 229.4));
        assert!(approx(r.current_a, 0.31));
        assert!(approx(r.total_kwh.unwrap(), 0.05));
    }

    #[test]
    fn missing_current_is_field_missing() {
        let err = parse_realtime(
            r#"{"emeter":{"get_realtime":{"power_mw":1500,"voltage_mv":230000}}}"#,
        )
        .unwrap_err();
        assert_eq!(err, TelemetryError::FieldMissing("current_ma"));
    }

    #[test]
    fn non_numeric_field_is_field_missing() {
        let err = parse_realtime(
            r#"{"emeter":{"get_realtime":{"power_mw":"n/a","voltage_mv":230000,"current_ma":10}}}"#,
        )
        .unwrap_err();
        assert_eq!(err, TelemetryError::FieldMissing("power_mw"));
    }

    #[test]
    fn device_error_is_reported() {
        let err = parse_realtime(
            r#"{"emeter":{"get_realtime":{"err_code":-1,"err_msg":"module not support"}}}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            TelemetryError::Device {
                code: -1,
                msg: "module not support".into()
            }
        );
    }

    #[test]
    fn wrong_structure() {
        assert_eq!(
            parse_realtime(r#"{"system":{"get_sysinfo":{}}}"#).unwrap_err(),
            TelemetryError::Structure("emeter")
        );
        assert_eq!(
            parse_realtime(r#"{"emeter":{"err_code":-2}}"#).unwrap_err(),
            TelemetryError::Structure("emeter.get_realtime")
        );
        assert_eq!(
            parse_realtime("[1, 2]").unwrap_err(),
            TelemetryError::Structure("objeto raiz")
        );
    }

    #[test]
    fn unparseable_text_is_literal_error() {
        assert!(matches!(
            parse_realtime("{\"emeter\": ").unwrap_err(),
            TelemetryError::Literal(_)
        ));
    }
}
