//! Loop de polling de uma tomada.
//!
//! Cada ciclo: consulta → interpretação → envio ao coletor, em sequência.
//! O agendamento é de taxa fixa (`crossbeam_channel::tick`): o próximo
//! ciclo não depende da duração do anterior. Ticks perdidos enquanto um
//! ciclo demora são coalescidos, então nunca há dois ciclos da mesma
//! tomada em andamento.
//!
//! O shutdown só é observado entre ciclos; um ciclo iniciado termina (ou
//! estoura os timeouts dos sockets) antes de o loop sair.

use crate::client::DeviceClient;
use crate::error::PollError;
use crate::forwarder::Forwarder;
use crate::shutdown::ShutdownSignal;
use crossbeam_channel::{select, tick};
use plug_core::command::Command;
use plug_core::config::{CollectorConfig, DeviceConfig, PollConfig};
use plug_core::metrics::{MetricRecord, unix_timestamp};
use plug_core::telemetry::{TelemetryReading, parse_realtime};
use std::time::Duration;
use tracing::{info, warn};

/// Resultado de um ciclo.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Leitura enviada ao coletor
    Forwarded(TelemetryReading),
    /// Comando que não é de energia: resposta apenas registrada no log
    Replied(String),
    Failed(PollError),
}

/// Contadores de um loop encerrado.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    pub forwarded: u64,
    pub failed: u64,
}

pub struct Poller {
    name: String,
    series_prefix: String,
    command: Command,
    interval: Duration,
    fail_fast: bool,
    client: DeviceClient,
    forwarder: Forwarder,
}

impl Poller {
    pub fn new(poll: &PollConfig, device: &DeviceConfig, collector: &CollectorConfig) -> Self {
        Self {
            name: device.name.clone(),
            series_prefix: device.series_prefix.clone(),
            command: poll.command,
            interval: poll.interval(),
            fail_fast: poll.fail_fast,
            client: DeviceClient::new(device),
            forwarder: Forwarder::new(collector),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executa um ciclo completo e registra o resultado no log.
    pub fn run_cycle(&self) -> CycleOutcome {
        let outcome = match self.cycle() {
            Ok(outcome) => outcome,
            Err(e) => CycleOutcome::Failed(e),
        };

        match &outcome {
            CycleOutcome::Forwarded(r) => info!(
                "[{}] {:.1} V | {:.3} A | {:.1} W → {}",
                self.name,
                r.voltage_v,
                r.current_a,
                r.power_w,
                self.forwarder.addr()
            ),
            CycleOutcome::Replied(text) => {
                info!("[{}] {} ← {}", self.name, self.command, text)
            }
            CycleOutcome::Failed(e) => warn!(
                device = %self.name,
                kind = %e.kind(),
                "Ciclo descartado: {e}"
            ),
        }
        outcome
    }

    fn cycle(&self) -> Result<CycleOutcome, PollError> {
        let text = self.client.query_text(self.command)?;
        if self.command != Command::Energy {
            return Ok(CycleOutcome::Replied(text));
        }

        let reading = parse_realtime(&text).map_err(|source| PollError::Payload {
            addr: self.client.addr().to_string(),
            source,
        })?;
        let records = MetricRecord::from_reading(&self.series_prefix, &reading, unix_timestamp());
        self.forwarder.forward(&records)?;
        Ok(CycleOutcome::Forwarded(reading))
    }

    /// Roda até o shutdown (ou `max_cycles`). O primeiro ciclo é imediato.
    ///
    /// Com `fail_fast`, a primeira falha encerra o loop com erro.
    pub fn run(
        &self,
        shutdown: &ShutdownSignal,
        max_cycles: Option<u64>,
    ) -> Result<LoopStats, PollError> {
        let ticker = tick(self.interval);
        let mut stats = LoopStats::default();

        info!(
            "[{}] polling {} a cada {:.1}s",
            self.name,
            self.client.addr(),
            self.interval.as_secs_f64()
        );

        while !shutdown.is_triggered() {
            stats.cycles += 1;
            match self.run_cycle() {
                CycleOutcome::Failed(e) => {
                    stats.failed += 1;
                    if self.fail_fast {
                        return Err(e);
                    }
                }
                CycleOutcome::Forwarded(_) => stats.forwarded += 1,
                CycleOutcome::Replied(_) => {}
            }

            if max_cycles.is_some_and(|max| stats.cycles >= max) {
                break;
            }

            let stop = select! {
                recv(ticker) -> _ => false,
                recv(shutdown.receiver()) -> _ => true,
            };
            if stop {
                break;
            }
        }

        info!(
            "[{}] encerrado: {} ciclos, {} enviados, {} falhas",
            self.name, stats.cycles, stats.forwarded, stats.failed
        );
        Ok(stats)
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::shutdown;
    use plug_core::codec;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    const REALTIME: &str = r#"{"emeter":{"get_realtime":{"voltage_mv":230000,"current_ma":6.5,"power_mw":1500,"total_wh":42,"err_code":0}}}"#;

    /// Tomada falsa que responde sempre `reply` e avisa o instante de cada consulta.
    fn fake_plug(reply: &'static str) -> (u16, mpsc::Receiver<Instant>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for sock in listener.incoming() {
                let Ok(mut sock) = sock else { break };
                let mut header = [0u8; 4];
                if sock.read_exact(&mut header).is_err() {
                    continue;
                }
                let mut body = vec![0u8; codec::frame_len(&header)];
                if sock.read_exact(&mut body).is_err() {
                    continue;
                }
                let _ = sock.write_all(&codec::encode_frame(reply.as_bytes()));
                if tx.send(Instant::now()).is_err() {
                    break;
                }
            }
        });
        (port, rx)
    }

    /// Coletor falso: cada conexão vira uma String com tudo que chegou.
    fn fake_collector() -> (u16, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for sock in listener.incoming() {
                let Ok(mut sock) = sock else { break };
                let mut received = String::new();
                let _ = sock.read_to_string(&mut received);
                if tx.send(received).is_err() {
                    break;
                }
            }
        });
        (port, rx)
    }

    fn poller(device_port: u16, collector_port: u16, interval_secs: f64) -> Poller {
        let poll = PollConfig {
            interval_secs,
            ..PollConfig::default()
        };
        let device = DeviceConfig {
            name: "teste".into(),
            host: "127.0.0.1".into(),
            port: device_port,
            connect_timeout_secs: 2.0,
            io_timeout_secs: 2.0,
            series_prefix: "casa.tv".into(),
        };
        let collector = CollectorConfig {
            host: "127.0.0.1".into(),
            port: collector_port,
            timeout_secs: 2.0,
        };
        Poller::new(&poll, &device, &collector)
    }

    fn closed_port() -> u16 {
        TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[test]
    fn one_cycle_sends_three_lines() {
        let (plug_port, _queries) = fake_plug(REALTIME);
        let (collector_port, lines) = fake_collector();

        let before = unix_timestamp();
        let outcome = poller(plug_port, collector_port, 10.0).run_cycle();
        let after = unix_timestamp();
        assert!(matches!(outcome, CycleOutcome::Forwarded(_)));

        let received = lines.recv_timeout(Duration::from_secs(5)).unwrap();
        let lines: Vec<&str> = received.lines().collect();
        assert_eq!(lines.len(), 3);

        let expected = [
            ("casa.tv.voltage", 230.0),
            ("casa.tv.current", 0.0065),
            ("casa.tv.power", 1.5),
        ];
        for (line, (name, value)) in lines.iter().zip(expected) {
            let parts: Vec<&str> = line.split(' ').collect();
            assert_eq!(parts.len(), 3, "linha: {line:?}");
            assert_eq!(parts[0], name);
            assert!((parts[1].parse::<f64>().unwrap() - value).abs() < 1e-9);
            let ts: u64 = parts[2].parse().unwrap();
            assert!(ts >= before && ts <= after);
        }
    }

    #[test]
    fn missing_field_forwards_nothing() {
        let (plug_port, _queries) =
            fake_plug(r#"{"emeter":{"get_realtime":{"voltage_mv":230000,"power_mw":1500}}}"#);
        let (collector_port, lines) = fake_collector();

        match poller(plug_port, collector_port, 10.0).run_cycle() {
            CycleOutcome::Failed(e) => assert_eq!(e.kind(), FailureKind::FieldMissing),
            other => panic!("esperava falha, veio {other:?}"),
        }
        assert!(lines.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn unreachable_device_is_cycle_local() {
        let (collector_port, lines) = fake_collector();
        let p = poller(closed_port(), collector_port, 0.05);
        let (_trigger, signal) = shutdown::channel();

        let stats = p.run(&signal, Some(3)).unwrap();
        assert_eq!(
            stats,
            LoopStats {
                cycles: 3,
                forwarded: 0,
                failed: 3
            }
        );
        assert!(lines.try_recv().is_err());
    }

    #[test]
    fn unreachable_collector_is_reported() {
        let (plug_port, _queries) = fake_plug(REALTIME);
        match poller(plug_port, closed_port(), 10.0).run_cycle() {
            CycleOutcome::Failed(e) => assert_eq!(e.kind(), FailureKind::CollectorUnreachable),
            other => panic!("esperava falha, veio {other:?}"),
        }
    }

    #[test]
    fn fail_fast_stops_on_first_failure() {
        let mut p = poller(closed_port(), closed_port(), 0.05);
        p.fail_fast = true;
        let (_trigger, signal) = shutdown::channel();
        let err = p.run(&signal, Some(5)).unwrap_err();
        assert_eq!(err.kind(), FailureKind::DeviceUnreachable);
    }

    #[test]
    fn n_ticks_make_n_queries_at_the_configured_period() {
        let (plug_port, queries) = fake_plug(REALTIME);
        let (collector_port, _lines) = fake_collector();
        let period = Duration::from_millis(200);
        let p = poller(plug_port, collector_port, period.as_secs_f64());
        let (_trigger, signal) = shutdown::channel();

        let stats = p.run(&signal, Some(4)).unwrap();
        assert_eq!(stats.cycles, 4);
        assert_eq!(stats.forwarded, 4);

        let stamps: Vec<Instant> = (0..4)
            .map(|_| queries.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert!(queries.recv_timeout(Duration::from_millis(300)).is_err());
        for pair in stamps.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(
                gap >= Duration::from_millis(120) && gap <= Duration::from_millis(600),
                "intervalo fora da tolerância: {gap:?}"
            );
        }
    }

    #[test]
    fn shutdown_stops_the_loop_between_cycles() {
        let (plug_port, queries) = fake_plug(REALTIME);
        let (collector_port, _lines) = fake_collector();
        let p = poller(plug_port, collector_port, 30.0);
        let (trigger, signal) = shutdown::channel();

        let worker = thread::spawn(move || p.run(&signal, None));
        queries.recv_timeout(Duration::from_secs(5)).unwrap();
        trigger.trigger();

        let stats = worker.join().unwrap().unwrap();
        assert_eq!(stats.cycles, 1);
    }

    #[test]
    fn non_energy_command_is_only_logged() {
        let (plug_port, _queries) = fake_plug(r#"{"system":{"set_relay_state":{"err_code":0}}}"#);
        let (collector_port, lines) = fake_collector();
        let mut p = poller(plug_port, collector_port, 10.0);
        p.command = Command::On;

        assert!(matches!(p.run_cycle(), CycleOutcome::Replied(_)));
        assert!(lines.recv_timeout(Duration::from_millis(300)).is_err());
    }
}
