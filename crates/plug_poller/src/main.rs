//! # Plug Poller
//!
//! Consulta o medidor de energia de tomadas inteligentes (HS110) em
//! intervalos fixos e repassa tensão, corrente e potência para um coletor
//! Graphite pelo protocolo plaintext.
//!
//! ## Uso
//! ```bash
//! plug_poller                          # Loop contínuo com config.toml ao lado do executável
//! plug_poller --config /etc/plug.toml  # Config explícito
//! plug_poller --once                   # Um ciclo por tomada e sai
//! plug_poller --send info              # Envia um comando e imprime a resposta
//! plug_poller --list-commands
//! ```

mod client;
mod error;
mod forwarder;
mod net;
mod poll_loop;
mod shutdown;

use clap::Parser;
use client::DeviceClient;
use crossbeam_channel::unbounded;
use error::PollError;
use plug_core::command::Command;
use plug_core::config::AppConfig;
use plug_core::literal::parse_literal;
use poll_loop::{LoopStats, Poller};
use shutdown::ShutdownTrigger;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(version, about = "Relay de telemetria de tomadas HS110 para Graphite")]
struct Cli {
    /// Caminho do config.toml (padrão: ao lado do executável)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Executa um único ciclo por tomada e sai
    #[arg(long)]
    once: bool,

    /// Envia um comando à primeira tomada e imprime a resposta decodificada
    #[arg(long, value_name = "COMANDO")]
    send: Option<Command>,

    /// Lista os comandos conhecidos
    #[arg(long)]
    list_commands: bool,
}

fn main() -> ExitCode {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    if cli.list_commands {
        for cmd in Command::ALL {
            println!("{:<10} {}", cmd.name(), cmd.payload());
        }
        return ExitCode::SUCCESS;
    }

    // ── Carregar config ──
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Config inválida: {e}");
        }
        return ExitCode::FAILURE;
    }

    if let Some(command) = cli.send {
        return send_once(&config, command);
    }

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ⚡ PLUG POLLER – ATIVO");
    println!("══════════════════════════════════════════════");
    for dev in &config.devices {
        println!("  Tomada:    {} ({}) → {}", dev.name, dev.addr(), dev.series_prefix);
    }
    println!("  Coletor:   {}", config.collector.addr());
    println!("  Intervalo: {:.1}s", config.poll.interval_secs);
    println!("  Comando:   {}", config.poll.command);
    println!("══════════════════════════════════════════════");
    println!();

    let (trigger, signal) = shutdown::channel();
    spawn_signal_listener(trigger.clone());

    let max_cycles = cli.once.then_some(1);
    let (done_tx, done_rx) = unbounded::<(String, Result<LoopStats, PollError>)>();

    let mut workers = Vec::new();
    for dev in &config.devices {
        let poller = Poller::new(&config.poll, dev, &config.collector);
        let signal = signal.clone();
        let done_tx = done_tx.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("poll-{}", dev.name))
            .spawn(move || {
                let result = poller.run(&signal, max_cycles);
                let _ = done_tx.send((poller.name().to_string(), result));
            });
        match spawned {
            Ok(handle) => workers.push(handle),
            Err(e) => {
                error!("Falha ao criar thread para {}: {e}", dev.name);
                trigger.trigger();
                return ExitCode::FAILURE;
            }
        }
    }
    drop(done_tx);

    // ── Aguarda os loops; em fail-fast, a primeira falha derruba todos ──
    let mut failed = false;
    for (name, result) in done_rx.iter() {
        if let Err(e) = result {
            error!("[{name}] fail-fast: {e}");
            failed = true;
            trigger.trigger();
        }
    }
    for handle in workers {
        let _ = handle.join();
    }

    if failed {
        ExitCode::FAILURE
    } else {
        info!("Encerrado.");
        ExitCode::SUCCESS
    }
}

/// Modo direto: um comando, uma resposta, sem coletor.
fn send_once(config: &AppConfig, command: Command) -> ExitCode {
    let Some(dev) = config.devices.first() else {
        error!("Nenhuma tomada configurada");
        return ExitCode::FAILURE;
    };

    let client = DeviceClient::new(dev);
    match client.query_text(command) {
        Ok(text) => {
            println!("Enviado  ({}): {}", command, command.payload());
            let pretty = parse_literal(&text)
                .ok()
                .and_then(|v| serde_json::to_string_pretty(&v).ok())
                .unwrap_or(text);
            println!("Recebido: {pretty}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(kind = %e.kind(), "{e}");
            ExitCode::FAILURE
        }
    }
}

// ──────────────────────────────────────────────
// Ctrl-C / SIGTERM
// ──────────────────────────────────────────────

/// Thread com um runtime tokio mínimo só para esperar o sinal.
fn spawn_signal_listener(trigger: ShutdownTrigger) {
    let spawned = std::thread::Builder::new()
        .name("signal".into())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    warn!("Sem tratamento de sinais: {e}");
                    return;
                }
            };
            rt.block_on(shutdown_signal());
            info!("Sinal recebido, encerrando após o ciclo em andamento...");
            trigger.trigger();
        });
    if let Err(e) = spawned {
        warn!("Falha ao criar thread de sinais: {e}");
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        tokio::select! {
            _ = ctrl_c() => {},
            _ = terminate() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await;
    }
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "Falha ao instalar handler de Ctrl+C");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(err) => {
            warn!(?err, "Falha ao instalar handler de SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}
