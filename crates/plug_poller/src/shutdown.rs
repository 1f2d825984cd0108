//! Sinal de encerramento compartilhado entre as threads de polling.
//!
//! Ninguém envia nada pelo canal: disparar o gatilho descarta o último
//! `Sender`, e todo `recv` passa a retornar `Disconnected` imediatamente,
//! inclusive dentro de `select!`.

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use std::sync::{Arc, Mutex};

/// Lado que dispara o encerramento. Clonável; o primeiro disparo vale.
#[derive(Clone)]
pub struct ShutdownTrigger {
    tx: Arc<Mutex<Option<Sender<()>>>>,
}

/// Lado observado pelos loops.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: Receiver<()>,
}

pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = bounded::<()>(0);
    (
        ShutdownTrigger {
            tx: Arc::new(Mutex::new(Some(tx))),
        },
        ShutdownSignal { rx },
    )
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let mut guard = match self.tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take();
    }
}

impl ShutdownSignal {
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }
}
