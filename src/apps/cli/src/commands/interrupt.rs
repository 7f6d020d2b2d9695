//! Ctrl-C handling shared by every command.
//!
//! One listener per process. While a stream is armed, Ctrl-C cancels it; with
//! nothing armed, Ctrl-C exits the way an unhandled SIGINT would.

use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const SIGINT_EXIT_CODE: i32 = 130;

#[derive(Default)]
struct Armed {
    generation: u64,
    token: Option<CancellationToken>,
}

#[derive(Clone, Default)]
pub struct Interrupts {
    armed: Arc<Mutex<Armed>>,
}

impl Interrupts {
    /// Installs the process-wide listener. Call once, inside the runtime.
    pub fn install() -> Self {
        let interrupts = Self::default();
        let listener = interrupts.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !listener.interrupt() {
                    eprintln!();
                    std::process::exit(SIGINT_EXIT_CODE);
                }
            }
        });
        interrupts
    }

    /// Token for one stream; Ctrl-C cancels it until the guard drops.
    pub fn arm(&self) -> ArmedStream {
        let token = CancellationToken::new();
        let mut generation = 0;
        if let Ok(mut armed) = self.armed.lock() {
            armed.generation += 1;
            armed.token = Some(token.clone());
            generation = armed.generation;
        }
        ArmedStream {
            token,
            generation,
            interrupts: self.clone(),
        }
    }

    /// Cancels the armed stream. False when nothing was armed.
    fn interrupt(&self) -> bool {
        let token = self.armed.lock().ok().and_then(|mut armed| armed.token.take());
        match token {
            Some(token) => {
                debug!("Interrupt received, cancelling stream");
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn disarm(&self, generation: u64) {
        if let Ok(mut armed) = self.armed.lock() {
            if armed.generation == generation {
                armed.token = None;
            }
        }
    }
}

pub struct ArmedStream {
    token: CancellationToken,
    generation: u64,
    interrupts: Interrupts,
}

impl ArmedStream {
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for ArmedStream {
    fn drop(&mut self) {
        self.interrupts.disarm(self.generation);
    }
}
