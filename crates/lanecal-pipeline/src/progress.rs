//! Terminal spinner shown while the vision executable runs.
//!
//! Purely cosmetic: the spinner owns no calibration state and the only thing
//! shared with the caller is the stop flag.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const SYMBOLS: [&str; 2] = ["./", ".\\"];
const TICK: Duration = Duration::from_millis(500);

pub struct Spinner {
    message: String,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Spinner {
    /// Start animating `message` on stdout.
    pub fn start(message: impl Into<String>) -> Self {
        let message = message.into();
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = Arc::clone(&stop);
            let message = message.clone();
            thread::spawn(move || {
                let mut out = io::stdout();
                for symbol in SYMBOLS.iter().cycle() {
                    if stop.load(Ordering::Acquire) {
                        break;
                    }
                    let _ = write!(out, "\r{message} {symbol}");
                    let _ = out.flush();
                    thread::park_timeout(TICK);
                }
            })
        };
        Self {
            message,
            stop,
            handle: Some(handle),
        }
    }

    /// Stop the animation and print `<message> [Done]`.
    pub fn finish(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.stop.store(true, Ordering::Release);
        handle.thread().unpark();
        let _ = handle.join();
        println!("\r{} [Done] ", self.message);
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.halt();
    }
}
