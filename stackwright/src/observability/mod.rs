//! Logging setup and operation timing.

use std::time::Instant;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_directive`. With `json` set,
/// events are written as one JSON object per line.
pub fn init_tracing(default_directive: &str, json: bool) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = if json {
        fmt::layer().with_target(false).json().boxed()
    } else {
        fmt::layer().with_target(false).boxed()
    };

    tracing_subscriber::registry().with(filter).with(layer).try_init()
}

/// Measures how long a named operation takes.
#[derive(Debug)]
pub struct OperationTimer {
    start: Instant,
    name: &'static str,
}

impl OperationTimer {
    /// Starts timing `name`.
    #[must_use]
    pub fn start(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    /// Returns the operation name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::start("up");
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10);
        assert_eq!(timer.name(), "up");
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init_tracing("stackwright=debug", false);
        assert!(init_tracing("stackwright=debug", true).is_err());
    }
}
