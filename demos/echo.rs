//! Echo server.
//!
//! Accepts connections on port 7878 (or the port given as the first
//! argument) and echoes back whatever each client sends.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=pulsar=debug cargo run --example echo -- 7878
//! nc localhost 7878
//! ```

use pulsar::{Connection, Detail, Fault, Protocol, ServerBuilder, Signal};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Echoes everything read since the previous pulse, keeping unsent bytes
/// for the next one.
#[derive(Default)]
struct Echo {
    pending: Vec<u8>,
}

impl Protocol for Echo {
    fn ready(&mut self, connection: &Connection, _: &Detail) -> Result<Signal, Fault> {
        connection.read_into(&mut self.pending, 64 * 1024)?;

        if !self.pending.is_empty() {
            connection.write_consume(&mut self.pending, usize::MAX)?;
        }

        Ok(Signal::CONTINUE)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pulsar=info")),
        )
        .init();

    let port = match std::env::args().nth(1) {
        Some(port) => port.parse()?,
        None => 7878,
    };

    let mut server = ServerBuilder::new()
        .port(port)
        .master_thread(false)
        .pulse_interval(Duration::from_millis(20))
        .build(Echo::default)?;

    println!("Echo server listening on {:?}", server.local_addr());
    println!("Press Ctrl+C to stop the server");

    server.master(|| true);

    Ok(())
}
