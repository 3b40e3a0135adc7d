//! timedbuf-demo: batch stdin lines through a `TimedBuffer`
//!
//! Usage: `timedbuf-demo [CONFIG.json] < input`
//!
//! Every non-empty line is added to the buffer. Batches are printed as they
//! are flushed (by size or by timer); at EOF the rest is flushed and the
//! buffer closed. Set `RUST_LOG=timedbuf=trace` to watch the event loop.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use timedbuf::TimedBuffer;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = cli::load_config(config_path.as_deref())?;
    info!(
        capacity = config.capacity,
        interval = ?config.flush_interval,
        "starting demo buffer"
    );

    let started = Instant::now();
    let mut batch_number = 0;
    let buffer = TimedBuffer::with_config(config, move |batch: Vec<String>| {
        batch_number += 1;
        let text = cli::format_batch(batch_number, &batch, started.elapsed());
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    })?;

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        buffer.add(trimmed.to_string())?;
    }

    buffer.flush()?;
    buffer.close()?;

    let stats = buffer.stats();
    info!(
        lines = stats.items_accepted,
        batches = stats.total_flushes(),
        by_size = stats.size_flushes,
        by_timer = stats.timer_flushes,
        "input finished"
    );
    Ok(())
}
