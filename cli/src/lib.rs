//! Helpers for the `timedbuf-demo` binary

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use timedbuf::TimedBufferConfig;

/// Config used when no file is given: 10 lines or 1 second
#[must_use]
pub fn default_config() -> TimedBufferConfig {
    TimedBufferConfig::new(10, 1).with_thread_name("demo-buffer")
}

/// Parse a JSON config, e.g. `{"capacity": 5, "flush_interval_secs": 0.5}`
pub fn parse_config(reader: impl Read) -> Result<TimedBufferConfig, Box<dyn std::error::Error>> {
    let config: TimedBufferConfig = serde_json::from_reader(reader)?;
    config.validate()?;
    Ok(config)
}

/// Load the config from `path`, or fall back to [`default_config`]
pub fn load_config(path: Option<&Path>) -> Result<TimedBufferConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let file = std::fs::File::open(path)
                .map_err(|e| format!("cannot open {}: {e}", path.display()))?;
            parse_config(std::io::BufReader::new(file))
        }
        None => Ok(default_config()),
    }
}

/// Render one flushed batch: a header line, then one indented line per item
#[must_use]
pub fn format_batch(number: usize, batch: &[String], elapsed: Duration) -> String {
    let mut out = format!(
        "batch {number}: {} items (+{}ms)\n",
        batch.len(),
        elapsed.as_millis()
    );
    for line in batch {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
    out
}
