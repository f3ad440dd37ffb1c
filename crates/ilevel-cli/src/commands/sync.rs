use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use ilevel_engine::emitter::JsonLinesEmitter;
use ilevel_engine::resolve::create_state_backend;
use ilevel_engine::transport::ReplayTransport;
use ilevel_engine::{prepare, run_sync};

/// Execute the `sync` command: parse, validate, and run every selected stream.
pub fn execute(config_path: &Path, replay_path: &Path, state: Option<PathBuf>) -> Result<()> {
    // 1. Parse config YAML
    let config = super::load_config(config_path, state)?;

    // 2. Validate
    let settings = prepare(&config)?;
    tracing::info!(
        streams = settings.streams.len(),
        max_span_days = settings.max_span_days.get(),
        max_id_batch_size = settings.max_id_batch_size.get(),
        state_backend = config.state.backend.as_str(),
        "Config validated"
    );

    // 3. Wire collaborators
    let transport = ReplayTransport::from_path(replay_path)?;
    let backend = create_state_backend(&config.state)?;
    let stdout = io::stdout();
    let mut emitter = JsonLinesEmitter::new(BufWriter::new(stdout.lock()));

    // 4. Run
    let result = run_sync(&settings, &transport, &mut emitter, backend)?;
    emitter
        .into_inner()
        .into_inner()
        .map_err(io::IntoInnerError::into_error)
        .context("Failed to flush output")?;

    eprintln!("Sync completed in {:.2}s.", result.duration_secs);
    for stream in &result.streams {
        let tally = &stream.tally;
        eprintln!(
            "  {:26} {:>8} emitted {:>6} filtered {:>4} failed records {:>4} failed units",
            stream.stream.as_str(),
            tally.emitted,
            tally.filtered,
            tally.failed_records,
            tally.failed_units,
        );
    }
    let totals = result.totals();
    if totals.has_failures() {
        tracing::warn!(
            failed_records = totals.failed_records,
            failed_units = totals.failed_units,
            "Some units or records failed; their data is missing from this run"
        );
    }
    Ok(())
}
