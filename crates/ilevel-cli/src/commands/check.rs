use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;

use ilevel_engine::resolve::{check_state_backend, create_state_backend};
use ilevel_engine::{plan_streams, prepare};
use ilevel_state::StateBackend as _;
use ilevel_types::state::SyncState;

/// Execute the `check` command: validate config and state, then print the plan.
pub fn execute(config_path: &Path, state: Option<PathBuf>) -> Result<()> {
    // 1. Parse config YAML
    let config = super::load_config(config_path, state)?;

    // 2. Validate
    let settings = prepare(&config)?;
    println!("Config:            OK");

    // 3. Check state backend
    let state_ok = check_state_backend(&config.state);
    if state_ok {
        println!("State backend:     OK");
    } else {
        println!("State backend:     FAILED");
    }

    // 4. Report the plan against whatever state could be read
    let state = if state_ok {
        create_state_backend(&config.state)?.load()?
    } else {
        SyncState::default()
    };
    let now = Utc::now().naive_utc();
    println!("\nStream plan (end {}):", settings.bounds(now).end_date());
    for plan in plan_streams(&settings, &state, now) {
        let resume = plan
            .resume_from
            .map_or_else(|| "-".to_string(), |wm| wm.to_string());
        println!(
            "  {:26} {:28} from {:22} {} unit(s)",
            plan.stream.as_str(),
            plan.strategy.as_str(),
            resume,
            plan.units
        );
    }

    if state_ok {
        println!("\nAll checks passed.");
        Ok(())
    } else {
        anyhow::bail!("One or more checks failed")
    }
}
