//! Firmware TestKit - run the reference firmware under the simulator
//!
//! `firmware-testkit remote` reads key events from stdin, one cycle per
//! line. `firmware-testkit realtime` cycles against the wall clock until
//! the configured duration has passed or Ctrl-C is pressed.

use anyhow::{bail, Context, Result};
use std::io;
use std::sync::atomic::Ordering;

use firmware_testkit::{
    config::{Config, RunMode},
    firmware::{EchoFirmware, Keymap},
    HarnessError, Orchestrator, SessionReport, Simulator,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("using default configuration: {}", e);
        Config::default()
    });

    let mode = match std::env::args().nth(1).as_deref() {
        None => config.run.mode,
        Some("remote") => RunMode::RemoteControlled,
        Some("realtime") => RunMode::Realtime,
        Some(other) => bail!("unknown mode `{}`, expected `remote` or `realtime`", other),
    };

    if !run(&config, mode)? {
        std::process::exit(1);
    }
    Ok(())
}

/// Run one session; returns whether it passed.
fn run(config: &Config, mode: RunMode) -> Result<bool> {
    let settings = config.orchestrator_settings();
    let firmware = EchoFirmware::new(Keymap::standard(settings.rows, settings.cols));
    let mut sim = Simulator::new(firmware, &settings);

    let result = match mode {
        RunMode::RemoteControlled => sim.run_remote_controlled(io::stdin().lock(), |_| {}),
        RunMode::Realtime => {
            let stop = sim.stop_handle();
            ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
                .context("failed to install Ctrl-C handler")?;
            sim.run_realtime(config.run.realtime_duration_ms, |_| {})
        }
    };
    match result {
        Err(HarnessError::Aborted) => log::warn!("run aborted after first error"),
        other => other.context("run failed")?,
    }
    sim.assert_nothing_queued();

    if let Some(path) = &config.run.report_path {
        SessionReport::new(&sim)
            .export_json(path)
            .with_context(|| format!("failed to write session report to {}", path.display()))?;
        log::info!("session report written to {}", path.display());
    }

    Ok(sim.passed())
}
