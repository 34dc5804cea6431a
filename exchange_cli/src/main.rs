#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `exchange` binary: run the line, replay scripts, check an installation.

mod cli;
mod error_fmt;
mod rt;
mod run;
mod self_check;
mod setup;
mod simulate;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use exchange_core::RunOutcome;
use exchange_hardware::SimOptions;

use crate::cli::{Cli, Commands, JSON_MODE, RtLock};
use crate::error_fmt::{EXIT_REBOOT, exit_code_for_error, format_error_json, humanize};
use crate::rt::RtOptions;
use crate::setup::{LoadedConfig, exchange_builder, init_tracing, load_config, open_stores};
use crate::simulate::{Simulation, parse_script};

fn main() {
    // Plain panic/report hooks; a failing install only loses pretty backtraces.
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    match real_main(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                println!("{}", format_error_json(&err));
            } else {
                eprintln!("{}", humanize(&err));
            }
            std::process::exit(exit_code_for_error(&err));
        }
    }
}

fn real_main(cli: Cli) -> eyre::Result<i32> {
    let loaded = match load_config(&cli.config) {
        Ok(l) => l,
        Err(e) => {
            init_tracing(cli.json, &cli.log_level, None);
            return Err(e);
        }
    };
    init_tracing(
        cli.json,
        &cli.log_level,
        Some((&loaded.cfg.logging, &loaded)),
    );
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match cli.cmd {
        Commands::Run {
            rt,
            rt_prio,
            rt_lock,
            rt_cpu,
            duration,
        } => cmd_run(
            &loaded,
            RtOptions {
                enabled: rt,
                prio: rt_prio,
                lock: rt_lock.unwrap_or(RtLock::os_default()),
                cpu: rt_cpu,
            },
            duration,
        ),
        Commands::Simulate {
            script,
            clip_ms,
            speech,
        } => {
            let text = std::fs::read_to_string(&script)
                .map_err(|e| eyre::eyre!("read script {}: {e}", script.display()))?;
            cmd_simulate(&loaded, &text, clip_ms, speech, cli.json)
        }
        Commands::SelfCheck => cmd_self_check(&loaded, cli.json),
    }
}

fn cmd_run(loaded: &LoadedConfig, rt: RtOptions, duration: Option<u64>) -> eyre::Result<i32> {
    let stores = open_stores(loaded)?;
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::Relaxed);
    })
    .map_err(|e| eyre::eyre!("install Ctrl-C handler: {e}"))?;

    match run::run_line(loaded, stores, rt, duration, stop)? {
        RunOutcome::Stopped => Ok(0),
        RunOutcome::RebootRequested => {
            tracing::warn!(exit_code = EXIT_REBOOT, "exiting for reboot");
            Ok(EXIT_REBOOT)
        }
    }
}

fn cmd_simulate(
    loaded: &LoadedConfig,
    script: &str,
    clip_ms: u64,
    speech: bool,
    json: bool,
) -> eyre::Result<i32> {
    let steps = parse_script(script)?;
    let stores = open_stores(loaded)?;
    let opts = SimOptions {
        clip_ms,
        speech,
        assets: stores.assets.clone(),
    };
    let mut sim = Simulation::new(exchange_builder(&loaded.cfg, stores), opts)?;
    sim.run(&steps);
    let report = sim.report();
    if json {
        println!("{}", report.to_json());
    } else {
        print!("{}", report.to_text());
    }
    Ok(if report.reboot_requested { EXIT_REBOOT } else { 0 })
}

fn cmd_self_check(loaded: &LoadedConfig, json: bool) -> eyre::Result<i32> {
    let checks = self_check::self_check(loaded)?;
    if json {
        println!("{}", self_check::checks_json(&checks));
    } else {
        for c in &checks {
            let mark = if c.ok { "ok  " } else { "FAIL" };
            println!("{mark} {:<13} {}", c.name, c.detail);
        }
    }
    self_check::verdict(&checks)?;
    Ok(0)
}
