//! Toshy Setup - Main entry point
//!
//! Installs, removes or tweaks the Toshy keymapper for the current user.

use anyhow::Context;
use std::process::ExitCode;
use toshy_setup::cli::{Action, Cli};
use toshy_setup::command_runner::{CommandRunner, SystemRunner};
use toshy_setup::environment::{self, OsReleaseSource};
use toshy_setup::error::SetupError;
use toshy_setup::orchestrator::{self, Installer};
use toshy_setup::prompt::StdioPrompter;
use toshy_setup::sentinel::Sentinel;
use toshy_setup::settings::{self, InstallerSettings, SetupPaths};
use toshy_setup::{distro, privilege, process_guard, sanity, uninstall};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Diagnostics on stderr; `RUST_LOG` overrides the default `warn`
fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Whether `dir` is an entry of the caller's original PATH
fn path_contains(dir: &std::path::Path) -> bool {
    std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).any(|entry| entry == dir))
        .unwrap_or(false)
}

fn main() -> ExitCode {
    init_logger();
    info!("toshy-setup starting up");

    let cli = Cli::parse_args();
    debug!("CLI arguments parsed: {:?}", cli);

    let code = match run(cli) {
        Ok(()) => 0,
        Err(e) => report(&e),
    };
    println!();
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn report(err: &anyhow::Error) -> i32 {
    let Some(setup_err) = err.downcast_ref::<SetupError>() else {
        toshy_setup::console::problem(&format!("ERROR: {:#}", err));
        return 1;
    };
    let code = setup_err.exit_code();
    if matches!(setup_err, SetupError::Declined { .. }) {
        if code == 0 {
            println!("\n{}", setup_err);
        } else {
            toshy_setup::console::problem(&setup_err.to_string());
        }
    } else {
        toshy_setup::console::problem(&format!("ERROR: {:#}", err));
    }
    code
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let action = cli.action()?;

    let paths = SetupPaths::from_env().context("resolving installer paths")?;
    let location = std::env::current_exe().unwrap_or_else(|_| paths.source_dir.clone());
    sanity::run_preflight_checks(&location, &paths.home);

    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }

    let mut runner = SystemRunner::new();
    privilege::invalidate_sudo_ticket(&mut runner);

    let local_bin_on_path = path_contains(&paths.local_bin);
    if local_bin_on_path {
        Sentinel::PathIsGood.set(&paths.runtime_dir)?;
    } else {
        debug!("Home user local bin not part of PATH string.");
    }

    let mut settings = InstallerSettings::new(paths, settings::current_user_name(), &mut runner);
    settings.local_bin_on_path = local_bin_on_path;
    settings.override_distro = cli.override_distro.clone();
    settings.barebones_config = cli.barebones_config;
    settings.skip_native = cli.skip_native;
    settings.fancy_pants = cli.fancy_pants;

    let source = OsReleaseSource::default();
    let mut prompter = StdioPrompter;

    let result = dispatch(action, &mut settings, &mut runner, &mut prompter, &source);
    privilege::invalidate_sudo_ticket(&mut runner);
    Ok(result?)
}

fn dispatch(
    action: Action,
    settings: &mut InstallerSettings,
    runner: &mut dyn CommandRunner,
    prompter: &mut StdioPrompter,
    source: &OsReleaseSource,
) -> toshy_setup::Result<()> {
    match action {
        Action::Uninstall => uninstall::uninstall_toshy(settings, runner, prompter, source),
        Action::ShowEnv => {
            environment::probe_environment(settings, source);
            println!("\n{}", environment::describe(settings));
            Ok(())
        }
        Action::ListDistros => {
            println!(
                "Distros known to the Toshy installer (use with \"--override-distro\" arg):\n\n\t{}",
                distro::distro_index()
            );
            Ok(())
        }
        Action::ApplyTweaks => orchestrator::run_apply_tweaks(settings, runner, source),
        Action::RemoveTweaks => orchestrator::run_remove_tweaks(settings, runner, source),
        Action::Install => Installer::new(settings, runner, prompter, source).run(),
    }
}
