//! sudo credential handling
//!
//! The cached sudo ticket is dropped at the start and end of every run,
//! and on interruption.

use crate::command_runner::{CommandRunner, CommandSpec};
use crate::console;
use crate::error::Result;
use std::process::{Command, Stdio};

/// `sudo -k` through the runner
pub fn invalidate_sudo_ticket(runner: &mut dyn CommandRunner) {
    let spec = CommandSpec::new("sudo").arg("-k").silent();
    if !runner.run_logged(&spec) {
        tracing::warn!("Could not invalidate the sudo ticket");
    }
}

/// `sudo -k` without a runner, for the signal handler thread
pub fn invalidate_sudo_ticket_blocking() {
    let status = Command::new("sudo")
        .arg("-k")
        .env("PATH", crate::command_runner::SAFE_PATH)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = status {
        tracing::warn!("Could not invalidate the sudo ticket: {}", e);
    }
}

/// Show a banner when the next sudo call will ask for a password
pub fn call_attention_to_password_prompt(runner: &mut dyn CommandRunner) {
    let probe = CommandSpec::new("sudo").args(["-n", "true"]).silent();
    let cached = runner.run(&probe).map(|out| out.success).unwrap_or(false);
    if !cached {
        console::password_banner();
    }
}

/// Obtain the sudo ticket early, visibly
pub fn elevate_privileges(runner: &mut dyn CommandRunner) -> Result<()> {
    call_attention_to_password_prompt(runner);
    let spec = CommandSpec::sudo("bash").args(["-c", "echo -e \"\nUsing elevated privileges...\""]);
    runner.run_checked(&spec)?;
    Ok(())
}
