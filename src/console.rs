//! User-facing progress output
//!
//! Diagnostics go through `tracing`; these helpers print what the user is
//! meant to read. Colour is used only when the terminal advertises it via
//! `COLORTERM`.

use colored::{ColoredString, Colorize};

pub const SEPARATOR_WIDTH: usize = 80;

pub const REBOOT_BANNER: &str = r"
        ██████      ███████     ██████       ██████       ██████      ████████     ██
        ██   ██     ██          ██   ██     ██    ██     ██    ██        ██        ██
        ██████      █████       ██████      ██    ██     ██    ██        ██        ██
        ██   ██     ██          ██   ██     ██    ██     ██    ██        ██
        ██   ██     ███████     ██████       ██████       ██████         ██        ██
";

/// Colours used by the installer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
}

pub fn separator() -> String {
    "=".repeat(SEPARATOR_WIDTH)
}

fn color_enabled() -> bool {
    std::env::var_os("COLORTERM").is_some_and(|v| !v.is_empty())
}

/// Colourize `text` when the terminal supports it
pub fn fancy(text: &str, tone: Tone, bold: bool) -> String {
    if !color_enabled() {
        return text.to_string();
    }
    let styled: ColoredString = match tone {
        Tone::Red => text.red(),
        Tone::Green => text.green(),
        Tone::Yellow => text.yellow(),
        Tone::Blue => text.blue(),
        Tone::Magenta => text.magenta(),
        Tone::Cyan => text.cyan(),
    };
    if bold {
        styled.bold().to_string()
    } else {
        styled.to_string()
    }
}

/// `§  Title...` followed by a separator line
pub fn section(title: &str) {
    println!("\n\n§  {}\n{}", title, separator());
}

pub fn task_completed() {
    println!("{}", fancy(" >> Task completed successfully << ", Tone::Green, true));
}

/// Something went wrong but the run continues
pub fn problem(message: &str) {
    eprintln!("{}", fancy(message, Tone::Red, false));
}

pub fn password_banner() {
    let line = "  -----------------------------------  ";
    println!();
    println!("{}", fancy(line, Tone::Magenta, true));
    println!("{}", fancy("  -- PASSWORD REQUIRED TO CONTINUE --  ", Tone::Magenta, true));
    println!("{}", fancy(line, Tone::Magenta, true));
    println!();
}

pub fn reboot_banner() {
    let sep = separator();
    println!("\n\n\n{sep}\n{sep}\n{}\n{sep}\n{sep}", REBOOT_BANNER);
}

/// Two separator lines around a red warning
pub fn warning_box(lines: &[&str]) {
    let sep = separator();
    println!("\n{sep}\n{sep}");
    if let Some((first, rest)) = lines.split_first() {
        println!("{}", fancy(first, Tone::Red, false));
        for line in rest {
            println!("{}", line);
        }
    }
    println!("{sep}\n{sep}\n");
}
