//! Console output for the devstack CLI.
//!
//! Progress meant for a person goes to stdout through these helpers;
//! structured logs go through `tracing` on stderr.

use colored::{ColoredString, Colorize};

const RULE_WIDTH: usize = 64;

/// Column the value of [`print_kv`] starts at.
const KEY_WIDTH: usize = 12;

#[derive(Clone, Copy)]
enum Status {
    Ok,
    Warn,
    Fail,
    Note,
}

impl Status {
    fn glyph(self) -> ColoredString {
        match self {
            Self::Ok => "✓".green().bold(),
            Self::Warn => "!".yellow().bold(),
            Self::Fail => "✗".red().bold(),
            Self::Note => "·".blue().bold(),
        }
    }
}

fn status_line(status: Status, message: &str) {
    let message = match status {
        Status::Ok | Status::Note => message.normal(),
        Status::Warn => message.yellow(),
        Status::Fail => message.red(),
    };
    println!("{} {message}", status.glyph());
}

/// Print the tool name, version and target profile.
pub fn print_banner(profile: &str) {
    println!();
    println!(
        "{} {}  {}",
        "devstack".cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_black(),
        format!("profile {profile}").bright_black()
    );
    println!("{}", "─".repeat(RULE_WIDTH).bright_black());
}

/// Print a section title padded out with a rule.
pub fn print_section(title: &str) {
    let pad = RULE_WIDTH.saturating_sub(title.chars().count() + 4);
    println!();
    println!(
        "{} {} {}",
        "──".bright_black(),
        title.cyan().bold(),
        "─".repeat(pad).bright_black()
    );
}

/// Print the start of step `current` of `total` in `up`.
pub fn print_progress_step(current: u8, total: u8, message: &str) {
    println!();
    println!("{} {}", format!("[{current}/{total}]").cyan(), message.bold());
}

pub fn print_success(message: &str) {
    status_line(Status::Ok, message);
}

pub fn print_warning(message: &str) {
    status_line(Status::Warn, message);
}

pub fn print_error(message: &str) {
    status_line(Status::Fail, message);
}

pub fn print_info(message: &str) {
    status_line(Status::Note, message);
}

/// Print a sub-step of the current operation.
pub fn print_progress(message: &str) {
    println!("    {}", message.bright_black());
}

/// Print the header for one Helm release.
pub fn print_component(release: &str) {
    println!("{} {}", "▸".cyan(), release.bold());
}

/// Print one prerequisite check, with a hint when it failed.
pub fn print_check(name: &str, passed: bool, hint: &str) {
    if passed {
        println!("  {} {name}", Status::Ok.glyph());
    } else {
        println!("  {} {name} {}", Status::Fail.glyph(), hint.bright_black());
    }
}

/// Print a key and value, values aligned in one column.
pub fn print_kv(key: &str, value: &str) {
    let key = format!("{key:<KEY_WIDTH$}");
    println!("  {} {}", key.bright_black(), value.green());
}

pub fn print_list_item(item: &str) {
    println!("  - {item}");
}
