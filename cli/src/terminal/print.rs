use colored::*;
use tracing::info;

use crate::terminal::colors;
use crate::terminal::format::Detail;
use crate::terminal::logging::PRINT_TARGET;

pub const TOTAL_WIDTH: usize = 64;

/// Width of the key column in tree details.
const TREE_KEY_WIDTH: usize = 7;

#[macro_export]
macro_rules! mprint {
    () => {
        $crate::terminal::print::print("");
    };
    ($msg:expr) => {
        $crate::terminal::print::print($msg);
    };
}

pub fn print(msg: &str) {
    info!(target: PRINT_TARGET, raw_msg = msg);
}

/// `title` centered in a line of `fill`.
fn rule(title: ColoredString, fill: &str) -> String {
    let width: usize = console::measure_text_width(&title.to_string());
    let pad: usize = TOTAL_WIDTH.saturating_sub(width);
    let left: String = fill.repeat(pad / 2);
    let right: String = fill.repeat(pad - pad / 2);
    format!("{}{}{}", left.bright_black(), title, right.bright_black())
}

pub fn banner() {
    let title: String = format!("⟦ UASCOUT v{} ⟧", env!("CARGO_PKG_VERSION"));
    print(&rule(title.bright_green().bold(), "═"));
}

pub fn header(msg: &str) {
    let title: String = format!("⟦ {} ⟧", msg.to_uppercase());
    print(&rule(title.bright_green(), "─"));
}

pub fn fat_separator() {
    print(&"═".repeat(TOTAL_WIDTH).bright_black().to_string());
}

fn leader(key: &str, width: usize) -> String {
    format!(
        "{}{}",
        ".".repeat(width.saturating_sub(key.len())).color(colors::SEPARATOR),
        ":".color(colors::SEPARATOR)
    )
}

/// `> key....: value`, with keys padded to `key_width`.
pub fn aligned_line(key: &str, value: ColoredString, key_width: usize) {
    print(&format!(
        "{} {}{} {}",
        ">".color(colors::SEPARATOR),
        key.color(colors::PRIMARY),
        leader(key, key_width + 1),
        value
    ));
}

pub fn tree_head(idx: usize, name: &str) {
    print(&format!(
        "{}{}{} {}",
        "[".color(colors::SEPARATOR),
        idx.to_string().color(colors::ACCENT),
        "]".color(colors::SEPARATOR),
        name.color(colors::PRIMARY)
    ));
}

pub fn as_tree_one_level(details: Vec<Detail>) {
    let last: usize = details.len().saturating_sub(1);
    for (i, (key, value)) in details.iter().enumerate() {
        let branch: &str = if i == last { "└─" } else { "├─" };
        print(&format!(
            " {} {}{} {}",
            branch.bright_black(),
            key.color(colors::TEXT_DEFAULT),
            leader(key, TREE_KEY_WIDTH),
            value
        ));
    }
}

pub fn centerln(msg: &str) {
    let space = " ".repeat(TOTAL_WIDTH.saturating_sub(console::measure_text_width(msg)) / 2);
    print(&format!("{space}{msg}"));
}

const NO_RESULTS: &str = r#"
         _   _  ___    ____  _____ ______     _______ ____  ____
        | \ | |/ _ \  / ___|| ____|  _ \ \   / / ____|  _ \/ ___|
        |  \| | | | | \___ \|  _| | |_) \ \ / /|  _| | |_) \___ \
        | |\  | |_| |  ___) | |___|  _ < \ V / | |___|  _ < ___) |
        |_| \_|\___/  |____/|_____|_| \_\ \_/  |_____|_| \_\____/
"#;

pub fn no_results() {
    print(&NO_RESULTS.red().bold().to_string());
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_fills_the_full_width() {
        colored::control::set_override(false);
        let line = rule("⟦ SCAN ⟧".normal(), "─");
        assert_eq!(console::measure_text_width(&line), TOTAL_WIDTH);
        assert!(line.starts_with('─') && line.ends_with('─'));
    }

    #[test]
    fn leader_pads_short_keys() {
        colored::control::set_override(false);
        assert_eq!(leader("Type", 7), "...:");
        assert_eq!(leader("Endpoint", 7), ":");
    }
}
