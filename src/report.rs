use colored::*;
use terminal_size::{Width, terminal_size};

use docidx::index::{Issue, Severity};

/// Get the current terminal width, defaulting to 80 if unable to detect
pub fn get_terminal_width() -> usize {
    if let Some((Width(w), _)) = terminal_size() {
        w as usize
    } else {
        80
    }
}

/// Create a separator line that fits the terminal width
pub fn separator(width: usize) -> String {
    "─".repeat(width.min(120))
}

/// Format a validation report, grouped by crate in the order issues appear
pub fn format_issues(issues: &[Issue], crate_count: usize) -> String {
    let sep_width = get_terminal_width().saturating_sub(2).max(40);
    let errors = issues
        .iter()
        .filter(|issue| issue.severity == Severity::Error)
        .count();
    let warnings = issues.len() - errors;

    let mut formatted = String::new();

    if issues.is_empty() {
        formatted.push_str(&format!(
            "{} {} crate(s) checked, no issues found\n",
            "✅".green(),
            crate_count
        ));
        return formatted;
    }

    let heading = if errors > 0 {
        "Index is inconsistent".red().bold()
    } else {
        "Index is usable, with warnings".yellow().bold()
    };
    formatted.push_str(&format!("\n{} {}\n", "🔎".cyan(), heading));

    let mut current: Option<&str> = None;
    for issue in issues {
        if current != Some(issue.crate_name.as_str()) {
            current = Some(issue.crate_name.as_str());
            let title = if issue.crate_name.is_empty() {
                "<unnamed>".to_string()
            } else {
                issue.crate_name.clone()
            };
            formatted.push_str(&format!(
                "\n{} {}\n",
                title.cyan().bold(),
                separator(sep_width.saturating_sub(title.chars().count() + 1)).cyan()
            ));
        }

        match issue.severity {
            Severity::Error => formatted.push_str(&format!(
                "  {} {}\n",
                "✖".red(),
                issue.message.red()
            )),
            Severity::Warning => formatted.push_str(&format!(
                "  {} {}\n",
                "⚠".yellow(),
                issue.message.yellow()
            )),
        }
    }

    formatted.push_str(&format!("\n{}\n", separator(sep_width).bright_black()));
    formatted.push_str(&format!(
        "{} {} error(s), {} warning(s) in {} crate(s)\n",
        if errors > 0 { "💥".red() } else { "💡".cyan() },
        errors,
        warnings,
        crate_count
    ));

    formatted
}
