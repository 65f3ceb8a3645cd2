use colored::Colorize;
use declarative::{Diagnostics, Severity};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print every diagnostic, errors on stderr
pub fn diagnostics(diags: &Diagnostics) {
    for diagnostic in diags.iter() {
        let summary = match &diagnostic.attribute {
            Some(path) => format!("{} ({path})", diagnostic.summary),
            None => diagnostic.summary.clone(),
        };
        match diagnostic.severity {
            Severity::Error => error(&summary),
            Severity::Warning => warn(&summary),
        }
        if !diagnostic.detail.is_empty() {
            dim(&diagnostic.detail);
        }
    }
}
