// src/utils/log.rs

//! Presentation helpers on top of the `log` facade.
//!
//! Run boundaries and summaries get a consistent shape in the log output
//! regardless of which logger the binary installs.

const RULE_WIDTH: usize = 60;

/// Log a boxed header line.
pub fn header(title: &str) {
    let border = "═".repeat(RULE_WIDTH);
    log::info!("{}", border);
    log::info!("  {}", title);
    log::info!("{}", border);
}

/// Log a step in a process
pub fn step(step_num: usize, total: usize, message: &str) {
    log::info!("[STEP {}/{}] {}", step_num, total, message);
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    for line in format_summary(title, items).lines() {
        log::info!("{}", line);
    }
}

/// Render summary items the way [`summary`] logs them.
pub fn format_summary(title: &str, items: &[(&str, String)]) -> String {
    let mut out = format!("[SUMMARY] {}", title);
    for (key, value) in items {
        out.push_str(&format!("\n    {}: {}", key, value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_summary() {
        let text = format_summary("Run", &[("Pages", "3".to_string()), ("New", "1".to_string())]);
        assert_eq!(text, "[SUMMARY] Run\n    Pages: 3\n    New: 1");
    }
}
