//! Console banner and run summary

use std::path::Path;

use crate::core::Config;
use crate::pipeline::BatchReport;

const RULE: &str = "─────────────────────────────────────────────────────────";

/// Print the startup banner
pub fn print_banner(config: &Config, file: &Path) {
    println!(
        r#"
╔═══════════════════════════════════════════════════════╗
║                                                       ║
║   mutuals - LinkedIn mutual connections extractor     ║
║                                                       ║
╚═══════════════════════════════════════════════════════╝
"#
    );
    println!("File:        {}", file.display());
    println!("Model:       {}", config.agent.model);
    println!("Chrome:      {}", config.browser.chrome_path);
    println!("Profile dir: {}", config.browser.user_data_dir.display());
    println!("Names/row:   {}", config.batch.target_count);
    println!("{}", RULE);
}

/// Final summary lines for a finished or interrupted run
pub fn summary_lines(report: &BatchReport, log_file: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    if report.interrupted {
        lines.push("⚠️  Run interrupted; re-run the same file to resume.".to_string());
    } else {
        lines.push("🎉 Automation completed successfully!".to_string());
    }
    lines.push(format!(
        "Processed: {}   Succeeded: {}   Failed: {}",
        report.processed, report.succeeded, report.failed
    ));
    lines.push(format!(
        "Rows done: {} of {}",
        report.summary.rows_completed, report.summary.total_rows
    ));
    lines.push(format!("📊 Results saved to: {}", report.path.display()));
    lines.push(format!("📋 Log file: {}", log_file.display()));
    lines
}

/// Print the end-of-run summary
pub fn print_summary(report: &BatchReport, log_file: &Path) {
    println!("\n{}", RULE);
    for line in summary_lines(report, log_file) {
        println!("{}", line);
    }
}

/// Print a fatal error with a pointer to the log
pub fn print_failure(error: &dyn std::fmt::Display, log_file: &Path) {
    eprintln!("\n❌ Automation failed: {}", error);
    eprintln!("   Check {} for details.", log_file.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_summary_lines() {
        let report = BatchReport {
            path: PathBuf::from("people.xlsx"),
            pending: 3,
            processed: 3,
            succeeded: 2,
            failed: 1,
            ..Default::default()
        };
        let lines = summary_lines(&report, Path::new("linkedin_automation.log"));

        assert!(lines[0].contains("completed"));
        assert_eq!(lines[1], "Processed: 3   Succeeded: 2   Failed: 1");
        assert!(lines.iter().any(|l| l.ends_with("people.xlsx")));
        assert!(lines.iter().any(|l| l.ends_with("linkedin_automation.log")));
    }

    #[test]
    fn test_interrupted_summary() {
        let report = BatchReport {
            interrupted: true,
            ..Default::default()
        };
        let lines = summary_lines(&report, Path::new("run.log"));
        assert!(lines[0].contains("interrupted"));
    }
}
