//! Report Module
//!
//! Summary reporting for batch conversions

use crate::batch::BatchResult;
use crate::progress::{format_bytes, format_duration};
use console::style;
use std::time::Duration;

/// Output size relative to input, as a percentage saved (negative when larger).
pub fn size_change_percent(input_bytes: u64, output_bytes: u64) -> f64 {
    if input_bytes > 0 {
        (1.0 - output_bytes as f64 / input_bytes as f64) * 100.0
    } else {
        0.0
    }
}

pub fn print_summary_report(
    result: &BatchResult,
    duration: Duration,
    input_bytes: u64,
    output_bytes: u64,
    operation_name: &str,
) {
    let reduction = size_change_percent(input_bytes, output_bytes);

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  📊 {:<56} ║", format!("{} Summary Report", operation_name));
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  📁 Files Processed:    {:>10}                           ║", result.total);
    println!(
        "║  ✅ Succeeded:          {:>10}                           ║",
        style(result.succeeded).green()
    );
    println!(
        "║  ❌ Failed:             {:>10}                           ║",
        style(result.failed).red()
    );
    println!("║  ⏭️  Skipped:            {:>10}                           ║", result.skipped);
    println!(
        "║  📈 Success Rate:       {:>9.1}%                           ║",
        result.success_rate()
    );
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!(
        "║  💾 Input Size:         {:>10}                           ║",
        format_bytes(input_bytes)
    );
    println!(
        "║  💾 Output Size:        {:>10}                           ║",
        format_bytes(output_bytes)
    );
    println!("║  📉 Size Change:        {:>9.1}%                           ║", reduction);
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!(
        "║  ⏱️  Total Time:         {:>10}                           ║",
        format_duration(duration)
    );
    println!("╚══════════════════════════════════════════════════════════════╝");

    if !result.errors.is_empty() {
        println!();
        println!("❌ Errors encountered:");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        for (name, error) in &result.errors {
            println!("   {} → {}", name, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_summary_report_no_panic() {
        let mut result = BatchResult::new();
        result.success();
        result.fail("broken.heic", "malformed input");

        print_summary_report(&result, Duration::from_secs(10), 1000, 500, "HEIC Conversion");
    }

    #[test]
    fn test_print_summary_report_zero_input() {
        let result = BatchResult::new();
        print_summary_report(&result, Duration::from_secs(1), 0, 0, "Test");
    }

    #[test]
    fn test_size_change_percent() {
        assert!((size_change_percent(1000, 500) - 50.0).abs() < 0.01);
        assert!((size_change_percent(1000, 250) - 75.0).abs() < 0.01);
        assert!((size_change_percent(1000, 1000) - 0.0).abs() < 0.01);
        assert!((size_change_percent(500, 1000) - (-100.0)).abs() < 0.01);
        assert_eq!(size_change_percent(0, 1000), 0.0);
    }
}
