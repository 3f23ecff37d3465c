use std::fmt::Write;

use eeprobe::{LatencyReport, ReaderSummary};

/// Group digits in threes: `1234567` → `"1,234,567"`.
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Whole milliseconds (fraction dropped) with thousands separators.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_ms(ms: f64) -> String {
    format!("{}ms", format_thousands(ms.max(0.0) as u64))
}

pub fn format_report(report: &LatencyReport) -> String {
    let mut out = String::new();

    for entry in &report.cameras {
        let stats = &entry.stats;
        let _ = writeln!(out, "Load time for {}:", entry.camera);
        let _ = writeln!(out, "\tMinimum: {}", format_ms(stats.minimum));
        let _ = writeln!(out, "\tAverage: {}", format_ms(stats.average));
        let _ = writeln!(out, "\tMedian:  {}", format_ms(stats.median));
        let _ = writeln!(out, "\tMaximum: {}", format_ms(stats.maximum));
        if entry.failures > 0 {
            let _ = writeln!(
                out,
                "\t({} of {} probes failed)",
                entry.failures,
                entry.failures as usize + stats.samples
            );
        }
    }

    for warning in &report.warnings {
        let _ = writeln!(out, "⚠️  {warning}");
    }

    out
}

pub fn format_summary(camera: &str, summary: &ReaderSummary) -> String {
    format!(
        "📊 {camera}: {} connections, {} reconnects, {} failed opens, {} bytes read",
        summary.connections,
        summary.reconnects(),
        summary.open_failures,
        format_thousands(summary.bytes_read)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use eeprobe::{CameraLatency, CameraWarning, Error, LatencyStats};

    #[test]
    fn thousands_separators() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn milliseconds_drop_fraction() {
        assert_eq!(format_ms(614.25), "614ms");
        assert_eq!(format_ms(618.5), "618ms");
        assert_eq!(format_ms(12_345.9), "12,345ms");
    }

    #[test]
    fn report_lists_stats_then_warnings() {
        let report = LatencyReport {
            cameras: vec![CameraLatency {
                camera: "lobby".to_string(),
                stats: LatencyStats {
                    minimum: 535.0,
                    average: 614.25,
                    median: 618.5,
                    maximum: 1685.0,
                    samples: 4,
                },
                failures: 1,
            }],
            warnings: vec![CameraWarning {
                camera: "dock".to_string(),
                failures: 5,
                error: Error::InsufficientData,
            }],
        };

        let text = format_report(&report);
        assert!(text.starts_with("Load time for lobby:\n\tMinimum: 535ms\n"));
        assert!(text.contains("\tMedian:  618ms\n"));
        assert!(text.contains("\tMaximum: 1,685ms\n"));
        assert!(text.contains("1 of 5 probes failed"));
        assert!(text.contains("⚠️  dock:"));
    }

    #[test]
    fn summary_line_counts_reconnects() {
        let summary = ReaderSummary {
            connections: 3,
            open_failures: 1,
            read_errors: 1,
            closures: 1,
            bytes_read: 20480,
        };
        let line = format_summary("lobby", &summary);
        assert!(line.contains("2 reconnects"));
        assert!(line.contains("20,480 bytes"));
    }
}
