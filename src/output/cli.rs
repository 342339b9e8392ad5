use crate::model::{LicenseStatus, ScanReport, Severity};
use anyhow::Result;
use std::fmt::Write as _;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct FactorRow {
    #[tabled(rename = "Factor")]
    factor: &'static str,
    #[tabled(rename = "Points")]
    points: u32,
}

#[derive(Tabled)]
struct ContributorRow {
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Points")]
    points: u32,
}

#[derive(Tabled)]
struct VulnRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Summary")]
    summary: String,
}

#[derive(Tabled)]
struct LicenseRow {
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "License")]
    spdx: String,
}

pub fn print_cli_table(report: &ScanReport) -> Result<()> {
    print!("{}", render_table(report));
    Ok(())
}

pub fn render_table(report: &ScanReport) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_report(&mut out, report);
    out
}

fn write_report(out: &mut String, report: &ScanReport) -> std::fmt::Result {
    writeln!(out)?;
    writeln!(
        out,
        "Scanned {} at {}",
        report.lockfile,
        report.scanned_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(out, "{} dependencies", report.dependencies.len())?;
    writeln!(out)?;

    writeln!(
        out,
        "Risk score: {}/100 {}",
        report.score.total,
        risk_label(report.score.total)
    )?;
    let factors = &report.score.factors;
    let rows = vec![
        FactorRow { factor: "Vulnerabilities", points: factors.severity },
        FactorRow { factor: "Staleness", points: factors.staleness },
        FactorRow { factor: "Release age", points: factors.age },
        FactorRow { factor: "Licenses", points: factors.license },
    ];
    writeln!(out, "{}", Table::new(rows).with(Style::rounded()))?;

    if !report.score.top_contributors.is_empty() {
        writeln!(out)?;
        writeln!(out, "Top contributors:")?;
        let rows: Vec<ContributorRow> = report
            .score
            .top_contributors
            .iter()
            .map(|c| ContributorRow {
                package: truncate(&c.package, 40),
                points: c.score,
            })
            .collect();
        writeln!(out, "{}", Table::new(rows).with(Style::rounded()))?;
    }

    if report.vulnerabilities.is_empty() {
        writeln!(out)?;
        writeln!(out, "No known vulnerabilities.")?;
    } else {
        writeln!(out)?;
        writeln!(out, "Found {} vulnerabilities:", report.vulnerability_count())?;

        let mut vulns: Vec<_> = report.vulnerabilities.values().flatten().collect();
        vulns.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.package.cmp(&b.package)));

        let rows: Vec<VulnRow> = vulns
            .iter()
            .map(|v| VulnRow {
                severity: format_severity(v.severity),
                package: truncate(&v.package, 30),
                id: v.external_id.clone(),
                summary: truncate(&v.summary, 50),
            })
            .collect();
        writeln!(out, "{}", Table::new(rows).with(Style::rounded()))?;
    }

    let flagged: Vec<LicenseRow> = report
        .licenses
        .iter()
        .filter(|l| l.status != LicenseStatus::Allowed)
        .map(|l| LicenseRow {
            status: format_license_status(l.status),
            package: truncate(&l.package, 40),
            spdx: l.spdx.clone(),
        })
        .collect();
    if !flagged.is_empty() {
        writeln!(out)?;
        writeln!(out, "License findings ({} not allowed):", flagged.len())?;
        writeln!(out, "{}", Table::new(flagged).with(Style::rounded()))?;
    }

    writeln!(out)?;
    writeln!(
        out,
        "Summary: {} vulnerable packages, {} blocked and {} warned licenses",
        report.vulnerabilities.len(),
        report.license_count(LicenseStatus::Blocked),
        report.license_count(LicenseStatus::Warn),
    )?;
    Ok(())
}

/// Higher totals mean more risk.
pub fn risk_label(total: u8) -> &'static str {
    match total {
        0..=19 => "[Low]",
        20..=49 => "[Moderate]",
        50..=79 => "[High]",
        _ => "[Severe]",
    }
}

fn format_severity(severity: Severity) -> String {
    match severity {
        Severity::Critical => "\x1b[31mCRITICAL\x1b[0m".to_string(),
        Severity::High => "\x1b[91mHIGH\x1b[0m".to_string(),
        Severity::Medium => "\x1b[33mMEDIUM\x1b[0m".to_string(),
        Severity::Low => "\x1b[32mLOW\x1b[0m".to_string(),
    }
}

fn format_license_status(status: LicenseStatus) -> String {
    match status {
        LicenseStatus::Blocked => "\x1b[31mblocked\x1b[0m".to_string(),
        LicenseStatus::Warn => "\x1b[33mwarn\x1b[0m".to_string(),
        LicenseStatus::Allowed => "allowed".to_string(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Contributor, Dependency, LicenseFinding, ScoreBreakdown, ScoreFactors, Vulnerability,
        VulnsByPackage,
    };
    use chrono::Utc;

    fn report() -> ScanReport {
        let mut vulnerabilities = VulnsByPackage::new();
        vulnerabilities.insert(
            "lodash".to_string(),
            vec![Vulnerability {
                package: "lodash".to_string(),
                version_range: None,
                external_id: "GHSA-35jh-r3h4-6jhm".to_string(),
                severity: Severity::High,
                summary: "Command injection".to_string(),
                references: Vec::new(),
            }],
        );
        ScanReport {
            scanned_at: Utc::now(),
            lockfile: "package-lock.json".to_string(),
            dependencies: vec![Dependency::new("lodash", "4.17.20")],
            vulnerabilities,
            licenses: vec![LicenseFinding {
                package: "lodash".to_string(),
                spdx: "GPL-3.0".to_string(),
                status: LicenseStatus::Blocked,
            }],
            score: ScoreBreakdown {
                total: 100,
                factors: ScoreFactors {
                    severity: 6,
                    license: 5,
                    ..ScoreFactors::default()
                },
                top_contributors: vec![Contributor {
                    package: "lodash".to_string(),
                    score: 11,
                }],
            },
        }
    }

    #[test]
    fn test_render_table_sections() {
        let text = render_table(&report());
        assert!(text.contains("Risk score: 100/100 [Severe]"));
        assert!(text.contains("Top contributors:"));
        assert!(text.contains("GHSA-35jh-r3h4-6jhm"));
        assert!(text.contains("License findings (1 not allowed):"));
        assert!(text.contains("GPL-3.0"));
        assert!(text.contains("1 vulnerable packages, 1 blocked and 0 warned licenses"));
    }

    #[test]
    fn test_render_clean_report() {
        let mut clean = report();
        clean.vulnerabilities.clear();
        clean.licenses.clear();
        clean.score = ScoreBreakdown::default();

        let text = render_table(&clean);
        assert!(text.contains("Risk score: 0/100 [Low]"));
        assert!(text.contains("No known vulnerabilities."));
        assert!(!text.contains("Top contributors:"));
        assert!(!text.contains("License findings"));
    }

    #[test]
    fn test_risk_label() {
        assert_eq!(risk_label(0), "[Low]");
        assert_eq!(risk_label(20), "[Moderate]");
        assert_eq!(risk_label(79), "[High]");
        assert_eq!(risk_label(80), "[Severe]");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-package-name", 10), "a-very-...");
        assert_eq!(truncate("ñññññññ", 5), "ññ...");
    }
}
