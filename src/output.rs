//! Summary rendering
//!
//! The pipeline's result is rendered to stdout as an aligned table (default),
//! CSV, or JSON. The root module row comes first, carrying the aggregated
//! totals.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::module::{Module, VersionsDiff, format_go_version};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode JSON output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to encode CSV output: {0}")]
    Csv(#[from] csv::Error),
}

/// Aggregated totals for the root module row.
#[derive(Debug, Clone, Copy, Default)]
pub struct Totals {
    pub libyear: f64,
    pub releases: i64,
    pub versions: VersionsDiff,
}

/// The completed run: per-dependency records plus root-level totals.
#[derive(Debug, Clone)]
pub struct Summary {
    pub root_path: String,
    pub root_time: DateTime<Utc>,
    pub totals: Totals,
    pub modules: Vec<Module>,
    /// Render the releases-diff column.
    pub releases: bool,
    /// Render the versions-diff column.
    pub versions: bool,
}

pub trait Output: Send + Sync {
    fn send(&self, summary: &Summary) -> Result<(), OutputError>;
}

const DATE_FORMAT: &str = "%Y-%m-%d";

fn format_date(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

/// Rows shared by the table and CSV renderers; the header row comes first.
fn summary_rows(summary: &Summary) -> Vec<Vec<String>> {
    let mut header = vec![
        "package".to_string(),
        "version".to_string(),
        "date".to_string(),
        "latest".to_string(),
        "latest_date".to_string(),
        "libyear".to_string(),
    ];
    if summary.releases {
        header.push("releases".to_string());
    }
    if summary.versions {
        header.push("versions".to_string());
    }

    let mut rows = vec![header];

    let mut root = vec![
        summary.root_path.clone(),
        String::new(),
        format_date(Some(summary.root_time)),
        String::new(),
        String::new(),
        format!("{:.2}", summary.totals.libyear),
    ];
    if summary.releases {
        root.push(summary.totals.releases.to_string());
    }
    if summary.versions {
        root.push(summary.totals.versions.to_string());
    }
    rows.push(root);

    for module in &summary.modules {
        let mut row = vec![
            module.path.clone(),
            format_go_version(&module.version),
            format_date(module.time),
            format_go_version(module.latest_version()),
            format_date(module.latest_time()),
            format!("{:.2}", module.libyear),
        ];
        if summary.releases {
            row.push(
            module
                .releases_diff
                .map(|d| d.to_string())
                .unwrap_or_default(),
        );
        }
        if summary.versions {
            row.push(module.versions_diff.to_string());
        }
        rows.push(row);
    }
    rows
}

pub struct TableOutput;

impl Output for TableOutput {
    fn send(&self, summary: &Summary) -> Result<(), OutputError> {
        let rows = summary_rows(summary);
        let mut column_widths = vec![0usize; rows[0].len()];
        for row in &rows {
            for (i, cell) in row.iter().enumerate() {
                column_widths[i] = column_widths[i].max(cell.len());
            }
        }
        for row in &rows {
            let mut line = String::new();
            for (i, cell) in row.iter().enumerate() {
                if i == row.len() - 1 {
                    line.push_str(cell);
                    break;
                }
                line.push_str(&format!("{:<width$}  ", cell, width = column_widths[i]));
            }
            println!("{}", line.trim_end());
        }
        Ok(())
    }
}

pub struct CsvOutput;

impl Output for CsvOutput {
    fn send(&self, summary: &Summary) -> Result<(), OutputError> {
        let mut writer = csv::Writer::from_writer(std::io::stdout());
        for row in summary_rows(summary) {
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

pub struct JsonOutput;

#[derive(Serialize)]
struct JsonSummary {
    module: String,
    date: String,
    libyear: f64,
    packages: Vec<JsonPackage>,
}

#[derive(Serialize)]
struct JsonPackage {
    package: String,
    version: String,
    date: String,
    latest_version: String,
    latest_date: String,
    libyear: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    releases: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    versions: Option<VersionsDiff>,
}

impl Output for JsonOutput {
    fn send(&self, summary: &Summary) -> Result<(), OutputError> {
        let model = JsonSummary {
            module: summary.root_path.clone(),
            date: format_date(Some(summary.root_time)),
            libyear: summary.totals.libyear,
            packages: summary
                .modules
                .iter()
                .map(|module| JsonPackage {
                    package: module.path.clone(),
                    version: format_go_version(&module.version),
                    date: format_date(module.time),
                    latest_version: format_go_version(module.latest_version()),
                    latest_date: format_date(module.latest_time()),
                    libyear: module.libyear,
                    releases: summary.releases.then(|| module.releases_diff.unwrap_or(0)),
                    versions: summary.versions.then_some(module.versions_diff),
                })
                .collect(),
        };
        serde_json::to_writer_pretty(std::io::stdout(), &model)?;
        println!();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleInfo;
    use semver::Version;

    fn summary() -> Summary {
        let mut module = Module::new(
            "github.com/acme/mod",
            Version::parse("1.0.0").unwrap(),
            false,
        );
        module.time = Some("2021-01-01T00:00:00Z".parse().unwrap());
        module.latest = Some(ModuleInfo {
            path: "github.com/acme/mod".to_string(),
            version: Version::parse("1.4.0").unwrap(),
            time: "2022-01-01T00:00:00Z".parse().unwrap(),
        });
        module.libyear = 1.0;
        module.releases_diff = Some(4);
        module.versions_diff = VersionsDiff([0, 4, 0]);
        Summary {
            root_path: "example.com/root".to_string(),
            root_time: "2024-06-01T12:00:00Z".parse().unwrap(),
            totals: Totals {
                libyear: 1.0,
                releases: 4,
                versions: VersionsDiff([0, 4, 0]),
            },
            modules: vec![module],
            releases: false,
            versions: false,
        }
    }

    #[test]
    fn summary_rows_renders_base_columns() {
        let rows = summary_rows(&summary());
        assert_eq!(
            rows[0],
            vec!["package", "version", "date", "latest", "latest_date", "libyear"]
        );
        assert_eq!(rows[1][0], "example.com/root");
        assert_eq!(rows[1][5], "1.00");
        assert_eq!(
            rows[2],
            vec![
                "github.com/acme/mod",
                "v1.0.0",
                "2021-01-01",
                "v1.4.0",
                "2022-01-01",
                "1.00",
            ]
        );
    }

    #[test]
    fn summary_rows_appends_optional_columns() {
        let mut summary = summary();
        summary.releases = true;
        summary.versions = true;

        let rows = summary_rows(&summary);

        assert_eq!(rows[0][6], "releases");
        assert_eq!(rows[0][7], "versions");
        assert_eq!(rows[2][6], "4");
        assert_eq!(rows[2][7], "[0, 4, 0]");
    }

    #[test]
    fn summary_rows_falls_back_to_own_version_when_current() {
        let mut summary = summary();
        summary.modules[0].latest = None;

        let rows = summary_rows(&summary);

        assert_eq!(rows[2][3], "v1.0.0");
        assert_eq!(rows[2][4], "2021-01-01");
    }
}
