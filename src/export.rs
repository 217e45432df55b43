//! Report exporter.
//!
//! `RosterReport` is the presentation-neutral table (rows = employees,
//! columns = days, cells = period code or `none`) plus legend and summary.
//! Sinks render it; a failing sink never touches the roster it came from.

use csv::WriterBuilder;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::ExportError;
use crate::roster::{Roster, RosterSummary};

/// Cell content for a day off.
pub const EMPTY_CELL: &str = "none";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub employee: String,
    pub cells: Vec<String>,
    pub hours: i64,
}

/// One period code and how to render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendEntry {
    pub code: String,
    pub period: String,
    pub duration_hours: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterReport {
    pub columns: Vec<String>,
    pub rows: Vec<ReportRow>,
    pub legend: Vec<LegendEntry>,
    pub summary: RosterSummary,
}

impl RosterReport {
    pub fn from_roster(roster: &Roster) -> Self {
        let catalog = roster.catalog();
        let columns = catalog.days().map(|day| catalog.day_label(day)).collect();
        let rows = catalog
            .employees()
            .iter()
            .enumerate()
            .map(|(e_idx, employee)| ReportRow {
                employee: employee.to_string(),
                cells: catalog
                    .days()
                    .map(|day| match roster.assignment(e_idx, day) {
                        Some(period) => period.code.clone(),
                        None => EMPTY_CELL.to_string(),
                    })
                    .collect(),
                hours: roster.hours_worked(e_idx),
            })
            .collect();
        let legend = catalog
            .periods()
            .iter()
            .map(|p| LegendEntry {
                code: p.code.clone(),
                period: p.id.to_string(),
                duration_hours: p.duration_hours,
                color: p.color.clone(),
            })
            .collect();
        Self {
            columns,
            rows,
            legend,
            summary: roster.summary(),
        }
    }

    /// Legend entry of a cell code, for renderers that color cells.
    pub fn legend_for(&self, code: &str) -> Option<&LegendEntry> {
        self.legend.iter().find(|entry| entry.code == code)
    }

    pub fn to_csv_string(&self) -> Result<String, ExportError> {
        let mut sink = CsvReportWriter::new(Vec::new());
        sink.write_report(self)?;
        let bytes = sink.into_inner()?;
        String::from_utf8(bytes)
            .map_err(|e| ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }
}

/// Write side of the report interface.
pub trait ReportSink {
    fn write_report(&mut self, report: &RosterReport) -> Result<(), ExportError>;
}

/// CSV rendering: the roster grid, then a legend block and a summary block
/// separated by blank lines.
pub struct CsvReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvReportWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_writer(inner),
        }
    }

    pub fn into_inner(self) -> Result<W, ExportError> {
        self.writer
            .into_inner()
            .map_err(|e| ExportError::Io(e.into_error()))
    }
}

impl<W: Write> ReportSink for CsvReportWriter<W> {
    fn write_report(&mut self, report: &RosterReport) -> Result<(), ExportError> {
        let mut header = vec!["Employee".to_string()];
        header.extend(report.columns.iter().cloned());
        header.push("Hours".to_string());
        self.writer.write_record(&header)?;

        for row in &report.rows {
            let mut record = vec![row.employee.clone()];
            record.extend(row.cells.iter().cloned());
            record.push(row.hours.to_string());
            self.writer.write_record(&record)?;
        }

        self.writer.write_record([""])?;
        self.writer.write_record(["Code", "Period", "Hours", "Color"])?;
        for entry in &report.legend {
            self.writer.write_record([
                entry.code.as_str(),
                entry.period.as_str(),
                entry.duration_hours.to_string().as_str(),
                entry.color.as_deref().unwrap_or(""),
            ])?;
        }

        let summary = &report.summary;
        self.writer.write_record([""])?;
        self.writer.write_record(["Status", summary.status.as_str()])?;
        self.writer
            .write_record(["Total preference cost", summary.total_preference_cost.to_string().as_str()])?;
        if let Some(objective) = summary.objective_value {
            self.writer.write_record(["Objective", objective.to_string().as_str()])?;
        }
        self.writer
            .write_record(["Assigned shifts", summary.assigned_shifts.to_string().as_str()])?;
        self.writer
            .write_record(["Solve time (ms)", summary.solve_time_ms.to_string().as_str()])?;
        self.writer.flush()?;
        Ok(())
    }
}

/// JSON rendering of the whole report.
pub struct JsonReportWriter<W: Write> {
    writer: W,
    pretty: bool,
}

impl<W: Write> JsonReportWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, pretty: false }
    }

    pub fn pretty(writer: W) -> Self {
        Self { writer, pretty: true }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for JsonReportWriter<W> {
    fn write_report(&mut self, report: &RosterReport) -> Result<(), ExportError> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, report)?;
        } else {
            serde_json::to_writer(&mut self.writer, report)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

pub fn write_csv_file(path: impl AsRef<Path>, report: &RosterReport) -> Result<(), ExportError> {
    let mut sink = CsvReportWriter::new(File::create(path)?);
    sink.write_report(report)
}

pub fn write_json_file(path: impl AsRef<Path>, report: &RosterReport) -> Result<(), ExportError> {
    let mut sink = JsonReportWriter::pretty(File::create(path)?);
    sink.write_report(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ModelBuilder;
    use crate::domain::{Catalog, Day, EmployeeId, Period};
    use crate::model::Valuation;
    use crate::preferences::WeightTable;
    use crate::roster::materialize;
    use crate::solver::{SolveOutcome, SolveStatus};
    use chrono::NaiveDate;
    use std::time::Duration;

    fn roster() -> Roster {
        let catalog = Catalog::new(
            vec![EmployeeId::new("Alice"), EmployeeId::new("Bob")],
            vec![
                Period::new("Morning", 8).with_color("FFCCFF"),
                Period::new("Night", 10).with_code("N").with_color("CCCCFF"),
            ],
            2,
        )
        .unwrap()
        .with_start_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let model = ModelBuilder::new(&catalog).build();
        let vars = model.variables();
        let mut valuation = Valuation::all_false(vars.len());
        valuation.set(vars.var(0, Day::new(1), 0).unwrap(), true);
        valuation.set(vars.var(1, Day::new(2), 1).unwrap(), true);
        let weights = WeightTable::uniform(vars, 3);
        let outcome = SolveOutcome::solved(SolveStatus::Optimal, valuation, Some(6), Duration::from_millis(12));
        materialize(&catalog, &model, &weights, &outcome).unwrap()
    }

    #[test]
    fn test_report_table() {
        let report = RosterReport::from_roster(&roster());
        assert_eq!(report.columns, vec!["Mon 2024-01-01", "Tue 2024-01-02"]);
        assert_eq!(report.rows[0].cells, vec!["M", EMPTY_CELL]);
        assert_eq!(report.rows[1].cells, vec![EMPTY_CELL, "N"]);
        assert_eq!(report.rows[1].hours, 10);
        assert_eq!(report.summary.total_preference_cost, 6);
        assert_eq!(
            report.legend_for("N").and_then(|e| e.color.as_deref()),
            Some("CCCCFF")
        );
    }

    #[test]
    fn test_csv_layout() {
        let csv = RosterReport::from_roster(&roster()).to_csv_string().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Employee,Mon 2024-01-01,Tue 2024-01-02,Hours");
        assert_eq!(lines[1], "Alice,M,none,8");
        assert_eq!(lines[2], "Bob,none,N,10");
        assert!(lines.contains(&"M,Morning,8,FFCCFF"));
        assert!(csv.contains("Total preference cost,6"));
        assert!(csv.contains("Status,OPTIMAL"));
    }

    #[test]
    fn test_json_sink() {
        let report = RosterReport::from_roster(&roster());
        let mut sink = JsonReportWriter::new(Vec::new());
        sink.write_report(&report).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&sink.into_inner()).unwrap();
        assert_eq!(value["rows"][0]["employee"], "Alice");
        assert_eq!(value["summary"]["status"], "OPTIMAL");
        assert_eq!(value["summary"]["totalPreferenceCost"], 6);
        assert_eq!(value["legend"][1]["code"], "N");
    }

    struct FailingSink;

    impl ReportSink for FailingSink {
        fn write_report(&mut self, _report: &RosterReport) -> Result<(), ExportError> {
            Err(ExportError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        }
    }

    #[test]
    fn test_failed_export_leaves_roster_intact() {
        let roster = roster();
        let before = roster.clone();
        let report = RosterReport::from_roster(&roster);
        assert!(FailingSink.write_report(&report).is_err());
        assert_eq!(roster, before);
    }
}
