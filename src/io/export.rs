//! CSV export for per-step episode telemetry.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::StepReport;

/// Column header for CSV telemetry export.
const HEADER: &str = "step,date,total_costs,reward,arrived,departed,parked,\
                      min_satisfaction,transformer_kw,overloaded";

/// Exports step reports to a CSV file at the given path.
///
/// Writes a header row followed by one data row per step. Per-transformer
/// power is joined with `;` inside a single column so the column count does
/// not depend on the city layout.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(reports: &[StepReport], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(reports, buf)
}

/// Writes step reports as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(reports: &[StepReport], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in reports {
        let transformer_kw = r
            .transformer_power_kw
            .iter()
            .map(|kw| format!("{kw:.4}"))
            .collect::<Vec<_>>()
            .join(";");
        wtr.write_record(&[
            r.step.to_string(),
            r.date.format("%Y-%m-%d %H:%M:%S").to_string(),
            format!("{:.6}", r.total_costs),
            format!("{:.6}", r.reward),
            r.arrived.to_string(),
            r.departed.to_string(),
            r.parked.to_string(),
            r.min_satisfaction()
                .map(|s| format!("{s:.4}"))
                .unwrap_or_default(),
            transformer_kw,
            r.overloaded.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_report(step: usize) -> StepReport {
        StepReport {
            step,
            date: NaiveDate::from_ymd_opt(2023, 7, 21)
                .and_then(|d| d.and_hms_opt(18, 5, 0))
                .unwrap(),
            total_costs: -0.25,
            user_satisfaction: if step % 2 == 0 { vec![0.5, 0.8] } else { vec![] },
            arrived: 1,
            departed: 2,
            parked: 3,
            transformer_power_kw: vec![10.0, -2.5],
            overloaded: false,
            reward: -0.25,
        }
    }

    fn render(reports: &[StepReport]) -> String {
        let mut buf = Vec::new();
        write_csv(reports, &mut buf).ok();
        String::from_utf8(buf).unwrap_or_default()
    }

    #[test]
    fn header_matches_schema() {
        let output = render(&[make_report(0)]);
        let first_line = output.lines().next().unwrap_or("");
        assert_eq!(
            first_line,
            "step,date,total_costs,reward,arrived,departed,parked,\
             min_satisfaction,transformer_kw,overloaded"
        );
    }

    #[test]
    fn row_count_matches_step_count() {
        let reports: Vec<StepReport> = (0..24).map(make_report).collect();
        assert_eq!(render(&reports).lines().count(), 25);
    }

    #[test]
    fn row_values() {
        let output = render(&[make_report(0), make_report(1)]);
        let rows: Vec<&str> = output.lines().skip(1).collect();
        assert_eq!(
            rows[0],
            "0,2023-07-21 18:05:00,-0.250000,-0.250000,1,2,3,0.5000,10.0000;-2.5000,false"
        );
        // no departures -> empty satisfaction column
        assert!(rows[1].contains(",3,,10.0000"));
    }

    #[test]
    fn output_is_deterministic() {
        let reports: Vec<StepReport> = (0..5).map(make_report).collect();
        assert_eq!(render(&reports), render(&reports));
    }

    #[test]
    fn export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.csv");
        export_csv(&[make_report(0)], &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
