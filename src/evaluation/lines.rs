//! Text line shapes of ground truth (`timestamp,label`) and result (one value per line) artefacts.

use crate::error::{Result, SimError};
use chrono::{DateTime, SecondsFormat, Utc};

fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SimError::Parse(format!("timestamp {s:?}: {e}")))
}

fn parse_label(s: &str) -> Result<usize> {
    s.trim()
        .parse()
        .map_err(|e| SimError::Parse(format!("label {s:?}: {e}")))
}

pub fn format_ground_truth(entries: &[(DateTime<Utc>, usize)]) -> String {
    entries
        .iter()
        .map(|(t, label)| format!("{},{}\n", format_timestamp(t), label))
        .collect()
}

pub fn parse_ground_truth_line(line: &str) -> Result<(DateTime<Utc>, usize)> {
    let (ts, label) = line
        .split_once(',')
        .ok_or_else(|| SimError::Parse(format!("expected timestamp,label in {line:?}")))?;
    Ok((parse_timestamp(ts)?, parse_label(label)?))
}

/// Blank lines are skipped.
pub fn parse_ground_truth(content: &str) -> Result<Vec<(DateTime<Utc>, usize)>> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(parse_ground_truth_line)
        .collect()
}

pub fn format_label_results(labels: &[usize]) -> String {
    labels.iter().map(|l| format!("{l}\n")).collect()
}

pub fn format_timestamp_results(timestamps: &[DateTime<Utc>]) -> String {
    timestamps.iter().map(|t| format!("{}\n", format_timestamp(t))).collect()
}

pub fn parse_label_results(content: &str) -> Result<Vec<usize>> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(parse_label)
        .collect()
}

pub fn parse_timestamp_results(content: &str) -> Result<Vec<DateTime<Utc>>> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(parse_timestamp)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn ground_truth_lines() {
        let t = Utc.with_ymd_and_hms(2019, 11, 18, 0, 0, 0).unwrap() + Duration::milliseconds(1);
        let text = format_ground_truth(&[(t, 4), (t + Duration::hours(1), 0)]);
        assert_eq!(text.lines().next(), Some("2019-11-18T00:00:00.001Z,4"));
        let parsed = parse_ground_truth(&text).unwrap();
        assert_eq!(parsed[1], (t + Duration::hours(1), 0));
    }

    #[test]
    fn offsets_are_normalised_to_utc() {
        let (t, label) = parse_ground_truth_line("2019-11-18T01:00:00.000+01:00,2").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2019, 11, 18, 0, 0, 0).unwrap());
        assert_eq!(label, 2);
    }

    #[test]
    fn malformed_lines_are_parse_errors() {
        assert!(matches!(parse_ground_truth_line("no comma"), Err(SimError::Parse(_))));
        assert!(matches!(parse_ground_truth_line("yesterday,1"), Err(SimError::Parse(_))));
        assert!(matches!(parse_label_results("1\nx\n"), Err(SimError::Parse(_))));
    }

    #[test]
    fn result_lines() {
        assert_eq!(format_label_results(&[3, 1]), "3\n1\n");
        assert_eq!(parse_label_results("3\n1\n\n").unwrap(), vec![3, 1]);
        let t = Utc.with_ymd_and_hms(2020, 1, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp_results(&format_timestamp_results(&[t])).unwrap(), vec![t]);
    }
}
