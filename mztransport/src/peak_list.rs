//! Reading and writing measures as plain text.
//!
//! A peak list has one `position<TAB>weight` pair per line. When reading, any whitespace
//! separates the two fields, and blank lines and lines starting with `#` are skipped.
use std::io::{self, prelude::*};
use std::str::FromStr;

use tracing::debug;

use crate::error::MeasureError;
use crate::measure::PointMeasure;
use crate::peak::Peak;
use crate::transport::TransportMove;

fn parse_field(line: usize, content: &str, token: &str, field: &str) -> Result<f64, MeasureError> {
    token.parse::<f64>().map_err(|e| MeasureError::Parse {
        line,
        content: content.to_string(),
        reason: format!("invalid {field} {token:?}: {e}"),
    })
}

fn parse_line(line: usize, content: &str) -> Result<Option<Peak>, MeasureError> {
    let trimmed = content.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if tokens.len() != 2 {
        return Err(MeasureError::Parse {
            line,
            content: content.to_string(),
            reason: format!("expected 2 fields, found {}", tokens.len()),
        });
    }
    let position = parse_field(line, content, tokens[0], "position")?;
    let weight = parse_field(line, content, tokens[1], "weight")?;
    Ok(Some(Peak::new(position, weight)))
}

/// Read a peak list into a canonical measure. Line numbers in errors start at 1.
pub fn read_peak_list<R: BufRead>(reader: R) -> Result<PointMeasure, MeasureError> {
    let mut peaks = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if let Some(peak) = parse_line(i + 1, &line)? {
            peaks.push(peak);
        }
    }
    let measure = PointMeasure::new(peaks);
    debug!("Read {} peaks", measure.len());
    Ok(measure)
}

/// Write `measure` one peak per line
pub fn write_peak_list<W: Write>(mut writer: W, measure: &PointMeasure) -> io::Result<()> {
    for peak in measure.iter() {
        writeln!(writer, "{peak}")?;
    }
    writer.flush()
}

/// Write a sequence of transport moves as `source<TAB>target<TAB>weight` lines
pub fn write_transport_plan<W: Write, I: IntoIterator<Item = TransportMove>>(
    mut writer: W,
    moves: I,
) -> io::Result<usize> {
    let mut count = 0;
    for step in moves {
        writeln!(writer, "{step}")?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

impl FromStr for PointMeasure {
    type Err = MeasureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        read_peak_list(s.as_bytes())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_read() {
        let text = "# observed\n100.5\t0.25\n\n  99.5   0.75\n100.5 0.5\n";
        let measure: PointMeasure = text.parse().unwrap();
        assert_eq!(measure.len(), 2);
        assert_eq!(measure[0], Peak::new(99.5, 0.75));
        assert_eq!(measure[1], Peak::new(100.5, 0.75));
    }

    #[test]
    fn test_parse_errors() {
        let err = "100.0\t1.0\n101.0\n".parse::<PointMeasure>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        match err {
            MeasureError::Parse { line, content, .. } => {
                assert_eq!(line, 2);
                assert_eq!(content, "101.0");
            }
            other => panic!("unexpected error {other}"),
        }

        let err = "100.0\tabc\n".parse::<PointMeasure>().unwrap_err();
        assert!(matches!(err, MeasureError::Parse { line: 1, .. }));
        let err = "1 2 3\n".parse::<PointMeasure>().unwrap_err();
        assert!(err.to_string().contains("expected 2 fields"));
    }

    #[test]
    fn test_write() {
        let measure: PointMeasure = vec![(101.0, 0.5), (100.0, 0.5)].into();
        let mut buffer = Vec::new();
        write_peak_list(&mut buffer, &measure).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "100\t0.5\n101\t0.5\n");
        assert_eq!(text.parse::<PointMeasure>().unwrap(), measure);
    }

    #[test]
    fn test_write_transport_plan() {
        let a: PointMeasure = vec![(100.0, 0.5), (101.0, 0.5)].into();
        let b: PointMeasure = vec![(100.5, 1.0)].into();
        let mut buffer = Vec::new();
        let count = write_transport_plan(&mut buffer, a.transport_plan(&b).unwrap()).unwrap();
        assert_eq!(count, 2);
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "100\t100.5\t0.5\n101\t100.5\t0.5\n");
    }
}
