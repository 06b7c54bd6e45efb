//! Parser for Digilent WaveForms "Raw Data" CSV exports of a logic
//! capture.
//!
//! The export starts with a fixed header: six `#`-prefixed metadata lines
//! (of which we want the sample rate and the sample count), one blank
//! line and one column-header line, then exactly as many `timestamp,value`
//! rows as the header declared. Header mismatches are fatal, this is a
//! format assertion rather than log noise.

use thiserror::Error;

pub const HEADER_TAG: &str = "#Digilent WaveForms Logic Analyzer Raw Data";

/// samples are packed as little-endian u16
pub const UNIT_SIZE: usize = 2;

/// 6 metadata lines + blank + column headers
const HEADER_LINES: usize = 8;

const RATE_LINE: usize = 4;
const COUNT_LINE: usize = 5;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("input ends inside the {HEADER_LINES}-line header")]
    TruncatedHeader,
    #[error("not a WaveForms raw data export")]
    HeaderTag,
    #[error("header line {line}: expected `name: value`")]
    HeaderField { line: usize },
    #[error("header declares {expected} samples but found {found} rows")]
    SampleCount { expected: usize, found: usize },
    #[error("row {row}: expected `timestamp,value`")]
    MalformedRow { row: usize },
    #[error("row {row}: sample does not fit in 16 bits")]
    SampleValue { row: usize },
}

pub struct Capture {
    /// declared rate in Hz
    pub sample_rate: u64,
    pub samples: Vec<u16>,
}

impl Capture {
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// the packed form the srzip logic entry wants
    pub fn logic_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * UNIT_SIZE);
        for sample in &self.samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }
}

pub fn parse_capture(text: &str) -> Result<Capture, CaptureError> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < HEADER_LINES {
        return Err(CaptureError::TruncatedHeader);
    }

    if lines[0].trim_end_matches('\r') != HEADER_TAG {
        return Err(CaptureError::HeaderTag);
    }

    // "#Sample rate: 1e+08Hz", scientific notation included
    let rate = header_value(&lines, RATE_LINE)?;
    let sample_rate = rate
        .trim_end_matches("Hz")
        .parse::<f64>()
        .map_err(|_| CaptureError::HeaderField { line: RATE_LINE })? as u64;

    let declared = header_value(&lines, COUNT_LINE)?
        .parse::<usize>()
        .map_err(|_| CaptureError::HeaderField { line: COUNT_LINE })?;

    let rows = &lines[HEADER_LINES..];
    if rows.len() != declared {
        return Err(CaptureError::SampleCount {
            expected: declared,
            found: rows.len(),
        });
    }

    let mut samples = Vec::with_capacity(declared);
    for (row, text) in rows.iter().enumerate() {
        let mut fields = text.trim_end_matches('\r').split(',');
        let (Some(_timestamp), Some(value), None) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(CaptureError::MalformedRow { row });
        };

        let value = value
            .trim()
            .parse::<u16>()
            .map_err(|_| CaptureError::SampleValue { row })?;
        samples.push(value);
    }

    Ok(Capture {
        sample_rate,
        samples,
    })
}

fn header_value<'a>(lines: &[&'a str], line: usize) -> Result<&'a str, CaptureError> {
    lines[line]
        .trim_end_matches('\r')
        .split_once(": ")
        .map(|(_name, value)| value)
        .ok_or(CaptureError::HeaderField { line })
}

#[cfg(test)]
mod tests {
    use super::{parse_capture, CaptureError};

    fn export(rate: &str, count: usize, rows: &[&str]) -> String {
        let mut text = String::new();
        text.push_str("#Digilent WaveForms Logic Analyzer Raw Data\n");
        text.push_str("#Device Name: Discovery2\n");
        text.push_str("#Serial Number: SN:210321A\n");
        text.push_str("#Date Time: 2025-05-02 11:22:33\n");
        text.push_str(&format!("#Sample rate: {}Hz\n", rate));
        text.push_str(&format!("#Samples: {}\n", count));
        text.push('\n');
        text.push_str("Time (s),Data\n");
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text
    }

    #[test]
    fn parses_an_export() {
        let text = export("1e+08", 3, &["0,0", "1e-08,65535", "2e-08,512"]);
        let capture = parse_capture(&text).unwrap();

        assert_eq!(capture.sample_rate, 100_000_000);
        assert_eq!(capture.samples, [0, 65535, 512]);
        assert_eq!(
            capture.logic_bytes(),
            [0x00, 0x00, 0xff, 0xff, 0x00, 0x02]
        );
    }

    #[test]
    fn plain_rate_also_parses() {
        let text = export("24000000", 1, &["0,1"]);
        assert_eq!(parse_capture(&text).unwrap().sample_rate, 24_000_000);
    }

    #[test]
    fn wrong_tag_is_fatal() {
        let text = export("1e+08", 1, &["0,0"]).replace("#Digilent", "#Other");
        assert!(matches!(
            parse_capture(&text),
            Err(CaptureError::HeaderTag)
        ));
    }

    #[test]
    fn row_count_must_match_declared() {
        let text = export("1e+08", 5, &["0,0", "1e-08,1"]);
        assert!(matches!(
            parse_capture(&text),
            Err(CaptureError::SampleCount {
                expected: 5,
                found: 2,
            })
        ));
    }

    #[test]
    fn short_input_is_fatal() {
        assert!(matches!(
            parse_capture("#Digilent WaveForms Logic Analyzer Raw Data\n"),
            Err(CaptureError::TruncatedHeader)
        ));
    }

    #[test]
    fn bad_rows_are_fatal() {
        let text = export("1e+08", 1, &["0"]);
        assert!(matches!(
            parse_capture(&text),
            Err(CaptureError::MalformedRow { row: 0 })
        ));

        let text = export("1e+08", 1, &["0,1,2"]);
        assert!(matches!(
            parse_capture(&text),
            Err(CaptureError::MalformedRow { row: 0 })
        ));

        let text = export("1e+08", 1, &["0,65536"]);
        assert!(matches!(
            parse_capture(&text),
            Err(CaptureError::SampleValue { row: 0 })
        ));
    }
}
