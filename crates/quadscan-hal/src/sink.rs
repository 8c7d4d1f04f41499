//! Output side: where accepted points go.
//!
//! [`LineSink`] renders one line per point and writes it with a single
//! `write_all`, so lines are never interleaved even if the writer is shared.
//!
//! | Format | Line |
//! |---|---|
//! | [`OutputFormat::Csv`] | `device_id,angle_deg,distance_mm,x_mm,y_mm,intensity` |
//! | [`OutputFormat::Json`] | `{"device_id":0,"angle_deg":…}` |

use std::fmt::Write as _;
use std::io::Write;
use std::str::FromStr;

use quadscan_types::{CartesianPoint, ScanError};
use serde::{Deserialize, Serialize};

/// Destination for accepted points.
pub trait PointSink {
    /// Emit one point.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::SinkFault`] when the point cannot be written.
    fn emit(&mut self, point: &CartesianPoint) -> Result<(), ScanError>;

    /// Push buffered output downstream.
    fn flush(&mut self) -> Result<(), ScanError> {
        Ok(())
    }
}

/// Line format of the point stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{other}'")),
        }
    }
}

/// Render `point` as a newline-terminated line into `line` (cleared first).
///
/// # Errors
///
/// Returns [`ScanError::SinkFault`] if JSON serialisation fails.
pub fn format_line(
    point: &CartesianPoint,
    format: OutputFormat,
    line: &mut String,
) -> Result<(), ScanError> {
    line.clear();
    match format {
        OutputFormat::Csv => {
            // Writing into a String cannot fail.
            let _ = write!(
                line,
                "{},{:.2},{},{:.2},{:.2},{}",
                point.device_id,
                point.angle_deg,
                point.distance_mm,
                point.x_mm,
                point.y_mm,
                point.intensity
            );
        }
        OutputFormat::Json => {
            let json =
                serde_json::to_string(point).map_err(|e| ScanError::SinkFault(e.to_string()))?;
            line.push_str(&json);
        }
    }
    line.push('\n');
    Ok(())
}

/// Line-oriented sink over any writer: stdout, a host serial link, a file.
pub struct LineSink<W: Write> {
    writer: W,
    format: OutputFormat,
    line: String,
    lines: u64,
}

impl<W: Write> LineSink<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            line: String::with_capacity(64),
            lines: 0,
        }
    }

    /// Lines written so far.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> PointSink for LineSink<W> {
    fn emit(&mut self, point: &CartesianPoint) -> Result<(), ScanError> {
        format_line(point, self.format, &mut self.line)?;
        self.writer
            .write_all(self.line.as_bytes())
            .map_err(|e| ScanError::SinkFault(e.to_string()))?;
        self.lines += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ScanError> {
        self.writer
            .flush()
            .map_err(|e| ScanError::SinkFault(e.to_string()))
    }
}

/// Collects points in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub points: Vec<CartesianPoint>,
}

impl PointSink for MemorySink {
    fn emit(&mut self, point: &CartesianPoint) -> Result<(), ScanError> {
        self.points.push(*point);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> CartesianPoint {
        CartesianPoint {
            device_id: 1,
            angle_deg: 12.345,
            distance_mm: 1000,
            x_mm: -1000.0,
            y_mm: 0.004,
            intensity: 200,
        }
    }

    /// Writer that always fails.
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "host gone",
            ))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn csv_line_layout() {
        let mut line = String::new();
        format_line(&point(), OutputFormat::Csv, &mut line).unwrap();
        assert_eq!(line, "1,12.35,1000,-1000.00,0.00,200\n");
    }

    #[test]
    fn json_line_has_every_field() {
        let mut line = String::new();
        format_line(&point(), OutputFormat::Json, &mut line).unwrap();
        assert!(line.ends_with('\n'));
        let back: CartesianPoint = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(back.device_id, 1);
        assert_eq!(back.distance_mm, 1000);
        assert_eq!(back.intensity, 200);
    }

    #[test]
    fn line_sink_writes_one_line_per_point() {
        let mut sink = LineSink::new(Vec::new(), OutputFormat::Csv);
        sink.emit(&point()).unwrap();
        sink.emit(&point()).unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.lines(), 2);

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(out.lines().all(|l| l.split(',').count() == 6));
    }

    #[test]
    fn write_failure_is_sink_fault() {
        let mut sink = LineSink::new(BrokenPipe, OutputFormat::Csv);
        assert!(matches!(sink.emit(&point()), Err(ScanError::SinkFault(_))));
        assert_eq!(sink.lines(), 0);
    }

    #[test]
    fn output_format_parses_case_insensitively() {
        assert_eq!("CSV".parse::<OutputFormat>(), Ok(OutputFormat::Csv));
        assert_eq!(" json ".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }

    #[test]
    fn memory_sink_collects() {
        let mut sink = MemorySink::default();
        sink.emit(&point()).unwrap();
        assert_eq!(sink.points.len(), 1);
    }
}
