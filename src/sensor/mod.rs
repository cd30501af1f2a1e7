// Sensor line ingress for the hub
//
// Lines are comma separated and tagged by a one-character category:
//   R,<angle>,<distance>
//   S,<temp>,<hum>,<gas>
//   V[,...]            vibration pulse

mod serial;

pub use serial::{pump_lines, spawn_serial_reader};

use std::fmt;

/// One parsed sensor line
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SensorReading {
    Radar { angle: i32, distance: i32 },
    Environment { temp: f64, hum: f64, gas: i32 },
    Vibration,
}

/// Why a sensor line was discarded
#[derive(Debug, Clone, PartialEq)]
pub enum SensorLineError {
    Empty,
    UnknownTag(String),
    FieldCount { tag: char, expected: usize, got: usize },
    InvalidNumber(String),
}

impl fmt::Display for SensorLineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorLineError::Empty => write!(f, "empty line"),
            SensorLineError::UnknownTag(tag) => write!(f, "unknown line tag '{}'", tag),
            SensorLineError::FieldCount { tag, expected, got } => {
                write!(f, "'{}' line needs {} fields, got {}", tag, expected, got)
            }
            SensorLineError::InvalidNumber(s) => write!(f, "invalid number '{}'", s),
        }
    }
}

impl std::error::Error for SensorLineError {}

/// Parse a single sensor line (without trailing newline).
pub fn parse_line(line: &str) -> Result<SensorReading, SensorLineError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(SensorLineError::Empty);
    }

    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    match parts[0] {
        "R" => {
            expect_fields('R', &parts, 3)?;
            Ok(SensorReading::Radar {
                angle: number(parts[1])?,
                distance: number(parts[2])?,
            })
        }
        "S" => {
            expect_fields('S', &parts, 4)?;
            Ok(SensorReading::Environment {
                temp: number(parts[1])?,
                hum: number(parts[2])?,
                gas: number(parts[3])?,
            })
        }
        // Devices send "V,1"; any payload after the tag is ignored
        "V" => Ok(SensorReading::Vibration),
        other => Err(SensorLineError::UnknownTag(other.to_string())),
    }
}

fn expect_fields(tag: char, parts: &[&str], expected: usize) -> Result<(), SensorLineError> {
    if parts.len() != expected {
        return Err(SensorLineError::FieldCount {
            tag,
            expected,
            got: parts.len(),
        });
    }
    Ok(())
}

fn number<T: std::str::FromStr>(field: &str) -> Result<T, SensorLineError> {
    field
        .parse()
        .map_err(|_| SensorLineError::InvalidNumber(field.to_string()))
}
