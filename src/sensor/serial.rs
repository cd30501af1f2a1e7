use super::{parse_line, SensorReading};
use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, ErrorKind};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Read newline-delimited sensor lines from `reader` until EOF.
///
/// Parsed readings are forwarded to `tx`; malformed lines are dropped without
/// affecting the following ones. Read timeouts are retried. Returns `Ok(())`
/// on EOF or when the receiver is gone.
pub fn pump_lines<R: BufRead>(mut reader: R, tx: &mpsc::Sender<SensorReading>) -> std::io::Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return Ok(()),
            Ok(_) => {
                // Partial lines survive timeouts; only a full line is parsed
                if buf.last() != Some(&b'\n') {
                    continue;
                }
                let line = String::from_utf8_lossy(&buf).into_owned();
                buf.clear();

                match parse_line(&line) {
                    Ok(reading) => {
                        if tx.blocking_send(reading).is_err() {
                            return Ok(());
                        }
                    }
                    Err(e) => debug!(error = %e, line = %line.trim(), "Discarding sensor line"),
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Open the serial device and spawn a blocking reader for it.
///
/// Returns `None` when the device cannot be opened; the hub keeps running
/// without a hardware link.
pub fn spawn_serial_reader(
    path: &str,
    baud_rate: u32,
    tx: mpsc::Sender<SensorReading>,
) -> Option<JoinHandle<()>> {
    let port = match open_port(path, baud_rate) {
        Ok(port) => port,
        Err(e) => {
            warn!(path = %path, error = %e, "Serial device not connected, running without sensors");
            return None;
        }
    };
    info!(path = %path, baud_rate = baud_rate, "Serial device connected");

    let path = path.to_string();
    Some(tokio::task::spawn_blocking(move || {
        let mut reader = BufReader::new(port);
        loop {
            match pump_lines(&mut reader, &tx) {
                Ok(()) => {
                    info!(path = %path, "Serial reader stopped");
                    return;
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Serial read error");
                    std::thread::sleep(Duration::from_secs(1));
                }
            }
        }
    }))
}

fn open_port(path: &str, baud_rate: u32) -> Result<Box<dyn serialport::SerialPort>> {
    serialport::new(path, baud_rate)
        .timeout(Duration::from_secs(1))
        .open()
        .with_context(|| format!("Failed to open serial device {}", path))
}
