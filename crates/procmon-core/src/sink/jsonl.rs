//! Newline-delimited JSON sink.

use std::io::Write;

use super::{EventSink, SinkError, encode_events};
use crate::normalize::NormalizedEvent;

/// Writes each event as one JSON line and flushes after every batch.
///
/// Used for dry runs (`procmond --stdout`) and for piping into other tools.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn write(&mut self, events: Vec<NormalizedEvent>) -> Result<(), SinkError> {
        let buf = encode_events(&events)?;
        self.writer.write_all(&buf)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_writes_one_line_per_event() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let event = |pid: u32| NormalizedEvent {
            host: "h1".to_string(),
            source: "proc_monitor".to_string(),
            sourcetype: "metric".to_string(),
            event: json!({ "pid": pid }),
        };

        sink.write(vec![event(1), event(2)]).unwrap();
        sink.write(vec![event(3)]).unwrap();
        sink.write(Vec::new()).unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let parsed: Vec<NormalizedEvent> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(parsed, vec![event(1), event(2), event(3)]);
    }

    #[test]
    fn test_write_error_is_reported() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut sink = JsonLinesSink::new(Broken);
        let err = sink
            .write(vec![NormalizedEvent {
                host: "h1".to_string(),
                source: "s".to_string(),
                sourcetype: "t".to_string(),
                event: json!(null),
            }])
            .unwrap_err();
        assert!(matches!(err, SinkError::Io(_)));
    }
}
