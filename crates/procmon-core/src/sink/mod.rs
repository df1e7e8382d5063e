//! Event sinks.
//!
//! A sink receives one batch per poll cycle and either accepts all of it or
//! fails; there is no partial success.

mod hec;
mod jsonl;

pub use hec::{HecConfig, HecSink};
pub use jsonl::JsonLinesSink;

use crate::normalize::NormalizedEvent;

/// Error type for sink failures.
#[derive(Debug)]
pub enum SinkError {
    /// Transport level HTTP failure (connect, timeout, TLS).
    Http(reqwest::Error),
    /// Endpoint answered with a non-success status.
    Status { status: u16, body: String },
    /// Endpoint URL could not be parsed.
    InvalidUrl(String),
    /// Events could not be serialized.
    Encode(serde_json::Error),
    /// I/O error writing events.
    Io(std::io::Error),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Http(e) => write!(f, "HTTP error: {}", e),
            SinkError::Status { status, body } if body.is_empty() => {
                write!(f, "sink rejected batch with status {}", status)
            }
            SinkError::Status { status, body } => {
                write!(f, "sink rejected batch with status {}: {}", status, body)
            }
            SinkError::InvalidUrl(url) => write!(f, "invalid sink URL '{}'", url),
            SinkError::Encode(e) => write!(f, "failed to encode events: {}", e),
            SinkError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Http(e) => Some(e),
            SinkError::Encode(e) => Some(e),
            SinkError::Io(e) => Some(e),
            SinkError::Status { .. } | SinkError::InvalidUrl(_) => None,
        }
    }
}

impl From<reqwest::Error> for SinkError {
    fn from(e: reqwest::Error) -> Self {
        SinkError::Http(e)
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(e: serde_json::Error) -> Self {
        SinkError::Encode(e)
    }
}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        SinkError::Io(e)
    }
}

/// Destination for normalized event batches.
pub trait EventSink {
    /// Transmits a batch. Ownership of the events moves to the sink.
    fn write(&mut self, events: Vec<NormalizedEvent>) -> Result<(), SinkError>;
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn write(&mut self, events: Vec<NormalizedEvent>) -> Result<(), SinkError> {
        (**self).write(events)
    }
}

/// Serializes events as newline separated JSON objects.
pub(crate) fn encode_events(events: &[NormalizedEvent]) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::with_capacity(events.len() * 256);
    for event in events {
        serde_json::to_writer(&mut buf, event)?;
        buf.push(b'\n');
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_events() {
        let events = vec![
            NormalizedEvent {
                host: "h1".to_string(),
                source: "proc_monitor".to_string(),
                sourcetype: "metric".to_string(),
                event: json!({"cpu": 10}),
            },
            NormalizedEvent {
                host: "h1".to_string(),
                source: "proc_monitor".to_string(),
                sourcetype: "metric".to_string(),
                event: json!({"pid": 1}),
            },
        ];

        let encoded = String::from_utf8(encode_events(&events).unwrap()).unwrap();
        assert_eq!(
            encoded,
            "{\"host\":\"h1\",\"source\":\"proc_monitor\",\"sourcetype\":\"metric\",\"event\":{\"cpu\":10}}\n\
             {\"host\":\"h1\",\"source\":\"proc_monitor\",\"sourcetype\":\"metric\",\"event\":{\"pid\":1}}\n"
        );
    }

    #[test]
    fn test_status_error_display() {
        let err = SinkError::Status {
            status: 403,
            body: "{\"text\":\"Invalid token\",\"code\":4}".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "sink rejected batch with status 403: {\"text\":\"Invalid token\",\"code\":4}"
        );

        let err = SinkError::Status {
            status: 503,
            body: String::new(),
        };
        assert_eq!(err.to_string(), "sink rejected batch with status 503");
    }
}
