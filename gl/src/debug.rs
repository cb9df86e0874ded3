//! Debug message classification.
//!
//! The driver reports validation errors, performance hints and application
//! markers through an asynchronous callback carrying raw enumerants. This
//! module decodes them into a [`DebugEvent`] and hands it to the
//! [`DebugSink`] installed on the context.

use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::backend::RawDebugMessage;
use crate::error::{GlError, GlResult};
use crate::types::{DebugKind, DebugSeverity, DebugSource};

/// A decoded debug message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEvent {
    /// Where the message originated.
    pub source: DebugSource,
    /// What the message is about.
    pub kind: DebugKind,
    /// How serious it is.
    pub severity: DebugSeverity,
    /// Implementation-defined message id.
    pub id: u32,
    /// Message text.
    pub message: String,
}

impl DebugEvent {
    /// Resolve every enumerant of a raw message.
    ///
    /// A value outside its family is reported as
    /// [`GlError::UnknownEnumerant`]; callers decide whether to continue.
    pub fn classify(raw: &RawDebugMessage<'_>) -> GlResult<Self> {
        Ok(Self {
            source: DebugSource::try_from(raw.source)?,
            kind: DebugKind::try_from(raw.kind)?,
            severity: DebugSeverity::try_from(raw.severity)?,
            id: raw.id,
            message: raw.message.to_owned(),
        })
    }

    /// Whether this event reports a problem rather than information.
    pub fn is_failure(&self) -> bool {
        !self.severity.is_informational()
    }
}

impl fmt::Display for DebugEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}: {}",
            self.source, self.kind, self.severity, self.id, self.message
        )
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Receiver of decoded debug events.
///
/// Runs on the context thread, inside whatever call made the driver report.
/// Implementations must not call back into the context.
pub trait DebugSink {
    /// Handle a decoded event.
    fn on_event(&self, event: &DebugEvent);

    /// Handle a message whose enumerants could not be decoded.
    fn on_unknown(&self, raw: &RawDebugMessage<'_>, error: &GlError) {
        log::warn!(
            "Undecodable GL debug message {} ({}): {}",
            raw.id,
            error,
            raw.message
        );
    }
}

/// Sink forwarding events to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DebugSink for LogSink {
    fn on_event(&self, event: &DebugEvent) {
        match event.severity {
            DebugSeverity::High => log::error!("[GL] {}", event),
            DebugSeverity::Medium => log::warn!("[GL] {}", event),
            DebugSeverity::Low => log::info!("[GL] {}", event),
            DebugSeverity::Notification => log::debug!("[GL] {}", event),
        }
    }
}

/// Sink keeping every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: RefCell<Vec<DebugEvent>>,
    unknown: RefCell<Vec<GlError>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far.
    pub fn events(&self) -> Vec<DebugEvent> {
        self.events.borrow().clone()
    }

    /// Decode errors received so far.
    pub fn unknown(&self) -> Vec<GlError> {
        self.unknown.borrow().clone()
    }

    /// Events that are not notifications.
    pub fn failures(&self) -> Vec<DebugEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.is_failure())
            .cloned()
            .collect()
    }

    /// Number of events received.
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    /// Whether no event has been received.
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
        self.unknown.borrow_mut().clear();
    }
}

impl DebugSink for RecordingSink {
    fn on_event(&self, event: &DebugEvent) {
        self.events.borrow_mut().push(event.clone());
    }

    fn on_unknown(&self, raw: &RawDebugMessage<'_>, error: &GlError) {
        log::warn!("Undecodable GL debug message {}: {}", raw.id, error);
        self.unknown.borrow_mut().push(error.clone());
    }
}

/// Classify a raw message and deliver it to `sink`.
///
/// Never unwinds: the caller is the driver.
pub(crate) fn dispatch(sink: &dyn DebugSink, raw: &RawDebugMessage<'_>) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match DebugEvent::classify(raw) {
        Ok(event) => sink.on_event(&event),
        Err(error) => sink.on_unknown(raw, &error),
    }));
    if outcome.is_err() {
        log::error!("Debug sink panicked while handling GL message {}", raw.id);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn raw(source: u32, kind: u32, severity: u32) -> RawDebugMessage<'static> {
        RawDebugMessage {
            source,
            kind,
            id: 7,
            severity,
            message: "buffer detailed info",
        }
    }

    #[test]
    fn test_classify_every_combination() {
        for source in DebugSource::ALL {
            for kind in DebugKind::ALL {
                for severity in DebugSeverity::ALL {
                    let event =
                        DebugEvent::classify(&raw(source.raw(), kind.raw(), severity.raw())).unwrap();
                    assert_eq!(event.source, *source);
                    assert_eq!(event.kind, *kind);
                    assert_eq!(event.severity, *severity);
                }
            }
        }
    }

    #[test]
    fn test_labels_are_unique() {
        let sources: HashSet<&str> = DebugSource::ALL.iter().map(|s| s.label()).collect();
        let kinds: HashSet<&str> = DebugKind::ALL.iter().map(|k| k.label()).collect();
        let severities: HashSet<&str> = DebugSeverity::ALL.iter().map(|s| s.label()).collect();
        assert_eq!(sources.len(), DebugSource::ALL.len());
        assert_eq!(kinds.len(), DebugKind::ALL.len());
        assert_eq!(severities.len(), DebugSeverity::ALL.len());
    }

    #[test]
    fn test_unknown_source_is_recoverable() {
        let err = DebugEvent::classify(&raw(0x1234, gl::DEBUG_TYPE_ERROR, gl::DEBUG_SEVERITY_HIGH))
            .unwrap_err();
        assert!(matches!(
            err,
            GlError::UnknownEnumerant {
                family: "debug source",
                value: 0x1234
            }
        ));

        let sink = RecordingSink::new();
        dispatch(&sink, &raw(0x1234, gl::DEBUG_TYPE_ERROR, gl::DEBUG_SEVERITY_HIGH));
        assert!(sink.is_empty());
        assert_eq!(sink.unknown().len(), 1);
    }

    #[test]
    fn test_display_format() {
        let event = DebugEvent::classify(&raw(
            gl::DEBUG_SOURCE_API,
            gl::DEBUG_TYPE_OTHER,
            gl::DEBUG_SEVERITY_NOTIFICATION,
        ))
        .unwrap();
        assert_eq!(event.to_string(), "API, OTHER, NOTIFICATION, 7: buffer detailed info");
        assert!(!event.is_failure());
    }

    #[test]
    fn test_recording_sink_failures() {
        let sink = RecordingSink::new();
        dispatch(
            &sink,
            &raw(gl::DEBUG_SOURCE_API, gl::DEBUG_TYPE_OTHER, gl::DEBUG_SEVERITY_NOTIFICATION),
        );
        dispatch(
            &sink,
            &raw(gl::DEBUG_SOURCE_API, gl::DEBUG_TYPE_ERROR, gl::DEBUG_SEVERITY_HIGH),
        );
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.failures().len(), 1);
        sink.clear();
        assert!(sink.is_empty());
    }

    struct PanickingSink;

    impl DebugSink for PanickingSink {
        fn on_event(&self, _event: &DebugEvent) {
            panic!("sink failure");
        }
    }

    #[test]
    fn test_panicking_sink_does_not_unwind() {
        dispatch(
            &PanickingSink,
            &raw(gl::DEBUG_SOURCE_APPLICATION, gl::DEBUG_TYPE_MARKER, gl::DEBUG_SEVERITY_LOW),
        );
    }
}
