//! Client-side result holder for one request/response exchange.
//!
//! Owned by whatever layer drives the exchange (it also owns timeout
//! detection and decides when to record `TimeoutError`). The core only
//! defines the state rules: results may be updated while pending, the
//! finished flag latches once, and error recording always forces the
//! reply through the finished state.

use crate::data::RegisterUnit;
use crate::pdu::ExceptionCode;

/// Error classification of a completed exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "with_serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReplyError {
    #[default]
    NoError,
    ProtocolError,
    TimeoutError,
    ReplyAbortedError,
}

/// Notification delivered through the reply's callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReplyEvent {
    Finished,
    ErrorOccurred(ReplyError),
}

pub struct Reply {
    server_address: u8,
    finished: bool,
    result: RegisterUnit,
    error: ReplyError,
    error_text: String,
    protocol_error: ExceptionCode,
    notify: Option<Box<dyn FnMut(ReplyEvent)>>,
}

impl core::fmt::Debug for Reply {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Reply")
            .field("server_address", &self.server_address)
            .field("finished", &self.finished)
            .field("result", &self.result)
            .field("error", &self.error)
            .field("error_text", &self.error_text)
            .field("protocol_error", &self.protocol_error)
            .finish_non_exhaustive()
    }
}

impl Reply {
    pub fn new(server_address: u8) -> Self {
        Self {
            server_address,
            finished: false,
            result: RegisterUnit::invalid(),
            error: ReplyError::NoError,
            error_text: String::new(),
            protocol_error: ExceptionCode::ExtendedException,
            notify: None,
        }
    }

    /// Installs the notification callback. Events fired before this call
    /// are gone; install it before handing the reply out.
    pub fn set_notifier<F: FnMut(ReplyEvent) + 'static>(&mut self, notify: F) {
        self.notify = Some(Box::new(notify));
    }

    pub fn server_address(&self) -> u8 {
        self.server_address
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn result(&self) -> &RegisterUnit {
        &self.result
    }

    pub fn error(&self) -> ReplyError {
        self.error
    }

    pub fn error_text(&self) -> &str {
        &self.error_text
    }

    pub fn protocol_error(&self) -> ExceptionCode {
        self.protocol_error
    }

    fn emit(&mut self, event: ReplyEvent) {
        if let Some(notify) = &mut self.notify {
            notify(event);
        }
    }

    /// Updates the pending result without completing the exchange (multi-
    /// step exchanges update it several times). Ignored once finished.
    pub fn set_result(&mut self, result: RegisterUnit) {
        if !self.finished {
            self.result = result;
        }
    }

    /// Latches the finished flag and fires [`ReplyEvent::Finished`] exactly
    /// once. Repeated calls, and any call with `false`, are no-ops.
    pub fn set_finished(&mut self, finished: bool) {
        if self.finished || !finished {
            return;
        }
        self.finished = true;
        self.emit(ReplyEvent::Finished);
    }

    /// Records an error and forces the reply through the finished state.
    ///
    /// Unlike [`set_finished`](Self::set_finished), error reporting is not
    /// deduplicated: every call fires `ErrorOccurred` followed by
    /// `Finished`, even on an already finished reply.
    pub fn set_error(&mut self, error: ReplyError, error_text: &str) {
        self.error = error;
        self.error_text = error_text.to_string();
        self.emit(ReplyEvent::ErrorOccurred(error));
        self.finished = true;
        self.emit(ReplyEvent::Finished);
    }

    /// Records a protocol exception reported by the server; behaves like
    /// [`set_error`](Self::set_error) with kind `ProtocolError`.
    pub fn set_protocol_error(&mut self, exception: ExceptionCode, error_text: &str) {
        self.protocol_error = exception;
        self.error = ReplyError::ProtocolError;
        self.error_text = error_text.to_string();
        self.emit(ReplyEvent::ErrorOccurred(ReplyError::ProtocolError));
        self.finished = true;
        self.emit(ReplyEvent::Finished);
    }
}
