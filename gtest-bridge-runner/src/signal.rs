// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support for handling Ctrl-C during a run.

use crate::errors::SignalHandlerSetupError;
use crossbeam_channel::Receiver;

/// The kind of signal handling to set up for a run.
///
/// A `SignalHandlerKind` can be passed into
/// [`TestRunnerBuilder::build`](crate::runner::TestRunnerBuilder::build).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum SignalHandlerKind {
    /// The standard signal handler: Ctrl-C cancels the run.
    ///
    /// This can only be set up once per process.
    Standard,

    /// A no-op signal handler. Useful for tests.
    Noop,
}

impl SignalHandlerKind {
    pub(crate) fn build(self) -> Result<SignalHandler, SignalHandlerSetupError> {
        match self {
            Self::Standard => SignalHandler::new(),
            Self::Noop => Ok(SignalHandler::noop()),
        }
    }
}

/// Receives signal events for the runner.
#[derive(Debug)]
pub(crate) struct SignalHandler {
    pub(crate) receiver: Receiver<SignalEvent>,
}

impl SignalHandler {
    /// Creates a new `SignalHandler` that handles Ctrl-C.
    fn new() -> Result<Self, SignalHandlerSetupError> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        ctrlc::set_handler(move || {
            // The runner may already be gone.
            let _ = sender.send(SignalEvent::Interrupted);
        })?;
        Ok(Self { receiver })
    }

    /// Creates a new `SignalHandler` that never fires.
    fn noop() -> Self {
        Self {
            receiver: crossbeam_channel::never(),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum SignalEvent {
    Interrupted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn noop_handler_never_fires() {
        let handler = SignalHandlerKind::Noop.build().expect("noop handler never fails");
        assert!(
            handler
                .receiver
                .recv_timeout(Duration::from_millis(20))
                .is_err()
        );
    }
}
