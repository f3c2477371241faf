// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test runner.
//!
//! The main structure in this module is [`TestRunner`].

use crate::{
    bridge::DelegatingBridge,
    case_list::{CaseInstance, CaseList, TestCaseId},
    errors::TestRunnerBuildError,
    invoker::InvokeHooks,
    reporter::{CancelReason, CaseResult, CaseStatus, TestEvent},
    signal::{SignalEvent, SignalHandler, SignalHandlerKind},
    stopwatch::StopwatchStart,
    test_filter::{FilterMatch, MismatchReason},
};
use crossbeam_channel::{Receiver, Sender};
use std::{
    convert::Infallible,
    marker::PhantomData,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tracing::debug;

/// Test runner options.
#[derive(Debug, Default)]
pub struct TestRunnerBuilder {
    test_threads: Option<usize>,
}

impl TestRunnerBuilder {
    /// Sets the number of cases to run at once.
    ///
    /// Defaults to the number of logical CPUs.
    pub fn set_test_threads(&mut self, test_threads: usize) -> &mut Self {
        self.test_threads = Some(test_threads);
        self
    }

    /// Creates a new test runner.
    pub fn build<'a>(
        &self,
        case_list: &'a CaseList,
        bridge: &'a DelegatingBridge,
        handler_kind: SignalHandlerKind,
    ) -> Result<TestRunner<'a>, TestRunnerBuildError> {
        let test_threads = self
            .test_threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism().map_or(1, |count| count.get())
            })
            .max(1);
        let handler = handler_kind.build()?;
        Ok(TestRunner {
            test_threads,
            case_list,
            bridge,
            handler,
        })
    }
}

/// Context for running cases.
#[derive(Debug)]
pub struct TestRunner<'a> {
    test_threads: usize,
    case_list: &'a CaseList,
    bridge: &'a DelegatingBridge,
    handler: SignalHandler,
}

impl<'a> TestRunner<'a> {
    /// Executes the listed cases, each one in its own process.
    ///
    /// The callback is called with the results of each case.
    pub fn execute<F>(&self, mut callback: F) -> RunStats
    where
        F: FnMut(TestEvent<'a>) + Send,
    {
        self.try_execute::<Infallible, _>(|test_event| {
            callback(test_event);
            Ok(())
        })
        .expect("Err branch is infallible")
    }

    /// Executes the listed cases, each one in its own process.
    ///
    /// Accepts a callback that is called with the results of each case. If the callback returns an
    /// error, the run is canceled and the first error is returned once in-flight cases have been
    /// terminated.
    pub fn try_execute<E, F>(&self, callback: F) -> Result<RunStats, E>
    where
        F: FnMut(TestEvent<'a>) -> Result<(), E> + Send,
        E: Send,
    {
        let (run_sender, run_receiver) = crossbeam_channel::unbounded();
        let (work_sender, work_receiver) = crossbeam_channel::unbounded();
        // Nothing is ever sent on this channel: dropping the sender disconnects every receiver,
        // which tells in-flight invocations to terminate their children.
        let (cancel_sender, cancel_receiver) = crossbeam_channel::bounded::<()>(0);

        let canceled = AtomicBool::new(false);

        let mut ctx = CallbackContext::new(callback, self.case_list.run_count());

        // Send the initial event.
        // (Don't need to set the canceled flag if this fails because the run hasn't started yet.)
        ctx.run_started(self.case_list)?;

        for instance in self.case_list.iter() {
            // The receiver is alive until the end of this function.
            let _ = work_sender.send(instance);
        }
        drop(work_sender);

        // Stores the first error that occurred. This error is propagated up.
        let mut first_error = None;

        std::thread::scope(|scope| {
            for _ in 0..self.test_threads {
                let worker = Worker {
                    bridge: self.bridge,
                    run_sender: run_sender.clone(),
                    work_receiver: work_receiver.clone(),
                    cancel_receiver: cancel_receiver.clone(),
                    canceled: &canceled,
                };
                scope.spawn(move || worker.run());
            }

            drop(run_sender);
            let mut cancel_sender = Some(cancel_sender);

            loop {
                let internal_event = crossbeam_channel::select! {
                    recv(run_receiver) -> internal_event => {
                        match internal_event {
                            Ok(event) => InternalEvent::Case(event),
                            Err(_) => {
                                // All runs have been completed.
                                break;
                            }
                        }
                    },
                    recv(self.handler.receiver) -> internal_event => {
                        match internal_event {
                            Ok(event) => InternalEvent::Signal(event),
                            Err(_) => {
                                // Ignore the signal thread being dropped.
                                continue;
                            }
                        }
                    },
                };

                if let Err(err) = ctx.handle_event(internal_event) {
                    // If an error happens, it is because either the callback failed or a
                    // cancellation notice was received. If the callback failed, we need to send a
                    // further cancellation notice as well.
                    canceled.store(true, Ordering::Release);
                    cancel_sender.take();

                    match err {
                        InternalError::Error(err) => {
                            // Ignore errors that happen during error cancellation.
                            if first_error.is_none() {
                                first_error = Some(err);
                            }
                            let _ = ctx.error_cancel();
                        }
                        InternalError::SignalCanceled(Some(err)) => {
                            // Signal-based cancellation and an error was received during
                            // cancellation.
                            if first_error.is_none() {
                                first_error = Some(err);
                            }
                        }
                        InternalError::SignalCanceled(None) => {
                            // Signal-based cancellation and no error was returned during
                            // cancellation. Continue to handle events.
                        }
                    }
                }
            }
        });

        if let Err(err) = ctx.run_finished()
            && first_error.is_none()
        {
            first_error = Some(err);
        }

        match first_error {
            None => Ok(ctx.run_stats),
            Some(err) => Err(err),
        }
    }
}

/// Pulls cases off the shared queue and runs them one at a time.
struct Worker<'a, 'scope> {
    bridge: &'a DelegatingBridge,
    run_sender: Sender<InternalCaseEvent<'a>>,
    work_receiver: Receiver<CaseInstance<'a>>,
    cancel_receiver: Receiver<()>,
    canceled: &'scope AtomicBool,
}

impl<'a> Worker<'a, '_> {
    fn run(self) {
        for instance in self.work_receiver.iter() {
            if self.canceled.load(Ordering::Acquire) {
                // Check for run cancellation.
                return;
            }

            // Failure to send means the receiver was dropped.
            if let FilterMatch::Mismatch { reason } = instance.filter_match {
                let _ = self.run_sender.send(InternalCaseEvent::Skipped {
                    case_id: instance.id,
                    reason,
                });
                continue;
            }

            let case_id = instance.id;
            let _ = self.run_sender.send(InternalCaseEvent::Started { case_id });

            let run_sender = &self.run_sender;
            let on_slow = move |elapsed: Duration| {
                let _ = run_sender.send(InternalCaseEvent::Slow { case_id, elapsed });
            };
            let hooks = InvokeHooks::default()
                .with_cancel_receiver(&self.cancel_receiver)
                .with_on_slow(&on_slow);
            let result = self.bridge.run_case_with(case_id, hooks);
            debug!(%case_id, status = ?CaseStatus::from_result(&result), "case finished");

            let _ = self
                .run_sender
                .send(InternalCaseEvent::Finished { case_id, result });
        }
    }
}

/// Statistics for a run.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct RunStats {
    /// The total number of cases that were expected to be run at the beginning.
    ///
    /// If the run is canceled, this will be more than `final_run_count`.
    pub initial_run_count: usize,

    /// The total number of cases that were actually run.
    pub final_run_count: usize,

    /// The number of cases that passed.
    pub passed: usize,

    /// The number of cases that failed.
    pub failed: usize,

    /// The number of cases whose success text and exit code disagreed.
    pub ambiguous: usize,

    /// The number of cases whose binary couldn't be launched.
    pub launch_failed: usize,

    /// The number of cases that timed out.
    pub timed_out: usize,

    /// The number of cases whose output couldn't be decoded.
    pub decode_failed: usize,

    /// The number of cases whose binary left processes holding its output open.
    pub leaked: usize,

    /// The number of cases that were terminated because the run was canceled.
    pub canceled: usize,

    /// The number of cases that were skipped.
    pub skipped: usize,
}

impl RunStats {
    /// Returns true if this run is considered a success.
    ///
    /// A run can be marked as failed if any of the following are true:
    /// * the run was canceled: the initial run count is greater than the final run count, or an
    ///   in-flight case was terminated
    /// * any cases failed or were ambiguous
    /// * any cases couldn't be run to completion
    pub fn is_success(&self) -> bool {
        if self.is_canceled() {
            return false;
        }
        if self.failed > 0 || self.ambiguous > 0 || self.has_infrastructure_failures() {
            return false;
        }
        true
    }

    /// Returns true if the run stopped before every selected case had finished.
    pub fn is_canceled(&self) -> bool {
        self.initial_run_count > self.final_run_count || self.canceled > 0
    }

    /// Returns true if any case failed to launch, timed out, couldn't be decoded, or leaked
    /// processes.
    pub fn has_infrastructure_failures(&self) -> bool {
        self.launch_failed > 0 || self.timed_out > 0 || self.decode_failed > 0 || self.leaked > 0
    }

    fn on_case_finished(&mut self, result: &CaseResult) {
        self.final_run_count += 1;
        match CaseStatus::from_result(result) {
            CaseStatus::Pass => self.passed += 1,
            CaseStatus::Fail => self.failed += 1,
            CaseStatus::Ambiguous => self.ambiguous += 1,
            CaseStatus::LaunchFailed => self.launch_failed += 1,
            CaseStatus::TimedOut => self.timed_out += 1,
            CaseStatus::DecodeFailed => self.decode_failed += 1,
            CaseStatus::Canceled => self.canceled += 1,
            CaseStatus::Leaked => self.leaked += 1,
        }
    }
}

struct CallbackContext<F, E> {
    callback: F,
    stopwatch: StopwatchStart,
    run_stats: RunStats,
    running: usize,
    cancel_state: CancelState,
    phantom: PhantomData<E>,
}

impl<'a, F, E> CallbackContext<F, E>
where
    F: FnMut(TestEvent<'a>) -> Result<(), E> + Send,
{
    fn new(callback: F, initial_run_count: usize) -> Self {
        Self {
            callback,
            stopwatch: StopwatchStart::now(),
            run_stats: RunStats {
                initial_run_count,
                ..RunStats::default()
            },
            running: 0,
            cancel_state: CancelState::None,
            phantom: PhantomData,
        }
    }

    fn run_started(&mut self, case_list: &'a CaseList) -> Result<(), E> {
        (self.callback)(TestEvent::RunStarted { case_list })
    }

    fn handle_event(&mut self, event: InternalEvent<'a>) -> Result<(), InternalError<E>> {
        match event {
            InternalEvent::Case(InternalCaseEvent::Started { case_id }) => {
                self.running += 1;
                (self.callback)(TestEvent::TestStarted { case_id }).map_err(InternalError::Error)
            }
            InternalEvent::Case(InternalCaseEvent::Slow { case_id, elapsed }) => {
                (self.callback)(TestEvent::TestSlow { case_id, elapsed })
                    .map_err(InternalError::Error)
            }
            InternalEvent::Case(InternalCaseEvent::Finished { case_id, result }) => {
                self.running -= 1;
                self.run_stats.on_case_finished(&result);
                (self.callback)(TestEvent::TestFinished { case_id, result })
                    .map_err(InternalError::Error)
            }
            InternalEvent::Case(InternalCaseEvent::Skipped { case_id, reason }) => {
                self.run_stats.skipped += 1;
                (self.callback)(TestEvent::TestSkipped { case_id, reason })
                    .map_err(InternalError::Error)
            }
            InternalEvent::Signal(SignalEvent::Interrupted) => {
                if self.cancel_state == CancelState::SignalCanceled {
                    // Ctrl-C was pressed twice -- panic in this case.
                    panic!("Ctrl-C pressed twice, exiting immediately");
                }

                self.cancel_state = CancelState::SignalCanceled;
                match (self.callback)(TestEvent::RunBeginCancel {
                    running: self.running,
                    reason: CancelReason::Signal,
                }) {
                    Ok(()) => Err(InternalError::SignalCanceled(None)),
                    Err(err) => Err(InternalError::SignalCanceled(Some(err))),
                }
            }
        }
    }

    fn error_cancel(&mut self) -> Result<(), E> {
        if self.cancel_state != CancelState::None {
            // Only report the first cancellation.
            return Ok(());
        }
        self.cancel_state = CancelState::ErrorCanceled;
        (self.callback)(TestEvent::RunBeginCancel {
            running: self.running,
            reason: CancelReason::ReportError,
        })
    }

    fn run_finished(&mut self) -> Result<(), E> {
        let stopwatch_end = self.stopwatch.end();
        (self.callback)(TestEvent::RunFinished {
            start_time: stopwatch_end.start_time,
            elapsed: stopwatch_end.duration,
            run_stats: self.run_stats,
        })
    }
}

#[derive(Debug)]
enum InternalEvent<'a> {
    Case(InternalCaseEvent<'a>),
    Signal(SignalEvent),
}

#[derive(Debug)]
enum InternalCaseEvent<'a> {
    Started {
        case_id: &'a TestCaseId,
    },
    Slow {
        case_id: &'a TestCaseId,
        elapsed: Duration,
    },
    Finished {
        case_id: &'a TestCaseId,
        result: CaseResult,
    },
    Skipped {
        case_id: &'a TestCaseId,
        reason: MismatchReason,
    },
}

#[derive(Debug)]
enum InternalError<E> {
    Error(E),
    SignalCanceled(Option<E>),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum CancelState {
    None,
    ErrorCanceled,
    SignalCanceled,
}
