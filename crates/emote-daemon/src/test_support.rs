//! Fakes standing in for the OS behind the monitor.

use std::cell::RefCell;
use std::rc::Rc;

use emote_core::{AliasTable, EmoteError, InjectionError, Injector, Settings};

use crate::context::ForegroundContext;
use crate::monitor::{Monitor, MonitorTables};
use crate::sink::ReplacementSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The event source could not be created.
    BeforeSending,
    /// The backspaces went out, the replacement did not.
    AfterDeleting,
}

#[derive(Default, Clone)]
pub struct RecordingInjector {
    pub calls: Rc<RefCell<Vec<(usize, String)>>>,
    pub failure: Option<Failure>,
}

impl Injector for RecordingInjector {
    fn replace(&mut self, delete_count: usize, replacement: &str) -> Result<(), InjectionError> {
        match self.failure {
            Some(Failure::BeforeSending) => Err(InjectionError::NotSent(EmoteError::Enigo(
                "no event source".into(),
            ))),
            Some(Failure::AfterDeleting) => Err(InjectionError::Partial(EmoteError::Enigo(
                "text rejected".into(),
            ))),
            None => {
                self.calls
                    .borrow_mut()
                    .push((delete_count, replacement.to_string()));
                Ok(())
            }
        }
    }
}

#[derive(Default, Clone)]
pub struct FakeContext {
    pub application: Rc<RefCell<Option<String>>>,
    pub secure: Rc<RefCell<bool>>,
}

impl ForegroundContext for FakeContext {
    fn current_application_identifier(&self) -> Option<String> {
        self.application.borrow().clone()
    }

    fn is_focused_field_secure(&self) -> bool {
        *self.secure.borrow()
    }
}

#[derive(Default, Clone)]
pub struct CollectingSink {
    pub seen: Rc<RefCell<Vec<(String, String)>>>,
}

impl ReplacementSink for CollectingSink {
    fn notify(&self, trigger: &str, replacement: &str) {
        self.seen
            .borrow_mut()
            .push((trigger.to_string(), replacement.to_string()));
    }
}

pub type FakeMonitor = Monitor<RecordingInjector, FakeContext, CollectingSink>;

pub struct Harness {
    pub monitor: FakeMonitor,
    pub injector: RecordingInjector,
    pub context: FakeContext,
    pub sink: CollectingSink,
    pub tables: MonitorTables,
}

/// A started monitor over a small alias table.
pub fn harness(aliases: &[(&str, &str)], swallows: bool) -> Harness {
    let tables = MonitorTables::new(
        AliasTable::from_pairs(aliases.iter().copied()),
        Settings::default(),
    );
    let injector = RecordingInjector::default();
    let context = FakeContext::default();
    let sink = CollectingSink::default();
    let mut monitor = Monitor::new(
        tables.clone(),
        injector.clone(),
        context.clone(),
        sink.clone(),
        swallows,
    );
    monitor.start();
    Harness {
        monitor,
        injector,
        context,
        sink,
        tables,
    }
}
