//! The interception state machine.
//!
//! [`Monitor`] owns the typed buffer and sees every key-down the tap delivers,
//! in order, on the tap thread. It decides per event whether the event passes
//! through or is swallowed, and drives the injector when a trigger completes.

use std::sync::Arc;

use emote_core::{
    AliasTable, CharOutcome, ContextPolicy, InjectionMarker, Injector, Settings, Snapshot,
    TypedBuffer, INJECTION_MARKER,
};
use tracing::{debug, error, info, warn};

use crate::context::ForegroundContext;
use crate::sink::ReplacementSink;

/// A key-down or pointer event, reduced to what the buffer cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// A printable character as the target application will receive it.
    Character(char),
    Backspace,
    /// Navigation, editing, modifier chords and pointer clicks.
    Reset,
}

/// An input event plus its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub input: InputEvent,
    pub marker: Option<InjectionMarker>,
}

impl KeyEvent {
    pub fn user(input: InputEvent) -> Self {
        Self { input, marker: None }
    }

    pub fn injected(input: InputEvent) -> Self {
        Self {
            input,
            marker: Some(INJECTION_MARKER),
        }
    }

    fn is_ours(&self) -> bool {
        self.marker == Some(INJECTION_MARKER)
    }
}

/// What the tap should do with the event it just delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    PassThrough,
    Suppress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapState {
    Disabled,
    Enabled,
}

/// Shared, hot-swappable inputs to the monitor.
#[derive(Clone, Default)]
pub struct MonitorTables {
    pub aliases: Arc<Snapshot<AliasTable>>,
    pub policy: Arc<Snapshot<ContextPolicy>>,
    pub settings: Arc<Snapshot<Settings>>,
}

impl MonitorTables {
    pub fn new(aliases: AliasTable, settings: Settings) -> Self {
        Self {
            aliases: Arc::new(Snapshot::new(aliases)),
            policy: Arc::new(Snapshot::new(settings.policy())),
            settings: Arc::new(Snapshot::new(settings)),
        }
    }
}

pub struct Monitor<I, C, S> {
    state: TapState,
    buffer: TypedBuffer,
    tables: MonitorTables,
    injector: I,
    context: C,
    sink: S,
    /// Whether the tap can veto the closing colon.
    swallows: bool,
    last_application: Option<String>,
    rearm_count: u64,
}

impl<I, C, S> Monitor<I, C, S>
where
    I: Injector,
    C: ForegroundContext,
    S: ReplacementSink,
{
    pub fn new(tables: MonitorTables, injector: I, context: C, sink: S, swallows: bool) -> Self {
        let capacity = tables.settings.load().buffer_capacity;
        Self {
            state: TapState::Disabled,
            buffer: TypedBuffer::new(capacity),
            tables,
            injector,
            context,
            sink,
            swallows,
            last_application: None,
            rearm_count: 0,
        }
    }

    pub fn state(&self) -> TapState {
        self.state
    }

    pub fn buffer(&self) -> &TypedBuffer {
        &self.buffer
    }

    pub fn rearm_count(&self) -> u64 {
        self.rearm_count
    }

    pub fn start(&mut self) {
        if self.state == TapState::Disabled {
            self.buffer.clear();
            self.last_application = None;
            self.state = TapState::Enabled;
            info!(swallows = self.swallows, "monitor started");
        }
    }

    pub fn stop(&mut self) {
        if self.state == TapState::Enabled {
            self.state = TapState::Disabled;
            info!("monitor stopped");
        }
        self.buffer.clear();
        self.last_application = None;
    }

    /// The OS disabled the tap (timeout or user input). Returns whether it
    /// should be re-enabled.
    pub fn on_tap_disabled(&mut self) -> bool {
        if self.state != TapState::Enabled {
            return false;
        }

        // Keystrokes may have been missed while the tap was down.
        self.buffer.clear();
        self.rearm_count += 1;
        debug!(rearm_count = self.rearm_count, "re-enabling event tap");
        true
    }

    /// Handle one delivered event.
    pub fn handle(&mut self, event: KeyEvent) -> Disposition {
        if self.state != TapState::Enabled || event.is_ours() {
            return Disposition::PassThrough;
        }

        if !self.context_allows() {
            self.buffer.clear();
            return Disposition::PassThrough;
        }

        self.sync_capacity();

        match event.input {
            InputEvent::Backspace => {
                self.buffer.on_backspace();
                Disposition::PassThrough
            }
            InputEvent::Reset => {
                self.buffer.clear();
                Disposition::PassThrough
            }
            InputEvent::Character(c) => match self.buffer.on_character(c) {
                CharOutcome::DelimiterAppended => self.try_expand(),
                CharOutcome::Appended | CharOutcome::Cleared => Disposition::PassThrough,
            },
        }
    }

    fn context_allows(&mut self) -> bool {
        let application = self.context.current_application_identifier();
        if application != self.last_application {
            self.buffer.clear();
            self.last_application = application.clone();
        }

        let secure = self.context.is_focused_field_secure();
        self.tables
            .policy
            .load()
            .should_process(application.as_deref(), secure)
    }

    /// Rebuild the buffer when a reload changed its capacity.
    fn sync_capacity(&mut self) {
        let capacity = self.tables.settings.load().buffer_capacity;
        if capacity != self.buffer.capacity() {
            self.buffer = TypedBuffer::new(capacity);
        }
    }

    fn try_expand(&mut self) -> Disposition {
        let max_trigger_length = self.tables.settings.load().max_trigger_length;
        let aliases = self.tables.aliases.load();

        let Some(found) = self.buffer.attempt_match(&aliases, max_trigger_length) else {
            return Disposition::PassThrough;
        };

        self.buffer.clear();
        let delete_count = found.delete_count(self.swallows);

        match self.injector.replace(delete_count, &found.replacement) {
            Ok(()) => {
                debug!(trigger = %found.trigger, delete_count, "expanded");
                self.sink.notify(&found.trigger, &found.replacement);
            }
            Err(e) if e.nothing_sent() => {
                // The trigger is still on screen; let the closing colon join it.
                warn!(error = %e, "replacement dropped");
                return Disposition::PassThrough;
            }
            Err(e) => {
                error!(trigger = %found.trigger, error = %e, "replacement incomplete");
            }
        }

        self.closing_colon()
    }

    fn closing_colon(&self) -> Disposition {
        if self.swallows {
            Disposition::Suppress
        } else {
            Disposition::PassThrough
        }
    }
}
