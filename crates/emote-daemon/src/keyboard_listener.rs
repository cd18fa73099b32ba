use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use emote_core::{InjectionGuard, InjectionMarker, Injector, Result};
use rdev::{self, Event, EventType, Key as RdevKey};
use tracing::{error, info, warn};

use crate::context::ForegroundContext;
use crate::monitor::{Disposition, InputEvent, KeyEvent, Monitor};
use crate::sink::ReplacementSink;

/// Whether the platform tap can swallow events.
pub const TAP_SWALLOWS: bool = cfg!(any(target_os = "macos", target_os = "windows"));

/// How long `ListenerHandle::stop` waits for the tap thread.
const STOP_TIMEOUT: Duration = Duration::from_millis(300);

/// Turns raw rdev events into monitor input, tracking held modifiers.
#[derive(Debug, Default, Clone)]
pub struct EventTranslator {
    control: bool,
    meta: bool,
    alt: bool,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    fn chord_held(&self) -> bool {
        self.control || self.meta || self.alt
    }

    fn set_modifier(&mut self, key: RdevKey, down: bool) -> bool {
        match key {
            RdevKey::ControlLeft | RdevKey::ControlRight => self.control = down,
            RdevKey::MetaLeft | RdevKey::MetaRight => self.meta = down,
            RdevKey::Alt => self.alt = down,
            // Shift, AltGr and Caps Lock change the character, not the meaning.
            RdevKey::ShiftLeft | RdevKey::ShiftRight | RdevKey::AltGr | RdevKey::CapsLock => {}
            _ => return false,
        }
        true
    }

    /// `None` means the event does not concern the buffer.
    pub fn translate(&mut self, event: &Event) -> Option<InputEvent> {
        match event.event_type {
            EventType::KeyPress(key) => {
                if self.set_modifier(key, true) {
                    return None;
                }
                if self.chord_held() {
                    return Some(InputEvent::Reset);
                }

                match key {
                    RdevKey::Backspace => Some(InputEvent::Backspace),
                    RdevKey::Return
                    | RdevKey::KpReturn
                    | RdevKey::Tab
                    | RdevKey::Escape
                    | RdevKey::Space
                    | RdevKey::Delete
                    | RdevKey::Insert
                    | RdevKey::Home
                    | RdevKey::End
                    | RdevKey::PageUp
                    | RdevKey::PageDown
                    | RdevKey::UpArrow
                    | RdevKey::DownArrow
                    | RdevKey::LeftArrow
                    | RdevKey::RightArrow => Some(InputEvent::Reset),
                    _ => event.name.as_deref().map(character_input),
                }
            }
            EventType::KeyRelease(key) => {
                self.set_modifier(key, false);
                None
            }
            EventType::ButtonPress(_) => Some(InputEvent::Reset),
            _ => None,
        }
    }
}

/// A single printable character, or a reset for anything else the key
/// produced (dead keys, control codes, composed sequences).
pub(crate) fn character_input(name: &str) -> InputEvent {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_control() => InputEvent::Character(c),
        _ => InputEvent::Reset,
    }
}

/// Everything the tap callback needs, shared across re-arms.
pub struct TapHandler<I, C, S> {
    monitor: Arc<Mutex<Monitor<I, C, S>>>,
    translator: Mutex<EventTranslator>,
    guard: Arc<InjectionGuard>,
}

impl<I, C, S> TapHandler<I, C, S>
where
    I: Injector,
    C: ForegroundContext,
    S: ReplacementSink,
{
    pub fn new(monitor: Arc<Mutex<Monitor<I, C, S>>>, guard: Arc<InjectionGuard>) -> Self {
        Self {
            monitor,
            translator: Mutex::new(EventTranslator::new()),
            guard,
        }
    }

    fn monitor(&self) -> MutexGuard<'_, Monitor<I, C, S>> {
        lock(&self.monitor)
    }

    /// Route one rdev event.
    pub fn route(&self, event: &Event) -> Disposition {
        let input = lock(&self.translator).translate(event);
        self.route_input(input, None)
    }

    /// Route translated input. Events without a marker of their own are
    /// stamped when they arrive while an injection is in flight.
    pub fn route_input(
        &self,
        input: Option<InputEvent>,
        marker: Option<InjectionMarker>,
    ) -> Disposition {
        let Some(input) = input else {
            return Disposition::PassThrough;
        };

        let event = KeyEvent {
            input,
            marker: marker.or_else(|| self.guard.stamp()),
        };
        self.monitor().handle(event)
    }

    /// The OS disabled the tap. Returns whether it should be re-enabled.
    pub fn on_tap_disabled(&self) -> bool {
        let rearm = self.monitor().on_tap_disabled();
        if rearm {
            warn!("event tap disabled by the system, re-enabling");
        }
        rearm
    }

    fn stop_monitor(&self) {
        self.monitor().stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Stop request shared with the tap thread.
#[derive(Default)]
pub struct TapControl {
    stopped: AtomicBool,
    #[cfg(target_os = "macos")]
    run_loop: Mutex<Option<core_foundation::runloop::CFRunLoop>>,
}

impl TapControl {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Ask the tap to detach. The macOS tap leaves its run loop right away;
    /// rdev taps stay attached until the process exits.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.wake_run_loop();
    }

    #[cfg(target_os = "macos")]
    fn wake_run_loop(&self) {
        use core_foundation::base::TCFType;
        use core_foundation::runloop::CFRunLoopStop;

        if let Some(run_loop) = lock(&self.run_loop).as_ref() {
            unsafe { CFRunLoopStop(run_loop.as_concrete_TypeRef()) };
        }
    }

    #[cfg(not(target_os = "macos"))]
    fn wake_run_loop(&self) {}

    #[cfg(target_os = "macos")]
    pub(crate) fn attach_run_loop(&self, run_loop: core_foundation::runloop::CFRunLoop) {
        *lock(&self.run_loop) = Some(run_loop);
    }

    #[cfg(target_os = "macos")]
    pub(crate) fn detach_run_loop(&self) {
        *lock(&self.run_loop) = None;
    }
}

#[cfg(target_os = "macos")]
fn run_tap<I, C, S>(handler: Arc<TapHandler<I, C, S>>, control: &TapControl) -> Result<()>
where
    I: Injector + Send + 'static,
    C: ForegroundContext + Send + 'static,
    S: ReplacementSink + Send + 'static,
{
    crate::mac_tap::run_tap(handler, control)
}

#[cfg(target_os = "windows")]
fn run_tap<I, C, S>(handler: Arc<TapHandler<I, C, S>>, _control: &TapControl) -> Result<()>
where
    I: Injector + Send + 'static,
    C: ForegroundContext + Send + 'static,
    S: ReplacementSink + Send + 'static,
{
    let callback = move |event: Event| match handler.route(&event) {
        Disposition::PassThrough => Some(event),
        Disposition::Suppress => None,
    };

    rdev::grab(callback).map_err(|e| emote_core::EmoteError::EventTap(format!("{:?}", e)))
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn run_tap<I, C, S>(handler: Arc<TapHandler<I, C, S>>, _control: &TapControl) -> Result<()>
where
    I: Injector + Send + 'static,
    C: ForegroundContext + Send + 'static,
    S: ReplacementSink + Send + 'static,
{
    let callback = move |event: Event| {
        handler.route(&event);
    };

    rdev::listen(callback).map_err(|e| emote_core::EmoteError::EventTap(format!("{:?}", e)))
}

/// When to give up re-attaching a tap that keeps failing.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Consecutive quick failures before the listener gives up.
    pub max_retries: u32,
    pub delay: Duration,
    /// A tap that ran at least this long before failing counts as healthy.
    pub healthy_run: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            delay: Duration::from_secs(1),
            healthy_run: Duration::from_secs(5),
        }
    }
}

/// Keep a tap attached with `attach` until it is stopped or keeps failing.
///
/// Giving up stops the monitor and clears `running` so the worker exits.
pub fn supervise<I, C, S, F>(
    handler: &TapHandler<I, C, S>,
    control: &TapControl,
    running: &AtomicBool,
    policy: RetryPolicy,
    mut attach: F,
) where
    I: Injector,
    C: ForegroundContext,
    S: ReplacementSink,
    F: FnMut() -> Result<()>,
{
    let mut failures = 0;

    loop {
        let started = Instant::now();
        match attach() {
            Ok(()) => info!("event tap returned"),
            Err(e) => warn!(error = %e, "event tap failed"),
        }

        if control.is_stopped() || !handler.on_tap_disabled() {
            break;
        }

        if started.elapsed() >= policy.healthy_run {
            failures = 0;
            continue;
        }

        failures += 1;
        if failures >= policy.max_retries {
            error!(attempts = failures, "failed to keep the event tap attached");
            handler.stop_monitor();
            running.store(false, Ordering::SeqCst);
            break;
        }
        thread::sleep(policy.delay);
    }
}

/// The running tap thread.
pub struct ListenerHandle {
    control: Arc<TapControl>,
    thread: JoinHandle<()>,
}

impl ListenerHandle {
    /// Detach the tap and wait briefly for its thread.
    pub fn stop(self) {
        self.control.stop();

        let started = Instant::now();
        while !self.thread.is_finished() && started.elapsed() < STOP_TIMEOUT {
            thread::sleep(Duration::from_millis(10));
        }

        if self.thread.is_finished() {
            if self.thread.join().is_err() {
                error!("event tap thread panicked");
            }
        } else {
            info!("event tap stays attached until exit");
        }
    }
}

/// Attach the tap on its own thread and keep it attached while the monitor
/// is enabled.
pub fn start_keyboard_listener<I, C, S>(
    monitor: Arc<Mutex<Monitor<I, C, S>>>,
    guard: Arc<InjectionGuard>,
    running: Arc<AtomicBool>,
) -> ListenerHandle
where
    I: Injector + Send + 'static,
    C: ForegroundContext + Send + 'static,
    S: ReplacementSink + Send + 'static,
{
    lock(&monitor).start();
    let handler = Arc::new(TapHandler::new(monitor, guard));
    let control = Arc::new(TapControl::default());

    let thread = {
        let control = Arc::clone(&control);
        thread::spawn(move || {
            supervise(&handler, &control, &running, RetryPolicy::default(), || {
                run_tap(Arc::clone(&handler), &control)
            });
        })
    };

    ListenerHandle { control, thread }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::TapState;
    use crate::test_support::{harness, CollectingSink, FakeContext, RecordingInjector};
    use emote_core::{EmoteError, INJECTION_MARKER};
    use std::time::SystemTime;

    fn press(key: RdevKey, name: Option<&str>) -> Event {
        Event {
            time: SystemTime::now(),
            name: name.map(str::to_string),
            event_type: EventType::KeyPress(key),
        }
    }

    fn release(key: RdevKey) -> Event {
        Event {
            time: SystemTime::now(),
            name: None,
            event_type: EventType::KeyRelease(key),
        }
    }

    #[test]
    fn printable_keys_become_characters() {
        let mut t = EventTranslator::new();
        assert_eq!(
            t.translate(&press(RdevKey::KeyA, Some("a"))),
            Some(InputEvent::Character('a'))
        );
        assert_eq!(
            t.translate(&press(RdevKey::SemiColon, Some(":"))),
            Some(InputEvent::Character(':'))
        );
    }

    #[test]
    fn shift_does_not_break_a_trigger() {
        let mut t = EventTranslator::new();
        assert_eq!(t.translate(&press(RdevKey::ShiftLeft, None)), None);
        assert_eq!(
            t.translate(&press(RdevKey::KeyS, Some("S"))),
            Some(InputEvent::Character('S'))
        );
    }

    #[test]
    fn modifier_chords_reset_until_released() {
        let mut t = EventTranslator::new();
        t.translate(&press(RdevKey::ControlLeft, None));
        assert_eq!(
            t.translate(&press(RdevKey::KeyV, Some("\u{16}"))),
            Some(InputEvent::Reset)
        );
        assert_eq!(
            t.translate(&press(RdevKey::Backspace, None)),
            Some(InputEvent::Reset)
        );

        t.translate(&release(RdevKey::ControlLeft));
        assert_eq!(
            t.translate(&press(RdevKey::KeyV, Some("v"))),
            Some(InputEvent::Character('v'))
        );
    }

    #[test]
    fn navigation_and_editing_keys_reset() {
        let mut t = EventTranslator::new();
        for key in [
            RdevKey::Return,
            RdevKey::Tab,
            RdevKey::Escape,
            RdevKey::Space,
            RdevKey::LeftArrow,
        ] {
            assert_eq!(t.translate(&press(key, None)), Some(InputEvent::Reset));
        }
        assert_eq!(
            t.translate(&press(RdevKey::Backspace, None)),
            Some(InputEvent::Backspace)
        );
    }

    #[test]
    fn pointer_clicks_reset_and_moves_do_not() {
        let mut t = EventTranslator::new();
        let click = Event {
            time: SystemTime::now(),
            name: None,
            event_type: EventType::ButtonPress(rdev::Button::Left),
        };
        let moved = Event {
            time: SystemTime::now(),
            name: None,
            event_type: EventType::MouseMove { x: 1.0, y: 2.0 },
        };
        assert_eq!(t.translate(&click), Some(InputEvent::Reset));
        assert_eq!(t.translate(&moved), None);
    }

    #[test]
    fn unnamed_keys_are_ignored() {
        let mut t = EventTranslator::new();
        assert_eq!(t.translate(&press(RdevKey::F5, None)), None);
    }

    #[test]
    fn composed_or_control_names_reset() {
        assert_eq!(character_input("\u{1b}"), InputEvent::Reset);
        assert_eq!(character_input("ab"), InputEvent::Reset);
        assert_eq!(character_input("é"), InputEvent::Character('é'));
    }

    type FakeHandler = TapHandler<RecordingInjector, FakeContext, CollectingSink>;

    fn handler_over(aliases: &[(&str, &str)]) -> (FakeHandler, RecordingInjector, Arc<InjectionGuard>) {
        let h = harness(aliases, true);
        let guard = Arc::new(InjectionGuard::new());
        let handler = TapHandler::new(Arc::new(Mutex::new(h.monitor)), Arc::clone(&guard));
        (handler, h.injector, guard)
    }

    fn key_for(c: char) -> RdevKey {
        if c == ':' {
            RdevKey::SemiColon
        } else {
            RdevKey::KeyA
        }
    }

    fn route_text(handler: &FakeHandler, text: &str) -> Vec<Disposition> {
        text.chars()
            .map(|c| handler.route(&press(key_for(c), Some(&c.to_string()))))
            .collect()
    }

    #[test]
    fn events_during_an_injection_are_ignored() {
        let (handler, injector, guard) = handler_over(&[("shipit", "🚢")]);

        let scope = guard.begin(Duration::ZERO);
        let dispositions = route_text(&handler, ":shipit:");
        drop(scope);

        assert!(dispositions.iter().all(|d| *d == Disposition::PassThrough));
        assert!(handler.monitor().buffer().is_empty());
        assert!(injector.calls.borrow().is_empty());
    }

    #[test]
    fn events_in_the_grace_window_are_ignored() {
        let (handler, injector, guard) = handler_over(&[("shipit", "🚢")]);

        drop(guard.begin(Duration::from_secs(60)));
        route_text(&handler, ":shipit:");

        assert!(handler.monitor().buffer().is_empty());
        assert!(injector.calls.borrow().is_empty());
    }

    #[test]
    fn user_typing_after_the_injection_expands() {
        let (handler, injector, guard) = handler_over(&[("shipit", "🚢")]);

        drop(guard.begin(Duration::ZERO));
        let dispositions = route_text(&handler, ":shipit:");

        assert_eq!(dispositions.last(), Some(&Disposition::Suppress));
        assert_eq!(*injector.calls.borrow(), vec![(7, "🚢".to_string())]);
    }

    #[test]
    fn marked_input_is_ignored_without_a_scope() {
        let (handler, injector, _guard) = handler_over(&[("shipit", "🚢")]);

        for c in ":shipit:".chars() {
            handler.route_input(Some(InputEvent::Character(c)), Some(INJECTION_MARKER));
        }

        assert!(handler.monitor().buffer().is_empty());
        assert!(injector.calls.borrow().is_empty());
    }

    fn quick_retries(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            delay: Duration::ZERO,
            healthy_run: Duration::from_secs(60),
        }
    }

    #[test]
    fn failing_tap_gives_up_and_ends_the_worker() {
        let (handler, _injector, _guard) = handler_over(&[("shipit", "🚢")]);
        let control = TapControl::default();
        let running = AtomicBool::new(true);
        let mut attempts = 0;

        supervise(&handler, &control, &running, quick_retries(3), || {
            attempts += 1;
            Err(EmoteError::EventTap("tap refused".into()))
        });

        assert_eq!(attempts, 3);
        assert!(!running.load(Ordering::SeqCst));
        assert_eq!(handler.monitor().state(), TapState::Disabled);
    }

    #[test]
    fn stopped_tap_is_not_reattached() {
        let (handler, _injector, _guard) = handler_over(&[("shipit", "🚢")]);
        let control = TapControl::default();
        let running = AtomicBool::new(true);
        let mut attempts = 0;

        supervise(&handler, &control, &running, quick_retries(3), || {
            attempts += 1;
            control.stop();
            Ok(())
        });

        assert_eq!(attempts, 1);
        assert!(running.load(Ordering::SeqCst));
        assert_eq!(handler.monitor().state(), TapState::Enabled);
    }

    #[test]
    fn dropped_tap_is_reattached_and_counted() {
        let (handler, _injector, _guard) = handler_over(&[("shipit", "🚢")]);
        let control = TapControl::default();
        let running = AtomicBool::new(true);
        let mut attempts = 0;

        supervise(&handler, &control, &running, quick_retries(5), || {
            attempts += 1;
            if attempts == 3 {
                control.stop();
            }
            Err(EmoteError::EventTap("tap dropped".into()))
        });

        assert_eq!(attempts, 3);
        assert_eq!(handler.monitor().rearm_count(), 2);
        assert!(running.load(Ordering::SeqCst));
    }
}
