//! Session-level CGEventTap.
//!
//! The tap runs on the listener thread's run loop. It can swallow the closing
//! colon, re-enables itself when the OS disables it, and reads the event
//! source user data so our own synthetic input is recognised by its marker.

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::os::raw::c_ulong;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;
use std::time::Duration;

use core_foundation::base::TCFType;
use core_foundation::mach_port::{CFMachPort, CFMachPortRef};
use core_foundation::runloop::{kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventTapProxy,
    CGEventType, EventField,
};
use emote_core::{EmoteError, InjectionMarker, Injector, Result, INJECTION_MARKER};
use foreign_types::ForeignType;
use tracing::{error, info};

use crate::context::ForegroundContext;
use crate::keyboard_listener::{TapControl, TapHandler};
use crate::mac_keys;
use crate::monitor::{Disposition, InputEvent};
use crate::sink::ReplacementSink;

type TapCallback = unsafe extern "C" fn(
    proxy: CGEventTapProxy,
    event_type: CGEventType,
    event: *mut c_void,
    user_info: *mut c_void,
) -> *mut c_void;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapCreate(
        tap: CGEventTapLocation,
        place: CGEventTapPlacement,
        options: CGEventTapOptions,
        events_of_interest: u64,
        callback: TapCallback,
        user_info: *mut c_void,
    ) -> CFMachPortRef;

    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);

    fn CGEventKeyboardGetUnicodeString(
        event: *mut c_void,
        max_length: c_ulong,
        actual_length: *mut c_ulong,
        buffer: *mut u16,
    );
}

/// How long the run loop runs before checking for a stop request.
const RUN_SLICE: Duration = Duration::from_secs(1);

struct TapContext<I, C, S> {
    handler: Arc<TapHandler<I, C, S>>,
    port: AtomicPtr<c_void>,
}

unsafe extern "C" fn tap_callback<I, C, S>(
    _proxy: CGEventTapProxy,
    event_type: CGEventType,
    event_ref: *mut c_void,
    user_info: *mut c_void,
) -> *mut c_void
where
    I: Injector,
    C: ForegroundContext,
    S: ReplacementSink,
{
    let context = &*(user_info as *const TapContext<I, C, S>);
    let kind = event_type as u32;

    // A panic must not unwind into CoreGraphics.
    let disposition = catch_unwind(AssertUnwindSafe(|| {
        if mac_keys::is_tap_disabled(kind) {
            if context.handler.on_tap_disabled() {
                let port = context.port.load(Ordering::SeqCst);
                if !port.is_null() {
                    CGEventTapEnable(port as CFMachPortRef, true);
                }
            }
            return Disposition::PassThrough;
        }

        // Borrowed from the system; released by the caller.
        let event = ManuallyDrop::new(CGEvent::from_ptr(event_ref as *mut _));
        context
            .handler
            .route_input(read_input(kind, &event), read_marker(&event))
    }));

    match disposition {
        Ok(Disposition::Suppress) => ptr::null_mut(),
        Ok(Disposition::PassThrough) => event_ref,
        Err(_) => {
            error!("event tap callback panicked");
            event_ref
        }
    }
}

fn read_input(kind: u32, event: &CGEvent) -> Option<InputEvent> {
    let keycode = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
    let flags = event.get_flags().bits();
    let text = if kind == mac_keys::KEY_DOWN {
        typed_text(event)
    } else {
        None
    };
    mac_keys::translate(kind, keycode, flags, text.as_deref())
}

/// The characters the key produces under the active layout.
fn typed_text(event: &CGEvent) -> Option<String> {
    let mut buffer = [0u16; 4];
    let mut length: c_ulong = 0;
    unsafe {
        CGEventKeyboardGetUnicodeString(
            event.as_ptr() as *mut c_void,
            buffer.len() as c_ulong,
            &mut length,
            buffer.as_mut_ptr(),
        );
    }

    let length = (length as usize).min(buffer.len());
    (length > 0).then(|| String::from_utf16_lossy(&buffer[..length]))
}

fn read_marker(event: &CGEvent) -> Option<InjectionMarker> {
    let data = event.get_integer_value_field(EventField::EVENT_SOURCE_USER_DATA);
    (data == INJECTION_MARKER.value()).then_some(INJECTION_MARKER)
}

/// Create the tap and run it until `control` is stopped.
pub fn run_tap<I, C, S>(handler: Arc<TapHandler<I, C, S>>, control: &TapControl) -> Result<()>
where
    I: Injector,
    C: ForegroundContext,
    S: ReplacementSink,
{
    let context = Box::into_raw(Box::new(TapContext {
        handler,
        port: AtomicPtr::new(ptr::null_mut()),
    }));

    let tap = unsafe {
        CGEventTapCreate(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::Default,
            mac_keys::EVENT_MASK,
            tap_callback::<I, C, S>,
            context as *mut c_void,
        )
    };

    let result = if tap.is_null() {
        Err(EmoteError::EventTap(
            "could not create the event tap; is input monitoring allowed?".into(),
        ))
    } else {
        unsafe { (*context).port.store(tap as *mut c_void, Ordering::SeqCst) };
        run_until_stopped(tap, control)
    };

    // The tap is disabled and off the run loop, so no callback can see this.
    unsafe { drop(Box::from_raw(context)) };
    result
}

fn run_until_stopped(tap: CFMachPortRef, control: &TapControl) -> Result<()> {
    let port = unsafe { CFMachPort::wrap_under_create_rule(tap) };
    let source = port
        .create_runloop_source(0)
        .map_err(|_| EmoteError::EventTap("could not create a run loop source".into()))?;

    let run_loop = CFRunLoop::get_current();
    run_loop.add_source(&source, unsafe { kCFRunLoopDefaultMode });
    control.attach_run_loop(run_loop.clone());

    unsafe { CGEventTapEnable(tap, true) };
    info!("event tap attached");

    while !control.is_stopped() {
        CFRunLoop::run_in_mode(unsafe { kCFRunLoopDefaultMode }, RUN_SLICE, false);
    }

    unsafe { CGEventTapEnable(tap, false) };
    run_loop.remove_source(&source, unsafe { kCFRunLoopDefaultMode });
    control.detach_run_loop();
    info!("event tap detached");
    Ok(())
}
