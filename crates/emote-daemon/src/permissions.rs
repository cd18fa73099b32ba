use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use emote_core::{EmoteError, Result};
use tracing::{info, warn};

#[cfg(target_os = "macos")]
use crate::process::detect_terminal_app;

#[cfg(target_os = "linux")]
use crate::process::detect_display_server;

pub const TRUST_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[cfg(target_os = "macos")]
#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrusted() -> bool;
    fn AXIsProcessTrustedWithOptions(options: *const std::ffi::c_void) -> bool;
}

#[cfg(target_os = "macos")]
#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFDictionaryCreate(
        allocator: *const std::ffi::c_void,
        keys: *const *const std::ffi::c_void,
        values: *const *const std::ffi::c_void,
        num_values: isize,
        key_callbacks: *const std::ffi::c_void,
        value_callbacks: *const std::ffi::c_void,
    ) -> *const std::ffi::c_void;

    fn CFRelease(cf: *const std::ffi::c_void);

    static kCFTypeDictionaryKeyCallBacks: std::ffi::c_void;
    static kCFTypeDictionaryValueCallBacks: std::ffi::c_void;
    static kCFBooleanTrue: *const std::ffi::c_void;
    static kAXTrustedCheckOptionPrompt: *const std::ffi::c_void;
}

/// Whether this process may observe and synthesize keystrokes.
#[cfg(target_os = "macos")]
pub fn is_trusted() -> bool {
    // SAFETY: reads the permission state only
    unsafe { AXIsProcessTrusted() }
}

/// X11 delivers keystrokes to any client; Wayland delivers none.
#[cfg(target_os = "linux")]
pub fn is_trusted() -> bool {
    detect_display_server() == "X11"
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
pub fn is_trusted() -> bool {
    true
}

/// Ask the OS to show its permission dialog. Returns the trust state at the
/// time of asking.
#[cfg(target_os = "macos")]
pub fn prompt_for_trust() -> bool {
    unsafe {
        let keys = [kAXTrustedCheckOptionPrompt];
        let values = [kCFBooleanTrue];

        let options = CFDictionaryCreate(
            std::ptr::null(),
            keys.as_ptr(),
            values.as_ptr(),
            1,
            &kCFTypeDictionaryKeyCallBacks,
            &kCFTypeDictionaryValueCallBacks,
        );

        let trusted = AXIsProcessTrustedWithOptions(options);

        if !options.is_null() {
            CFRelease(options);
        }

        trusted
    }
}

#[cfg(not(target_os = "macos"))]
pub fn prompt_for_trust() -> bool {
    is_trusted()
}

/// Prompt once, then poll until trusted or `running` is cleared.
pub fn wait_until_trusted(running: &AtomicBool) -> bool {
    if is_trusted() {
        return true;
    }

    warn!("input monitoring permission missing, waiting for it to be granted");
    prompt_for_trust();

    while running.load(Ordering::SeqCst) {
        thread::sleep(TRUST_POLL_INTERVAL);
        if is_trusted() {
            info!("input monitoring permission granted");
            return true;
        }
    }

    false
}

/// Interactive check run by `emote start` and `emote permissions`.
pub fn check_and_request_permissions() -> Result<()> {
    if is_trusted() {
        return Ok(());
    }

    #[cfg(target_os = "macos")]
    {
        request_macos_permissions()?;
    }

    #[cfg(target_os = "linux")]
    {
        request_linux_permissions()?;
    }

    Ok(())
}

#[cfg(target_os = "macos")]
fn request_macos_permissions() -> Result<()> {
    let terminal_app = detect_terminal_app();

    println!("⚠️  emote needs accessibility permissions to watch for :shortcodes:");
    println!("-------------------------------------------------------------------");
    println!("Please follow these steps:");
    println!("1. Open System Settings > Privacy & Security > Accessibility");
    println!("2. Find and check the box next to '{}'", terminal_app);
    println!("3. If it's already checked, uncheck and recheck it");
    println!();
    println!("On macOS 14 (Sonoma) or newer, also allow '{}' in Input Monitoring.", terminal_app);
    println!();

    prompt_for_trust();

    println!("Press Enter once you've granted permission...");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    if !is_trusted() {
        return Err(EmoteError::PermissionDenied(format!(
            "Accessibility permission not granted for {}. Grant it and run 'emote start' again.",
            terminal_app
        )));
    }

    println!("\n✅ Permission granted successfully!");
    Ok(())
}

#[cfg(target_os = "linux")]
fn request_linux_permissions() -> Result<()> {
    let display = detect_display_server();

    println!("⚠️  emote needs an X11 session to watch for :shortcodes:");
    println!("--------------------------------------------------------");
    println!("Detected display server: {}", display);
    println!();
    if display == "Wayland" {
        println!("Wayland does not let applications observe global keystrokes.");
        println!("Log in to an X11 (Xorg) session to use emote.");
    } else {
        println!("No display was found. Start emote from inside your desktop session.");
    }

    Err(EmoteError::PermissionDenied(format!(
        "global keyboard access is unavailable on display server '{}'",
        display
    )))
}
