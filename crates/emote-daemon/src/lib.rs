pub mod context;
mod daemon_manager;
pub mod keyboard_listener;
pub mod logging;
pub mod mac_keys;
#[cfg(target_os = "macos")]
mod mac_tap;
pub mod monitor;
pub mod permissions;
mod process;
pub mod reload;
pub mod sink;
#[cfg(test)]
mod test_support;

// Re-export the main functionality
pub use daemon_manager::{
    daemon_status, daemon_worker_entry, run_daemon_worker, start_daemon, stop_daemon,
};
pub use keyboard_listener::{start_keyboard_listener, ListenerHandle, TapControl};
pub use monitor::{Disposition, InputEvent, KeyEvent, Monitor, MonitorTables, TapState};
pub use permissions::{check_and_request_permissions, is_trusted};
