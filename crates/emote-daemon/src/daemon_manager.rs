use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use emote_core::config::{
    ensure_config_dir, get_daemon_log_path, get_pid_file_path, get_recent_path, get_settings_path,
    write_pid_file,
};
use emote_core::{is_daemon_running, EmoteError, EnigoInjector, InjectionGuard, JsonAliasStore, Result};
use tracing::{error, info};

use crate::context::SystemContext;
use crate::keyboard_listener::{start_keyboard_listener, TAP_SWALLOWS};
use crate::logging::init_logging;
use crate::monitor::{Monitor, MonitorTables};
use crate::permissions::{check_and_request_permissions, wait_until_trusted};
use crate::process::verify_process_running;
use crate::reload::{load_settings_or_default, ConfigWatcher};
use crate::sink::{load_recent, ChannelSink, RecentLog};

const RELOAD_INTERVAL: Duration = Duration::from_secs(1);
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Start the daemon process
pub fn start_daemon() -> Result<()> {
    if let Some(pid) = is_daemon_running()? {
        if verify_process_running(pid) {
            return Err(EmoteError::DaemonAlreadyRunning(pid));
        }

        println!("Found stale PID file. Cleaning up and starting new daemon...");
        let _ = fs::remove_file(get_pid_file_path());
    }

    println!("Starting emote daemon...");

    ensure_config_dir()?;
    JsonAliasStore::from_config_dir().ensure_custom_file()?;
    check_and_request_permissions()?;

    let current_exe = std::env::current_exe()?;
    let daemon_log_file = get_daemon_log_path();

    #[cfg(unix)]
    {
        use std::process::Command;

        let cmd = format!(
            "nohup \"{}\" daemon-worker > \"{}\" 2>&1 &",
            current_exe.to_string_lossy(),
            daemon_log_file.to_string_lossy()
        );

        Command::new("sh").arg("-c").arg(&cmd).status()?;
    }

    #[cfg(windows)]
    {
        use std::process::Command;

        let cmd = format!(
            "START /B \"emote Daemon\" \"{}\" daemon-worker > \"{}\" 2>&1",
            current_exe.to_string_lossy(),
            daemon_log_file.to_string_lossy()
        );

        Command::new("cmd").arg("/C").arg(&cmd).status()?;
    }

    // Wait for the worker to write its PID file
    for _ in 0..20 {
        thread::sleep(Duration::from_millis(100));
        if is_daemon_running()?.is_some() {
            break;
        }
    }

    match is_daemon_running()? {
        Some(pid) if verify_process_running(pid) => {
            println!("Daemon started successfully with PID {}.", pid);
            Ok(())
        }
        Some(_) => Err(EmoteError::Other(format!(
            "Daemon process failed to start. Check logs at {}",
            daemon_log_file.display()
        ))),
        None => Err(EmoteError::Other(format!(
            "Daemon failed to start. Check logs at {}",
            daemon_log_file.display()
        ))),
    }
}

/// Stop the daemon if it's running
pub fn stop_daemon() -> Result<()> {
    let pid_file = get_pid_file_path();
    let pid = is_daemon_running()?.ok_or(EmoteError::DaemonNotRunning)?;

    println!("Attempting to stop daemon with PID {}...", pid);

    if !verify_process_running(pid) {
        println!("Process with PID {} is not running.", pid);
        let _ = fs::remove_file(&pid_file);
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::process::Command;

        // SIGTERM lets the worker detach the tap and remove its PID file
        let _ = Command::new("kill").arg(pid.to_string()).status();
        println!("Sent termination signal to daemon with PID {}", pid);

        for _ in 0..10 {
            thread::sleep(Duration::from_millis(100));
            if !verify_process_running(pid) {
                break;
            }
        }

        if verify_process_running(pid) {
            println!("Daemon didn't terminate gracefully, using force kill...");
            let _ = Command::new("kill")
                .args(["-9", &pid.to_string()])
                .status();
        }
    }

    #[cfg(windows)]
    {
        use std::process::Command;

        let _ = Command::new("taskkill")
            .args(["/PID", &pid.to_string()])
            .status();

        thread::sleep(Duration::from_millis(500));

        if verify_process_running(pid) {
            println!("Daemon didn't terminate gracefully, using force kill...");
            let _ = Command::new("taskkill")
                .args(["/F", "/T", "/PID", &pid.to_string()])
                .status();
        }
    }

    let _ = fs::remove_file(&pid_file);

    if verify_process_running(pid) {
        println!("WARNING: Failed to stop daemon process. PID file removed anyway.");
    } else {
        println!("Daemon stopped successfully.");
    }

    Ok(())
}

/// Check daemon status
pub fn daemon_status() -> Result<()> {
    match is_daemon_running()? {
        Some(pid) if verify_process_running(pid) => {
            println!("emote daemon is running with PID {}", pid);
        }
        Some(pid) => {
            println!("PID file exists but process {} is not running", pid);
            println!("This could indicate the daemon crashed or was stopped abruptly");
            println!("Recommend running 'emote stop' followed by 'emote start'");
        }
        None => {
            println!("emote daemon is not running");
        }
    }

    let recent = load_recent(&get_recent_path()).unwrap_or_default();
    if !recent.is_empty() {
        println!("\nRecent replacements:");
        for entry in recent {
            println!(
                "  :{}: → {}  ({})",
                entry.trigger,
                entry.replacement,
                entry.formatted_time()
            );
        }
    }

    Ok(())
}

/// This function runs as a separate daemon process
pub fn daemon_worker_entry() -> Result<()> {
    let pid_file = get_pid_file_path();
    write_pid_file(&pid_file)?;

    let result = run_daemon_worker();

    let _ = fs::remove_file(&pid_file);

    result
}

/// The actual daemon worker process
pub fn run_daemon_worker() -> Result<()> {
    if let Err(e) = init_logging() {
        eprintln!("{}", e);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    let running = Arc::new(AtomicBool::new(true));
    runtime.spawn(wait_for_shutdown(Arc::clone(&running)));

    if !wait_until_trusted(&running) {
        info!("shutdown requested before permission was granted");
        return Ok(());
    }

    let store = JsonAliasStore::from_config_dir();
    let settings_path = get_settings_path();
    let settings = load_settings_or_default(&settings_path);
    let tables = MonitorTables::new(store.load_table(), settings);
    info!(aliases = tables.aliases.load().len(), "alias table loaded");

    let guard = Arc::new(InjectionGuard::new());
    let injector = EnigoInjector::new(Arc::clone(&tables.settings), Arc::clone(&guard))
        .with_runtime(runtime.handle().clone());

    let (sink, rx) = ChannelSink::new();
    runtime.spawn(RecentLog::open(get_recent_path()).run(rx));

    let monitor = Arc::new(Mutex::new(Monitor::new(
        tables.clone(),
        injector,
        SystemContext,
        sink,
        TAP_SWALLOWS,
    )));

    let listener = start_keyboard_listener(Arc::clone(&monitor), guard, Arc::clone(&running));

    let mut watcher = ConfigWatcher::new(store, settings_path, tables);
    runtime.block_on(async {
        let mut reload = tokio::time::interval(RELOAD_INTERVAL);
        while running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = reload.tick() => {
                    watcher.poll();
                }
                _ = tokio::time::sleep(SHUTDOWN_POLL) => {}
            }
        }
    });

    match monitor.lock() {
        Ok(mut monitor) => monitor.stop(),
        Err(poisoned) => poisoned.into_inner().stop(),
    }
    listener.stop();

    runtime.shutdown_timeout(Duration::from_millis(500));
    info!("daemon worker exiting");
    Ok(())
}

/// Clear `running` on Ctrl-C or SIGTERM.
async fn wait_for_shutdown(running: Arc<AtomicBool>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(terminate) => terminate,
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
                running.store(false, Ordering::SeqCst);
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            return;
        }
    }

    info!("shutdown signal received");
    running.store(false, Ordering::SeqCst);
}
