/// Verify if a process with the given PID is running
#[cfg(unix)]
pub fn verify_process_running(pid: u32) -> bool {
    use std::process::Command;

    // kill -0 only checks that the process exists
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(windows)]
pub fn verify_process_running(pid: u32) -> bool {
    use std::process::Command;

    let output = Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid), "/NH"])
        .output();

    match output {
        Ok(output) => String::from_utf8_lossy(&output.stdout).contains(&pid.to_string()),
        Err(_) => false,
    }
}

/// Best guess at the application that needs the input permission.
#[cfg(target_os = "macos")]
pub fn detect_terminal_app() -> String {
    match std::env::var("TERM_PROGRAM").as_deref() {
        Ok("Apple_Terminal") => "Terminal".to_string(),
        Ok("iTerm.app") => "iTerm".to_string(),
        Ok("vscode") => "Visual Studio Code".to_string(),
        Ok("WezTerm") => "WezTerm".to_string(),
        Ok(other) if !other.is_empty() => other.to_string(),
        _ => "your terminal application".to_string(),
    }
}

#[cfg(target_os = "linux")]
pub fn detect_display_server() -> &'static str {
    if std::env::var_os("WAYLAND_DISPLAY").is_some() {
        "Wayland"
    } else if std::env::var_os("DISPLAY").is_some() {
        "X11"
    } else {
        "none"
    }
}
