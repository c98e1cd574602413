//! Foreground-window resolution (spec §4.5 step 4).
//!
//! Each platform branch is best-effort: failures fall back to
//! `("Unknown Window", "Unknown App")` rather than propagating an error, since
//! losing the active-window label is not a reason to drop a capture.

use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Resolve the current foreground window title and owning application name.
pub fn active_window() -> (String, String) {
    #[cfg(target_os = "linux")]
    {
        linux::active_window()
    }
    #[cfg(target_os = "macos")]
    {
        macos::active_window()
    }
    #[cfg(target_os = "windows")]
    {
        windows::active_window()
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        tracing::warn!("unsupported platform for active window detection");
        unknown()
    }
}

fn unknown() -> (String, String) {
    ("Unknown Window".to_string(), "Unknown App".to_string())
}

/// Run a subprocess, polling for completion, killing it if it outlives
/// `timeout`. `on_missing` is invoked once if the binary itself is absent.
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn run_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
    on_missing: impl FnOnce(),
) -> Option<std::process::Output> {
    use std::process::{Command, Stdio};

    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            on_missing();
            return None;
        }
        Err(_) => return None,
    };

    let start = std::time::Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return child.wait_with_output().ok(),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    return None;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(_) => return None,
        }
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use super::{run_with_timeout, unknown, PROBE_TIMEOUT};

    pub fn active_window() -> (String, String) {
        let window_id = match run("xdotool", &["getactivewindow"]) {
            Some(id) if !id.is_empty() => id,
            _ => return unknown(),
        };

        let window_title = run("xdotool", &["getwindowname", &window_id]).unwrap_or_default();
        let window_pid = run("xdotool", &["getwindowpid", &window_id]).unwrap_or_default();

        let app_name = if window_pid.is_empty() {
            "Unknown App".to_string()
        } else {
            std::fs::read_to_string(format!("/proc/{window_pid}/comm"))
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| "Unknown App".to_string())
        };

        let title = if window_title.is_empty() {
            "Unknown Window".to_string()
        } else {
            window_title
        };

        (title, app_name)
    }

    fn run(program: &str, args: &[&str]) -> Option<String> {
        let output = run_with_timeout(program, args, PROBE_TIMEOUT, || {
            tracing::warn!("xdotool not found; install it for active window detection");
        })?;
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(target_os = "macos")]
mod macos {
    use super::{run_with_timeout, unknown, PROBE_TIMEOUT};

    const APP_SCRIPT: &str = r#"
        tell application "System Events"
            set frontApp to name of first application process whose frontmost is true
            return frontApp
        end tell
    "#;

    pub fn active_window() -> (String, String) {
        let app_name = match osascript(APP_SCRIPT) {
            Some(s) if !s.is_empty() => s,
            _ => return unknown(),
        };

        let title_script = format!(
            r#"
            tell application "System Events"
                tell process "{app_name}"
                    try
                        set windowTitle to name of front window
                        return windowTitle
                    on error
                        return ""
                    end try
                end tell
            end tell
            "#
        );

        let window_title = osascript(&title_script).unwrap_or_default();
        let title = if window_title.is_empty() {
            app_name.clone()
        } else {
            window_title
        };

        (title, app_name)
    }

    fn osascript(script: &str) -> Option<String> {
        let output = run_with_timeout("osascript", &["-e", script], PROBE_TIMEOUT, || {
            tracing::warn!("osascript not found; install Xcode command line tools");
        })?;
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(target_os = "windows")]
mod windows {
    use super::unknown;
    use windows_sys::Win32::Foundation::HWND;
    use windows_sys::Win32::System::ProcessStatus::K32GetModuleBaseNameW;
    use windows_sys::Win32::System::Threading::{
        OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
    };
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        GetForegroundWindow, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId,
    };

    pub fn active_window() -> (String, String) {
        unsafe {
            let hwnd: HWND = GetForegroundWindow();
            if hwnd == 0 {
                return unknown();
            }

            let len = GetWindowTextLengthW(hwnd) + 1;
            let mut buf = vec![0u16; len as usize];
            GetWindowTextW(hwnd, buf.as_mut_ptr(), len);
            let window_title = String::from_utf16_lossy(&buf)
                .trim_end_matches('\u{0}')
                .to_string();
            let window_title = if window_title.is_empty() {
                "Unknown Window".to_string()
            } else {
                window_title
            };

            let mut pid: u32 = 0;
            GetWindowThreadProcessId(hwnd, &mut pid);

            let mut app_name = "Unknown App".to_string();
            if pid != 0 {
                let handle =
                    OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, 0, pid);
                if handle != 0 {
                    let mut exe_buf = vec![0u16; 260];
                    let written =
                        K32GetModuleBaseNameW(handle, std::ptr::null_mut(), exe_buf.as_mut_ptr(), 260);
                    if written > 0 {
                        app_name = String::from_utf16_lossy(&exe_buf[..written as usize]);
                    }
                    windows_sys::Win32::Foundation::CloseHandle(handle);
                }
            }

            (window_title, app_name)
        }
    }
}
