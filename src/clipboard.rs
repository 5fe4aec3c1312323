//! System clipboard access
//!
//! Images go through arboard. File references have no portable API, so they
//! are handed to the platform's own clipboard tool.

use std::borrow::Cow;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use image::RgbaImage;

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(#[from] arboard::Error),

    #[error("{program} failed: {detail}")]
    Command { program: String, detail: String },

    #[error("No clipboard tool found (tried {tried})")]
    NoTool { tried: String },

    #[error("Cannot place {} on the clipboard: {reason}", path.display())]
    InvalidPath {
        path: std::path::PathBuf,
        reason: &'static str,
    },
}

/// Destination for copied PDFs and captured images
pub trait ClipboardSink {
    fn set_image(&mut self, image: &RgbaImage) -> Result<(), ClipboardError>;

    /// Place a reference to an existing file, so pasting into a file manager
    /// or chat client attaches the file itself
    fn set_file(&mut self, path: &Path) -> Result<(), ClipboardError>;
}

/// The desktop clipboard.
///
/// The arboard handle is opened on first use and kept, since on Linux the
/// clipboard contents live only as long as the handle that set them.
#[derive(Default)]
pub struct SystemClipboard {
    handle: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> Result<&mut arboard::Clipboard, ClipboardError> {
        if self.handle.is_none() {
            self.handle = Some(arboard::Clipboard::new()?);
        }
        self.handle
            .as_mut()
            .ok_or_else(|| ClipboardError::Unavailable(arboard::Error::ClipboardNotSupported))
    }
}

impl ClipboardSink for SystemClipboard {
    fn set_image(&mut self, image: &RgbaImage) -> Result<(), ClipboardError> {
        let data = arboard::ImageData {
            width: image.width() as usize,
            height: image.height() as usize,
            bytes: Cow::Borrowed(image.as_raw()),
        };
        self.handle()?.set_image(data)?;
        log::info!("Copied {}x{} image to clipboard", image.width(), image.height());
        Ok(())
    }

    fn set_file(&mut self, path: &Path) -> Result<(), ClipboardError> {
        if !path.is_absolute() {
            return Err(ClipboardError::InvalidPath {
                path: path.to_path_buf(),
                reason: "path must be absolute",
            });
        }
        set_file_reference(path)?;
        log::info!("Copied file reference {} to clipboard", path.display());
        Ok(())
    }
}

#[cfg(target_os = "windows")]
fn set_file_reference(path: &Path) -> Result<(), ClipboardError> {
    let script = format!(
        "Set-Clipboard -LiteralPath {}",
        powershell_literal(&path.to_string_lossy())
    );
    run_tool("powershell", &["-NoProfile", "-NonInteractive", "-Command", &script], None)
}

#[cfg(target_os = "macos")]
fn set_file_reference(path: &Path) -> Result<(), ClipboardError> {
    let script = format!(
        "set the clipboard to POSIX file {}",
        applescript_string(&path.to_string_lossy())
    );
    run_tool("osascript", &["-e", &script], None)
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn set_file_reference(path: &Path) -> Result<(), ClipboardError> {
    let uri_list = format!("{}\r\n", file_uri(path));

    let wayland = std::env::var_os("WAYLAND_DISPLAY").is_some();
    let mut attempts: Vec<(&str, &[&str])> = Vec::new();
    if wayland {
        attempts.push(("wl-copy", &["--type", "text/uri-list"]));
    }
    attempts.push(("xclip", &["-selection", "clipboard", "-t", "text/uri-list", "-i"]));

    let mut tried = Vec::new();
    for (program, args) in attempts {
        match run_tool(program, args, Some(&uri_list)) {
            Err(ClipboardError::NoTool { .. }) => tried.push(program),
            other => return other,
        }
    }
    Err(ClipboardError::NoTool {
        tried: tried.join(", "),
    })
}

/// Longest a clipboard helper may take before it is killed
const TOOL_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a clipboard helper, feeding `stdin` if given
fn run_tool(program: &str, args: &[&str], stdin: Option<&str>) -> Result<(), ClipboardError> {
    run_tool_with_timeout(program, args, stdin, TOOL_TIMEOUT)
}

/// Helpers such as xclip and wl-copy fork a process that keeps serving the
/// selection and inherits their stdio. Only the direct child is waited for,
/// and its stderr goes to a file so no pipe is held open by the fork.
fn run_tool_with_timeout(
    program: &str,
    args: &[&str],
    stdin: Option<&str>,
    timeout: Duration,
) -> Result<(), ClipboardError> {
    let command_err = |detail: String| ClipboardError::Command {
        program: program.to_string(),
        detail,
    };

    let mut stderr_log = tempfile::tempfile().map_err(|e| command_err(e.to_string()))?;
    let stderr = stderr_log
        .try_clone()
        .map_err(|e| command_err(e.to_string()))?;

    let mut child = match Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::null())
        .stderr(Stdio::from(stderr))
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ClipboardError::NoTool {
                tried: program.to_string(),
            });
        }
        Err(e) => return Err(command_err(e.to_string())),
    };

    // The pipe is dropped at the end of this block so the tool sees EOF
    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        if let Err(e) = pipe.write_all(input.as_bytes()) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(command_err(e.to_string()));
        }
    }

    let status = match wait_timeout(&mut child, timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            log::warn!("{program} did not finish within {timeout:?}, killed");
            return Err(command_err(format!("timed out after {timeout:?}")));
        }
        Err(e) => return Err(command_err(e.to_string())),
    };
    if status.success() {
        return Ok(());
    }

    let mut detail = String::new();
    if stderr_log.seek(SeekFrom::Start(0)).is_ok() {
        let _ = stderr_log.read_to_string(&mut detail);
    }
    let detail = detail.trim();
    Err(command_err(if detail.is_empty() {
        status.to_string()
    } else {
        detail.to_string()
    }))
}

fn wait_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// `file://` URI with every path segment percent-encoded
#[must_use]
pub fn file_uri(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let encoded: Vec<String> = raw
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    let joined = encoded.join("/");
    if joined.starts_with('/') {
        format!("file://{joined}")
    } else {
        format!("file:///{joined}")
    }
}

/// Single-quoted PowerShell string literal
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn powershell_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Double-quoted AppleScript string literal
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn applescript_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
