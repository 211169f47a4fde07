//! Engine driving a local Graphviz `dot` executable.

use super::{Engine, EngineResult, Options};
use crate::error::EngineError;
use crate::rasterizer::Rasterizer;
use gvrender_config::Config;
use parking_lot::Mutex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

#[cfg(windows)]
const DOT_EXECUTABLE: &str = "dot.exe";
#[cfg(not(windows))]
const DOT_EXECUTABLE: &str = "dot";

/// Runs `dot` as a subprocess, source on stdin, output on stdout.
pub struct CommandLineEngine {
    configured: Option<PathBuf>,
    resolved: Mutex<Option<PathBuf>>,
}

impl Default for CommandLineEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandLineEngine {
    /// Engine that looks `dot` up on `PATH`.
    pub fn new() -> Self {
        Self {
            configured: None,
            resolved: Mutex::new(None),
        }
    }

    /// Engine using an explicit `dot` executable.
    pub fn with_executable(path: impl Into<PathBuf>) -> Self {
        Self {
            configured: Some(path.into()),
            resolved: Mutex::new(None),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        match &config.cmdline.executable {
            Some(path) => Self::with_executable(path),
            None => Self::new(),
        }
    }

    /// Path of the executable found by the last successful lookup.
    pub fn executable(&self) -> Option<PathBuf> {
        self.resolved.lock().clone()
    }

    fn resolve(&self) -> Result<PathBuf, EngineError> {
        if let Some(path) = self.resolved.lock().as_ref() {
            return Ok(path.clone());
        }
        let path = match &self.configured {
            Some(path) if path.is_file() => path.clone(),
            Some(path) => {
                return Err(EngineError::CommandNotFound(format!(
                    "configured dot executable {} does not exist",
                    path.display()
                )));
            }
            None => find_on_path(DOT_EXECUTABLE).ok_or_else(|| {
                EngineError::CommandNotFound(format!("{DOT_EXECUTABLE} not found on PATH"))
            })?,
        };
        *self.resolved.lock() = Some(path.clone());
        Ok(path)
    }
}

/// Search the `PATH` directories for an executable file.
fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Build the `dot` argument list for one request.
fn dot_args(options: &Options, format: &str) -> Vec<String> {
    let mut args = vec![
        format!("-K{}", options.layout),
        format!("-T{format}"),
    ];
    if options.y_invert {
        args.push("-y".to_string());
    }
    args
}

/// Run `program` with `input` piped to stdin and return its stdout.
fn run_piped(
    program: &Path,
    args: &[String],
    input: &[u8],
    cwd: Option<&Path>,
) -> Result<Vec<u8>, EngineError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let mut child = command.spawn()?;

    // Feed stdin from a separate thread so a large output cannot deadlock the pipe
    let writer = child.stdin.take().map(|mut stdin| {
        let input = input.to_vec();
        thread::spawn(move || stdin.write_all(&input))
    });

    let output = child.wait_with_output()?;
    if let Some(writer) = writer {
        match writer.join() {
            Ok(Ok(())) => {}
            // dot may exit early on a syntax error and close its stdin
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(EngineError::RenderFailed(
                    "stdin writer thread panicked".to_string(),
                ));
            }
        }
    }

    if output.status.success() {
        Ok(output.stdout)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("{} exited with {}", program.display(), output.status)
        } else {
            stderr
        };
        Err(EngineError::CommandFailed(message))
    }
}

impl Engine for CommandLineEngine {
    fn name(&self) -> &str {
        "cmdline"
    }

    fn init(&self) -> Result<(), EngineError> {
        let path = self.resolve()?;
        let output = Command::new(&path)
            .arg("-V")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| EngineError::CommandNotFound(format!("{}: {e}", path.display())))?;
        if !output.status.success() {
            return Err(EngineError::CommandFailed(format!(
                "{} -V exited with {}",
                path.display(),
                output.status
            )));
        }
        // dot prints its version banner on stderr
        crate::debug_info!(
            "ENGINE",
            "cmdline: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(())
    }

    fn execute(
        &self,
        source: &str,
        options: &Options,
        rasterizer: Option<&dyn Rasterizer>,
    ) -> Result<EngineResult, EngineError> {
        let path = self.resolve()?;

        let built_in = if options.kind.is_image() {
            rasterizer.and_then(|r| r.built_in_format())
        } else {
            None
        };
        let format = built_in.as_deref().unwrap_or(options.kind.engine_token());
        let args = dot_args(options, format);
        crate::debug_log!("ENGINE", "cmdline: {} {}", path.display(), args.join(" "));

        let stdout = run_piped(&path, &args, source.as_bytes(), options.basedir.as_deref())?;
        if built_in.is_some() {
            return Ok(EngineResult::Binary(stdout));
        }
        String::from_utf8(stdout)
            .map(EngineResult::Text)
            .map_err(|e| EngineError::RenderFailed(format!("dot produced non-UTF-8 output: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Layout;
    use crate::format::OutputKind;

    #[test]
    fn test_dot_args() {
        let options = Options {
            kind: OutputKind::Json,
            layout: Layout::Neato,
            y_invert: true,
            ..Options::default()
        };
        assert_eq!(dot_args(&options, "json"), vec!["-Kneato", "-Tjson", "-y"]);
        assert_eq!(dot_args(&Options::default(), "svg"), vec!["-Kdot", "-Tsvg"]);
    }

    #[test]
    fn test_missing_configured_executable() {
        let engine = CommandLineEngine::with_executable("/nonexistent/bin/dot");
        assert!(matches!(engine.init(), Err(EngineError::CommandNotFound(_))));
        assert!(engine.executable().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_piped_echoes_stdin() {
        let out = run_piped(Path::new("/bin/cat"), &[], b"digraph { a }", None).unwrap();
        assert_eq!(out, b"digraph { a }");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_piped_reports_stderr() {
        let args = vec!["-c".to_string(), "echo 'syntax error in line 1' >&2; exit 1".to_string()];
        let err = run_piped(Path::new("/bin/sh"), &args, b"", None).unwrap_err();
        match err {
            EngineError::CommandFailed(msg) => assert_eq!(msg, "syntax error in line 1"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
