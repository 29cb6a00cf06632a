//! Process invocation utilities.
//!
//! Every external tool slipway runs goes through [`ProcessBuilder`],
//! so working directory, environment and error reporting behave the
//! same for all of them.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};

use anyhow::{bail, Context, Result};

/// A command line under construction: program, arguments, environment
/// overrides and working directory.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: OsString,
    args: Vec<OsString>,
    env: BTreeMap<String, OsString>,
    cwd: Option<PathBuf>,
}

/// What a streamed command left behind: its exit status and everything
/// it printed, in arrival order per stream.
#[derive(Debug)]
pub struct StreamedOutput {
    pub status: ExitStatus,
    pub text: String,
}

impl ProcessBuilder {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Self {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Override one environment variable in the child.
    pub fn env(mut self, key: impl Into<String>, value: impl AsRef<OsStr>) -> Self {
        self.env.insert(key.into(), value.as_ref().to_os_string());
        self
    }

    /// Run the child in this directory.
    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }

    /// Run to completion, capturing stdout and stderr.
    pub fn exec(&self) -> Result<Output> {
        self.command()
            .output()
            .with_context(|| format!("failed to run `{}`", self.program.to_string_lossy()))
    }

    /// Run to completion and treat a non-zero exit as an error, with
    /// the child's stderr in the message.
    pub fn exec_and_check(&self) -> Result<Output> {
        let output = self.exec()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`{}` exited with {}\n{}",
                self.display_command(),
                output.status,
                stderr.trim()
            );
        }
        Ok(output)
    }

    /// Run the command, echoing every output line to stderr as it
    /// arrives while also capturing it.
    ///
    /// stdout and stderr are drained on separate threads so neither
    /// pipe can fill up and stall the child.
    pub fn exec_stream(&self) -> Result<StreamedOutput> {
        let mut cmd = self.command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.to_string_lossy()))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let text = std::thread::scope(|scope| {
            let out = scope.spawn(move || drain_lines(stdout));
            let err = scope.spawn(move || drain_lines(stderr));
            let mut text = out.join().unwrap_or_default();
            text.push_str(&err.join().unwrap_or_default());
            text
        });

        let status = child
            .wait()
            .with_context(|| format!("failed to wait for `{}`", self.program.to_string_lossy()))?;

        Ok(StreamedOutput { status, text })
    }

    /// The command line as one displayable string, for logs and errors.
    pub fn display_command(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn drain_lines<R: Read>(pipe: Option<R>) -> String {
    let mut text = String::new();
    let Some(pipe) = pipe else {
        return text;
    };
    let reader = BufReader::new(pipe);
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        eprintln!("{}", line);
        text.push_str(&line);
        text.push('\n');
    }
    text
}
