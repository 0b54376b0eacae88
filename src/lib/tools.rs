//! External tool invocation plumbing.
//!
//! Every external collaborator is described declaratively as a
//! [`ToolPipeline`]: one or more commands chained stdout-to-stdin, with the
//! final stdout optionally captured into an artifact. The declarative form
//! lets the stage engine render, execute, and fail multi-process pipelines
//! uniformly, and lets dry-run mode print exactly what would be executed.
//!
//! Captured artifacts are written to a `.partial` temporary and renamed into
//! place only after every process in the chain exits successfully, so a
//! pipeline killed mid-write never leaves a non-empty artifact that the
//! resume skip-predicate would mistake for a completed stage.

use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use log::debug;

use crate::errors::{FusepipeError, Result};

/// A single external command: program name plus arguments.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
}

impl ToolCommand {
    /// Starts a builder for `program`.
    #[must_use]
    pub fn new<S: Into<String>>(program: S) -> Self {
        ToolCommand { program: program.into(), args: Vec::new() }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends a path argument.
    #[must_use]
    pub fn path<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().display().to_string())
    }

    /// The resolved command line, for dry-run display and error messages.
    #[must_use]
    pub fn rendered(&self) -> String {
        let mut rendered = self.program.clone();
        for arg in &self.args {
            rendered.push(' ');
            if arg.contains(char::is_whitespace) {
                rendered.push('\'');
                rendered.push_str(arg);
                rendered.push('\'');
            } else {
                rendered.push_str(arg);
            }
        }
        rendered
    }
}

/// One or more commands chained through pipes, with the last command's
/// stdout optionally captured to a file.
#[derive(Debug, Clone)]
pub struct ToolPipeline {
    commands: Vec<ToolCommand>,
    stdout_to: Option<PathBuf>,
}

impl ToolPipeline {
    /// A pipeline of a single command.
    #[must_use]
    pub fn single(command: ToolCommand) -> Self {
        ToolPipeline { commands: vec![command], stdout_to: None }
    }

    /// A pipeline chaining `commands` stdout-to-stdin, left to right.
    ///
    /// # Panics
    /// Panics if `commands` is empty
    #[must_use]
    pub fn chain(commands: Vec<ToolCommand>) -> Self {
        assert!(!commands.is_empty(), "a tool pipeline needs at least one command");
        ToolPipeline { commands, stdout_to: None }
    }

    /// Captures the final command's stdout into `path` (atomically).
    #[must_use]
    pub fn capture_to<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.stdout_to = Some(path.into());
        self
    }

    /// The resolved pipeline, shell style: `a | b > out`.
    #[must_use]
    pub fn rendered(&self) -> String {
        let mut rendered =
            self.commands.iter().map(ToolCommand::rendered).collect::<Vec<_>>().join(" | ");
        if let Some(path) = &self.stdout_to {
            rendered.push_str(" > ");
            rendered.push_str(&path.display().to_string());
        }
        rendered
    }

    /// Runs the pipeline to completion.
    ///
    /// All processes are spawned up front; the call then waits for each in
    /// order. The captured artifact only appears under its final name when
    /// every process exits with status zero.
    ///
    /// # Errors
    /// Returns [`FusepipeError::ToolSpawn`] when a program cannot be started
    /// and [`FusepipeError::ToolExit`] on any nonzero exit
    pub fn run(&self) -> Result<()> {
        debug!("Executing: {}", self.rendered());
        let partial = self.stdout_to.as_ref().map(|p| partial_path(p));
        let last = self.commands.len() - 1;
        let mut children: Vec<Child> = Vec::with_capacity(self.commands.len());
        let mut upstream: Option<ChildStdout> = None;

        for (i, tool) in self.commands.iter().enumerate() {
            let mut command = Command::new(&tool.program);
            command.args(&tool.args);
            if let Some(stdout) = upstream.take() {
                command.stdin(Stdio::from(stdout));
            }
            if i < last {
                command.stdout(Stdio::piped());
            } else if let Some(path) = &partial {
                command.stdout(File::create(path)?);
            }
            let mut child = command.spawn().map_err(|e| FusepipeError::ToolSpawn {
                command: tool.rendered(),
                source: e,
            })?;
            if i < last {
                upstream = child.stdout.take();
            }
            children.push(child);
        }

        for (child, tool) in children.iter_mut().zip(&self.commands) {
            let status = child.wait()?;
            if !status.success() {
                if let Some(path) = &partial {
                    let _ = fs::remove_file(path);
                }
                return Err(FusepipeError::ToolExit {
                    command: tool.rendered(),
                    status: status.to_string(),
                });
            }
        }

        if let (Some(final_path), Some(partial)) = (&self.stdout_to, &partial) {
            fs::rename(partial, final_path)?;
        }
        Ok(())
    }
}

/// The temporary name an artifact is written under until it is complete.
#[must_use]
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

/// Writes `contents` to `path` through a `.partial` temporary and an atomic
/// rename, so a partially written file is never visible under `path`.
///
/// # Errors
/// Returns an error if the write or the rename fails
pub fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    let partial = partial_path(path);
    fs::write(&partial, contents)?;
    fs::rename(&partial, path)?;
    Ok(())
}

/// Copies `source` to `dest` through a `.partial` temporary and an atomic
/// rename.
///
/// # Errors
/// Returns an error if the copy or the rename fails
pub fn atomic_copy(source: &Path, dest: &Path) -> Result<()> {
    let partial = partial_path(dest);
    fs::copy(source, &partial)?;
    fs::rename(&partial, dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_rendered_single_command() {
        let command = ToolCommand::new("samtools").arg("view").arg("-b").path("/data/in.bam");
        assert_eq!(command.rendered(), "samtools view -b /data/in.bam");
    }

    #[test]
    fn test_rendered_quotes_whitespace() {
        let command = ToolCommand::new("chimfilter").arg("--thresholds").arg("5,0,80,30;");
        assert_eq!(command.rendered(), "chimfilter --thresholds 5,0,80,30;");
        let spaced = ToolCommand::new("tool").arg("a b");
        assert_eq!(spaced.rendered(), "tool 'a b'");
    }

    #[test]
    fn test_rendered_pipeline() {
        let pipeline = ToolPipeline::chain(vec![
            ToolCommand::new("samtools").arg("fastq").arg("-f").arg("4"),
            ToolCommand::new("pigz").arg("-c"),
        ])
        .capture_to("/out/unmapped.fastq.gz");
        assert_eq!(
            pipeline.rendered(),
            "samtools fastq -f 4 | pigz -c > /out/unmapped.fastq.gz"
        );
    }

    #[test]
    fn test_run_captures_stdout_atomically() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("echo.txt");
        let pipeline =
            ToolPipeline::single(ToolCommand::new("echo").arg("hello")).capture_to(&out);
        pipeline.run().unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "hello\n");
        assert!(!partial_path(&out).exists());
    }

    #[test]
    fn test_run_chains_through_pipes() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("count.txt");
        let pipeline = ToolPipeline::chain(vec![
            ToolCommand::new("printf").arg("a\\nb\\nc\\n"),
            ToolCommand::new("wc").arg("-l"),
        ])
        .capture_to(&out);
        pipeline.run().unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap().trim(), "3");
    }

    #[test]
    fn test_failing_command_reports_exit_and_drops_partial() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("never.txt");
        let pipeline = ToolPipeline::single(ToolCommand::new("false")).capture_to(&out);
        let err = pipeline.run().unwrap_err();
        assert!(matches!(err, FusepipeError::ToolExit { .. }));
        assert!(!out.exists());
        assert!(!partial_path(&out).exists());
    }

    #[test]
    fn test_unknown_program_is_a_spawn_error() {
        let pipeline = ToolPipeline::single(ToolCommand::new("fusepipe-no-such-tool"));
        assert!(matches!(pipeline.run(), Err(FusepipeError::ToolSpawn { .. })));
    }

    #[test]
    fn test_atomic_write_and_copy() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        atomic_write(&a, "MATE1_SENSE\t1\n").unwrap();
        atomic_copy(&a, &b).unwrap();
        assert_eq!(fs::read_to_string(&b).unwrap(), "MATE1_SENSE\t1\n");
        assert!(!partial_path(&a).exists());
        assert!(!partial_path(&b).exists());
    }
}
