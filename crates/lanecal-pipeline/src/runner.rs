//! Invocation of the offline vision executable.

use std::env;
use std::ffi::OsStr;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use lanecal_core::{CalibrationStage, CameraRole};
use log::debug;
use thiserror::Error;

use crate::error::CalibrationError;
use crate::progress::Spinner;

/// One (camera, stage) processing job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub role: CameraRole,
    pub stage: CalibrationStage,
    /// Recorded clip to process.
    pub clip: PathBuf,
    /// File that receives the combined stdout and stderr.
    pub log_file: PathBuf,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("cannot create log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot launch {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status} while processing {clip}")]
    NonZeroExit {
        program: PathBuf,
        status: ExitStatus,
        clip: PathBuf,
    },
    #[error("{0}")]
    Failed(String),
}

/// Something that turns a recorded clip into a vision log.
///
/// Implementations must leave `request.log_file` in place on success.
pub trait VideoProcessingRunner {
    fn process(&mut self, request: &RunRequest) -> Result<(), RunnerError>;
}

impl<R: VideoProcessingRunner + ?Sized> VideoProcessingRunner for &mut R {
    fn process(&mut self, request: &RunRequest) -> Result<(), RunnerError> {
        (**self).process(request)
    }
}

/// Runs `<build> --offline -i <clip> -v > <log_file> 2>&1`.
#[derive(Debug, Clone)]
pub struct ExecutableRunner {
    build: PathBuf,
    show_progress: bool,
}

impl ExecutableRunner {
    /// `build` is a path to the executable, or a bare name looked up in `PATH`
    /// the way a shell would.
    pub fn new(build: impl Into<PathBuf>) -> Result<Self, CalibrationError> {
        let build = build.into();
        let search_path = env::var_os("PATH");
        let Some(build) = locate_executable(&build, search_path.as_deref()) else {
            return Err(CalibrationError::Configuration(format!(
                "vision executable {} not found",
                build.display()
            )));
        };
        debug!("vision executable: {}", build.display());
        Ok(Self {
            build,
            show_progress: false,
        })
    }

    /// Animate a spinner on stdout while the executable runs.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn build(&self) -> &Path {
        &self.build
    }

    fn command(&self, request: &RunRequest) -> Result<Command, RunnerError> {
        let log_err = |source| RunnerError::LogFile {
            path: request.log_file.clone(),
            source,
        };
        let stdout = File::create(&request.log_file).map_err(log_err)?;
        let stderr = stdout.try_clone().map_err(log_err)?;

        let mut cmd = Command::new(&self.build);
        cmd.arg("--offline")
            .arg("-i")
            .arg(&request.clip)
            .arg("-v")
            .stdout(stdout)
            .stderr(stderr);
        Ok(cmd)
    }
}

/// An existing file at `build`, else a bare name found in one of the
/// `search_path` directories.
fn locate_executable(build: &Path, search_path: Option<&OsStr>) -> Option<PathBuf> {
    if build.is_file() {
        return Some(build.to_path_buf());
    }
    if build.parent() != Some(Path::new("")) {
        return None;
    }
    env::split_paths(search_path?)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(build))
        .find(|candidate| candidate.is_file())
}

impl VideoProcessingRunner for ExecutableRunner {
    fn process(&mut self, request: &RunRequest) -> Result<(), RunnerError> {
        let mut cmd = self.command(request)?;
        debug!("running {cmd:?} > {}", request.log_file.display());

        let spinner = self.show_progress.then(|| {
            Spinner::start(format!(
                "Processing {} camera clip, {}",
                request.role, request.stage
            ))
        });
        let status = cmd.status();
        if let Some(spinner) = spinner {
            spinner.finish();
        }

        let status = status.map_err(|source| RunnerError::Spawn {
            program: self.build.clone(),
            source,
        })?;
        if !status.success() {
            return Err(RunnerError::NonZeroExit {
                program: self.build.clone(),
                status,
                clip: request.clip.clone(),
            });
        }
        Ok(())
    }
}
