//! Task execution engine for kiln.

pub mod git;
pub mod runner;
pub mod shell;

pub use git::{GitChangeDetector, StaticChangeDetector};
pub use runner::{OutputLine, OutputStream, RunnerConfig, TaskRunner};
pub use shell::ShellRunner;
