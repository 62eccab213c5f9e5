//! Per-kind strategies that prepare and run a bound test unit.

mod hdl;
mod lint;
mod native;
mod script;

pub use hdl::{HdlSimulateAdapter, HdlSynthesizeAdapter};
pub use lint::LintAdapter;
pub use native::NativeAdapter;
pub use script::ScriptAdapter;

use super::{
    outcome::{AdapterError, ExecutionResult},
    process::{self, CapturedOutput},
    test_unit::BoundTestUnit,
};
use crate::configuration::{ToolchainSection, definition_header::AdapterKind};
use log::debug;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    process::Command,
    time::Duration,
};

/// Everything an adapter may touch while handling one unit.
#[derive(Debug, Clone, Copy)]
pub struct Sandbox<'a> {
    /// The student's build directory, emptied before every unit.
    pub build_dir: &'a Path,
    pub corpus_root: &'a Path,
    pub toolchain: &'a ToolchainSection,
    /// Limit of the unit's run step.
    pub timeout: Duration,
    /// Limit of each compile or analysis step.
    pub build_timeout: Duration,
}

impl Sandbox<'_> {
    pub fn find_tool(&self, name: &str) -> Result<PathBuf, AdapterError> {
        process::find_tool(name, &self.toolchain.search_paths)
    }
}

/// Runs a compile or analysis step under the build limit. A non-zero exit is a compilation
/// error carrying everything the tool printed.
fn build_step(command: Command, sandbox: &Sandbox<'_>) -> Result<CapturedOutput, AdapterError> {
    let output = process::run(command, None, sandbox.build_timeout)?;
    if !output.status.success() {
        debug!("  ❌ Build step failed with {}", output.status);
        return Err(AdapterError::Compilation(output.combined()));
    }
    Ok(output)
}

fn include_flag(dir: &Path) -> String {
    format!("-I{}", dir.display())
}

/// The command that runs a prepared unit.
#[derive(Debug)]
pub struct PreparedArtifact {
    pub command: Command,
    pub stdin: Option<String>,
}

impl PreparedArtifact {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            stdin: None,
        }
    }

    pub fn with_stdin(mut self, stdin: Option<String>) -> Self {
        self.stdin = stdin;
        self
    }
}

/// Adapter contract for one kind of submission.
pub trait Adapter: Send + Sync {
    fn kind(&self) -> AdapterKind;

    /// Builds whatever the unit needs inside the sandbox and returns the command to run.
    fn prepare(
        &self,
        unit: &BoundTestUnit<'_>,
        sandbox: &Sandbox<'_>,
    ) -> Result<PreparedArtifact, AdapterError>;

    /// Runs the prepared command and judges its outcome. `Ok` means the unit passed.
    fn run(
        &self,
        artifact: PreparedArtifact,
        unit: &BoundTestUnit<'_>,
        sandbox: &Sandbox<'_>,
    ) -> Result<(), AdapterError>;

    fn classify_failure(&self, error: AdapterError) -> ExecutionResult {
        error.into()
    }
}

/// Maps adapter kinds to their implementations.
pub struct AdapterRegistry {
    adapters: HashMap<AdapterKind, Box<dyn Adapter>>,
}

impl AdapterRegistry {
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Every built-in adapter.
    pub fn standard() -> Self {
        Self::empty()
            .with_adapter(Box::new(NativeAdapter))
            .with_adapter(Box::new(HdlSimulateAdapter))
            .with_adapter(Box::new(HdlSynthesizeAdapter))
            .with_adapter(Box::new(ScriptAdapter))
            .with_adapter(Box::new(LintAdapter))
    }

    /// Registers `adapter`, replacing any adapter of the same kind.
    pub fn with_adapter(mut self, adapter: Box<dyn Adapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn adapter_for(&self, kind: AdapterKind) -> Option<&dyn Adapter> {
        self.adapters.get(&kind).map(|adapter| &**adapter)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
