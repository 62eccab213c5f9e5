use super::{Adapter, PreparedArtifact, Sandbox};
use crate::{
    configuration::definition_header::AdapterKind,
    grader::{expectation, outcome::AdapterError, process, test_unit::BoundTestUnit},
};
use log::info;
use std::process::Command;

/// Runs the student's script with the configured interpreter.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptAdapter;

impl Adapter for ScriptAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Script
    }

    fn prepare(
        &self,
        unit: &BoundTestUnit<'_>,
        sandbox: &Sandbox<'_>,
    ) -> Result<PreparedArtifact, AdapterError> {
        let header = unit.header();
        let interpreter = sandbox.find_tool(&sandbox.toolchain.interpreter)?;
        let script = unit
            .targets
            .files
            .first()
            .ok_or_else(|| AdapterError::Tool("no script target".to_string()))?;

        let mut cmd = Command::new(interpreter);
        cmd.current_dir(sandbox.build_dir)
            .arg(script)
            .args(header.arguments());
        if let Some(param) = unit.unit.param() {
            cmd.arg(param);
        }
        Ok(PreparedArtifact::new(cmd).with_stdin(header.stdin.clone()))
    }

    fn run(
        &self,
        artifact: PreparedArtifact,
        unit: &BoundTestUnit<'_>,
        sandbox: &Sandbox<'_>,
    ) -> Result<(), AdapterError> {
        info!("🚀 Executing '{}'", unit.unit.id);
        let output = process::run(artifact.command, artifact.stdin.as_deref(), sandbox.timeout)?;
        let expect = unit.header().expect.as_ref();
        if !output.status.success() && expect.and_then(|e| e.status).is_none() {
            info!("❌ Script exited with {}", output.status);
            return Err(AdapterError::Runtime(output.stderr));
        }
        expectation::verdict(expect, &output)
    }
}
