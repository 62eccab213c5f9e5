use super::{Adapter, PreparedArtifact, Sandbox, build_step, include_flag};
use crate::{
    configuration::definition_header::{AdapterKind, BuildMode},
    grader::{expectation, outcome::AdapterError, process, test_unit::BoundTestUnit},
};
use log::{debug, info};
use std::{fs, process::Command};

pub const BINARY_NAME: &str = "test_binary";
pub const STUDENT_HEADER: &str = "student.h";

/// Compiles the tutor test source together with the student's C source and runs the result.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeAdapter;

impl Adapter for NativeAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Native
    }

    fn prepare(
        &self,
        unit: &BoundTestUnit<'_>,
        sandbox: &Sandbox<'_>,
    ) -> Result<PreparedArtifact, AdapterError> {
        let header = unit.header();
        let toolchain = sandbox.toolchain;
        let compiler = sandbox.find_tool(&toolchain.compiler)?;
        let binary = sandbox.build_dir.join(BINARY_NAME);

        let mut cmd = Command::new(compiler);
        cmd.current_dir(sandbox.build_dir)
            .args(&toolchain.compile_flags);
        if let Some(param) = unit.unit.param() {
            cmd.arg("-D").arg(param);
        }
        cmd.arg("-o")
            .arg(&binary)
            .arg(include_flag(sandbox.corpus_root))
            .arg(include_flag(sandbox.build_dir))
            .arg(include_flag(unit.student_root()));
        for dependency in &header.depends {
            cmd.arg(sandbox.corpus_root.join(dependency));
        }
        cmd.arg(unit.definition_path());

        match header.build {
            BuildMode::Include => {
                let includes: String = unit
                    .targets
                    .files
                    .iter()
                    .map(|file| format!("#include \"{}\"\n", file.display()))
                    .collect();
                debug!("Writing {STUDENT_HEADER}:\n{includes}");
                fs::write(sandbox.build_dir.join(STUDENT_HEADER), includes)?;
            }
            BuildMode::Link => {
                cmd.args(&unit.targets.files);
            }
        }

        info!("🔨 Compiling '{}'", unit.unit.id);
        build_step(cmd, sandbox)?;

        let mut run = Command::new(&binary);
        run.current_dir(sandbox.build_dir).args(header.arguments());
        Ok(PreparedArtifact::new(run).with_stdin(header.stdin.clone()))
    }

    fn run(
        &self,
        artifact: PreparedArtifact,
        unit: &BoundTestUnit<'_>,
        sandbox: &Sandbox<'_>,
    ) -> Result<(), AdapterError> {
        info!("🚀 Executing '{}'", unit.unit.id);
        let output = process::run(artifact.command, artifact.stdin.as_deref(), sandbox.timeout)?;
        expectation::verdict(unit.header().expect.as_ref(), &output)
    }
}
