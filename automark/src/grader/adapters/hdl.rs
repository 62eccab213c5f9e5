//! VHDL simulation with GHDL and synthesis with Vivado.

use super::{Adapter, PreparedArtifact, Sandbox, build_step};
use crate::{
    configuration::definition_header::AdapterKind,
    grader::{outcome::AdapterError, process, test_unit::BoundTestUnit},
};
use log::{debug, info};
use std::{
    fmt::Write,
    path::{Path, PathBuf},
    process::Command,
};

/// Generic assigned the parameter when a parameterized definition names none.
pub const DEFAULT_GENERIC: &str = "test";

fn workdir_flag(build_dir: &Path) -> String {
    format!("--workdir={}", build_dir.display())
}

fn top_entity(unit: &BoundTestUnit<'_>) -> String {
    unit.header()
        .top
        .clone()
        .unwrap_or_else(|| unit.unit.definition.stem())
}

/// Analyses the dependencies, the tutor testbench and the student's design, then runs the
/// testbench with assertion failures treated as errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct HdlSimulateAdapter;

impl HdlSimulateAdapter {
    fn ghdl(ghdl: &Path, command: &str, sandbox: &Sandbox<'_>) -> Command {
        let mut cmd = Command::new(ghdl);
        cmd.current_dir(sandbox.build_dir)
            .arg(command)
            .args(&sandbox.toolchain.ghdl_options)
            .arg(workdir_flag(sandbox.build_dir));
        cmd
    }
}

impl Adapter for HdlSimulateAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::HdlSimulate
    }

    fn prepare(
        &self,
        unit: &BoundTestUnit<'_>,
        sandbox: &Sandbox<'_>,
    ) -> Result<PreparedArtifact, AdapterError> {
        let header = unit.header();
        let ghdl = sandbox.find_tool(&sandbox.toolchain.ghdl)?;

        let mut clean = Command::new(&ghdl);
        clean
            .current_dir(sandbox.build_dir)
            .arg("--clean")
            .arg(workdir_flag(sandbox.build_dir));
        let output = process::run(clean, None, sandbox.build_timeout)?;
        if !output.status.success() {
            return Err(AdapterError::Tool(output.combined()));
        }

        let sources = header
            .depends
            .iter()
            .map(|dependency| sandbox.corpus_root.join(dependency))
            .chain([unit.definition_path().to_path_buf()])
            .chain(unit.targets.files.iter().cloned());
        for source in sources {
            info!("🔨 Analysing '{}'", source.display());
            let mut analyse = Self::ghdl(&ghdl, "-a", sandbox);
            analyse.arg(&source);
            build_step(analyse, sandbox)?;
        }

        let mut run = Self::ghdl(&ghdl, "--elab-run", sandbox);
        run.arg(top_entity(unit));
        if let Some(param) = unit.unit.param() {
            let generic = header.generic.as_deref().unwrap_or(DEFAULT_GENERIC);
            run.arg(format!("-g{generic}={param}"));
        }
        run.arg("--assert-level=error");
        Ok(PreparedArtifact::new(run))
    }

    fn run(
        &self,
        artifact: PreparedArtifact,
        unit: &BoundTestUnit<'_>,
        sandbox: &Sandbox<'_>,
    ) -> Result<(), AdapterError> {
        info!("🚀 Simulating '{}'", unit.unit.id);
        let output = process::run(artifact.command, None, sandbox.timeout)?;
        if !output.status.success() {
            info!("❌ Simulation failed with {}", output.status);
            return Err(AdapterError::Runtime(output.combined()));
        }
        Ok(())
    }
}

/// Error and warning markers counted in a synthesis log.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct SynthesisCounts {
    pub errors: usize,
    pub warnings: usize,
}

impl SynthesisCounts {
    /// Vivado may exit with 0 after logging errors, so its output is inspected line by line.
    pub fn scan(log: &str) -> Self {
        let mut counts = Self::default();
        for line in log.lines() {
            let line = line.trim_start();
            if line.starts_with("ERROR:") || line.starts_with("CRITICAL WARNING:") {
                counts.errors += 1;
            } else if line.starts_with("WARNING:") {
                counts.warnings += 1;
            }
        }
        counts
    }
}

/// Synthesises, implements and writes a bitstream for the student's design.
#[derive(Debug, Default, Clone, Copy)]
pub struct HdlSynthesizeAdapter;

impl HdlSynthesizeAdapter {
    pub fn bitstream_path(build_dir: &Path, top: &str) -> PathBuf {
        build_dir.join(format!("{top}.bit"))
    }

    /// The TCL script driving a non-project Vivado flow.
    pub fn script(
        sources: &[PathBuf],
        constraints: Option<&Path>,
        top: &str,
        part_number: &str,
        bitstream: &Path,
    ) -> String {
        let mut tcl = String::new();
        for source in sources {
            let _ = writeln!(tcl, "read_vhdl {}", source.display());
        }
        if let Some(constraints) = constraints {
            let _ = writeln!(tcl, "read_xdc {}", constraints.display());
        }
        let _ = writeln!(tcl, "synth_design -top {top} -part {part_number}");
        for step in [
            "opt_design",
            "power_opt_design",
            "place_design",
            "phys_opt_design",
            "route_design",
        ] {
            let _ = writeln!(tcl, "{step}");
        }
        let _ = writeln!(tcl, "write_bitstream -force {}", bitstream.display());
        tcl
    }
}

impl Adapter for HdlSynthesizeAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::HdlSynthesize
    }

    fn prepare(
        &self,
        unit: &BoundTestUnit<'_>,
        sandbox: &Sandbox<'_>,
    ) -> Result<PreparedArtifact, AdapterError> {
        let toolchain = sandbox.toolchain;
        let vivado = sandbox.find_tool(&toolchain.vivado)?;
        let top = top_entity(unit);

        let sources: Vec<PathBuf> = unit
            .header()
            .depends
            .iter()
            .map(|dependency| sandbox.corpus_root.join(dependency))
            .chain(unit.targets.files.iter().cloned())
            .collect();
        let bitstream = Self::bitstream_path(sandbox.build_dir, &top);
        let tcl = Self::script(
            &sources,
            unit.targets.constraints.as_deref(),
            &top,
            &toolchain.part_number,
            &bitstream,
        );
        debug!("Synthesis script:\n{tcl}");

        let mut cmd = Command::new(vivado);
        cmd.current_dir(unit.student_root())
            .args(&toolchain.vivado_options)
            .arg("-log")
            .arg(sandbox.build_dir.join("synth.log"))
            .arg("-tempDir")
            .arg(sandbox.build_dir)
            .arg("-mode")
            .arg("tcl");
        Ok(PreparedArtifact::new(cmd).with_stdin(Some(tcl)))
    }

    fn run(
        &self,
        artifact: PreparedArtifact,
        unit: &BoundTestUnit<'_>,
        sandbox: &Sandbox<'_>,
    ) -> Result<(), AdapterError> {
        info!("🔨 Synthesising '{}'", unit.unit.id);
        let output = process::run(artifact.command, artifact.stdin.as_deref(), sandbox.timeout)?;
        let counts = SynthesisCounts::scan(&output.stdout);
        debug!("   -📊 Obtained: {counts:?}");
        if !output.status.success() || counts.errors > 0 {
            info!("❌ Synthesis reported errors");
            return Err(AdapterError::Compilation(output.combined()));
        }
        if let Some(max) = unit.header().max_warnings
            && counts.warnings > max as usize
        {
            info!("❌ Too many synthesis warnings");
            return Err(AdapterError::Runtime(format!(
                "{} warnings (maximum {max})\n{}",
                counts.warnings, output.stdout
            )));
        }
        let bitstream = Self::bitstream_path(sandbox.build_dir, &top_entity(unit));
        if !bitstream.is_file() {
            return Err(AdapterError::Runtime(format!(
                "bitstream '{}' was not written",
                bitstream.display()
            )));
        }
        Ok(())
    }
}
