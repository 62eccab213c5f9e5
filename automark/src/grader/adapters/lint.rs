use super::{Adapter, PreparedArtifact, Sandbox, include_flag};
use crate::{
    configuration::definition_header::AdapterKind,
    grader::{outcome::AdapterError, process, test_unit::BoundTestUnit},
};
use log::{debug, info};
use regex::Regex;
use std::{process::Command, sync::OnceLock};

fn diagnostic_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[^\s:][^:]*:\d+:\d+: (warning|error):").unwrap())
}

fn generated_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(\d+) warnings? generated").unwrap())
}

/// Number of diagnostics reported by the static checker.
///
/// Diagnostic lines (`file:line:col: warning:`) are counted; when none are printed the
/// `N warnings generated.` summaries are summed instead.
pub fn count_diagnostics(stdout: &str, stderr: &str) -> usize {
    let lines = diagnostic_regex().find_iter(stdout).count()
        + diagnostic_regex().find_iter(stderr).count();
    if lines > 0 {
        return lines;
    }
    generated_regex()
        .captures_iter(stderr)
        .filter_map(|c| c[1].parse::<usize>().ok())
        .sum()
}

/// Runs the static checker over the student's files and compares the count with the threshold.
#[derive(Debug, Default, Clone, Copy)]
pub struct LintAdapter;

impl Adapter for LintAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Lint
    }

    fn prepare(
        &self,
        unit: &BoundTestUnit<'_>,
        sandbox: &Sandbox<'_>,
    ) -> Result<PreparedArtifact, AdapterError> {
        let lint = unit
            .header()
            .lint
            .as_ref()
            .ok_or_else(|| AdapterError::Tool("no lint section".to_string()))?;
        let linter = sandbox.find_tool(&sandbox.toolchain.linter)?;

        let mut cmd = Command::new(linter);
        cmd.current_dir(sandbox.build_dir)
            .args(&unit.targets.files)
            .arg(format!("-checks={}", lint.checks))
            .arg("--quiet")
            .arg("--")
            .arg(include_flag(sandbox.corpus_root))
            .arg(include_flag(sandbox.build_dir))
            .arg(include_flag(unit.student_root()));
        Ok(PreparedArtifact::new(cmd))
    }

    fn run(
        &self,
        artifact: PreparedArtifact,
        unit: &BoundTestUnit<'_>,
        sandbox: &Sandbox<'_>,
    ) -> Result<(), AdapterError> {
        let threshold = unit.header().lint.as_ref().map_or(0, |lint| lint.threshold);
        info!("🧹 Linting '{}'", unit.unit.id);
        let output = process::run(artifact.command, None, sandbox.timeout)?;
        if !output.status.success() {
            return Err(AdapterError::Compilation(output.combined()));
        }

        let count = count_diagnostics(&output.stdout, &output.stderr);
        debug!("   -📋 Threshold: {threshold}");
        debug!("   -📊 Obtained: {count}");
        if count > threshold as usize {
            info!("❌ Too many lint diagnostics");
            return Err(AdapterError::LintThresholdExceeded {
                count,
                threshold,
                diagnostic: output.combined(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_count_diagnostic_lines() {
        let stdout = "\
/home/s/q1.c:3:5: warning: variable 'x' is not initialized [cppcoreguidelines-init-variables]
    int x;
        ^
/home/s/q1.c:7:12: warning: 42 is a magic number [readability-magic-numbers]
q1.c:9:1: error: unknown type name 'bool' [clang-diagnostic-error]
";
        assert_eq!(count_diagnostics(stdout, "3 warnings generated.\n"), 3);
    }

    #[test]
    fn should_fall_back_to_generated_summary() {
        assert_eq!(count_diagnostics("", "2 warnings generated.\n"), 2);
        assert_eq!(
            count_diagnostics("", "1 warning generated.\n4 warnings generated.\n"),
            5
        );
        assert_eq!(count_diagnostics("", ""), 0);
    }

    #[test]
    fn should_ignore_indented_notes() {
        assert_eq!(count_diagnostics("    note: q1.c:1:1: warning: nope\n", ""), 0);
    }
}
