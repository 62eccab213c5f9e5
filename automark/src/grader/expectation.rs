use super::{outcome::AdapterError, process::CapturedOutput};
use crate::configuration::definition_header::ExpectSection;
use log::{debug, info};
use std::fmt::{self, Display};

#[derive(Debug, PartialEq, Eq, Clone)]
struct ExpectedObtainedResult<T> {
    expected: T,
    obtained: Option<T>,
}

impl<T: Display> Display for ExpectedObtainedResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, obtained ", self.expected)?;
        match &self.obtained {
            Some(obtained) => write!(f, "{obtained}"),
            None => write!(f, "nothing"),
        }
    }
}

/// Checks a finished test program against what its definition expects.
///
/// Without an explicit `status` the program must exit with 0. `stdout` is compared after
/// trimming surrounding whitespace on both sides.
pub fn verdict(expect: Option<&ExpectSection>, output: &CapturedOutput) -> Result<(), AdapterError> {
    let mut failures = Vec::new();
    let expected_status = expect.and_then(|e| e.status).unwrap_or(0);
    let obtained_status = output.status.code();
    if obtained_status != Some(expected_status) {
        debug!("  ❌ Failed status assertion.");
        debug!("   -📋 Expected: {expected_status}");
        debug!("   -📊 Obtained: {obtained_status:?}");
        let status = ExpectedObtainedResult {
            expected: expected_status,
            obtained: obtained_status,
        };
        failures.push(format!("exit status: {status}"));
    }

    if let Some(expected_stdout) = expect.and_then(|e| e.stdout.as_deref())
        && output.stdout.trim() != expected_stdout.trim()
    {
        debug!("  ❌ Failed stdout assertion.");
        debug!("   -📋 Expected: '{}'", expected_stdout.replace('\n', "\\n"));
        debug!("   -📊 Obtained: '{}'", output.stdout.replace('\n', "\\n"));
        let stdout = ExpectedObtainedResult {
            expected: format!("{:?}", expected_stdout.trim()),
            obtained: Some(format!("{:?}", output.stdout.trim())),
        };
        failures.push(format!("stdout: {stdout}"));
    }

    if failures.is_empty() {
        info!("✅ Expectations met");
        return Ok(());
    }
    info!("❌ Expectations not met");
    let mut diagnostic = failures.join("\n");
    if !output.stderr.trim().is_empty() {
        diagnostic.push('\n');
        diagnostic.push_str(output.stderr.trim_end());
    }
    Err(AdapterError::Runtime(diagnostic))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::{os::unix::process::ExitStatusExt, process::ExitStatus};

    fn output(code: i32, stdout: &str, stderr: &str) -> CapturedOutput {
        CapturedOutput {
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test_log::test]
    fn should_require_success_without_expectations() {
        assert!(verdict(None, &output(0, "", "")).is_ok());
        let err = verdict(None, &output(2, "", "assertion failed")).unwrap_err();
        let AdapterError::Runtime(diagnostic) = err else {
            panic!("unexpected error");
        };
        assert!(diagnostic.contains("exit status: expected 0, obtained 2"));
        assert!(diagnostic.contains("assertion failed"));
    }

    #[test_log::test]
    fn should_accept_expected_non_zero_status() {
        let expect = ExpectSection {
            stdout: None,
            status: Some(4),
        };
        assert!(verdict(Some(&expect), &output(4, "", "")).is_ok());
        assert!(verdict(Some(&expect), &output(0, "", "")).is_err());
    }

    #[test_log::test]
    fn should_compare_trimmed_stdout() {
        let expect = ExpectSection {
            stdout: Some("42\n".to_string()),
            status: None,
        };
        assert!(verdict(Some(&expect), &output(0, "  42  \n\n", "")).is_ok());
        let err = verdict(Some(&expect), &output(0, "41\n", "")).unwrap_err();
        assert!(matches!(err, AdapterError::Runtime(d) if d.contains("stdout: expected \"42\", obtained \"41\"")));
    }
}
