use crate::{
    Error, Result,
    cohort::{CohortContext, StudentContext},
    grader::{Grader, adapters::AdapterRegistry, workspace::Workspace},
    report::{Report, ReportOutput},
};
use log::{error, info};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Which students to run and what to do with existing reports.
#[derive(Debug, Default, Clone)]
pub struct BatchOptions {
    /// Empty means every student of the cohort.
    pub students: Vec<String>,
    pub overwrite: bool,
    /// Skip students who already have a report.
    pub new_only: bool,
    /// Overrides the configured report file prefix.
    pub prefix: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StudentOutcome {
    pub username: String,
    /// `None` when the report is printed rather than written.
    pub report_path: Option<PathBuf>,
    pub report: Report,
    pub all_passed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<StudentOutcome>,
    pub skipped: Vec<String>,
}

impl BatchSummary {
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.all_passed)
    }
}

/// Runs a cohort's corpus for many students, one after the other.
pub struct Batch<'a> {
    cohort: &'a CohortContext,
    registry: AdapterRegistry,
}

impl<'a> Batch<'a> {
    pub fn new(cohort: &'a CohortContext) -> Self {
        Self {
            cohort,
            registry: AdapterRegistry::standard(),
        }
    }

    pub fn with_registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = registry;
        self
    }

    fn report_path(&self, username: &str, prefix: &str) -> Option<PathBuf> {
        let configuration = self.cohort.configuration();
        let extension = configuration.report.output.extension()?;
        Some(
            configuration
                .reports_path
                .join(format!("{prefix}{username}.{extension}")),
        )
    }

    /// Runs every selected student and writes their reports.
    ///
    /// Existing reports are checked for every student before anything runs, so a conflict
    /// aborts the batch without producing partial output.
    pub fn run(&self, options: &BatchOptions) -> Result<BatchSummary> {
        let configuration = self.cohort.configuration();
        let prefix = options
            .prefix
            .as_deref()
            .unwrap_or(&configuration.report.prefix);

        let students = if options.students.is_empty() {
            self.cohort.students()?
        } else {
            options
                .students
                .iter()
                .map(|name| self.cohort.student(name))
                .collect::<Result<Vec<_>>>()?
        };

        let mut summary = BatchSummary::default();
        let mut selected: Vec<(StudentContext, Option<PathBuf>)> = vec![];
        for student in students {
            let path = self.report_path(student.username(), prefix);
            if let Some(path) = &path
                && path.exists()
            {
                if options.new_only {
                    info!("⏭️  Skipping {}: report exists", student.username());
                    summary.skipped.push(student.username().to_string());
                    continue;
                }
                if !options.overwrite {
                    return Err(Error::ReportExists(path.clone()));
                }
            }
            selected.push((student, path));
        }

        let corpus = self.cohort.corpus()?;
        let grader = Grader::new(corpus, &self.registry, configuration);
        // Dropped at the end of the batch when no build path is configured.
        let scratch;
        let build_root: &Path = match &configuration.build_path {
            Some(path) => path,
            None => {
                scratch = tempfile::tempdir().map_err(|err| Error::io(std::env::temp_dir(), err))?;
                scratch.path()
            }
        };
        if selected.iter().any(|(_, path)| path.is_some()) {
            fs::create_dir_all(&configuration.reports_path)
                .map_err(|err| Error::io(&configuration.reports_path, err))?;
        }

        for (student, report_path) in selected {
            self.cohort
                .start_log_section(&format!("Running tests for {}", student.username()));
            let build_dir = build_root.join(student.username());
            let workspace = Workspace::new(&build_dir).map_err(|err| Error::io(&build_dir, err))?;
            let report = grader.run_report(&student, &workspace);
            let all_passed = report.all_passed();
            if all_passed {
                info!("✅ {}: Passed all tests", student.username());
            } else {
                error!("❌ {}: Failed test", student.username());
            }

            if let Some(path) = &report_path {
                let content = match configuration.report.output {
                    ReportOutput::Json => report.to_json()?,
                    _ => report.render_text(
                        configuration.report.verbose,
                        configuration.grading.get_grading_mode(),
                    ),
                };
                fs::write(path, content).map_err(|err| Error::io(path, err))?;
                info!("📝 Report written to '{}'", path.display());
            }
            summary.outcomes.push(StudentOutcome {
                username: student.username().to_string(),
                report_path,
                report,
                all_passed,
            });
        }
        Ok(summary)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::{Configuration, ExecutionResult};

    const SCRIPT_TEST: &str = "# automark:begin\n# {\"kind\": \"script\", \"targets\": [\"q1.sh\"]}\n# automark:end\n";

    /// A cohort whose single script test passes when the student's `q1.sh` exits 0.
    fn cohort(dir: &Path, students: &[(&str, &str)]) -> CohortContext {
        fs::create_dir_all(dir.join("tests")).unwrap();
        fs::write(dir.join("tests/test_q1.sh"), SCRIPT_TEST).unwrap();
        for (name, body) in students {
            let root = dir.join("students").join(name);
            fs::create_dir_all(&root).unwrap();
            fs::write(root.join("q1.sh"), body).unwrap();
        }
        let mut configuration = Configuration::new(
            "2026",
            dir.join("students"),
            dir.join("tests"),
            dir.join("reports"),
        );
        configuration.toolchain.interpreter = "sh".to_string();
        configuration.build_path = Some(dir.join("build"));
        CohortContext::new(configuration)
    }

    #[test_log::test]
    fn should_write_one_report_per_student() {
        let dir = tempfile::tempdir().unwrap();
        let cohort = cohort(dir.path(), &[("ab12", "exit 0"), ("cd34", "exit 1")]);
        let summary = Batch::new(&cohort).run(&BatchOptions::default()).unwrap();

        assert_eq!(summary.outcomes.len(), 2);
        assert!(summary.outcomes[0].all_passed);
        assert!(!summary.outcomes[1].all_passed);
        assert!(!summary.all_passed());

        let text = fs::read_to_string(dir.path().join("reports/ab12.txt")).unwrap();
        assert!(text.starts_with("Report generated "));
        assert!(text.contains("\ntest_q1.sh PASSED\n"));
        let text = fs::read_to_string(dir.path().join("reports/cd34.txt")).unwrap();
        assert!(text.contains("\ntest_q1.sh FAILED runtime failure\n"));
        assert!(dir.path().join("build/ab12").is_dir());
    }

    #[test_log::test]
    fn should_refuse_to_overwrite_before_running_anyone() {
        let dir = tempfile::tempdir().unwrap();
        let cohort = cohort(dir.path(), &[("ab12", "exit 0"), ("cd34", "exit 0")]);
        fs::create_dir_all(dir.path().join("reports")).unwrap();
        fs::write(dir.path().join("reports/cd34.txt"), "old").unwrap();

        let err = Batch::new(&cohort).run(&BatchOptions::default()).unwrap_err();
        assert!(matches!(err, Error::ReportExists(path) if path.ends_with("cd34.txt")));
        assert!(!dir.path().join("reports/ab12.txt").exists());

        let summary = Batch::new(&cohort)
            .run(&BatchOptions {
                new_only: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(summary.skipped, vec!["cd34"]);
        assert_eq!(summary.outcomes.len(), 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("reports/cd34.txt")).unwrap(),
            "old"
        );

        Batch::new(&cohort)
            .run(&BatchOptions {
                overwrite: true,
                students: vec!["cd34".to_string()],
                prefix: Some("lab1-".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(dir.path().join("reports/lab1-cd34.txt").exists());
    }

    #[test_log::test]
    fn should_reject_unknown_student() {
        let dir = tempfile::tempdir().unwrap();
        let cohort = cohort(dir.path(), &[("ab12", "exit 0")]);
        let err = Batch::new(&cohort)
            .run(&BatchOptions {
                students: vec!["zz99".to_string()],
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::UnknownStudent(_)));
    }

    #[test_log::test]
    fn should_write_json_reports() {
        let dir = tempfile::tempdir().unwrap();
        let cohort = cohort(dir.path(), &[("ab12", "echo hi")]);
        let mut configuration = cohort.configuration().clone();
        configuration.report.output = ReportOutput::Json;
        let cohort = CohortContext::new(configuration);

        Batch::new(&cohort).run(&BatchOptions::default()).unwrap();
        let json = fs::read_to_string(dir.path().join("reports/ab12.json")).unwrap();
        let report: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(report.student, "ab12");
        assert_eq!(report.entries[0].result, ExecutionResult::Passed);
    }

    #[test_log::test]
    fn should_not_write_stdout_reports() {
        let dir = tempfile::tempdir().unwrap();
        let cohort = cohort(dir.path(), &[("ab12", "exit 0")]);
        let mut configuration = cohort.configuration().clone();
        configuration.report.output = ReportOutput::Stdout;
        let cohort = CohortContext::new(configuration);

        let summary = Batch::new(&cohort).run(&BatchOptions::default()).unwrap();
        assert_eq!(summary.outcomes[0].report_path, None);
        assert!(summary.all_passed());
        assert!(!dir.path().join("reports").exists());
    }
}
