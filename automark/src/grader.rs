pub mod adapters;
pub mod discovery;
mod expectation;
pub mod outcome;
pub mod process;
pub mod score;
pub mod test_unit;
pub mod workspace;

use crate::{
    Configuration,
    cohort::StudentContext,
    report::{Report, ReportEntry},
};
use adapters::{AdapterRegistry, Sandbox};
use discovery::Corpus;
use log::{debug, info, warn};
use outcome::ExecutionResult;
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};
use test_unit::{BoundTestUnit, StudentBindings, TestUnit};
use workspace::Workspace;

/// Runs a corpus against one student at a time.
pub struct Grader<'a> {
    corpus: &'a Corpus,
    registry: &'a AdapterRegistry,
    configuration: &'a Configuration,
}

impl<'a> Grader<'a> {
    pub fn new(
        corpus: &'a Corpus,
        registry: &'a AdapterRegistry,
        configuration: &'a Configuration,
    ) -> Self {
        Self {
            corpus,
            registry,
            configuration,
        }
    }

    /// Runs every unit of the corpus, in order, against `student`.
    ///
    /// Never fails: whatever goes wrong with a unit becomes that unit's outcome, and the
    /// remaining units still run. `workspace` is emptied before each unit.
    pub fn run_report(&self, student: &StudentContext, workspace: &Workspace) -> Report {
        let mut report = Report::new(student.username(), &self.configuration.assessor.name);
        let mut bindings = StudentBindings::new(student, self.configuration.file_match);

        for unit in &self.corpus.units {
            let id = unit.id.to_string();
            info!("🚀 Executing test unit: '{id}'");
            let (result, notes) = match bindings.bind(unit) {
                Ok(bound) => {
                    let notes = bound.targets.notes.clone();
                    (self.execute(&bound, workspace), notes)
                }
                Err(unresolved) => (
                    ExecutionResult::NotFound {
                        pattern: unresolved.pattern,
                    },
                    vec![],
                ),
            };
            if result.passed() {
                info!("✅ '{id}' passed");
            } else {
                info!("❌ '{id}' failed: {}", result.summary().unwrap_or_default());
            }

            let manifest = self.corpus.manifest.entry(&id, &unit.definition.id);
            report.push(ReportEntry {
                id,
                description: manifest.and_then(|m| m.description.clone()),
                weight: manifest.map_or(1, |m| m.mark),
                result,
                notes,
            });
        }
        info!("----------------------------------------------------------");
        report
    }

    fn execute(&self, bound: &BoundTestUnit<'_>, workspace: &Workspace) -> ExecutionResult {
        let unit: &TestUnit = bound.unit;
        if let Err(err) = workspace.reset() {
            return ExecutionResult::ToolError {
                diagnostic: format!("cannot clean build directory: {err}"),
            };
        }
        let Some(adapter) = self.registry.adapter_for(unit.kind) else {
            return ExecutionResult::ToolError {
                diagnostic: format!("no adapter registered for {:?}", unit.kind),
            };
        };

        let timeouts = &self.configuration.timeouts;
        let sandbox = Sandbox {
            build_dir: workspace.path(),
            corpus_root: &self.corpus.root,
            toolchain: &self.configuration.toolchain,
            timeout: unit.timeout(timeouts.default_timeout()),
            build_timeout: timeouts.build_timeout(),
        };
        debug!("Sandbox: {sandbox:?}");

        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            let artifact = adapter.prepare(bound, &sandbox)?;
            adapter.run(artifact, bound, &sandbox)
        }));
        match attempt {
            Ok(Ok(())) => ExecutionResult::Passed,
            Ok(Err(err)) => {
                debug!("💥 Error: '{err:?}'");
                adapter.classify_failure(err)
            }
            Err(payload) => {
                let message = panic_message(&*payload);
                warn!("💥 Adapter panicked on '{}': {message}", unit.id);
                ExecutionResult::ToolError {
                    diagnostic: format!("adapter panicked: {message}"),
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
