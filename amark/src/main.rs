use automark::{
    Batch, BatchOptions, CohortContext, Verdict, analyse_report,
    report::{ReportOutput, report_ids},
};
use clap::{Parser, Subcommand};
use log::error;
use std::{fs, path::PathBuf, process::ExitCode};

#[derive(Parser, Debug)]
#[command(
    name = "amark",
    version,
    about = "Run a cohort's test corpus against student submissions",
    long_about = "Discover the tests of a cohort, run them against each student's submission in \
                  an isolated build directory and write one report per student."
)]
struct Cli {
    /// Cohort configuration file.
    #[arg(short, long, default_value = "automark.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the tests and write the reports.
    Run {
        /// Only run this student (repeatable).
        #[arg(short, long = "student")]
        students: Vec<String>,
        /// Replace existing reports.
        #[arg(long, conflicts_with = "new_only")]
        overwrite: bool,
        /// Only run students without a report.
        #[arg(long)]
        new_only: bool,
        /// Prefix of report file names.
        #[arg(long)]
        prefix: Option<String>,
    },
    /// List the discovered test units.
    List,
    /// Read back the outcome of each unit from a text report.
    Analyse {
        report: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let cohort = match CohortContext::load(&cli.config) {
        Ok(cohort) => cohort,
        Err(err) => {
            eprintln!("amark: {err}");
            return ExitCode::FAILURE;
        }
    };
    env_logger::Builder::new()
        .filter_level(cohort.configuration().logging_mode.level_filter())
        .parse_default_env()
        .init();

    match execute(&cohort, cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err}");
            eprintln!("amark: {err}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether everything that ran passed.
fn execute(cohort: &CohortContext, command: Command) -> automark::Result<bool> {
    match command {
        Command::Run {
            students,
            overwrite,
            new_only,
            prefix,
        } => {
            let options = BatchOptions {
                students,
                overwrite,
                new_only,
                prefix,
            };
            let summary = Batch::new(cohort).run(&options)?;
            let configuration = cohort.configuration();
            for outcome in &summary.outcomes {
                if configuration.report.output == ReportOutput::Stdout {
                    print!(
                        "{}",
                        outcome.report.render_text(
                            configuration.report.verbose,
                            configuration.grading.get_grading_mode()
                        )
                    );
                }
            }
            for outcome in &summary.outcomes {
                let verdict = if outcome.all_passed {
                    Verdict::Passed
                } else {
                    Verdict::Failed
                };
                println!("{} {verdict}", outcome.username);
            }
            Ok(summary.all_passed())
        }
        Command::List => {
            let corpus = cohort.corpus()?;
            for unit in &corpus.units {
                println!("{}", unit.id);
            }
            for rejected in &corpus.rejected {
                eprintln!("rejected {}: {}", rejected.path.display(), rejected.reason);
            }
            Ok(corpus.rejected.is_empty())
        }
        Command::Analyse { report } => {
            let text = fs::read_to_string(&report)
                .map_err(|source| automark::Error::Io { path: report, source })?;
            let ids = match cohort.corpus() {
                Ok(corpus) => corpus.units.iter().map(|u| u.id.to_string()).collect(),
                Err(_) => report_ids(&text),
            };
            let verdicts = analyse_report(&text, &ids);
            for (id, verdict) in &verdicts {
                println!("{id}: {verdict}");
            }
            Ok(verdicts.iter().all(|(_, v)| *v == Verdict::Passed))
        }
    }
}
