//! Cohort and student identities.

use crate::{
    Configuration, Error, Result,
    grader::discovery::{Corpus, discover},
    input::{self, MatchMode, Resolution},
};
use log::{info, warn};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

/// A student bound to their submission root.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct StudentContext {
    username: String,
    root: PathBuf,
}

impl StudentContext {
    pub fn new(username: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            username: username.into(),
            root: root.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Finds the submission file matching `pattern`, logging missing and ambiguous matches.
    pub fn resolve(&self, pattern: &str, mode: MatchMode) -> Option<Resolution> {
        let resolution = input::resolve(&self.root, pattern, mode);
        match &resolution {
            None => warn!("⚠️  {}: no file matching '{pattern}'", self.username),
            Some(found) if found.is_ambiguous() => warn!(
                "⚠️  {}: multiple files matched '{pattern}', using '{}'",
                self.username,
                found.path.display()
            ),
            Some(_) => {}
        }
        resolution
    }
}

/// One cohort: its configuration and its test corpus, discovered at most once.
#[derive(Debug)]
pub struct CohortContext {
    configuration: Configuration,
    corpus: OnceLock<Corpus>,
}

impl CohortContext {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            corpus: OnceLock::new(),
        }
    }

    /// Reads the cohort configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(Configuration::load(path)?))
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// The cohort's test corpus, discovered on first use.
    pub fn corpus(&self) -> Result<&Corpus> {
        if let Some(corpus) = self.corpus.get() {
            return Ok(corpus);
        }
        let corpus = discover(&self.configuration.tests_path, &self.configuration.test_prefix)?;
        Ok(self.corpus.get_or_init(|| corpus))
    }

    /// Every student of the cohort, in order: the configured roster, or else every
    /// non-hidden directory under `students_path`, sorted.
    pub fn students(&self) -> Result<Vec<StudentContext>> {
        let root = &self.configuration.students_path;
        if !root.is_dir() {
            return Err(Error::StudentsPathMissing(root.clone()));
        }
        if let Some(roster) = &self.configuration.students {
            return Ok(roster
                .iter()
                .map(|name| StudentContext::new(name, root.join(name)))
                .collect());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(root).map_err(|err| Error::io(root, err))? {
            let entry = entry.map_err(|err| Error::io(root, err))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') && entry.path().is_dir() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| StudentContext::new(&name, root.join(&name)))
            .collect())
    }

    /// The named student. Fails when the name is not in the configured roster, or, without a
    /// roster, when no such directory exists.
    pub fn student(&self, username: &str) -> Result<StudentContext> {
        self.students()?
            .into_iter()
            .find(|s| s.username() == username)
            .ok_or_else(|| Error::UnknownStudent(username.to_string()))
    }

    /// Logs a banner separating one student's (or one step's) log output from the next.
    pub fn start_log_section(&self, title: &str) {
        info!("===== {title} =====");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cohort(dir: &Path) -> CohortContext {
        CohortContext::new(Configuration::new(
            "2026",
            dir.join("students"),
            dir.join("tests"),
            dir.join("reports"),
        ))
    }

    #[test_log::test]
    fn should_list_student_directories_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["zz99", "ab12", ".git"] {
            fs::create_dir_all(dir.path().join("students").join(name)).unwrap();
        }
        fs::write(dir.path().join("students/notes.txt"), "").unwrap();
        let students = cohort(dir.path()).students().unwrap();
        let names: Vec<_> = students.iter().map(|s| s.username()).collect();
        assert_eq!(names, vec!["ab12", "zz99"]);
        assert_eq!(students[0].root(), dir.path().join("students/ab12"));
    }

    #[test_log::test]
    fn should_use_configured_roster() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("students/ab12")).unwrap();
        let mut configuration =
            Configuration::new("2026", dir.path().join("students"), "tests", "reports");
        configuration.students = Some(vec!["cd34".to_string(), "ab12".to_string()]);
        let cohort = CohortContext::new(configuration);

        let names: Vec<_> = cohort
            .students()
            .unwrap()
            .into_iter()
            .map(|s| s.username().to_string())
            .collect();
        assert_eq!(names, vec!["cd34", "ab12"]);
        assert!(cohort.student("cd34").is_ok());
        assert!(matches!(
            cohort.student("ef56"),
            Err(Error::UnknownStudent(name)) if name == "ef56"
        ));
    }

    #[test_log::test]
    fn should_fail_without_students_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            cohort(dir.path()).students(),
            Err(Error::StudentsPathMissing(_))
        ));
    }

    #[test_log::test]
    fn should_discover_corpus_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("tests")).unwrap();
        let cohort = cohort(dir.path());
        let first = cohort.corpus().unwrap() as *const Corpus;
        fs::write(
            dir.path().join("tests/test_q1.c"),
            "// automark:begin\n// {\"kind\": \"native\", \"targets\": [\"q1.c\"]}\n// automark:end\n",
        )
        .unwrap();
        let second = cohort.corpus().unwrap();
        assert_eq!(first, second as *const Corpus);
        assert!(second.units.is_empty());
    }

    #[test_log::test]
    fn should_propagate_missing_corpus() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            cohort(dir.path()).corpus(),
            Err(Error::CorpusRootMissing(_))
        ));
    }
}
