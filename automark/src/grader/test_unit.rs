use crate::{
    cohort::StudentContext,
    configuration::definition_header::{AdapterKind, DefinitionHeader},
    input::MatchMode,
};
use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

/// A parsed tutor test-definition file. Shared read-only by all units derived from it.
#[derive(Debug, PartialEq, Clone)]
pub struct TestDefinitionFile {
    pub path: PathBuf,
    /// Path relative to the corpus root, `/`-separated.
    pub id: String,
    pub header: DefinitionHeader,
}

impl TestDefinitionFile {
    /// The file stem, used as the default HDL top-level entity.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum Variant {
    Single,
    Param(String),
    /// The style unit added to a functional definition that carries a lint section.
    Lint,
}

#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct TestUnitId {
    pub definition: String,
    pub variant: Variant,
}

impl fmt::Display for TestUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Variant::Single => write!(f, "{}", self.definition),
            Variant::Param(param) => write!(f, "{}[{param}]", self.definition),
            Variant::Lint => write!(f, "{}::lint", self.definition),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct TestUnit {
    pub id: TestUnitId,
    pub definition: Arc<TestDefinitionFile>,
    pub kind: AdapterKind,
}

impl TestUnit {
    pub fn new(definition: Arc<TestDefinitionFile>, variant: Variant, kind: AdapterKind) -> Self {
        Self {
            id: TestUnitId {
                definition: definition.id.clone(),
                variant,
            },
            definition,
            kind,
        }
    }

    pub fn header(&self) -> &DefinitionHeader {
        &self.definition.header
    }

    pub fn param(&self) -> Option<&str> {
        match &self.id.variant {
            Variant::Param(param) => Some(param),
            _ => None,
        }
    }

    /// The definition's own timeout, or `default`.
    pub fn timeout(&self, default: Duration) -> Duration {
        self.header().timeout().unwrap_or(default)
    }
}

/// The student files a definition resolved to.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct ResolvedTargets {
    /// One path per declared target, in declaration order.
    pub files: Vec<PathBuf>,
    /// Synthesis constraints file, for `hdl-synthesize` definitions.
    pub constraints: Option<PathBuf>,
    /// Ambiguity notes for the report.
    pub notes: Vec<String>,
}

/// A target pattern that matched no student file.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Unresolved {
    pub pattern: String,
}

/// Resolves every target of `definition` against `student`. All of them must resolve.
pub fn resolve_targets(
    definition: &TestDefinitionFile,
    student: &StudentContext,
    default_mode: MatchMode,
) -> Result<ResolvedTargets, Unresolved> {
    let header = &definition.header;
    let mut resolved = ResolvedTargets::default();
    let mut resolve = |pattern: &str, mode: MatchMode| {
        let Some(resolution) = student.resolve(pattern, mode) else {
            return Err(Unresolved {
                pattern: pattern.to_string(),
            });
        };
        if let Some(note) = resolution.ambiguity_note(student.root(), pattern) {
            resolved.notes.push(note);
        }
        Ok(resolution.path)
    };

    let mut files = Vec::with_capacity(header.targets.len());
    for target in &header.targets {
        files.push(resolve(target.pattern(), target.mode(default_mode))?);
    }
    let constraints = if header.kind == AdapterKind::HdlSynthesize {
        let pattern = match (&header.constraints, &header.top) {
            (Some(pattern), _) => pattern.clone(),
            (None, Some(top)) => format!("{top}.xdc"),
            (None, None) => format!("{}.xdc", definition.stem()),
        };
        Some(resolve(&pattern, default_mode)?)
    } else {
        None
    };
    resolved.files = files;
    resolved.constraints = constraints;
    Ok(resolved)
}

/// A test unit bound to one student. Created per student run and dropped with it.
#[derive(Debug, Clone)]
pub struct BoundTestUnit<'a> {
    pub unit: &'a TestUnit,
    pub student: &'a StudentContext,
    pub targets: Arc<ResolvedTargets>,
}

impl BoundTestUnit<'_> {
    pub fn header(&self) -> &DefinitionHeader {
        self.unit.header()
    }

    pub fn definition_path(&self) -> &Path {
        &self.unit.definition.path
    }

    pub fn student_root(&self) -> &Path {
        self.student.root()
    }
}

/// Lazily binds units to one student, resolving each definition's targets only once.
///
/// One instance lives for exactly one student's run.
pub struct StudentBindings<'a> {
    student: &'a StudentContext,
    default_mode: MatchMode,
    resolved: HashMap<String, Result<Arc<ResolvedTargets>, Unresolved>>,
}

impl<'a> StudentBindings<'a> {
    pub fn new(student: &'a StudentContext, default_mode: MatchMode) -> Self {
        Self {
            student,
            default_mode,
            resolved: HashMap::new(),
        }
    }

    pub fn bind<'u>(&mut self, unit: &'u TestUnit) -> Result<BoundTestUnit<'u>, Unresolved>
    where
        'a: 'u,
    {
        let (student, default_mode) = (self.student, self.default_mode);
        let targets = self
            .resolved
            .entry(unit.definition.id.clone())
            .or_insert_with(|| {
                resolve_targets(&unit.definition, student, default_mode).map(Arc::new)
            })
            .clone()?;
        Ok(BoundTestUnit {
            unit,
            student,
            targets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::definition_header::TargetSpecification;
    use std::fs;

    fn definition(header: DefinitionHeader) -> Arc<TestDefinitionFile> {
        Arc::new(TestDefinitionFile {
            path: PathBuf::from("/corpus/lab1/test_q1.c"),
            id: "lab1/test_q1.c".to_string(),
            header,
        })
    }

    fn targets(patterns: &[&str]) -> Vec<TargetSpecification> {
        patterns
            .iter()
            .map(|p| TargetSpecification::Pattern(p.to_string()))
            .collect()
    }

    #[test]
    fn should_format_unit_identities() {
        let definition = definition(DefinitionHeader::new(AdapterKind::Native, targets(&["q1.c"])));
        let single = TestUnit::new(definition.clone(), Variant::Single, AdapterKind::Native);
        let param = TestUnit::new(
            definition.clone(),
            Variant::Param("TEST2".to_string()),
            AdapterKind::Native,
        );
        let lint = TestUnit::new(definition, Variant::Lint, AdapterKind::Lint);
        assert_eq!(single.id.to_string(), "lab1/test_q1.c");
        assert_eq!(param.id.to_string(), "lab1/test_q1.c[TEST2]");
        assert_eq!(param.param(), Some("TEST2"));
        assert_eq!(lint.id.to_string(), "lab1/test_q1.c::lint");
        assert_eq!(lint.param(), None);
    }

    #[test]
    fn should_use_default_timeout_unless_declared() {
        let mut header = DefinitionHeader::new(AdapterKind::Native, targets(&["q1.c"]));
        let unit = TestUnit::new(definition(header.clone()), Variant::Single, AdapterKind::Native);
        assert_eq!(unit.timeout(Duration::from_secs(10)), Duration::from_secs(10));
        header.timeout = Some(0.5);
        let unit = TestUnit::new(definition(header), Variant::Single, AdapterKind::Native);
        assert_eq!(unit.timeout(Duration::from_secs(10)), Duration::from_millis(500));
    }

    #[test_log::test]
    fn should_require_every_target_to_resolve() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("adder.vhd"), "").unwrap();
        let student = StudentContext::new("jdoe", dir.path());
        let definition = definition(DefinitionHeader::new(
            AdapterKind::HdlSimulate,
            targets(&["adder.vhd", "counter.vhd"]),
        ));
        assert_eq!(
            resolve_targets(&definition, &student, MatchMode::Glob),
            Err(Unresolved {
                pattern: "counter.vhd".to_string()
            })
        );
    }

    #[test_log::test]
    fn should_resolve_synthesis_constraints_from_top() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("top.vhd"), "").unwrap();
        fs::write(dir.path().join("top.xdc"), "").unwrap();
        let student = StudentContext::new("jdoe", dir.path());
        let header = DefinitionHeader {
            top: Some("top".to_string()),
            ..DefinitionHeader::new(AdapterKind::HdlSynthesize, targets(&["*.vhd"]))
        };
        let resolved = resolve_targets(&definition(header), &student, MatchMode::Glob).unwrap();
        assert_eq!(resolved.files, vec![dir.path().join("top.vhd")]);
        assert_eq!(resolved.constraints, Some(dir.path().join("top.xdc")));
    }

    #[test_log::test]
    fn should_bind_each_student_independently() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(first.path().join("q1.c"), "").unwrap();
        fs::write(second.path().join("q1.c"), "").unwrap();
        fs::write(second.path().join("q1_old.c"), "").unwrap();
        let definition = definition(DefinitionHeader::new(AdapterKind::Native, targets(&["q1*.c"])));
        let unit = TestUnit::new(definition, Variant::Single, AdapterKind::Native);

        let alice = StudentContext::new("alice", first.path());
        let bob = StudentContext::new("bob", second.path());
        let mut alice_bindings = StudentBindings::new(&alice, MatchMode::Glob);
        let mut bob_bindings = StudentBindings::new(&bob, MatchMode::Glob);

        let bound_alice = alice_bindings.bind(&unit).unwrap();
        let bound_bob = bob_bindings.bind(&unit).unwrap();
        assert_eq!(bound_alice.targets.files, vec![first.path().join("q1.c")]);
        assert!(bound_alice.targets.notes.is_empty());
        assert_eq!(bound_bob.targets.files, vec![second.path().join("q1.c")]);
        assert_eq!(bound_bob.targets.notes.len(), 1);

        let again = alice_bindings.bind(&unit).unwrap();
        assert!(Arc::ptr_eq(&again.targets, &bound_alice.targets));
    }
}
