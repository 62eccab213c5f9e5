//! Collection of test units from a corpus of tutor test-definition files.

use super::test_unit::{TestDefinitionFile, TestUnit, Variant};
use crate::{
    Error, Result,
    configuration::definition_header::{AdapterKind, parse_header_block},
    input,
    report::Manifest,
};
use log::{debug, info, warn};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

/// A definition file whose header could not be parsed.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RejectedDefinition {
    pub path: PathBuf,
    pub reason: String,
}

/// Every test unit of a cohort, in report order.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub root: PathBuf,
    pub definitions: Vec<Arc<TestDefinitionFile>>,
    pub units: Vec<TestUnit>,
    pub rejected: Vec<RejectedDefinition>,
    pub manifest: Manifest,
}

/// Walks `root` for test-definition files and expands them into test units.
///
/// Files are visited in sorted walk order, hidden entries skipped. A file is a definition when
/// its name starts with `prefix` and it carries a header block. Units follow the definition
/// order, then the declared parameter order.
pub fn discover(root: &Path, prefix: &str) -> Result<Corpus> {
    if !root.is_dir() {
        return Err(Error::CorpusRootMissing(root.to_path_buf()));
    }
    info!("🔎 Discovering tests under '{}'", root.display());

    let mut corpus = Corpus {
        root: root.to_path_buf(),
        definitions: vec![],
        units: vec![],
        rejected: vec![],
        manifest: Manifest::load(root)?,
    };

    for path in input::submission_files(root) {
        let is_candidate = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with(prefix));
        if !is_candidate {
            continue;
        }
        let Some(id) = input::relative_slash_path(root, &path) else {
            continue;
        };
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                debug!("Skipping '{id}': {err}");
                continue;
            }
        };
        let header = match parse_header_block(&content) {
            Ok(Some(header)) => header,
            Ok(None) => {
                debug!("Skipping '{id}': no header block");
                continue;
            }
            Err(err) => {
                warn!("⚠️  Rejected test definition '{id}': {err}");
                corpus.rejected.push(RejectedDefinition {
                    path,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        if header.targets.is_empty() {
            debug!("Skipping '{id}': no targets declared");
            continue;
        }

        let definition = Arc::new(TestDefinitionFile { path, id, header });
        corpus.units.extend(expand(&definition));
        corpus.definitions.push(definition);
    }

    info!(
        "📚 Found {} test units in {} definitions",
        corpus.units.len(),
        corpus.definitions.len()
    );
    Ok(corpus)
}

fn expand(definition: &Arc<TestDefinitionFile>) -> Vec<TestUnit> {
    let header = &definition.header;
    if header.kind == AdapterKind::Lint {
        return vec![TestUnit::new(
            definition.clone(),
            Variant::Single,
            AdapterKind::Lint,
        )];
    }

    let mut units: Vec<_> = if header.params.is_empty() {
        vec![TestUnit::new(definition.clone(), Variant::Single, header.kind)]
    } else {
        header
            .params
            .iter()
            .map(|param| {
                TestUnit::new(
                    definition.clone(),
                    Variant::Param(param.clone()),
                    header.kind,
                )
            })
            .collect()
    };
    if header.lint.is_some() {
        units.push(TestUnit::new(
            definition.clone(),
            Variant::Lint,
            AdapterKind::Lint,
        ));
    }
    units
}
