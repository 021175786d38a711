//! Tree files: a JSON record source
//!
//! ```json
//! {
//!   "classes": [{"name": "Hit", "size": 8, "members": [{"name": "e", "type": "double", "offset": 0}]}],
//!   "trees": {
//!     "events": {
//!       "branches": [{"name": "n", "type": "int"}, {"name": "x", "type": "double", "dims": [{"counter": "n"}]}],
//!       "entries": [{"n": 2, "x": [1.0, 2.0]}]
//!     }
//!   }
//! }
//! ```
//!
//! Several files can be chained: each must declare the tree with the same
//! branches, and their entries are concatenated in file order.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::materialize::Materializer;
use super::{EntrySource, FieldDecl, FieldHandle};
use crate::dictionary::{normalize_type_name, ClassDef, Dictionary, DictionaryLoader};
use crate::errors::{WalkError, WalkResult};
use crate::memory::{Address, Arena, Memory};

/// Tree-file problems
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("No input files")]
    NoInput,

    #[error("Cannot read {0}: {1}")]
    Read(String, #[source] io::Error),

    #[error("Malformed tree file {0}: {1}")]
    Parse(String, #[source] serde_json::Error),

    #[error("Tree '{0}' not found in {1}")]
    TreeNotFound(String, String),

    #[error("Tree '{0}' in {1} declares different branches")]
    BranchMismatch(String, String),

    #[error("Unknown branch: {0}")]
    UnknownBranch(String),

    #[error("Branch '{0}' is declared as '{1}', not '{2}'")]
    BranchType(String, String, String),

    #[error("Entry {0} out of range ({1} entries)")]
    EntryOutOfRange(u64, u64),

    #[error("Entry {0}, field '{1}': {2}")]
    BadValue(u64, String, String),
}

impl From<FixtureError> for WalkError {
    fn from(err: FixtureError) -> Self {
        match err {
            FixtureError::Read(path, source) => {
                WalkError::io(format!("Cannot read {}", path), source)
            }
            FixtureError::BadValue(..) | FixtureError::EntryOutOfRange(..) => {
                WalkError::io_failure(err.to_string())
            }
            other => WalkError::invalid_argument(other.to_string()),
        }
    }
}

/// One tree inside a tree file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeSpec {
    pub branches: Vec<FieldDecl>,
    #[serde(default)]
    pub entries: Vec<Map<String, Value>>,
}

/// A whole tree file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeFile {
    #[serde(default)]
    pub classes: Vec<ClassDef>,
    #[serde(default)]
    pub trees: BTreeMap<String, TreeSpec>,
}

impl TreeFile {
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let origin = path.display().to_string();
        let content =
            fs::read_to_string(path).map_err(|e| FixtureError::Read(origin.clone(), e))?;
        serde_json::from_str(&content).map_err(|e| FixtureError::Parse(origin, e))
    }
}

/// Entry currently materialized in memory
#[derive(Debug, Default)]
struct LoadedEntry {
    arena: Arena,
    addresses: Vec<Address>,
}

/// Record source over one tree chained across tree files
#[derive(Debug)]
pub struct FixtureSource {
    tree: String,
    dictionary: Rc<Dictionary>,
    branches: Vec<FieldDecl>,
    entries: Vec<Map<String, Value>>,
    cursor: u64,
    current: LoadedEntry,
}

impl FixtureSource {
    /// Opens and chains tree files from disk.
    pub fn open<P: AsRef<Path>>(paths: &[P], tree: &str) -> WalkResult<Self> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            files.push((path.display().to_string(), TreeFile::load(path)?));
        }
        Self::from_files(files, tree)
    }

    /// Chains already-parsed tree files, labelled by origin.
    pub fn from_files(files: Vec<(String, TreeFile)>, tree: &str) -> WalkResult<Self> {
        if files.is_empty() {
            return Err(FixtureError::NoInput.into());
        }

        let mut loader = DictionaryLoader::new();
        let mut branches: Option<Vec<FieldDecl>> = None;
        let mut entries = Vec::new();

        for (origin, file) in files {
            loader.register_all(file.classes, &origin)?;

            let mut trees = file.trees;
            let spec = trees
                .remove(tree)
                .ok_or_else(|| FixtureError::TreeNotFound(tree.to_string(), origin.clone()))?;
            match &branches {
                Some(first) if *first != spec.branches => {
                    return Err(FixtureError::BranchMismatch(tree.to_string(), origin).into());
                }
                Some(_) => {}
                None => branches = Some(spec.branches),
            }
            entries.extend(spec.entries);
        }

        Ok(Self {
            tree: tree.to_string(),
            dictionary: Rc::new(loader.into_dictionary()),
            branches: branches.unwrap_or_default(),
            entries,
            cursor: 0,
            current: LoadedEntry::default(),
        })
    }

    pub fn tree(&self) -> &str {
        &self.tree
    }

    /// Class metadata shared by all chained files
    pub fn dictionary(&self) -> Rc<Dictionary> {
        Rc::clone(&self.dictionary)
    }

    fn materialize(&self, entry: u64) -> Result<LoadedEntry, FixtureError> {
        let values = &self.entries[entry as usize];
        let mut materializer = Materializer::new(&self.dictionary);
        let mut addresses = Vec::with_capacity(self.branches.len());
        for decl in &self.branches {
            let value = values.get(&decl.name).unwrap_or(&Value::Null);
            let addr = materializer
                .branch(decl, value, values)
                .map_err(|reason| FixtureError::BadValue(entry, decl.name.clone(), reason))?;
            addresses.push(addr);
        }
        Ok(LoadedEntry {
            arena: materializer.into_arena(),
            addresses,
        })
    }
}

impl EntrySource for FixtureSource {
    fn declarations(&self) -> &[FieldDecl] {
        &self.branches
    }

    fn bind(&mut self, field: &str, type_name: &str) -> WalkResult<FieldHandle> {
        let index = self
            .branches
            .iter()
            .position(|decl| decl.name == field)
            .ok_or_else(|| FixtureError::UnknownBranch(field.to_string()))?;
        let declared = &self.branches[index].type_name;
        if normalize_type_name(declared) != normalize_type_name(type_name) {
            return Err(FixtureError::BranchType(
                field.to_string(),
                declared.clone(),
                type_name.to_string(),
            )
            .into());
        }
        Ok(FieldHandle(index))
    }

    fn address(&self, handle: FieldHandle) -> WalkResult<Address> {
        self.current.addresses.get(handle.0).copied().ok_or_else(|| {
            WalkError::io_failure(format!("No entry loaded for field handle {}", handle.0))
        })
    }

    fn memory(&self) -> &dyn Memory {
        &self.current.arena
    }

    fn has_next(&self) -> bool {
        self.cursor < self.num_entries()
    }

    fn advance(&mut self) -> WalkResult<()> {
        if !self.has_next() {
            return Err(FixtureError::EntryOutOfRange(self.cursor, self.num_entries()).into());
        }
        self.current = self.materialize(self.cursor)?;
        self.cursor += 1;
        Ok(())
    }

    fn num_entries(&self) -> u64 {
        self.entries.len() as u64
    }

    fn seek(&mut self, entry: u64) -> WalkResult<()> {
        if entry > self.num_entries() {
            return Err(FixtureError::EntryOutOfRange(entry, self.num_entries()).into());
        }
        self.cursor = entry;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WalkErrorCode;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn tree_file(value: Value) -> TreeFile {
        serde_json::from_value(value).unwrap()
    }

    fn part(entries: Value) -> TreeFile {
        tree_file(json!({
            "classes": [{"name": "Hit", "size": 8, "members": [{"name": "e", "type": "double", "offset": 0}]}],
            "trees": {"events": {"branches": [{"name": "hit", "type": "Hit"}], "entries": entries}}
        }))
    }

    #[test]
    fn test_chained_files_concatenate_entries() {
        let mut source = FixtureSource::from_files(
            vec![
                ("a.json".into(), part(json!([{"hit": {"e": 1.0}}]))),
                ("b.json".into(), part(json!([{"hit": {"e": 2.0}}, {"hit": {"e": 3.0}}]))),
            ],
            "events",
        )
        .unwrap();
        assert_eq!(source.num_entries(), 3);

        let handle = source.bind("hit", "Hit").unwrap();
        source.seek(2).unwrap();
        source.advance().unwrap();
        let addr = source.address(handle).unwrap();
        assert_eq!(source.memory().read_f64(addr).unwrap(), 3.0);
        assert!(!source.has_next());
        assert!(source.advance().is_err());
    }

    #[test]
    fn test_branch_mismatch_rejected() {
        let other = tree_file(json!({
            "trees": {"events": {"branches": [{"name": "hit", "type": "int"}]}}
        }));
        let err = FixtureSource::from_files(
            vec![("a.json".into(), part(json!([]))), ("b.json".into(), other)],
            "events",
        )
        .unwrap_err();
        assert_eq!(err.code(), WalkErrorCode::InvalidArgument);
        assert!(err.message().contains("b.json"));
    }

    #[test]
    fn test_missing_tree_and_no_input() {
        let err = FixtureSource::from_files(vec![("a.json".into(), part(json!([])))], "nope")
            .unwrap_err();
        assert!(err.message().contains("nope"));
        assert!(FixtureSource::from_files(vec![], "events").is_err());
    }

    #[test]
    fn test_bind_checks_name_and_type() {
        let mut source =
            FixtureSource::from_files(vec![("a.json".into(), part(json!([])))], "events").unwrap();
        assert!(source.bind("hit", "const Hit").is_ok());
        assert!(source.bind("hit", "int").is_err());
        assert!(source.bind("missing", "Hit").is_err());
    }

    #[test]
    fn test_bad_entry_is_io_failure() {
        let mut source = FixtureSource::from_files(
            vec![("a.json".into(), part(json!([{"hit": [1, 2]}])))],
            "events",
        )
        .unwrap();
        let err = source.advance().unwrap_err();
        assert_eq!(err.code(), WalkErrorCode::IoFailure);
        assert!(err.message().contains("Entry 0"));
    }

    #[test]
    fn test_open_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            json!({"trees": {"t": {"branches": [{"name": "n", "type": "int"}], "entries": [{"n": 5}]}}})
        )
        .unwrap();

        let mut source = FixtureSource::open(&[file.path()], "t").unwrap();
        let handle = source.bind("n", "int").unwrap();
        source.advance().unwrap();
        assert_eq!(source.memory().read_u32(source.address(handle).unwrap()).unwrap(), 5);

        let missing = FixtureSource::open(&["/nonexistent/tree.json"], "t").unwrap_err();
        assert_eq!(missing.code(), WalkErrorCode::IoFailure);
    }
}
