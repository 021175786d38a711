//! Type dictionary: class metadata looked up by name at run time
//!
//! The walker engine asks the dictionary for a class whenever a type string
//! is not one of the built-in kinds. Names are normalized before lookup
//! (leading `const` and surrounding whitespace are dropped).

mod loader;
mod types;

pub use loader::DictionaryLoader;
pub use types::{ClassDef, DataMember};

use std::collections::HashMap;

/// Normalizes a type name: strips leading `const` qualifiers and whitespace.
pub fn normalize_type_name(type_name: &str) -> &str {
    let mut tn = type_name.trim();
    while let Some(rest) = tn.strip_prefix("const ") {
        tn = rest.trim_start();
    }
    tn
}

/// Registry of class definitions
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    classes: HashMap<String, ClassDef>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dictionary from definitions, later duplicates replacing earlier ones.
    pub fn from_classes(classes: impl IntoIterator<Item = ClassDef>) -> Self {
        let mut out = Self::new();
        for class in classes {
            out.insert(class);
        }
        out
    }

    pub(crate) fn insert(&mut self, class: ClassDef) {
        let key = normalize_type_name(&class.name).to_string();
        self.classes.insert(key, class);
    }

    /// Looks up a class by (unnormalized) name.
    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(normalize_type_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.class(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
