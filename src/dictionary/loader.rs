//! Collects class definitions from one or more inputs into a [`Dictionary`]
//!
//! Chained inputs may repeat a class definition, but every repetition must
//! be identical to the first one seen.

use std::collections::HashMap;

use super::types::ClassDef;
use super::{normalize_type_name, Dictionary};
use crate::errors::{WalkError, WalkResult};

/// Builds a dictionary while enforcing consistency across inputs.
#[derive(Debug, Default)]
pub struct DictionaryLoader {
    dictionary: Dictionary,
    /// Where each class was first defined
    origins: HashMap<String, String>,
}

impl DictionaryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one class definition coming from `origin`.
    pub fn register(&mut self, class: ClassDef, origin: &str) -> WalkResult<()> {
        class.validate_structure().map_err(|reason| {
            WalkError::invalid_argument(format!("Malformed class '{}': {}", class.name, reason))
                .with_details(format!("origin: {}", origin))
        })?;

        if let Some(existing) = self.dictionary.class(&class.name) {
            if *existing != class {
                let key = normalize_type_name(&class.name);
                return Err(WalkError::invalid_argument(format!(
                    "Class '{}' redefined differently",
                    class.name
                ))
                .with_details(format!(
                    "first: {}, again: {}",
                    self.origins.get(key).map(String::as_str).unwrap_or("?"),
                    origin
                )));
            }
            return Ok(());
        }

        self.origins
            .insert(normalize_type_name(&class.name).to_string(), origin.to_string());
        self.dictionary.insert(class);
        Ok(())
    }

    /// Registers every definition from `origin`.
    pub fn register_all(
        &mut self,
        classes: impl IntoIterator<Item = ClassDef>,
        origin: &str,
    ) -> WalkResult<()> {
        for class in classes {
            self.register(class, origin)?;
        }
        Ok(())
    }

    pub fn into_dictionary(self) -> Dictionary {
        self.dictionary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::DataMember;
    use crate::errors::WalkErrorCode;

    fn point() -> ClassDef {
        ClassDef::new(
            "Point",
            16,
            vec![DataMember::new("x", "double", 0), DataMember::new("y", "double", 8)],
        )
    }

    #[test]
    fn test_identical_redefinition_accepted() {
        let mut loader = DictionaryLoader::new();
        loader.register(point(), "a.json").unwrap();
        loader.register(point(), "b.json").unwrap();
        assert_eq!(loader.into_dictionary().len(), 1);
    }

    #[test]
    fn test_conflicting_redefinition_rejected() {
        let mut loader = DictionaryLoader::new();
        loader.register(point(), "a.json").unwrap();

        let mut other = point();
        other.size = 24;
        let err = loader.register(other, "b.json").unwrap_err();
        assert_eq!(err.code(), WalkErrorCode::InvalidArgument);
        assert!(err.details().unwrap().contains("a.json"));
    }

    #[test]
    fn test_malformed_class_rejected() {
        let mut loader = DictionaryLoader::new();
        let bad = ClassDef::new("Bad", 4, vec![DataMember::new("x", "int", 12)]);
        assert!(loader.register(bad, "a.json").is_err());
    }
}
