//! Runtime class metadata
//!
//! A class definition is what a live tree knows about a record type at run
//! time: its byte size and the name, declared type and offset of each member.

use serde::{Deserialize, Serialize};

/// One data member of a class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMember {
    /// Member name
    pub name: String,
    /// Declared type string, e.g. `vector<double>` or `Hit*`
    #[serde(rename = "type")]
    pub type_name: String,
    /// Byte offset from the start of the owning object
    pub offset: usize,
    /// Source comment, carried into the schema as field doc
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl DataMember {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, offset: usize) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            offset,
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Class definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Class name, possibly scope-qualified (`geo::Point`)
    pub name: String,
    /// Size of one instance in bytes
    pub size: usize,
    /// Class title, carried into the schema as record doc
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Members in declaration order
    #[serde(default)]
    pub members: Vec<DataMember>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>, size: usize, members: Vec<DataMember>) -> Self {
        Self {
            name: name.into(),
            size,
            doc: None,
            members,
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Checks that every member fits inside the instance.
    pub fn validate_structure(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Class name must not be empty".into());
        }
        for member in &self.members {
            if member.offset >= self.size.max(1) {
                return Err(format!(
                    "Member '{}' offset {} outside class size {}",
                    member.name, member.offset, self.size
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_def_from_json() {
        let def: ClassDef = serde_json::from_str(
            r#"{"name": "Point", "size": 16,
                "members": [{"name": "x", "type": "double", "offset": 0},
                            {"name": "y", "type": "double", "offset": 8, "comment": "vertical"}]}"#,
        )
        .unwrap();
        assert_eq!(def.members.len(), 2);
        assert_eq!(def.members[1].type_name, "double");
        assert_eq!(def.members[1].comment.as_deref(), Some("vertical"));
        assert!(def.validate_structure().is_ok());
    }

    #[test]
    fn test_member_outside_class_rejected() {
        let def = ClassDef::new("Bad", 8, vec![DataMember::new("x", "double", 8)]);
        let result = def.validate_structure();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("outside"));
    }
}
