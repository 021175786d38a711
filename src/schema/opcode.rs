//! Flat schema instruction stream
//!
//! The numbering is a fixed contract shared with external schema builders.

use std::fmt;

/// One schema instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SchemaElement {
    Null = 0,
    Boolean = 1,
    Int = 2,
    Long = 3,
    Float = 4,
    Double = 5,
    String = 6,
    Bytes = 7,
    Array = 8,
    Map = 9,
    RecordName = 10,
    RecordNamespace = 11,
    RecordDoc = 12,
    FieldName = 13,
    FieldDoc = 14,
    RecordEnd = 15,
    EnumName = 16,
    EnumNamespace = 17,
    EnumDoc = 18,
    EnumSymbol = 19,
    EnumEnd = 20,
    FixedName = 21,
    FixedNamespace = 22,
    FixedDoc = 23,
    FixedSize = 24,
    UnionStart = 25,
    UnionEnd = 26,
    Reference = 27,
}

impl SchemaElement {
    const ALL: [SchemaElement; 28] = [
        SchemaElement::Null,
        SchemaElement::Boolean,
        SchemaElement::Int,
        SchemaElement::Long,
        SchemaElement::Float,
        SchemaElement::Double,
        SchemaElement::String,
        SchemaElement::Bytes,
        SchemaElement::Array,
        SchemaElement::Map,
        SchemaElement::RecordName,
        SchemaElement::RecordNamespace,
        SchemaElement::RecordDoc,
        SchemaElement::FieldName,
        SchemaElement::FieldDoc,
        SchemaElement::RecordEnd,
        SchemaElement::EnumName,
        SchemaElement::EnumNamespace,
        SchemaElement::EnumDoc,
        SchemaElement::EnumSymbol,
        SchemaElement::EnumEnd,
        SchemaElement::FixedName,
        SchemaElement::FixedNamespace,
        SchemaElement::FixedDoc,
        SchemaElement::FixedSize,
        SchemaElement::UnionStart,
        SchemaElement::UnionEnd,
        SchemaElement::Reference,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Primitive type name for the eight primitive instructions
    pub fn primitive_name(self) -> Option<&'static str> {
        let name = match self {
            SchemaElement::Null => "null",
            SchemaElement::Boolean => "boolean",
            SchemaElement::Int => "int",
            SchemaElement::Long => "long",
            SchemaElement::Float => "float",
            SchemaElement::Double => "double",
            SchemaElement::String => "string",
            SchemaElement::Bytes => "bytes",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for SchemaElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// Receiver of the flat instruction stream.
///
/// `word` carries the name, namespace, doc, symbol or size; it is empty for
/// instructions that take no argument.
pub trait SchemaBuilder {
    fn element(&mut self, op: SchemaElement, word: &str);
}

/// Builder that records every instruction in order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OpcodeRecorder {
    pub elements: Vec<(SchemaElement, String)>,
}

impl OpcodeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instruction codes only
    pub fn codes(&self) -> Vec<u8> {
        self.elements.iter().map(|(op, _)| op.code()).collect()
    }
}

impl SchemaBuilder for OpcodeRecorder {
    fn element(&mut self, op: SchemaElement, word: &str) {
        self.elements.push((op, word.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbering_is_fixed() {
        assert_eq!(SchemaElement::Null.code(), 0);
        assert_eq!(SchemaElement::Bytes.code(), 7);
        assert_eq!(SchemaElement::RecordEnd.code(), 15);
        assert_eq!(SchemaElement::EnumEnd.code(), 20);
        assert_eq!(SchemaElement::FixedSize.code(), 24);
        assert_eq!(SchemaElement::Reference.code(), 27);
    }

    #[test]
    fn test_from_code_covers_every_element() {
        for code in 0..28u8 {
            assert_eq!(SchemaElement::from_code(code).unwrap().code(), code);
        }
        assert_eq!(SchemaElement::from_code(28), None);
    }

    #[test]
    fn test_recorder_keeps_order() {
        let mut recorder = OpcodeRecorder::new();
        recorder.element(SchemaElement::Array, "");
        recorder.element(SchemaElement::Long, "");
        assert_eq!(recorder.codes(), vec![8, 3]);
    }
}
