//! Type-name parsing
//!
//! A declared type string is parsed once into a [`TypeExpr`]. Qualifiers are
//! peeled from the outside in: fixed dimensions, pointer marker, sequence
//! wrapper, then the base name.

use std::fmt;

use super::primitive::{PrimitiveKind, StringKind};
use crate::dictionary::{normalize_type_name, Dictionary};
use crate::errors::{WalkError, WalkResult};
use crate::memory::{POINTER_SIZE, TREF_SIZE, VECTOR_SIZE};

/// Physical form of a dynamic heterogeneous array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicForm {
    /// Slots are possibly-null object pointers
    ObjArray,
    /// Slots are back-reference uids
    RefArray,
    /// Slots are non-null object pointers of one class
    ClonesArray,
}

impl DynamicForm {
    pub fn from_name(type_name: &str) -> Option<Self> {
        match type_name {
            "TObjArray" => Some(DynamicForm::ObjArray),
            "TRefArray" => Some(DynamicForm::RefArray),
            "TClonesArray" => Some(DynamicForm::ClonesArray),
            _ => None,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            DynamicForm::ObjArray => "TObjArray",
            DynamicForm::RefArray => "TRefArray",
            DynamicForm::ClonesArray => "TClonesArray",
        }
    }

    /// Size of one slot in the data block
    pub fn slot_size(self) -> usize {
        match self {
            DynamicForm::RefArray => 4,
            DynamicForm::ObjArray | DynamicForm::ClonesArray => POINTER_SIZE,
        }
    }

    /// Whether a slot may hold no element
    pub fn nullable_items(self) -> bool {
        !matches!(self, DynamicForm::ClonesArray)
    }
}

/// Parsed type string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Primitive(PrimitiveKind),
    String(StringKind),
    /// Record type looked up in the dictionary
    Class(String),
    Pointer(Box<TypeExpr>),
    BackRef,
    Vector(Box<TypeExpr>),
    BitVector,
    /// Fixed array; the outermost bracket is the outermost array
    Array(Box<TypeExpr>, usize),
    Dynamic(DynamicForm),
}

impl TypeExpr {
    /// Parses a declared type string.
    pub fn parse(type_name: &str) -> WalkResult<TypeExpr> {
        let tn = normalize_type_name(type_name);
        Self::parse_normalized(tn).ok_or_else(|| WalkError::unsupported_type(type_name))
    }

    fn parse_normalized(tn: &str) -> Option<TypeExpr> {
        if tn.is_empty() {
            return None;
        }

        if tn.ends_with(']') {
            let (base, dims) = split_dimensions(tn)?;
            return Self::with_dimensions(base, dims);
        }

        if let Some(base) = tn.strip_suffix('*') {
            let base = normalize_type_name(base);
            if is_char(base) {
                return Some(TypeExpr::Pointer(Box::new(TypeExpr::String(
                    StringKind::CharBuffer { capacity: None },
                ))));
            }
            return Some(TypeExpr::Pointer(Box::new(Self::parse_normalized(base)?)));
        }

        if let Some(inner) = tn
            .strip_prefix("std::vector<")
            .or_else(|| tn.strip_prefix("vector<"))
        {
            let inner = normalize_type_name(inner.strip_suffix('>')?);
            if inner == "bool" {
                return Some(TypeExpr::BitVector);
            }
            return Some(TypeExpr::Vector(Box::new(Self::parse_normalized(inner)?)));
        }

        if tn == "TRef" {
            return Some(TypeExpr::BackRef);
        }
        if let Some(form) = DynamicForm::from_name(tn) {
            return Some(TypeExpr::Dynamic(form));
        }
        if let Some(kind) = PrimitiveKind::from_name(tn) {
            return Some(TypeExpr::Primitive(kind));
        }
        match tn {
            "string" | "std::string" => return Some(TypeExpr::String(StringKind::StdString)),
            "TString" => return Some(TypeExpr::String(StringKind::TString)),
            _ => {}
        }

        if is_class_name(tn) {
            Some(TypeExpr::Class(tn.to_string()))
        } else {
            None
        }
    }

    fn with_dimensions(base: &str, mut dims: Vec<usize>) -> Option<TypeExpr> {
        let mut expr = if is_char(base) {
            let capacity = dims.pop()?;
            TypeExpr::String(StringKind::CharBuffer {
                capacity: Some(capacity),
            })
        } else {
            Self::parse_normalized(base)?
        };
        for n in dims.into_iter().rev() {
            expr = TypeExpr::Array(Box::new(expr), n);
        }
        Some(expr)
    }

    /// Byte size of one value; record sizes come from the dictionary.
    pub fn size(&self, dictionary: &Dictionary) -> WalkResult<usize> {
        let size = match self {
            TypeExpr::Primitive(kind) => kind.size(),
            TypeExpr::String(kind) => kind.size(),
            TypeExpr::Class(name) => {
                dictionary
                    .class(name)
                    .ok_or_else(|| WalkError::unsupported_type(name.as_str()))?
                    .size
            }
            TypeExpr::Pointer(_) => POINTER_SIZE,
            TypeExpr::BackRef => TREF_SIZE,
            TypeExpr::Vector(_) | TypeExpr::BitVector | TypeExpr::Dynamic(_) => VECTOR_SIZE,
            TypeExpr::Array(inner, n) => inner.size(dictionary)? * n,
        };
        Ok(size)
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Primitive(kind) => write!(f, "{}", kind.type_name()),
            TypeExpr::String(kind) => write!(f, "{}", kind.type_name()),
            TypeExpr::Class(name) => write!(f, "{}", name),
            TypeExpr::Pointer(inner) => match inner.as_ref() {
                TypeExpr::String(StringKind::CharBuffer { capacity: None }) => write!(f, "char*"),
                inner => write!(f, "{}*", inner),
            },
            TypeExpr::BackRef => write!(f, "TRef"),
            TypeExpr::Vector(inner) => write!(f, "vector<{}>", inner),
            TypeExpr::BitVector => write!(f, "vector<bool>"),
            TypeExpr::Dynamic(form) => write!(f, "{}", form.type_name()),
            TypeExpr::Array(..) => {
                let mut dims = Vec::new();
                let mut base = self;
                while let TypeExpr::Array(inner, n) = base {
                    dims.push(*n);
                    base = inner;
                }
                match base {
                    TypeExpr::String(StringKind::CharBuffer { capacity: Some(n) }) => {
                        dims.push(*n);
                        write!(f, "char")?;
                    }
                    other => write!(f, "{}", other)?,
                }
                for n in dims {
                    write!(f, "[{}]", n)?;
                }
                Ok(())
            }
        }
    }
}

fn is_char(base: &str) -> bool {
    PrimitiveKind::from_name(base) == Some(PrimitiveKind::Int8)
}

/// Splits `T[2][3]` into `T` and `[2, 3]`.
fn split_dimensions(tn: &str) -> Option<(&str, Vec<usize>)> {
    let mut dims = Vec::new();
    let mut rest = tn;
    while let Some(body) = rest.strip_suffix(']') {
        let open = body.rfind('[')?;
        let n = body[open + 1..].trim().parse::<usize>().ok()?;
        dims.push(n);
        rest = body[..open].trim_end();
    }
    dims.reverse();
    if rest.is_empty() {
        return None;
    }
    Some((rest, dims))
}

/// Identifier, optionally scope-qualified with `::`.
fn is_class_name(tn: &str) -> bool {
    tn.split("::").all(|part| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}
