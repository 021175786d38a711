//! Primitive and string leaves of the walker tree
//!
//! Widening is fixed: 8/16-bit integers become `int`, `uint32` becomes
//! `long`, `uint64` becomes `double`. Values are read through the widened
//! representation so that text and binary output never disagree with the
//! schema.

use crate::errors::WalkResult;
use crate::memory::{Address, Memory, STD_STRING_SIZE, TSTRING_SIZE};
use crate::schema::SchemaElement;

/// The closed set of primitive kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl PrimitiveKind {
    /// Recognizes every accepted spelling of a primitive type.
    pub fn from_name(type_name: &str) -> Option<Self> {
        let kind = match type_name {
            "bool" | "Bool_t" => PrimitiveKind::Bool,
            "char" | "Char_t" | "Int8_t" => PrimitiveKind::Int8,
            "unsigned char" | "UChar_t" | "UInt8_t" => PrimitiveKind::UInt8,
            "short" | "Short_t" | "Short16_t" | "Int16_t" => PrimitiveKind::Int16,
            "unsigned short" | "UShort_t" | "UShort16_t" | "UInt16_t" => PrimitiveKind::UInt16,
            "int" | "Int_t" | "Int32_t" => PrimitiveKind::Int32,
            "unsigned int" | "UInt_t" | "UInt32_t" => PrimitiveKind::UInt32,
            "long" | "Long_t" | "Long64_t" | "long long" => PrimitiveKind::Int64,
            "unsigned long" | "ULong_t" | "ULong64_t" | "unsigned long long" => PrimitiveKind::UInt64,
            "float" | "Float_t" | "Float16_t" => PrimitiveKind::Float32,
            "double" | "Double_t" | "Double32_t" => PrimitiveKind::Float64,
            _ => return None,
        };
        Some(kind)
    }

    /// Size in bytes of one value
    pub fn size(self) -> usize {
        match self {
            PrimitiveKind::Bool | PrimitiveKind::Int8 | PrimitiveKind::UInt8 => 1,
            PrimitiveKind::Int16 | PrimitiveKind::UInt16 => 2,
            PrimitiveKind::Int32 | PrimitiveKind::UInt32 | PrimitiveKind::Float32 => 4,
            PrimitiveKind::Int64 | PrimitiveKind::UInt64 | PrimitiveKind::Float64 => 8,
        }
    }

    /// Normalized type name
    pub fn type_name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Int8 => "char",
            PrimitiveKind::UInt8 => "unsigned char",
            PrimitiveKind::Int16 => "short",
            PrimitiveKind::UInt16 => "unsigned short",
            PrimitiveKind::Int32 => "int",
            PrimitiveKind::UInt32 => "unsigned int",
            PrimitiveKind::Int64 => "long",
            PrimitiveKind::UInt64 => "unsigned long",
            PrimitiveKind::Float32 => "float",
            PrimitiveKind::Float64 => "double",
        }
    }

    /// Widened schema type
    pub fn avro_type(self) -> &'static str {
        match self.schema_element() {
            SchemaElement::Boolean => "boolean",
            SchemaElement::Int => "int",
            SchemaElement::Long => "long",
            SchemaElement::Float => "float",
            _ => "double",
        }
    }

    pub fn schema_element(self) -> SchemaElement {
        match self {
            PrimitiveKind::Bool => SchemaElement::Boolean,
            PrimitiveKind::Int8
            | PrimitiveKind::UInt8
            | PrimitiveKind::Int16
            | PrimitiveKind::UInt16
            | PrimitiveKind::Int32 => SchemaElement::Int,
            PrimitiveKind::UInt32 | PrimitiveKind::Int64 => SchemaElement::Long,
            PrimitiveKind::Float32 => SchemaElement::Float,
            PrimitiveKind::UInt64 | PrimitiveKind::Float64 => SchemaElement::Double,
        }
    }

    /// Reads one value at `addr` and widens it.
    pub fn read(self, mem: &dyn Memory, addr: Address) -> WalkResult<Widened> {
        let value = match self {
            PrimitiveKind::Bool => Widened::Boolean(mem.read_u8(addr)? != 0),
            PrimitiveKind::Int8 => Widened::Int(i32::from(mem.read_u8(addr)? as i8)),
            PrimitiveKind::UInt8 => Widened::Int(i32::from(mem.read_u8(addr)?)),
            PrimitiveKind::Int16 => Widened::Int(i32::from(mem.read_u16(addr)? as i16)),
            PrimitiveKind::UInt16 => Widened::Int(i32::from(mem.read_u16(addr)?)),
            PrimitiveKind::Int32 => Widened::Int(mem.read_u32(addr)? as i32),
            PrimitiveKind::UInt32 => Widened::Long(i64::from(mem.read_u32(addr)?)),
            PrimitiveKind::Int64 => Widened::Long(mem.read_u64(addr)? as i64),
            PrimitiveKind::UInt64 => Widened::Double(mem.read_u64(addr)? as f64),
            PrimitiveKind::Float32 => Widened::Float(mem.read_f32(addr)?),
            PrimitiveKind::Float64 => Widened::Double(mem.read_f64(addr)?),
        };
        Ok(value)
    }

    pub fn is_integer(self) -> bool {
        !matches!(
            self,
            PrimitiveKind::Bool | PrimitiveKind::Float32 | PrimitiveKind::Float64
        )
    }
}

/// A primitive value after widening
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Widened {
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl Widened {
    /// Interprets an integer value as an element count.
    pub fn as_count(self) -> Option<usize> {
        match self {
            Widened::Int(v) => usize::try_from(v).ok(),
            Widened::Long(v) => usize::try_from(v).ok(),
            _ => None,
        }
    }
}

/// The three physical string representations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringKind {
    /// NUL-terminated characters; inline with a fixed capacity, or behind a pointer
    CharBuffer { capacity: Option<usize> },
    /// Owned growable string: data address + length
    StdString,
    /// Library string wrapper: length + data address
    TString,
}

impl StringKind {
    pub fn size(self) -> usize {
        match self {
            StringKind::CharBuffer { capacity } => capacity.unwrap_or(1),
            StringKind::StdString => STD_STRING_SIZE,
            StringKind::TString => TSTRING_SIZE,
        }
    }

    pub fn type_name(self) -> String {
        match self {
            StringKind::CharBuffer { capacity: Some(n) } => format!("char[{}]", n),
            StringKind::CharBuffer { capacity: None } => "char".to_string(),
            StringKind::StdString => "string".to_string(),
            StringKind::TString => "TString".to_string(),
        }
    }

    pub fn read(self, mem: &dyn Memory, addr: Address) -> WalkResult<String> {
        match self {
            StringKind::CharBuffer { capacity } => mem.read_cstr(addr, capacity),
            StringKind::StdString => {
                let data = mem.read_address(addr)?;
                let len = mem.read_u64(addr.offset(8))? as usize;
                mem.read_utf8(data, len)
            }
            StringKind::TString => {
                let len = mem.read_u32(addr)? as usize;
                let data = mem.read_address(addr.offset(8))?;
                mem.read_utf8(data, len)
            }
        }
    }
}
