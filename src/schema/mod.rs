//! Typed descriptions of the packed, variable-length record layouts the
//! runtime serializes into its ring buffer. The descriptions drive the code
//! generator in [`crate::codegen`]; the native codecs in [`crate::wire`]
//! implement the same contracts for the fixed catalog.

use crate::{config::Config, error::SchemaError};

/// On-wire size of a pointer placeholder.
pub const PTR_SIZE: usize = 4;

/// Payload alignment for dynamic-array values, from the buffer start.
pub const DYN_ARRAY_ALIGN: usize = 4;

/// An integer primitive, 1/2/4/8 bytes wide.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct IntType {
    pub size: usize,
    pub signed: bool,
}

impl IntType {
    pub const I8: IntType = IntType { size: 1, signed: true };
    pub const I16: IntType = IntType { size: 2, signed: true };
    pub const I32: IntType = IntType { size: 4, signed: true };
    pub const I64: IntType = IntType { size: 8, signed: true };
    pub const U8: IntType = IntType { size: 1, signed: false };
    pub const U16: IntType = IntType { size: 2, signed: false };
    pub const U32: IntType = IntType { size: 4, signed: false };
    pub const U64: IntType = IntType { size: 8, signed: false };

    pub fn new(size: usize, signed: bool) -> Result<Self, SchemaError> {
        match size {
            1 | 2 | 4 | 8 => Ok(Self { size, signed }),
            _ => Err(SchemaError::UnsupportedWidth(size)),
        }
    }
}

/// Type descriptor for a single record field.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum TypeDesc {
    Int(IntType),
    /// The entry-kind enumeration; one byte unsigned on the wire.
    Enum,
    /// Fixed-size array of an integer primitive.
    Array { elem: IntType, count: usize },
    /// Pointer to an integer primitive; a 4-byte placeholder on the wire,
    /// replaced by an inline payload when serialized.
    Pointer { elem: IntType },
    /// Compound of a `size: u16` member and a `values` pointer member; the
    /// serialized form carries `size * elem.size` payload bytes after the
    /// inline header.
    DynamicArray { elem: IntType },
}

impl TypeDesc {
    /// Size of the inline (constant) portion of this type.
    pub fn constant_size(&self) -> usize {
        match self {
            Self::Int(t) => t.size,
            Self::Enum => 1,
            Self::Array { elem, count } => elem.size * count,
            Self::Pointer { .. } => PTR_SIZE,
            // size member plus the pointer placeholder
            Self::DynamicArray { .. } => IntType::U16.size + PTR_SIZE,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::DynamicArray { .. })
    }
}

/// A single named field of a memory format.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Field {
    pub name: String,
    pub ty: TypeDesc,
}

impl Field {
    pub fn new<S: Into<String>>(name: S, ty: TypeDesc) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A named, ordered record layout.
///
/// The `type_id` is the one-byte serialization discriminator written at
/// offset 0 of every packed record of this format.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MemoryFormat {
    pub typename: String,
    pub fields: Vec<Field>,
    pub type_id: u8,
}

impl MemoryFormat {
    /// Sum of the inline sizes of all fields, excluding the tag byte.
    pub fn constant_size(&self) -> usize {
        self.fields.iter().map(|f| f.ty.constant_size()).sum()
    }

    pub fn is_dynamic(&self) -> bool {
        self.fields.iter().any(|f| f.ty.is_dynamic())
    }

    /// Fields in declaration order.
    pub fn members(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }
}

/// Assigns serialization type ids monotonically, starting at 1.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    next_type_id: u8,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define<S: Into<String>>(
        &mut self,
        typename: S,
        fields: Vec<Field>,
    ) -> Result<MemoryFormat, SchemaError> {
        let typename = typename.into();
        for (idx, field) in fields.iter().enumerate() {
            if field.ty.is_dynamic() && idx != fields.len() - 1 {
                return Err(SchemaError::DynamicArrayNotLast {
                    typename,
                    field: field.name.clone(),
                });
            }
        }
        self.next_type_id += 1;
        Ok(MemoryFormat {
            typename,
            fields,
            type_id: self.next_type_id,
        })
    }
}

/// A trace event kind: public numeric code, name, and wire layout.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct EntryDescription {
    pub id: u32,
    pub name: String,
    pub memory_format: MemoryFormat,
}

fn standard_format(registry: &mut SchemaRegistry) -> Result<MemoryFormat, SchemaError> {
    registry.define(
        "StandardEntry",
        vec![
            Field::new("id", TypeDesc::Int(IntType::I32)),
            Field::new("type", TypeDesc::Enum),
            Field::new("timestamp", TypeDesc::Int(IntType::I64)),
            Field::new("tid", TypeDesc::Int(IntType::I32)),
            Field::new("callid", TypeDesc::Int(IntType::I32)),
            Field::new("matchid", TypeDesc::Int(IntType::I32)),
            Field::new("extra", TypeDesc::Int(IntType::I64)),
        ],
    )
}

fn frames_format(registry: &mut SchemaRegistry) -> Result<MemoryFormat, SchemaError> {
    registry.define(
        "FramesEntry",
        vec![
            Field::new("id", TypeDesc::Int(IntType::I32)),
            Field::new("type", TypeDesc::Enum),
            Field::new("timestamp", TypeDesc::Int(IntType::I64)),
            Field::new("tid", TypeDesc::Int(IntType::I32)),
            Field::new("frames", TypeDesc::DynamicArray { elem: IntType::I64 }),
        ],
    )
}

fn bytes_format(registry: &mut SchemaRegistry) -> Result<MemoryFormat, SchemaError> {
    registry.define(
        "BytesEntry",
        vec![
            Field::new("id", TypeDesc::Int(IntType::I32)),
            Field::new("type", TypeDesc::Enum),
            Field::new("matchid", TypeDesc::Int(IntType::I32)),
            Field::new("bytes", TypeDesc::DynamicArray { elem: IntType::U8 }),
        ],
    )
}

/// Build the entry catalog for a [`Config`], assigning entry-kind ids in
/// catalog order and sharing one memory format per record shape.
pub fn entry_descriptions(cfg: &Config) -> Result<Vec<EntryDescription>, SchemaError> {
    let mut registry = SchemaRegistry::new();
    let standard = standard_format(&mut registry)?;
    let frames = frames_format(&mut registry)?;
    let bytes = bytes_format(&mut registry)?;

    Ok(cfg
        .names
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let memory_format = if cfg.is_stack_frame_entry(name) {
                frames.clone()
            } else if cfg.is_bytes_entry(name) {
                bytes.clone()
            } else {
                standard.clone()
            };
            EntryDescription {
                id: idx as u32,
                name: name.clone(),
                memory_format,
            }
        })
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn constant_sizes() {
        assert_eq!(TypeDesc::Int(IntType::I64).constant_size(), 8);
        assert_eq!(TypeDesc::Enum.constant_size(), 1);
        assert_eq!(
            TypeDesc::Array {
                elem: IntType::U8,
                count: 16
            }
            .constant_size(),
            16
        );
        assert_eq!(
            TypeDesc::Pointer { elem: IntType::I64 }.constant_size(),
            PTR_SIZE
        );
        assert_eq!(
            TypeDesc::DynamicArray { elem: IntType::I64 }.constant_size(),
            6
        );
    }

    #[test]
    fn unsupported_width() {
        assert_eq!(
            IntType::new(3, false),
            Err(SchemaError::UnsupportedWidth(3))
        );
    }

    #[test]
    fn type_ids_are_monotonic() {
        let mut registry = SchemaRegistry::new();
        let standard = standard_format(&mut registry).unwrap();
        let frames = frames_format(&mut registry).unwrap();
        let bytes = bytes_format(&mut registry).unwrap();
        assert_eq!(standard.type_id, 1);
        assert_eq!(frames.type_id, 2);
        assert_eq!(bytes.type_id, 3);
    }

    #[test]
    fn dynamic_array_must_be_last() {
        let mut registry = SchemaRegistry::new();
        let err = registry
            .define(
                "BadEntry",
                vec![
                    Field::new("data", TypeDesc::DynamicArray { elem: IntType::U8 }),
                    Field::new("tail", TypeDesc::Int(IntType::I32)),
                ],
            )
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DynamicArrayNotLast {
                typename: "BadEntry".to_owned(),
                field: "data".to_owned(),
            }
        );
    }

    #[test]
    fn catalog_shapes() {
        let descriptions = entry_descriptions(&Config::default()).unwrap();
        let by_name = |n: &str| descriptions.iter().find(|d| d.name == n).unwrap();
        assert_eq!(by_name("MARK_PUSH").memory_format.typename, "StandardEntry");
        assert_eq!(by_name("STACK_FRAME").memory_format.typename, "FramesEntry");
        assert_eq!(by_name("STRING_KEY").memory_format.typename, "BytesEntry");
        assert_eq!(by_name("UNKNOWN_TYPE").id, 0);
        // StandardEntry: 4 + 1 + 8 + 4 + 4 + 4 + 8
        assert_eq!(by_name("MARK_POP").memory_format.constant_size(), 33);
    }
}
