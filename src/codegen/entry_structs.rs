use super::{indent, Codegen, SIGNED_SOURCE};
use crate::{
    error::SchemaError,
    schema::{EntryDescription, Field, IntType, MemoryFormat, TypeDesc},
};
use itertools::Itertools;

fn cpp_int_type(t: &IntType) -> String {
    let unsigned = if t.signed { "" } else { "u" };
    format!("{}int{}_t", unsigned, t.size * 8)
}

fn declaration(field: &Field) -> String {
    match &field.ty {
        TypeDesc::Int(t) => format!("{} {};", cpp_int_type(t), field.name),
        TypeDesc::Enum => format!("EntryType {};", field.name),
        TypeDesc::Array { elem, count } => {
            format!("{} {}[{}];", cpp_int_type(elem), field.name, count)
        }
        TypeDesc::Pointer { elem } => {
            format!("const {}* {};", cpp_int_type(elem), field.name)
        }
        TypeDesc::DynamicArray { elem } => format!(
            "struct {{\n  const {elem}* values;\n  uint16_t size;\n}} {name};",
            elem = cpp_int_type(elem),
            name = field.name
        ),
    }
}

fn bare_pointer(typename: &str, field: &Field) -> SchemaError {
    SchemaError::BarePointerField {
        typename: typename.to_owned(),
        field: field.name.clone(),
    }
}

fn pack_code(typename: &str, field: &Field) -> Result<String, SchemaError> {
    let from = format!("entry.{}", field.name);
    Ok(match &field.ty {
        TypeDesc::Int(_) | TypeDesc::Array { .. } => format!(
            "std::memcpy((dst_byte) + offset, &({from}), sizeof(({from})));\n\
             offset += sizeof(({from}));"
        ),
        TypeDesc::Enum => {
            let tmp = format!("{}_tmp", from.replace('.', "_"));
            format!(
                "uint8_t {tmp} = static_cast<uint8_t>({from});\n\
                 std::memcpy((dst_byte) + offset, &({tmp}), sizeof(({tmp})));\n\
                 offset += sizeof(({tmp}));"
            )
        }
        TypeDesc::Pointer { .. } => return Err(bare_pointer(typename, field)),
        TypeDesc::DynamicArray { .. } => format!(
            "auto _{name}_size_size = sizeof({from}.size);\n\
             std::memcpy((dst_byte + offset), &({from}.size), (_{name}_size_size));\n\
             offset += _{name}_size_size;\n\
             \n\
             auto _{name}_values_size = ({from}.size) * sizeof(*{from}.values);\n\
             // Must align target on a 4-byte boundary. Assuming dst_byte is aligned.\n\
             offset = (offset + 0x03) & ~0x03;\n\
             std::memcpy((dst_byte + offset), ({from}.values), _{name}_values_size);\n\
             offset += _{name}_values_size;",
            name = field.name
        ),
    })
}

fn unpack_code(typename: &str, field: &Field) -> Result<String, SchemaError> {
    let to = format!("entry.{}", field.name);
    Ok(match &field.ty {
        TypeDesc::Int(_) | TypeDesc::Array { .. } => format!(
            "std::memcpy(&({to}), (src_byte) + offset, sizeof(({to})));\n\
             offset += sizeof(({to}));"
        ),
        TypeDesc::Enum => {
            let tmp = format!("{}_tmp", to.replace('.', "_"));
            format!(
                "uint8_t {tmp};\n\
                 std::memcpy(&({tmp}), (src_byte) + offset, sizeof(({tmp})));\n\
                 offset += sizeof(({tmp}));\n\
                 {to} = static_cast<EntryType>({tmp});"
            )
        }
        TypeDesc::Pointer { .. } => return Err(bare_pointer(typename, field)),
        TypeDesc::DynamicArray { .. } => format!(
            "auto _{name}_size_size = sizeof({to}.size);\n\
             std::memcpy(&({to}).size, (src_byte + offset), (_{name}_size_size));\n\
             offset += _{name}_size_size;\n\
             \n\
             // Must align values on a 4-byte boundary. Assuming src_byte is aligned.\n\
             offset = (offset + 0x03) & ~0x03;\n\
             \n\
             // Retains pointer to incoming data!\n\
             ({to}).values = reinterpret_cast<decltype(({to}).values)>(\n\
               (src_byte + offset)\n\
             );\n\
             offset += ({to}).size * sizeof(*({to}).values);",
            name = field.name
        ),
    })
}

fn size_code(typename: &str, field: &Field) -> Result<String, SchemaError> {
    let member = format!("entry.{}", field.name);
    Ok(match &field.ty {
        TypeDesc::Pointer { .. } => return Err(bare_pointer(typename, field)),
        TypeDesc::DynamicArray { .. } => format!(
            "offset += sizeof({member}.size);\n\
             // Must align {member} values on a 4-byte boundary.\n\
             offset = (offset + 0x03) & ~0x03;\n\
             offset += {member}.size * sizeof(*{member}.values);"
        ),
        _ => format!("(offset) += sizeof({member});"),
    })
}

/// One memory format per unique typename, first occurrence wins.
fn unique_formats(entries: &[EntryDescription]) -> Vec<&MemoryFormat> {
    entries
        .iter()
        .map(|x| &x.memory_format)
        .unique_by(|fmt| fmt.typename.clone())
        .collect()
}

fn validate_dynamic_last(fmt: &MemoryFormat) -> Result<(), SchemaError> {
    for (idx, field) in fmt.fields.iter().enumerate() {
        if field.ty.is_dynamic() && idx != fmt.fields.len() - 1 {
            return Err(SchemaError::DynamicArrayNotLast {
                typename: fmt.typename.clone(),
                field: field.name.clone(),
            });
        }
    }
    Ok(())
}

/// Emits the packed record struct header.
#[derive(Clone, Debug)]
pub struct EntryStructsCodegen {
    entries: Vec<EntryDescription>,
}

impl EntryStructsCodegen {
    pub fn new(entries: Vec<EntryDescription>) -> Self {
        Self { entries }
    }

    fn generate_entry_struct(fmt: &MemoryFormat) -> String {
        let template = r#"struct __attribute__((packed)) %%TYPENAME%% {

  static const uint8_t kSerializationType = %%TYPE_ID%%;

%%FIELDS%%

  static void pack(const %%TYPENAME%%& entry, void* dst, size_t size);
  static void unpack(%%TYPENAME%%& entry, const void* src, size_t size);

  static size_t calculateSize(%%TYPENAME%% const& entry);
};
"#;

        let fields = fmt
            .fields
            .iter()
            .map(declaration)
            .collect::<Vec<_>>()
            .join("\n");

        template
            .replace("%%TYPENAME%%", &fmt.typename)
            .replace("%%TYPE_ID%%", &fmt.type_id.to_string())
            .replace("%%FIELDS%%", &indent(&fields))
    }
}

impl Codegen for EntryStructsCodegen {
    fn preferred_filename(&self) -> &'static str {
        "Entry.h"
    }

    fn generate(&self) -> Result<String, SchemaError> {
        let template = r#"// %%SIGNED_SOURCE%%

#include <cstdint>
#include <cstring>
#include <type_traits>
#include <unistd.h>

#pragma once

namespace apptrace {
namespace entries {

%%ENTRIES_STRUCTS%%

uint8_t peek_type(const void* src, size_t len);

} // namespace entries
} // namespace apptrace
"#;

        let structs = unique_formats(&self.entries)
            .into_iter()
            .map(Self::generate_entry_struct)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(template
            .replace("%%ENTRIES_STRUCTS%%", &structs)
            .replace("%%SIGNED_SOURCE%%", SIGNED_SOURCE))
    }
}

/// Emits the pack/unpack/size routine source.
#[derive(Clone, Debug)]
pub struct EntryStructsCppCodegen {
    entries: Vec<EntryDescription>,
}

impl EntryStructsCppCodegen {
    pub fn new(entries: Vec<EntryDescription>) -> Self {
        Self { entries }
    }

    fn generate_pack(fmt: &MemoryFormat) -> Result<String, SchemaError> {
        let template = r#"/* Alignment requirement: dst must be 4-byte aligned. */
void %%TYPENAME%%::pack(const %%TYPENAME%%& entry, void* dst, size_t size) {
  if (size < %%TYPENAME%%::calculateSize(entry)) {
      throw std::out_of_range("Cannot fit %%TYPENAME%% in destination");
  }
  if (dst == nullptr) {
      throw std::invalid_argument("dst == nullptr");
  }
  uint8_t* dst_byte = reinterpret_cast<uint8_t*>(dst);
  *dst_byte = kSerializationType;
  size_t offset = 1;

%%MEMCOPIES%%
}
"#;

        let memcopies = fmt
            .fields
            .iter()
            .map(|f| pack_code(&fmt.typename, f))
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");

        Ok(template
            .replace("%%TYPENAME%%", &fmt.typename)
            .replace("%%MEMCOPIES%%", &indent(&memcopies)))
    }

    fn generate_unpack(fmt: &MemoryFormat) -> Result<String, SchemaError> {
        let template = r#"/* Alignment requirement: src must be 4-byte aligned. */
void %%TYPENAME%%::unpack(%%TYPENAME%%& entry, const void* src, size_t size) {
  if (src == nullptr) {
      throw std::invalid_argument("src == nullptr");
  }
  const uint8_t* src_byte = reinterpret_cast<const uint8_t*>(src);
  if (*src_byte != kSerializationType) {
      throw std::invalid_argument("Serialization type is incorrect");
  }
  size_t offset = 1;
%%MEMCOPIES%%
}
"#;

        let memcopies = fmt
            .fields
            .iter()
            .map(|f| unpack_code(&fmt.typename, f))
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");

        Ok(template
            .replace("%%TYPENAME%%", &fmt.typename)
            .replace("%%MEMCOPIES%%", &indent(&memcopies)))
    }

    fn generate_calcsize(fmt: &MemoryFormat) -> Result<String, SchemaError> {
        let template = r#"size_t %%TYPENAME%%::calculateSize(%%TYPENAME%% const& entry) {
  size_t offset = 1 /*serialization format*/;
%%EXPRESSIONS%%
  return offset;
}
"#;

        let expressions = fmt
            .fields
            .iter()
            .map(|f| size_code(&fmt.typename, f))
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");

        Ok(template
            .replace("%%TYPENAME%%", &fmt.typename)
            .replace("%%EXPRESSIONS%%", &indent(&expressions)))
    }
}

impl Codegen for EntryStructsCppCodegen {
    fn preferred_filename(&self) -> &'static str {
        "Entry.cpp"
    }

    fn generate(&self) -> Result<String, SchemaError> {
        let template = r#"// %%SIGNED_SOURCE%%

#include <cstring>
#include <stdexcept>
#include <apptrace/entries/Entry.h>

namespace apptrace {
namespace entries {

%%ENTRIES_CODE%%

uint8_t peek_type(const void* src, size_t len) {
  const uint8_t* src_byte = reinterpret_cast<const uint8_t*>(src);
  return *src_byte;
}

} // namespace entries
} // namespace apptrace
"#;

        let mut code = Vec::new();
        for fmt in unique_formats(&self.entries) {
            validate_dynamic_last(fmt)?;
            code.push(Self::generate_pack(fmt)?);
            code.push(Self::generate_unpack(fmt)?);
            code.push(Self::generate_calcsize(fmt)?);
        }

        Ok(template
            .replace("%%ENTRIES_CODE%%", &code.join("\n"))
            .replace("%%SIGNED_SOURCE%%", SIGNED_SOURCE))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{config::Config, schema::entry_descriptions};

    fn catalog() -> Vec<EntryDescription> {
        entry_descriptions(&Config::default()).unwrap()
    }

    #[test]
    fn one_struct_per_unique_format() {
        let header = EntryStructsCodegen::new(catalog()).generate().unwrap();
        assert_eq!(header.matches("struct __attribute__((packed))").count(), 3);
        assert!(header.contains("static const uint8_t kSerializationType = 1;"));
        assert!(header.contains("static const uint8_t kSerializationType = 2;"));
        assert!(header.contains("static const uint8_t kSerializationType = 3;"));
        assert!(header.contains("EntryType type;"));
        assert!(header.contains("const int64_t* values;"));
        assert!(header.contains("uint8_t peek_type(const void* src, size_t len);"));
    }

    #[test]
    fn pack_routines_align_dynamic_payloads() {
        let src = EntryStructsCppCodegen::new(catalog()).generate().unwrap();
        assert!(src.contains("void StandardEntry::pack"));
        assert!(src.contains("void FramesEntry::unpack"));
        assert!(src.contains("size_t BytesEntry::calculateSize"));
        assert!(src.contains("offset = (offset + 0x03) & ~0x03;"));
        assert!(src.contains("Retains pointer to incoming data!"));
        // Enum fields are narrowed before the copy
        assert!(src.contains("static_cast<uint8_t>(entry.type)"));
    }

    #[test]
    fn bare_pointer_fields_are_rejected() {
        use crate::schema::{Field, SchemaRegistry};

        let mut registry = SchemaRegistry::new();
        let fmt = registry
            .define(
                "PointyEntry",
                vec![Field::new(
                    "data",
                    TypeDesc::Pointer { elem: IntType::U8 },
                )],
            )
            .unwrap();
        let entries = vec![EntryDescription {
            id: 0,
            name: "POINTY".to_owned(),
            memory_format: fmt,
        }];
        let err = EntryStructsCppCodegen::new(entries).generate().unwrap_err();
        assert!(matches!(err, SchemaError::BarePointerField { .. }));
    }
}
