use super::{indent, Codegen, SIGNED_SOURCE};
use crate::{error::SchemaError, schema::EntryDescription};

/// Emits the entry-kind enum header.
#[derive(Clone, Debug)]
pub struct EntryTypesCodegen {
    entries: Vec<EntryDescription>,
}

impl EntryTypesCodegen {
    pub fn new(entries: Vec<EntryDescription>) -> Self {
        Self { entries }
    }

    fn generate_entries_enum(&self) -> String {
        let name_id_entries = self
            .entries
            .iter()
            .map(|x| format!("{} = {},", x.name, x.id))
            .collect::<Vec<_>>()
            .join("\n");

        format!("enum EntryType {{\n{}\n}};\n", indent(&name_id_entries))
    }
}

impl Codegen for EntryTypesCodegen {
    fn preferred_filename(&self) -> &'static str {
        "EntryType.h"
    }

    fn generate(&self) -> Result<String, SchemaError> {
        let template = r#"// %%SIGNED_SOURCE%%

#pragma once

namespace apptrace {
namespace entries {
%%ENTRIES_ENUM%%

const char* to_string(EntryType type);
} // namespace entries
} // namespace apptrace
"#;

        Ok(template
            .replace("%%ENTRIES_ENUM%%", &self.generate_entries_enum())
            .replace("%%SIGNED_SOURCE%%", SIGNED_SOURCE))
    }
}

/// Emits the entry-kind `to_string` source.
#[derive(Clone, Debug)]
pub struct EntryTypesCppCodegen {
    entries: Vec<EntryDescription>,
}

impl EntryTypesCppCodegen {
    pub fn new(entries: Vec<EntryDescription>) -> Self {
        Self { entries }
    }

    fn generate_to_string(&self) -> String {
        let cases = self
            .entries
            .iter()
            .map(|x| format!("case {0}: return \"{0}\";", x.name))
            .collect::<Vec<_>>()
            .join("\n");
        let cases = indent(&indent(&cases));

        format!(
            "const char* to_string(EntryType type) {{\n  switch(type) {{\n{cases}\n    default: throw std::invalid_argument(\"Unknown entry type\");\n  }}\n}}\n"
        )
    }
}

impl Codegen for EntryTypesCppCodegen {
    fn preferred_filename(&self) -> &'static str {
        "EntryType.cpp"
    }

    fn generate(&self) -> Result<String, SchemaError> {
        let template = r#"// %%SIGNED_SOURCE%%

#include <stdexcept>
#include <apptrace/entries/EntryType.h>

namespace apptrace {
namespace entries {

%%TO_STRING%%
} // namespace entries
} // namespace apptrace
"#;

        Ok(template
            .replace("%%TO_STRING%%", &self.generate_to_string())
            .replace("%%SIGNED_SOURCE%%", SIGNED_SOURCE))
    }
}
