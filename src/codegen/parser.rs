use super::{indent, Codegen, SIGNED_SOURCE};
use crate::{error::SchemaError, schema::EntryDescription};
use itertools::Itertools;

/// Emits the dispatch parser header: an abstract visitor with one method
/// per record shape, and a `parse` switch over the serialization tags.
#[derive(Clone, Debug)]
pub struct ParserCodegen {
    entries: Vec<EntryDescription>,
}

impl ParserCodegen {
    pub fn new(entries: Vec<EntryDescription>) -> Self {
        Self { entries }
    }

    fn unique_formats(&self) -> Vec<&crate::schema::MemoryFormat> {
        self.entries
            .iter()
            .map(|x| &x.memory_format)
            .unique_by(|fmt| fmt.typename.clone())
            .collect()
    }

    fn generate_visitor_methods(&self) -> String {
        self.unique_formats()
            .into_iter()
            .map(|fmt| format!("virtual void visit(const {}& entry) = 0;", fmt.typename))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn generate_parse_method(&self) -> String {
        let case_template = r#"case %%ID%%: {
  %%TYPE%% data;
  %%TYPE%%::unpack(data, src, size);
  visitor.visit(data);
  break;
}
"#;

        let cases = self
            .unique_formats()
            .into_iter()
            .map(|fmt| {
                case_template
                    .replace("%%ID%%", &fmt.type_id.to_string())
                    .replace("%%TYPE%%", &fmt.typename)
            })
            .collect::<Vec<_>>()
            .join("\n");
        let cases = indent(&indent(&cases));

        let template = r#"static void parse(const void* src, size_t size, EntryVisitor& visitor) {
  uint8_t type = entries::peek_type(src, size);
  switch (type) {
%%CASES%%
    default: throw std::invalid_argument("Unknown type in parse");
  }
}
"#;

        template.replace("%%CASES%%", &cases)
    }
}

impl Codegen for ParserCodegen {
    fn preferred_filename(&self) -> &'static str {
        "EntryParser.h"
    }

    fn generate(&self) -> Result<String, SchemaError> {
        let template = r#"// %%SIGNED_SOURCE%%

#pragma once

#include <cstdint>
#include <cstring>
#include <unistd.h>

#include <stdexcept>
#include <ostream>

#include <apptrace/entries/EntryType.h>
#include <apptrace/entries/Entry.h>

namespace apptrace {
namespace entries {

class EntryVisitor {
public:

%%ENTRY_VISITOR_METHODS%%
};

class EntryParser {
public:

%%PARSE_METHOD%%
};

} // namespace entries
} // namespace apptrace
"#;

        Ok(template
            .replace(
                "%%ENTRY_VISITOR_METHODS%%",
                &indent(&self.generate_visitor_methods()),
            )
            .replace("%%PARSE_METHOD%%", &indent(&self.generate_parse_method()))
            .replace("%%SIGNED_SOURCE%%", SIGNED_SOURCE))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{config::Config, schema::entry_descriptions};

    #[test]
    fn parse_switch_covers_the_closed_tag_set() {
        let entries = entry_descriptions(&Config::default()).unwrap();
        let header = ParserCodegen::new(entries).generate().unwrap();

        assert!(header.contains("virtual void visit(const StandardEntry& entry) = 0;"));
        assert!(header.contains("virtual void visit(const FramesEntry& entry) = 0;"));
        assert!(header.contains("virtual void visit(const BytesEntry& entry) = 0;"));
        assert!(header.contains("case 1:"));
        assert!(header.contains("case 2:"));
        assert!(header.contains("case 3:"));
        // Unknown tags surface to the caller
        assert!(header.contains("default: throw std::invalid_argument"));
    }
}
