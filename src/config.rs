use serde::Deserialize;
use std::collections::BTreeSet;

/// Bytes available to a record within a 128-byte ring-buffer slot; the
/// slot overhead, stream id, size-plus-next flag and serialization format
/// byte are spoken for.
pub const TARGET_SIZE: usize = 128 - 4 - 4 - 1 - 1;

/// Entry kinds in catalog order. The position of a name is its public
/// numeric entry-kind id, so this list is append-only.
pub const DEFAULT_NAMES: &[&str] = &[
    "UNKNOWN_TYPE",
    "UI_INPUT_START",
    "UI_INPUT_END",
    "UI_UPDATE_START",
    "UI_UPDATE_END",
    "NET_ADDED",
    "NET_ERROR",
    "NET_END",
    "NET_RESPONSE",
    "NET_RETRY",
    "NET_START",
    "NET_COUNTER",
    "CALL_START",
    "CALL_END",
    "ASYNC_CALL",
    "SERV_CONN",
    "SERV_DISCONN",
    "SERV_END",
    "ADAPTER_NOTIFY",
    "ASYNC_TASK_PRE",
    "ASYNC_TASK_BACKGROUND",
    "ASYNC_TASK_POST",
    "ASYNC_TASK_END",
    "NETWORK_OP_START",
    "NETWORK_OP_END",
    "MARK_FLAG",
    "MARK_START",
    "MARK_STOP",
    "MARK_FAIL",
    "MARK_CANCEL",
    "MARK_PUSH",
    "MARK_POP",
    "LIFECYCLE_APPLICATION_START",
    "LIFECYCLE_APPLICATION_END",
    "LIFECYCLE_ACTIVITY_START",
    "LIFECYCLE_ACTIVITY_END",
    "LIFECYCLE_SERVICE_START",
    "LIFECYCLE_SERVICE_END",
    "LIFECYCLE_BROADCAST_RECEIVER_START",
    "LIFECYCLE_BROADCAST_RECEIVER_END",
    "LIFECYCLE_CONTENT_PROVIDER_START",
    "LIFECYCLE_CONTENT_PROVIDER_END",
    "LIFECYCLE_FRAGMENT_START",
    "LIFECYCLE_FRAGMENT_END",
    "LIFECYCLE_VIEW_START",
    "LIFECYCLE_VIEW_END",
    "TRACE_ABORT",
    "TRACE_END",
    "TRACE_START",
    "TRACE_BACKWARDS",
    "TRACE_TIMEOUT",
    "COUNTER",
    "STACK_FRAME",
    "TEST_CLOCK_SYNC_START",
    "TEST_CLOCK_SYNC_END",
    "QPL_START",
    "QPL_END",
    "QPL_CANCEL",
    "QPL_NOTE",
    "QPL_POINT",
    "TRACE_ANNOTATION",
    "WAIT_START",
    "WAIT_END",
    "WAIT_SIGNAL",
    "STRING_KEY",
    "STRING_VALUE",
    "QPL_TAG",
    "QPL_ANNOTATION",
    "TRACE_THREAD_NAME",
    "TRACE_PRE_END",
    "TRACE_THREAD_PRI",
    "MAJOR_FAULT",
    "YARN_LOST_RECORDS",
    "CLASS_LOAD",
    "NATIVE_STACK_FRAME",
    "NATIVE_LIB_MAPPING",
    "JAVASCRIPT_STACK_FRAME",
    "MESSAGE_START",
    "MESSAGE_END",
    "CLASS_VALUE",
    "HTTP2_REQUEST_INITIATED",
    "HTTP2_FRAME_HEADER",
    "HTTP2_WINDOW_UPDATE",
    "HTTP2_PRIORITY",
    "PROCESS_LIST",
    "IO_START",
    "IO_END",
    "CPU_COUNTER",
    "STRING_NAME",
    "JAVA_FRAME_NAME",
    "MAPPING",
];

/// Entry kinds whose records carry a stack-frame payload.
pub const DEFAULT_STACK_FRAME_ENTRIES: &[&str] = &[
    "STACK_FRAME",
    "NATIVE_STACK_FRAME",
    "JAVASCRIPT_STACK_FRAME",
];

/// Entry kinds whose records carry a raw byte payload.
pub const DEFAULT_BYTES_ENTRIES: &[&str] = &[
    "STRING_KEY",
    "STRING_VALUE",
    "STRING_NAME",
    "MAPPING",
    "CLASS_VALUE",
];

/// The entry catalog the code generator works from.
///
/// This can be constructed from a yaml description or taken as the built-in
/// default catalog via [`Config::default`].
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Entry kind names; the index of a name is its entry-kind id.
    pub names: Vec<String>,
    /// Names serialized with the stack-frames memory format.
    #[serde(default)]
    pub stack_frame_entries: BTreeSet<String>,
    /// Names serialized with the byte-payload memory format.
    #[serde(default)]
    pub bytes_entries: BTreeSet<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            names: DEFAULT_NAMES.iter().map(|s| (*s).to_owned()).collect(),
            stack_frame_entries: DEFAULT_STACK_FRAME_ENTRIES
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            bytes_entries: DEFAULT_BYTES_ENTRIES
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
        }
    }
}

impl Config {
    pub fn is_stack_frame_entry(&self, name: &str) -> bool {
        self.stack_frame_entries.contains(name)
    }

    pub fn is_bytes_entry(&self, name: &str) -> bool {
        self.bytes_entries.contains(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn yaml_config() {
        let cfg: Config = serde_yaml::from_str(
            r#"
names:
  - UNKNOWN_TYPE
  - MARK_PUSH
  - MARK_POP
  - STACK_FRAME
  - STRING_KEY
stack-frame-entries:
  - STACK_FRAME
bytes-entries:
  - STRING_KEY
"#,
        )
        .unwrap();
        assert_eq!(cfg.names.len(), 5);
        assert!(cfg.is_stack_frame_entry("STACK_FRAME"));
        assert!(cfg.is_bytes_entry("STRING_KEY"));
        assert!(!cfg.is_bytes_entry("MARK_PUSH"));
    }

    #[test]
    fn default_catalog() {
        let cfg = Config::default();
        assert_eq!(cfg.names[0], "UNKNOWN_TYPE");
        assert!(cfg.is_bytes_entry("STRING_VALUE"));
        assert!(cfg.is_stack_frame_entry("NATIVE_STACK_FRAME"));
        // Names must be unique for id assignment to be meaningful
        let unique: std::collections::BTreeSet<_> = cfg.names.iter().collect();
        assert_eq!(unique.len(), cfg.names.len());
        assert_eq!(TARGET_SIZE, 118);
    }
}
