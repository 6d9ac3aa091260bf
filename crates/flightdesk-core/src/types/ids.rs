use serde::{Deserialize, Serialize};
use std::ops::Deref;
use uuid::Uuid;

/// Macro to define a string-backed newtype ID.
///
/// Thread and run ids are chosen by the browser and may be any string
/// (`"thread-1"`, a timestamp, a UUID), so the value is stored verbatim and
/// serialized back unchanged. Server-generated ids use a random UUID with
/// an optional prefix.
macro_rules! define_id_type {
    ($(#[$attr:meta])* $name:ident, $prefix:expr) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an ID from any string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Creates a new random ID.
            pub fn random() -> Self {
                let prefix: &str = $prefix;
                if prefix.is_empty() {
                    Self(Uuid::new_v4().to_string())
                } else {
                    let short = &Uuid::new_v4().simple().to_string()[..12];
                    Self(format!("{prefix}{short}"))
                }
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` for an empty or whitespace-only id.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid.to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self::new(s))
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

define_id_type!(
    /// Conversation thread chosen by the caller.
    ThreadId,
    ""
);
define_id_type!(
    /// One end-to-end agent invocation inside a thread.
    RunId,
    ""
);
define_id_type!(
    /// Assistant message streamed during a run.
    MessageId,
    "msg_"
);
define_id_type!(
    /// A tool call ID.
    ///
    /// Providers choose their own format (OpenAI uses `call_xxx`); ids we
    /// mint follow the same shape.
    ToolCallId,
    "call_"
);
define_id_type!(
    /// Step inside a run (analysis step, workflow step).
    StepId,
    "step_"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_random_has_provider_shape() {
        let id = ToolCallId::random();
        assert!(id.starts_with("call_"));
        assert_eq!(id.len(), 5 + 12);
    }

    #[test]
    fn thread_id_random_is_uuid() {
        let id = ThreadId::random();
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn arbitrary_strings_round_trip() {
        let id = RunId::new("my-custom-run-id-123");
        let serialized = serde_json::to_string(&id).unwrap();
        assert_eq!(serialized, "\"my-custom-run-id-123\"");

        let back: RunId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(back, id);
        assert!(back == "my-custom-run-id-123");
    }

    #[test]
    fn blank_ids_are_detected() {
        assert!(ThreadId::new("").is_blank());
        assert!(ThreadId::new("   ").is_blank());
        assert!(!ThreadId::new("t1").is_blank());
    }

    #[test]
    fn ids_hash_by_value() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(MessageId::new("m1"), "first");
        assert_eq!(map.get(&MessageId::from("m1")), Some(&"first"));
    }
}
