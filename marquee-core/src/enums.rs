//! Enum types for MARQUEE entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error when parsing an enum from its string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for EnumParseError {}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Lowercase wire/storage form.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = EnumParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(EnumParseError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum!(
    /// Entity type discriminator used in cache keys and errors.
    EntityType, "entity type" {
        Content => "content",
        Media => "media",
    }
);

string_enum!(
    /// Editorial lifecycle of a Content item. Only published content is discoverable.
    LifecycleState, "lifecycle state" {
        Draft => "draft",
        Published => "published",
    }
);

string_enum!(
    /// Kind of media asset attached to a Content item.
    MediaType, "media type" {
        Audio => "audio",
        Video => "video",
    }
);

string_enum!(
    /// Where the media bytes live.
    MediaSource, "media source" {
        /// Uploaded by the team; the locator is a storage path.
        Upload => "upload",
        /// Hosted elsewhere; the locator is a URL.
        External => "external",
    }
);

string_enum!(
    /// Who supplies the media.
    MediaProvider, "media provider" {
        Team => "team",
        Youtube => "youtube",
    }
);

string_enum!(
    /// Operation carried by a reindex job.
    JobOperation, "job operation" {
        Upsert => "upsert",
        Delete => "delete",
    }
);

impl Default for LifecycleState {
    fn default() -> Self {
        LifecycleState::Draft
    }
}

impl Default for MediaProvider {
    fn default() -> Self {
        MediaProvider::Team
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Published".parse::<LifecycleState>(), Ok(LifecycleState::Published));
        assert_eq!(" VIDEO ".parse::<MediaType>(), Ok(MediaType::Video));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "ready".parse::<LifecycleState>().unwrap_err();
        assert_eq!(err.kind, "lifecycle state");
        assert!(err.to_string().contains("ready"));
    }

    #[test]
    fn test_serde_uses_lowercase() {
        let json = serde_json::to_string(&JobOperation::Upsert).unwrap();
        assert_eq!(json, "\"upsert\"");
        let parsed: MediaSource = serde_json::from_str("\"external\"").unwrap();
        assert_eq!(parsed, MediaSource::External);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(LifecycleState::default(), LifecycleState::Draft);
        assert_eq!(MediaProvider::default(), MediaProvider::Team);
    }
}
