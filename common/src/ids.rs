//! Validated identifiers for keyspaces, datacenters, and store servers.
//!
//! Client delivery channels are addressed by the joined string
//! `keyspace:datacenter:server`, and fanout matches on the prefix
//! `keyspace:datacenter:`. That scheme is only sound if the separator can
//! never appear inside a component, so each identifier rejects `:` (and
//! the empty string) at construction time rather than trusting callers.

/// Separator used when joining identifiers into a registry key.
pub const KEY_SEPARATOR: char = ':';

/// Error returned when an identifier fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidNameError {
    pub message: String,
}

impl std::error::Error for InvalidNameError {}

impl std::fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn validate(kind: &str, value: &str) -> Result<(), InvalidNameError> {
    if value.is_empty() {
        return Err(InvalidNameError {
            message: format!("{} must not be empty", kind),
        });
    }
    if value.contains(KEY_SEPARATOR) {
        return Err(InvalidNameError {
            message: format!("{} must not contain '{}': {:?}", kind, KEY_SEPARATOR, value),
        });
    }
    Ok(())
}

macro_rules! identifier {
    ($(#[$doc:meta])* $name:ident, $kind:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self, InvalidNameError> {
                let value = value.into();
                validate($kind, &value)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = InvalidNameError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }
    };
}

identifier!(
    /// Name of a logical dataset partitioned across store nodes.
    KeyspaceName,
    "keyspace name"
);

identifier!(
    /// Topology grouping of store nodes within a keyspace.
    DatacenterName,
    "datacenter name"
);

identifier!(
    /// Identity of one store server within a datacenter.
    ServerAddress,
    "server address"
);
