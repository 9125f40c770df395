//! Identity types for media sources, browse endpoints and sessions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate common ID type implementations
macro_rules! impl_id_type {
    ($name:ident) => {
        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name::new(s)
            }
        }
    };
}

/// Application identity of a media source (e.g. "com.example.radio")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageName(String);

impl_id_type!(PackageName);

/// Browse-service connection target
///
/// Usually the component name of the browse service, in the
/// "package/.ServiceClass" form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointId(String);

impl_id_type!(EndpointId);

impl EndpointId {
    /// Package part of a "package/class" endpoint, if present
    pub fn package(&self) -> Option<PackageName> {
        self.0
            .split_once('/')
            .map(|(package, _)| package)
            .filter(|package| !package.is_empty())
            .map(PackageName::new)
    }
}

/// Token identifying one playback session of the media subsystem
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(String);

impl_id_type!(SessionToken);
