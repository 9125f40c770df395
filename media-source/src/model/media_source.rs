//! Selectable media source

use serde::{Deserialize, Serialize};

use super::{EndpointId, PackageName};

/// A source the user can select
///
/// Owned by the selection store; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaSourceHandle {
    /// Application identity of the source
    pub package: PackageName,
    /// Browse endpoint, absent for sources that cannot be browsed
    pub browse_endpoint: Option<EndpointId>,
    /// Human readable name
    pub display_name: Option<String>,
}

impl MediaSourceHandle {
    /// Source without a browse endpoint
    pub fn new(package: impl Into<PackageName>) -> Self {
        Self {
            package: package.into(),
            browse_endpoint: None,
            display_name: None,
        }
    }

    /// Source that can be browsed through `endpoint`
    pub fn browsable(package: impl Into<PackageName>, endpoint: impl Into<EndpointId>) -> Self {
        Self {
            package: package.into(),
            browse_endpoint: Some(endpoint.into()),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn supports_browse(&self) -> bool {
        self.browse_endpoint.is_some()
    }

    /// Display name, falling back to the package name
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .unwrap_or_else(|| self.package.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browsable_source() {
        let source = MediaSourceHandle::browsable("com.example.radio", "com.example.radio/.Browse");
        assert!(source.supports_browse());
        assert_eq!(source.name(), "com.example.radio");
    }

    #[test]
    fn test_display_name() {
        let source = MediaSourceHandle::new("com.example.podcasts").with_display_name("Podcasts");
        assert!(!source.supports_browse());
        assert_eq!(source.name(), "Podcasts");
    }
}
