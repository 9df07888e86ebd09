//! Target and macro identifiers, and the ordered macro set of a target.

use std::collections::HashSet;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{RegistryError, RegistryResult};

/// Stable, human-readable label of a target, e.g. `serde_derive 1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TargetLabel(String);

impl<'de> Deserialize<'de> for TargetLabel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl TargetLabel {
    /// Create a label, rejecting empty or whitespace-only input.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidLabel`] if the label is blank.
    pub fn new(label: impl Into<String>) -> RegistryResult<Self> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(RegistryError::InvalidLabel(
                "target label must not be empty".into(),
            ));
        }
        Ok(Self(label))
    }

    /// Create a label from a literal known to be valid.
    #[must_use]
    pub fn from_static(label: &str) -> Self {
        Self(label.to_string())
    }

    /// Label text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TargetLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Name of the export that implements a macro, e.g. `expand_derive_serialize`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacroId(String);

impl MacroId {
    /// Wrap an export name.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Export name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacroId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MacroId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One selectable macro of a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroEntry {
    /// Dropdown text, e.g. `#[derive(Serialize)]`.
    pub label: String,
    /// Export invoked on the target's module.
    pub id: MacroId,
}

/// The macros a target exposes, in display order.
///
/// Decoded from a JSON object mapping label to export name. Key order in the
/// source document is preserved and labels must be unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroSet {
    entries: Vec<MacroEntry>,
}

impl MacroSet {
    /// Build a set from `(label, id)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidLabel`] if a label repeats.
    pub fn from_pairs<I, L, M>(pairs: I) -> RegistryResult<Self>
    where
        I: IntoIterator<Item = (L, M)>,
        L: Into<String>,
        M: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for (label, id) in pairs {
            let label = label.into();
            if !seen.insert(label.clone()) {
                return Err(RegistryError::InvalidLabel(format!(
                    "duplicate macro label: {label}"
                )));
            }
            entries.push(MacroEntry {
                label,
                id: MacroId::new(id),
            });
        }
        Ok(Self { entries })
    }

    /// Decode the JSON metadata document of `target`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Metadata`] if the document is not an object of
    /// strings or repeats a label.
    pub fn from_json(target: &TargetLabel, json: &str) -> RegistryResult<Self> {
        serde_json::from_str(json).map_err(|e| RegistryError::Metadata {
            target: target.clone(),
            message: e.to_string(),
        })
    }

    /// Entries in display order.
    pub fn iter(&self) -> impl Iterator<Item = &MacroEntry> {
        self.entries.iter()
    }

    /// Whether `id` is exported by this set.
    #[must_use]
    pub fn contains(&self, id: &MacroId) -> bool {
        self.entries.iter().any(|e| &e.id == id)
    }

    /// First entry displayed as `label`.
    #[must_use]
    pub fn by_label(&self, label: &str) -> Option<&MacroEntry> {
        self.entries.iter().find(|e| e.label == label)
    }

    /// First entry invoking `id`.
    #[must_use]
    pub fn by_id(&self, id: &MacroId) -> Option<&MacroEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    /// Number of macros.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set has no macros.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'de> Deserialize<'de> for MacroSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MacroSetVisitor;

        impl<'de> Visitor<'de> for MacroSetVisitor {
            type Value = MacroSet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping macro labels to export names")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((label, id)) = map.next_entry::<String, String>()? {
                    pairs.push((label, id));
                }
                MacroSet::from_pairs(pairs).map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_map(MacroSetVisitor)
    }
}
