//! Name resolution for vendor car names
//!
//! P1Doks labels datapacks with free-text car names that rarely match the
//! folder names iRacing expects under the setups directory. This module maps
//! a vendor name to a canonical folder identifier through three comparison
//! tiers applied in strict order — exact (case-insensitive), containment,
//! token overlap — with a deterministic sanitizing fallback when nothing
//! matches. Resolution is a pure function: no I/O, no shared state, and the
//! result depends only on the candidate and the mapping's iteration order.
//!
//! Known precision limitation: the token-overlap tier treats a word as
//! matching when either word contains the other, with no minimum word
//! length, so short model suffixes can over-match. This mirrors the
//! behavior the mapping files were generated against.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// Built-in base mapping: official iRacing car names to setup folder ids
const BASE_MAPPING_JSON: &str = include_str!("../../data/iracing-cars.json");

/// Built-in override mapping: P1Doks-specific names, wins on collision
const OVERRIDE_MAPPING_JSON: &str = include_str!("../../data/p1doks-overrides.json");

/// Ordered display-name to folder-identifier table
///
/// Iteration order is the JSON document order of the source file; the
/// resolver's tie-breaks depend on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceMapping {
    entries: Vec<(String, String)>,
}

/// On-disk mapping file shape
#[derive(Debug, Deserialize)]
struct MappingFile {
    #[allow(dead_code)]
    #[serde(default)]
    description: Option<String>,
    mappings: ReferenceMapping,
}

/// Outcome of resolving one candidate name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Reference key that matched, present only when `matched`
    pub matched_name: Option<String>,
    /// Folder identifier, always populated
    pub folder: String,
    /// False when the sanitizing fallback produced the folder
    pub matched: bool,
}

impl ReferenceMapping {
    /// Build a mapping from (name, folder) pairs, keeping their order
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    /// Parse a mapping file (`{"mappings": {name: folder, ...}}`)
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let file: MappingFile = serde_json::from_str(json)?;
        Ok(file.mappings)
    }

    /// The built-in base mapping merged with the built-in overrides
    pub fn builtin() -> Self {
        let base = Self::from_json(BASE_MAPPING_JSON).expect("built-in base mapping is valid");
        let overrides =
            Self::from_json(OVERRIDE_MAPPING_JSON).expect("built-in override mapping is valid");
        Self::merged(&base, &overrides)
    }

    /// The built-in base mapping alone (used when regenerating overrides)
    pub fn builtin_base() -> Self {
        Self::from_json(BASE_MAPPING_JSON).expect("built-in base mapping is valid")
    }

    /// Merge a base mapping with a higher-priority override mapping
    ///
    /// Override entries win on key collision without disturbing the base
    /// order; override-only keys are appended after the base entries.
    pub fn merged(base: &Self, overrides: &Self) -> Self {
        let mut entries: Vec<(String, String)> = base
            .entries
            .iter()
            .map(|(name, folder)| {
                let folder = overrides
                    .get(name)
                    .unwrap_or(folder.as_str())
                    .to_string();
                (name.clone(), folder)
            })
            .collect();

        for (name, folder) in &overrides.entries {
            if base.get(name).is_none() {
                entries.push((name.clone(), folder.clone()));
            }
        }

        Self { entries }
    }

    /// Exact (case-sensitive) lookup
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, folder)| folder.as_str())
    }

    /// Entries in iteration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, folder)| (name.as_str(), folder.as_str()))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// JSON objects must keep their document order, so the mapping deserializes
// through a visitor into a Vec instead of a map type.
impl<'de> Deserialize<'de> for ReferenceMapping {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedMapVisitor;

        impl<'de> Visitor<'de> for OrderedMapVisitor {
            type Value = ReferenceMapping;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of display name to folder identifier")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, folder)) = access.next_entry::<String, String>()? {
                    entries.push((name, folder));
                }
                Ok(ReferenceMapping { entries })
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor)
    }
}

/// Resolve a vendor car name to a setup folder identifier
///
/// Tiers are tried in strict order and the first success wins; no score is
/// carried between tiers. Ties within a tier keep the earliest entry in
/// mapping order.
pub fn resolve(candidate: &str, mapping: &ReferenceMapping) -> Resolution {
    let candidate_upper = candidate.to_uppercase();

    // Tier 1: exact match, case-insensitive
    for (name, folder) in mapping.iter() {
        if name.to_uppercase() == candidate_upper {
            return Resolution {
                matched_name: Some(name.to_string()),
                folder: folder.to_string(),
                matched: true,
            };
        }
    }

    // Tier 2: containment either direction, case-insensitive
    for (name, folder) in mapping.iter() {
        let name_upper = name.to_uppercase();
        if candidate_upper.contains(&name_upper) || name_upper.contains(&candidate_upper) {
            return Resolution {
                matched_name: Some(name.to_string()),
                folder: folder.to_string(),
                matched: true,
            };
        }
    }

    // Tier 3: token overlap, at least two matching words, strictly higher
    // score required to displace the first-seen best
    let candidate_words: Vec<String> = candidate_upper
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let mut best: Option<(&str, &str)> = None;
    let mut best_score = 0usize;

    for (name, folder) in mapping.iter() {
        let name_words: Vec<String> = name
            .to_uppercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let score = candidate_words
            .iter()
            .filter(|word| {
                name_words
                    .iter()
                    .any(|nw| nw.contains(word.as_str()) || word.contains(nw.as_str()))
            })
            .count();

        if score >= 2 && score > best_score {
            best_score = score;
            best = Some((name, folder));
        }
    }

    if let Some((name, folder)) = best {
        return Resolution {
            matched_name: Some(name.to_string()),
            folder: folder.to_string(),
            matched: true,
        };
    }

    // Tier 4: sanitizing fallback, flagged for manual review
    Resolution {
        matched_name: None,
        folder: sanitize_folder(candidate),
        matched: false,
    }
}

/// Derive a filesystem-safe folder identifier from a free-text name
///
/// Lower-cases, strips everything but lowercase letters, digits, and
/// whitespace, then removes the whitespace.
pub fn sanitize_folder(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .filter(|c| !c.is_whitespace())
        .collect()
}
