use std::path::{Path, PathBuf};

use crate::filter::FilterVariant;
use crate::types::MediaKind;

/// Cache partition key: a canonical species name under one filter variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpeciesKey {
    pub species: String,
    pub filter: FilterVariant,
}

impl SpeciesKey {
    pub fn new(species: impl Into<String>, filter: FilterVariant) -> Self {
        Self {
            species: species.into(),
            filter,
        }
    }

    /// `<species><filter>`, e.g. `Cardinalis cardinalis0`.
    pub fn dir_name(&self) -> String {
        format!("{}{}", clean_dir_name(&self.species), self.filter.to_int())
    }
}

/// `<root>/<images|songs>/<species><filter>`.
pub fn species_dir(root: &Path, kind: MediaKind, key: &SpeciesKey) -> PathBuf {
    root.join(kind.as_str()).join(key.dir_name())
}

/// Remove characters that are invalid in directory names on common
/// filesystems, and any that would let a name escape its parent.
pub fn clean_dir_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

/// Numeric candidate index encoded in a cached file's stem, if any.
pub fn asset_index(path: &Path) -> Option<usize> {
    path.file_stem()?.to_str()?.parse().ok()
}
