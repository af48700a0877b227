//! Class-label normalization.
//!
//! Timetable cells hold free text such as `"VI A"`, `"viii b"` or `"7"`.
//! Only labels that reduce to at least three letters once case and
//! whitespace are folded count as class codes; everything else (period
//! numbers, day abbreviations, stray initials, `"XI"`) is a free period.

use crate::{ClassCode, Error, RawCell, Result};
use std::collections::{BTreeMap, BTreeSet};
use unicode_normalization::UnicodeNormalization;

/// Minimum number of letters in a class code.
pub const MIN_CLASS_CODE_LEN: usize = 3;

/// Apply the base class-code rule to a raw label.
///
/// Folds compatibility forms (full-width letters, Roman numeral signs),
/// uppercases, and removes all whitespace. Returns `None` unless the result
/// is purely alphabetic and at least [`MIN_CLASS_CODE_LEN`] characters long.
///
/// Removing whitespace can leave combining marks out of canonical order,
/// so the result is normalized once more.
pub(crate) fn canonical_form(raw: &str) -> Option<String> {
    let folded: String = raw
        .nfkc()
        .collect::<String>()
        .to_uppercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .nfkc()
        .collect();

    if folded.chars().count() < MIN_CLASS_CODE_LEN {
        return None;
    }
    if !folded.chars().all(char::is_alphabetic) {
        return None;
    }

    Some(folded)
}

/// Mapping from a normalized class label to its canonical code.
///
/// Schools often spell the same section two ways (`"VIIIIA"` for
/// `"VIIIA"`). The table is supplied from outside, usually as JSON, and is
/// flattened on load so every lookup is a single step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasTable {
    entries: BTreeMap<String, ClassCode>,
}

impl AliasTable {
    /// Create an empty alias table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(raw, canonical)` pairs.
    ///
    /// Both sides go through the base class-code rule. Chains are collapsed
    /// to their final target; cycles and invalid entries are rejected.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut direct: BTreeMap<String, String> = BTreeMap::new();

        for (raw, canonical) in pairs {
            let (raw, canonical) = (raw.as_ref(), canonical.as_ref());
            let key = canonical_form(raw).ok_or_else(|| {
                Error::InvalidAlias(format!("'{}' is not a valid class label", raw))
            })?;
            let value = canonical_form(canonical).ok_or_else(|| {
                Error::InvalidAlias(format!(
                    "'{}' (alias target of '{}') is not a valid class code",
                    canonical, raw
                ))
            })?;

            if key == value {
                continue;
            }
            if let Some(existing) = direct.get(&key) {
                if existing != &value {
                    return Err(Error::InvalidAlias(format!(
                        "'{}' maps to both '{}' and '{}'",
                        key, existing, value
                    )));
                }
            }
            direct.insert(key, value);
        }

        let mut entries = BTreeMap::new();
        for key in direct.keys() {
            let mut seen = BTreeSet::from([key.as_str()]);
            let mut target = &direct[key];
            while let Some(next) = direct.get(target) {
                if !seen.insert(target.as_str()) {
                    return Err(Error::InvalidAlias(format!(
                        "alias cycle through '{}'",
                        key
                    )));
                }
                target = next;
            }
            entries.insert(key.clone(), ClassCode::from_normalized(target.clone()));
        }

        log::debug!("Loaded {} class aliases", entries.len());
        Ok(Self { entries })
    }

    /// Parse a JSON object of `{"RAW": "CANONICAL"}` entries.
    pub fn from_json(json: &str) -> Result<Self> {
        let map: BTreeMap<String, String> = serde_json::from_str(json)
            .map_err(|e| Error::InvalidAlias(format!("alias table is not a JSON object of strings: {}", e)))?;
        Self::from_pairs(map)
    }

    /// Canonical code for an already-normalized label, if aliased.
    pub fn resolve(&self, normalized: &str) -> Option<&ClassCode> {
        self.entries.get(normalized)
    }

    /// Number of aliases.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table has no aliases.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Normalizer that turns raw cells into class codes.
#[derive(Debug, Clone, Default)]
pub struct ClassNormalizer {
    aliases: AliasTable,
}

impl ClassNormalizer {
    /// Create a normalizer with no alias table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given alias table after the base rule.
    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    /// The configured alias table.
    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Normalize a free-text class label.
    ///
    /// - Blank input is `None`
    /// - Case and whitespace are folded (`"vi a"` becomes `"VIA"`)
    /// - Anything not purely alphabetic or shorter than three letters is `None`
    /// - Aliased labels map to their canonical code
    pub fn normalize_label(&self, raw: &str) -> Option<ClassCode> {
        let code = canonical_form(raw)?;
        match self.aliases.resolve(&code) {
            Some(canonical) => Some(canonical.clone()),
            None => Some(ClassCode::from_normalized(code)),
        }
    }

    /// Normalize a sheet cell. Numeric and boolean cells are never class codes.
    pub fn normalize_cell(&self, cell: &RawCell) -> Option<ClassCode> {
        match cell {
            RawCell::Text(text) => self.normalize_label(text),
            RawCell::Empty | RawCell::Number(_) | RawCell::Bool(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(raw: &str) -> Option<String> {
        ClassNormalizer::new()
            .normalize_label(raw)
            .map(|c| c.as_str().to_string())
    }

    #[test]
    fn test_strips_spaces_and_uppercases() {
        assert_eq!(norm("VI A"), Some("VIA".to_string()));
        assert_eq!(norm("  viii   b "), Some("VIIIB".to_string()));
        assert_eq!(norm("Ix\tC"), Some("IXC".to_string()));
    }

    #[test]
    fn test_rejects_short_labels() {
        assert_eq!(norm("XI"), None);
        assert_eq!(norm("X I"), None);
        assert_eq!(norm("A"), None);
        assert_eq!(norm(""), None);
        assert_eq!(norm("   "), None);
    }

    #[test]
    fn test_rejects_numeric_and_mixed() {
        assert_eq!(norm("123"), None);
        assert_eq!(norm("7 A"), None);
        assert_eq!(norm("VI-A"), None);
        assert_eq!(norm("VIA1"), None);
        assert_eq!(norm("VI.A"), None);
    }

    #[test]
    fn test_folds_compatibility_forms() {
        // Full-width letters
        assert_eq!(norm("ＶＩＡ"), Some("VIA".to_string()));
        // Roman numeral sign VI followed by a section letter
        assert_eq!(norm("\u{2165} B"), Some("VIB".to_string()));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let normalizer = ClassNormalizer::new();
        for raw in ["VI A", "viii b", "ＶＩＡ", "x  c", "Nursery", "ª b c", "XI", "12"] {
            let once = normalizer.normalize_label(raw);
            let twice = once
                .as_ref()
                .and_then(|c| normalizer.normalize_label(c.as_str()));
            assert_eq!(once, twice, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_spaced_ligatures_are_idempotent() {
        // These ligatures fold to a space followed by combining marks.
        let normalizer = ClassNormalizer::new();
        for ligature in '\u{FC5E}'..='\u{FC63}' {
            let raw: String = std::iter::repeat(ligature).take(3).collect();
            let once = normalizer.normalize_label(&raw);
            assert!(once.is_some(), "ligature {:?} was rejected", ligature);
            let twice = once
                .as_ref()
                .and_then(|c| normalizer.normalize_label(c.as_str()));
            assert_eq!(once, twice, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_numeric_cells_are_never_classes() {
        let normalizer = ClassNormalizer::new();
        assert_eq!(normalizer.normalize_cell(&RawCell::Number(610.0)), None);
        assert_eq!(normalizer.normalize_cell(&RawCell::Bool(true)), None);
        assert_eq!(normalizer.normalize_cell(&RawCell::Empty), None);
        assert_eq!(
            normalizer.normalize_cell(&RawCell::Text("ix a".to_string())),
            ClassCode::parse("IXA")
        );
    }

    #[test]
    fn test_alias_table_maps_after_base_rule() {
        let aliases = AliasTable::from_pairs([("VIII IA", "VIII A")]).unwrap();
        let normalizer = ClassNormalizer::new().with_aliases(aliases);

        assert_eq!(
            normalizer.normalize_label("viiii a").map(|c| c.to_string()),
            Some("VIIIA".to_string())
        );
        assert_eq!(
            normalizer.normalize_label("VIIIA").map(|c| c.to_string()),
            Some("VIIIA".to_string())
        );
    }

    #[test]
    fn test_alias_chains_are_flattened() {
        let aliases = AliasTable::from_json(r#"{"SIXA": "VIAA", "VIAA": "VIA"}"#).unwrap();
        assert_eq!(aliases.len(), 2);
        assert_eq!(aliases.resolve("SIXA").map(ClassCode::as_str), Some("VIA"));

        // Canonical targets are never keys, so normalization stays idempotent.
        let normalizer = ClassNormalizer::new().with_aliases(aliases);
        let once = normalizer.normalize_label("six a").unwrap();
        assert_eq!(normalizer.normalize_label(once.as_str()), Some(once));
    }

    #[test]
    fn test_alias_cycle_is_rejected() {
        let err = AliasTable::from_pairs([("VIA", "VIB"), ("VIB", "VIA")]).unwrap_err();
        assert!(matches!(err, Error::InvalidAlias(_)));
    }

    #[test]
    fn test_alias_invalid_entries_are_rejected() {
        assert!(AliasTable::from_pairs([("XI", "XIA")]).is_err());
        assert!(AliasTable::from_pairs([("XIA", "11A")]).is_err());
        assert!(AliasTable::from_json("[1, 2]").is_err());
        assert!(AliasTable::from_pairs([("VIA", "VIB"), ("vi a", "VIC")]).is_err());
    }

    #[test]
    fn test_identity_alias_is_ignored() {
        let aliases = AliasTable::from_pairs([("vi a", "VIA")]).unwrap();
        assert!(aliases.is_empty());
    }
}
