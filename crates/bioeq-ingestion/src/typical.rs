//! Local table of typical CVintra values, the last evidence-free fallback.

use std::collections::HashMap;

/// Term → typical CVintra (%) lookup.
pub trait TypicalValueTable: Send + Sync {
    fn lookup(&self, term: &str) -> Option<f64>;
}

/// Approximate within-subject CVs for Cmax of frequently studied drugs.
const BUILTIN: &[(&str, f64)] = &[
    ("amlodipine",    10.0),
    ("aspirin",       15.0),
    ("atorvastatin",  32.0),
    ("clopidogrel",   45.0),
    ("esomeprazole",  38.0),
    ("ibuprofen",     18.0),
    ("levothyroxine", 10.0),
    ("metformin",     22.0),
    ("omeprazole",    40.0),
    ("paracetamol",   15.0),
    ("acetaminophen", 15.0),
    ("simvastatin",   35.0),
    ("tacrolimus",    20.0),
    ("warfarin",      10.0),
];

/// Built-in defaults merged with configured overrides. Keys are matched
/// case-insensitively after trimming.
#[derive(Debug, Clone, Default)]
pub struct StaticTypicalValues {
    values: HashMap<String, f64>,
}

impl StaticTypicalValues {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        Self::new().with_overrides(BUILTIN.iter().map(|(k, v)| (k.to_string(), *v)))
    }

    /// Overrides replace built-in entries with the same key.
    pub fn with_overrides<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        for (term, value) in overrides {
            self.values.insert(normalize_key(&term), value);
        }
        self
    }

    pub fn with(self, term: &str, value: f64) -> Self {
        self.with_overrides([(term.to_string(), value)])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl TypicalValueTable for StaticTypicalValues {
    fn lookup(&self, term: &str) -> Option<f64> {
        self.values.get(&normalize_key(term)).copied()
    }
}

fn normalize_key(term: &str) -> String {
    term.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup_is_case_insensitive() {
        let table = StaticTypicalValues::builtin();
        assert_eq!(table.lookup(" Aspirin "), Some(15.0));
        assert_eq!(table.lookup("zzx-obscure-123"), None);
    }

    #[test]
    fn test_overrides_replace_builtin() {
        let table = StaticTypicalValues::builtin()
            .with_overrides([("ASPIRIN".to_string(), 17.5), ("newdrug".to_string(), 28.0)]);
        assert_eq!(table.lookup("aspirin"), Some(17.5));
        assert_eq!(table.lookup("NewDrug"), Some(28.0));
        assert_eq!(table.len(), BUILTIN.len() + 1);
    }

    #[test]
    fn test_empty_table() {
        assert!(StaticTypicalValues::new().is_empty());
        assert_eq!(StaticTypicalValues::new().lookup("aspirin"), None);
    }
}
