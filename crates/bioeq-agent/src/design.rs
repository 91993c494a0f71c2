//! Bioequivalence study design recommendation from an estimated CVintra.

use serde::{Deserialize, Serialize};

/// CVintra (%) assumed when no estimate is available.
pub const DEFAULT_CVINTRA: f64 = 25.0;
pub const DROPOUT_RATE: f64 = 0.15;
pub const WASHOUT_HALF_LIVES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdministrationMode {
    #[default]
    Fasted,
    Fed,
    /// Separate fasted and fed studies.
    FastedAndFed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignRecommendation {
    pub design: String,
    pub cvintra: f64,
    pub default_cv_used: bool,
    pub mode: AdministrationMode,
    pub studies: u32,
    /// Subjects before dropout allowance.
    pub base_sample_size: u32,
    pub sample_size: u32,
    pub dropout_rate: f64,
    pub washout_half_lives: u32,
    pub complexity: Complexity,
}

pub fn recommend_design(cvintra: Option<f64>, mode: AdministrationMode) -> DesignRecommendation {
    let default_cv_used = cvintra.is_none();
    let cv = cvintra.unwrap_or(DEFAULT_CVINTRA);

    let (design, base, complexity) = if cv <= 20.0 {
        ("2x2 crossover", 12, Complexity::Low)
    } else if cv <= 30.0 {
        ("2x2 or 2x4 replicate crossover", 32, Complexity::Medium)
    } else {
        ("replicate crossover or parallel", 60, Complexity::High)
    };

    let (base, studies) = match mode {
        AdministrationMode::FastedAndFed => (base * 3 / 2, 2),
        AdministrationMode::Fasted | AdministrationMode::Fed => (base, 1),
    };

    DesignRecommendation {
        design: design.to_string(),
        cvintra: cv,
        default_cv_used,
        mode,
        studies,
        base_sample_size: base,
        // floor(base × 1.15)
        sample_size: base * 115 / 100,
        dropout_rate: DROPOUT_RATE,
        washout_half_lives: WASHOUT_HALF_LIVES,
        complexity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_low_variability() {
        let r = recommend_design(Some(15.2), AdministrationMode::Fasted);
        assert_eq!(r.design, "2x2 crossover");
        assert_eq!(r.complexity, Complexity::Low);
        assert_eq!(r.sample_size, 13);
        assert!(!r.default_cv_used);
    }

    #[test]
    fn test_band_edges() {
        assert_eq!(recommend_design(Some(20.0), AdministrationMode::Fed).complexity, Complexity::Low);
        assert_eq!(recommend_design(Some(30.0), AdministrationMode::Fed).complexity, Complexity::Medium);
        let high = recommend_design(Some(30.1), AdministrationMode::Fed);
        assert_eq!(high.complexity, Complexity::High);
        assert_eq!(high.sample_size, 69);
    }

    #[test]
    fn test_default_cv_when_missing() {
        let r = recommend_design(None, AdministrationMode::Fasted);
        assert!(r.default_cv_used);
        assert_eq!(r.cvintra, DEFAULT_CVINTRA);
        assert_eq!(r.design, "2x2 or 2x4 replicate crossover");
        assert_eq!(r.sample_size, 36);
    }

    #[test]
    fn test_fasted_and_fed_doubles_up() {
        let sizes: Vec<(u32, u32)> = [10.0, 25.0, 45.0]
            .iter()
            .map(|cv| {
                let r = recommend_design(Some(*cv), AdministrationMode::FastedAndFed);
                assert_eq!(r.studies, 2);
                (r.base_sample_size, r.sample_size)
            })
            .collect();
        assert_eq!(sizes, vec![(18, 20), (48, 55), (90, 103)]);
    }

    #[test]
    fn test_washout_and_dropout() {
        let r = recommend_design(Some(22.0), AdministrationMode::Fed);
        assert_eq!(r.washout_half_lives, 5);
        assert_eq!(r.dropout_rate, 0.15);
    }
}
