//! Keyword heuristics that label a record's study design and subjects.

use std::sync::OnceLock;

use bioeq_common::{ArticleKind, Classification, LiteratureRecord, SubjectKind};
use regex::Regex;

/// Checked against the title first, in this order.
const TITLE_KINDS: &[(ArticleKind, &[&str])] = &[
    (ArticleKind::Review, &["systematic review", "meta-analysis", "meta analysis", "review", "overview"]),
    (ArticleKind::Methodology, &["method", "simulation", "assay", "validation", "sample size", "modeling", "modelling"]),
    (ArticleKind::Trial, &["randomized", "randomised", "crossover", "cross-over", "bioequivalence", "trial", "pharmacokinetic study"]),
    (ArticleKind::Observational, &["cohort", "retrospective", "observational", "case-control", "registry", "real-world"]),
];

/// Checked against the whole text when the title was inconclusive.
const TEXT_KINDS: &[(ArticleKind, &[&str])] = &[
    (ArticleKind::Review, &["systematic review", "meta-analysis", "we reviewed", "literature review"]),
    (ArticleKind::Trial, &["randomized", "randomised", "crossover", "cross-over", "open-label", "two-period", "double-blind", "trial"]),
    (ArticleKind::Observational, &["cohort", "retrospective", "observational", "case-control", "registry"]),
    (ArticleKind::Methodology, &["simulation", "monte carlo", "assay", "validated method", "sample size calculation"]),
];

const SUBJECT_KEYWORDS: &[(SubjectKind, &[&str])] = &[
    (SubjectKind::Human, &["healthy volunteers", "volunteers", "subjects", "patients", "participants", "human", "humans", "men", "women", "adults", "children"]),
    (SubjectKind::Animal, &["rats", "rat", "mice", "mouse", "dogs", "beagle", "rabbits", "monkeys", "pigs", "porcine", "murine", "animal", "animals"]),
    (SubjectKind::InVitro, &["in vitro", "cell line", "cell lines", "microsomes", "hepatocytes", "caco-2", "dissolution"]),
];

fn compiled<K: Copy>(table: &'static [(K, &'static [&'static str])]) -> Vec<(K, Regex)> {
    table
        .iter()
        .filter_map(|(kind, words)| keyword_regex(words).map(|re| (*kind, re)))
        .collect()
}

fn keyword_regex(words: &[&str]) -> Option<Regex> {
    let alternation = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    match Regex::new(&format!(r"(?i)\b(?:{alternation})\b")) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(keywords = %alternation, error = %e, "Skipping invalid keyword group");
            None
        }
    }
}

fn title_kinds() -> &'static [(ArticleKind, Regex)] {
    static RE: OnceLock<Vec<(ArticleKind, Regex)>> = OnceLock::new();
    RE.get_or_init(|| compiled(TITLE_KINDS))
}

fn text_kinds() -> &'static [(ArticleKind, Regex)] {
    static RE: OnceLock<Vec<(ArticleKind, Regex)>> = OnceLock::new();
    RE.get_or_init(|| compiled(TEXT_KINDS))
}

fn subject_kinds() -> &'static [(SubjectKind, Regex)] {
    static RE: OnceLock<Vec<(SubjectKind, Regex)>> = OnceLock::new();
    RE.get_or_init(|| compiled(SUBJECT_KEYWORDS))
}

pub fn classify_article(title: &str, text: &str) -> ArticleKind {
    title_kinds()
        .iter()
        .find(|(_, re)| re.is_match(title))
        .or_else(|| text_kinds().iter().find(|(_, re)| re.is_match(text)))
        .map(|(kind, _)| *kind)
        .unwrap_or(ArticleKind::Other)
}

/// The kind with the most keyword hits; ties go to the earlier table entry.
pub fn classify_subject(text: &str) -> Option<SubjectKind> {
    let mut best: Option<(SubjectKind, usize)> = None;
    for (kind, re) in subject_kinds() {
        let hits = re.find_iter(text).count();
        if hits > 0 && best.map_or(true, |(_, n)| hits > n) {
            best = Some((*kind, hits));
        }
    }
    best.map(|(kind, _)| kind)
}

pub fn classify(record: &LiteratureRecord) -> Classification {
    let text = record.text();
    Classification {
        article_kind: classify_article(&record.title, &text),
        subject_kind: classify_subject(&text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crossover_in_volunteers() {
        let title = "Bioequivalence of two aspirin tablets";
        let text = "A randomized two-period crossover study in 24 healthy volunteers.";
        assert_eq!(classify_article(title, text), ArticleKind::Trial);
        assert_eq!(classify_subject(text), Some(SubjectKind::Human));
    }

    #[test]
    fn test_review_title_wins_over_trial_words() {
        let title = "Intra-subject variability of NSAIDs: a systematic review";
        assert_eq!(classify_article(title, "We pooled randomized crossover trials."), ArticleKind::Review);
    }

    #[test]
    fn test_animal_study() {
        let text = "Plasma exposure was measured in male Wistar rats after oral dosing of rats.";
        assert_eq!(classify_subject(text), Some(SubjectKind::Animal));
    }

    #[test]
    fn test_every_keyword_group_compiles() {
        assert_eq!(title_kinds().len(), TITLE_KINDS.len());
        assert_eq!(text_kinds().len(), TEXT_KINDS.len());
        assert_eq!(subject_kinds().len(), SUBJECT_KEYWORDS.len());
        assert!(keyword_regex(&["caco-2", "in vitro"]).is_some());
    }

    #[test]
    fn test_no_cues() {
        assert_eq!(classify_article("Notes", "Nothing here."), ArticleKind::Other);
        assert_eq!(classify_subject("Nothing here."), None);
    }

    #[test]
    fn test_word_boundaries() {
        // "treatment" must not count as "men"
        assert_eq!(classify_subject("Treatment response."), None);
    }

    #[test]
    fn test_classify_record() {
        let rec = LiteratureRecord {
            id: "1".into(),
            title: "Retrospective cohort of warfarin users".into(),
            abstract_text: "Data from 300 patients.".into(),
            year: None,
            authors: vec![],
            url: String::new(),
            source: "test".into(),
            classification: None,
        };
        let c = classify(&rec);
        assert_eq!(c.article_kind, ArticleKind::Observational);
        assert_eq!(c.subject_kind, Some(SubjectKind::Human));
    }
}
