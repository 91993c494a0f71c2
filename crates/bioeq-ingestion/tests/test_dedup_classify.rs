//! Deduplication and classification over records as the sources produce them.

use bioeq_common::{ArticleKind, LiteratureRecord, SubjectKind};
use bioeq_ingestion::classify::classify;
use bioeq_ingestion::dedup::{deduplicate, DedupConfig};
use bioeq_ingestion::sources::pubmed::parse_pubmed_xml;

const TWO_ARTICLES: &str = r#"<PubmedArticleSet>
  <PubmedArticle><MedlineCitation><PMID>1001</PMID><Article>
    <Journal><JournalIssue><PubDate><Year>2016</Year></PubDate></JournalIssue></Journal>
    <ArticleTitle>Bioequivalence of two aspirin formulations in healthy volunteers.</ArticleTitle>
    <Abstract><AbstractText>A randomized crossover study. The intra-subject CV: 15.2% for Cmax.</AbstractText></Abstract>
  </Article></MedlineCitation></PubmedArticle>
  <PubmedArticle><MedlineCitation><PMID>1002</PMID><Article>
    <Journal><JournalIssue><PubDate><MedlineDate>2021 Jan-Feb</MedlineDate></PubDate></JournalIssue></Journal>
    <ArticleTitle>Bioequivalence of Two Aspirin Formulations in Healthy Volunteers</ArticleTitle>
    <Abstract><AbstractText>A randomized crossover study. The intra-subject CV: 15.2% for Cmax.</AbstractText></Abstract>
  </Article></MedlineCitation></PubmedArticle>
</PubmedArticleSet>"#;

#[test]
fn test_parsed_duplicates_collapse_to_newest() {
    let records = parse_pubmed_xml(TWO_ARTICLES).unwrap();
    assert_eq!(records.len(), 2);

    let kept = deduplicate(records, &DedupConfig::default());
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].id, "1002");
    assert_eq!(kept[0].year, Some(2021));
}

#[test]
fn test_classified_records_survive_dedup() {
    let records: Vec<LiteratureRecord> = parse_pubmed_xml(TWO_ARTICLES)
        .unwrap()
        .into_iter()
        .map(|r| {
            let c = classify(&r);
            r.with_classification(c)
        })
        .collect();

    let kept = deduplicate(records, &DedupConfig::default());
    assert_eq!(kept[0].article_kind(), Some(ArticleKind::Trial));
    assert_eq!(kept[0].subject_kind(), Some(SubjectKind::Human));
}
