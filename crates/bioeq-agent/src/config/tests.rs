#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::pipeline::FallbackPolicy;

    fn with_email() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.pubmed.email = Some("lab@example.org".into());
        cfg
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.pipeline.fetch_timeout_secs, 30);
        assert_eq!(cfg.pipeline.search_limit, 20);
        assert_eq!(cfg.dedup.similarity_threshold, 0.85);
        assert_eq!(cfg.cache.query_ttl_secs, 24 * 3600);
        assert!(cfg.typical_values.is_empty());
        assert_eq!(cfg.pipeline.fallback, FallbackPolicy::default());
    }

    #[test]
    fn test_sections_parse() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [pubmed]
            email = "lab@example.org"

            [secondary]
            enabled = false

            [aggregation]
            method = "median"

            [pipeline]
            fetch_timeout_secs = 10
            [pipeline.fallback]
            steps = ["literature", "typical_value"]

            [typical_values]
            "drug x" = 27.5
            "#,
        )
        .unwrap();
        assert!(!cfg.secondary.enabled);
        assert_eq!(cfg.pipeline.fetch_timeout_secs, 10);
        assert_eq!(cfg.pipeline.fallback.steps.len(), 2);
        assert_eq!(cfg.typical_values.get("drug x"), Some(&27.5));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = AppConfig::from_toml_str("[pipeline\nfetch_timeout_secs = ").unwrap_err();
        assert!(matches!(err, BioeqError::ConfigParse(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_env_overrides_replace_file_values() {
        let mut cfg = AppConfig::default();
        cfg.pubmed.email = Some("file@example.org".into());
        cfg.llm.api_key = Some("from-file".into());
        cfg.apply_env_overrides(|k| match k {
            "NCBI_API_KEY" => Some("abc123".into()),
            "NCBI_EMAIL" => Some("env@example.org".into()),
            "BIOEQ_LLM_API_KEY" => Some("  ".into()),
            _ => None,
        });
        assert_eq!(cfg.pubmed.api_key.as_deref(), Some("abc123"));
        assert_eq!(cfg.pubmed.email.as_deref(), Some("env@example.org"));
        // blank variable leaves the file value alone
        assert_eq!(cfg.llm.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_missing_email_rejected_only_with_literature_step() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.pipeline.fallback.steps = vec![FallbackStep::Secondary, FallbackStep::TypicalValue];
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = with_email();
        cfg.ranking.article_kind = 0.9;
        assert!(cfg.validate().is_err());

        let mut cfg = with_email();
        cfg.dedup.similarity_threshold = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = with_email();
        cfg.pipeline.fetch_timeout_secs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = with_email();
        cfg.aggregation.bounds.min_value = 200.0;
        assert!(cfg.validate().is_err());

        let mut cfg = with_email();
        cfg.typical_values.insert("odd".into(), 400.0);
        assert!(cfg.validate().is_err());

        assert!(with_email().validate().is_ok());
    }
}
