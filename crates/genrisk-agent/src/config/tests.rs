#[cfg(test)]
mod tests {
    use super::super::*;
    use genrisk_common::ModelScope;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.storage.registry_dir, "./data/registry");
        assert_eq!(config.training.solver, TrainerConfig::default());
        assert!(config.training.train_on_start);
        assert!(!config.training.train_global);
        assert_eq!(config.cache.ttl_secs, None);
    }

    #[test]
    fn test_training_section_flattens_solver_settings() {
        let config = Config::from_toml(
            r#"
            [training]
            c = 0.5
            max_iter = 300
            train_global = true
            "#,
        )
        .unwrap();
        assert_eq!(config.training.solver.c, 0.5);
        assert_eq!(config.training.solver.max_iter, 300);
        assert_eq!(config.training.solver.imbalance_threshold, 0.1);
        assert!(config.training.train_global);
    }

    #[test]
    fn test_cache_warm_scopes() {
        let config = Config::from_toml(
            r#"
            [cache]
            ttl_secs = 600
            warm_global = true
            warm_diseases = [3, 1]
            "#,
        )
        .unwrap();
        assert_eq!(config.cache.ttl_secs, Some(600));
        assert_eq!(
            config.cache.warm_scopes(),
            vec![ModelScope::Global, ModelScope::Disease(3), ModelScope::Disease(1)]
        );
    }

    #[test]
    fn test_non_positive_c_rejected() {
        assert!(Config::from_toml("[training]\nc = 0.0\n").is_err());
    }
}
