#[cfg(test)]
mod tests {
    use crate::config::model::*;
    use std::collections::HashMap;

    fn create_service_route() -> RouteConfig {
        RouteConfig {
            path: Some("/simple/**".to_string()),
            service_id: Some("simple".to_string()),
            url: None,
            strip_prefix: true,
            add_proxy_headers: None,
        }
    }

    fn create_url_route() -> RouteConfig {
        RouteConfig {
            path: Some("/test/**".to_string()),
            service_id: None,
            url: Some("http://localhost:7777/local".to_string()),
            strip_prefix: true,
            add_proxy_headers: None,
        }
    }

    fn create_test_config() -> Config {
        let mut routes = HashMap::new();
        routes.insert("simple".to_string(), create_service_route());
        routes.insert("local".to_string(), create_url_route());

        Config {
            routes,
            ..Config::default()
        }
    }

    #[test]
    fn test_config_validation_success() {
        let config = create_test_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_route_without_target() {
        let mut config = create_test_config();
        config.routes.get_mut("simple").unwrap().service_id = None;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("either 'service_id' or 'url'"));
    }

    #[test]
    fn test_config_validation_route_with_both_targets() {
        let mut config = create_test_config();
        config.routes.get_mut("simple").unwrap().url =
            Some("http://example.com".to_string());

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("exactly one is allowed"));
    }

    #[test]
    fn test_config_validation_invalid_url_scheme() {
        let mut config = create_test_config();
        config.routes.get_mut("local").unwrap().url = Some("ftp://example.com".to_string());

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("invalid url"));
    }

    #[test]
    fn test_config_validation_path_must_start_with_slash() {
        let mut config = create_test_config();
        config.routes.get_mut("simple").unwrap().path = Some("simple/**".to_string());

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("invalid path"));
    }

    #[test]
    fn test_config_validation_mapping_format() {
        let mut config = create_test_config();
        config.proxy.mapping = "api".to_string();
        assert!(config.validate().is_err());

        config.proxy.mapping = "/api/".to_string();
        assert!(config.validate().is_err());

        config.proxy.mapping = "/api".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_poll_interval_nonzero() {
        let mut config = create_test_config();
        config.discovery.poll_interval_seconds = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("poll_interval_seconds"));
    }

    #[test]
    fn test_effective_path_defaults_to_route_name() {
        let route = RouteConfig {
            path: None,
            service_id: Some("users".to_string()),
            ..RouteConfig::default()
        };
        assert_eq!(route.effective_path("users"), "/users/**");

        let explicit = create_url_route();
        assert_eq!(explicit.effective_path("local"), "/test/**");
    }

    #[test]
    fn test_parse_toml_config() {
        let toml_str = r#"
            [server]
            bind_address = "0.0.0.0:9000"

            [proxy]
            mapping = "/api"
            strip_mapping = true
            ignored_services = ["admin-service"]

            [loadbalance]
            strategy = "weighted_random"
            prefer_ip_address = true
            local_zone = "myzone.mydomain.com"

            [routes.simple]
            service_id = "simple"

            [routes.local]
            path = "/test/**"
            url = "http://localhost:7777/local"
            strip_prefix = false
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_address, "0.0.0.0:9000");
        assert_eq!(config.proxy.mapping, "/api");
        assert!(config.proxy.strip_mapping);
        assert!(config.is_ignored_service("admin-service"));
        assert!(!config.is_ignored_service("simple"));
        assert_eq!(
            config.loadbalance.strategy,
            LoadBalanceStrategy::WeightedRandom
        );
        assert_eq!(
            config.loadbalance.local_zone.as_deref(),
            Some("myzone.mydomain.com")
        );

        let local = config.get_route("local").unwrap();
        assert_eq!(local.url.as_deref(), Some("http://localhost:7777/local"));
        assert!(!local.strip_prefix);

        let simple = config.get_route("simple").unwrap();
        assert_eq!(simple.effective_path("simple"), "/simple/**");
    }

    #[test]
    fn test_defaults_applied() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:8080");
        assert!(config.proxy.add_proxy_headers);
        assert!(config.loadbalance.approximate_zone_from_hostname);
        assert!(!config.loadbalance.prefer_ip_address);
        assert_eq!(config.loadbalance.strategy, LoadBalanceStrategy::RoundRobin);
        assert_eq!(config.loadbalance.stats_window_size, 100);
    }
}
