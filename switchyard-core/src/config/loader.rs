use crate::config::model::Config;

/// 配置文件查找顺序：CONFIG_PATH 环境变量 > ./config.toml > /etc/switchyard/config.toml
pub fn get_config_path() -> String {
    if let Ok(path) = std::env::var("CONFIG_PATH") {
        return path;
    }

    for candidate in ["config.toml", "/etc/switchyard/config.toml"] {
        if std::path::Path::new(candidate).exists() {
            return candidate.to_string();
        }
    }

    "config.toml".to_string()
}

pub fn load_config() -> Result<Config, anyhow::Error> {
    load_config_from_path(&get_config_path())
}

pub fn load_config_from_path(config_path: &str) -> Result<Config, anyhow::Error> {
    let config_str = std::fs::read_to_string(config_path)?;
    let config: Config = toml::from_str(&config_str)?;
    config.validate()?;
    Ok(config)
}
