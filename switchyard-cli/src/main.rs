//! Switchyard CLI Tool
//!
//! Command line interface for managing the Switchyard gateway

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use switchyard_core::discovery::StaticDiscoveryClient;
use switchyard_proxy::{RouteLocator, RouteTarget};

#[derive(Parser)]
#[command(name = "switchyard-cli")]
#[command(about = "A CLI tool for managing the Switchyard gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    ValidateConfig {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Show the route table a configuration produces
    ShowRoutes {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
        /// Query a running gateway instead of building locally
        #[arg(short, long)]
        gateway: Option<String>,
    },
    /// Generate example configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config_example.toml")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ValidateConfig { config } => {
            println!("Validating configuration file: {}", config);
            match switchyard_core::config::loader::load_config_from_path(&config) {
                Ok(cfg) => {
                    println!("✅ Configuration is valid");
                    println!("  - {} explicit routes configured", cfg.routes.len());
                    println!("  - {} ignored services", cfg.proxy.ignored_services.len());
                    println!("  - load balance strategy: {:?}", cfg.loadbalance.strategy);
                    if !cfg.proxy.mapping.is_empty() {
                        println!(
                            "  - global mapping '{}' ({})",
                            cfg.proxy.mapping,
                            if cfg.proxy.strip_mapping {
                                "stripped before forwarding"
                            } else {
                                "retained in forwarded path"
                            }
                        );
                    }
                }
                Err(e) => {
                    eprintln!("❌ Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::ShowRoutes { config, gateway } => {
            if let Some(gateway) = gateway {
                show_remote_routes(&gateway).await?;
            } else {
                show_local_routes(&config).await?;
            }
        }
        Commands::GenerateConfig { output } => {
            println!("Generating configuration file: {}", output);
            generate_config_file(&output)?;
            println!("✅ Configuration file generated successfully");
        }
    }

    Ok(())
}

/// 本地构建路由表并打印
///
/// 没有注册中心可查，只包含显式配置的路由；发现的服务在运行
/// 的网关上才会出现。
async fn show_local_routes(config_path: &str) -> Result<()> {
    let config = switchyard_core::config::loader::load_config_from_path(config_path)?;
    let locator = RouteLocator::new(
        Arc::new(config),
        Arc::new(StaticDiscoveryClient::new()),
    );
    let table = locator.routes().await?;

    println!("🗺  Route Table ({} routes)", table.len());
    println!("==================");
    for route in table.routes() {
        let target = match &route.target {
            RouteTarget::ServiceId(service) => format!("service '{}'", service),
            RouteTarget::Url(url) => format!("url {}", url),
        };
        println!(
            "{}  {} -> {} (strip_prefix: {})",
            route.id, route.path, target, route.strip_prefix
        );
    }
    println!();
    println!("Note: discovered services appear only on a running gateway (--gateway)");
    Ok(())
}

/// 从运行中的网关查询路由表
async fn show_remote_routes(gateway: &str) -> Result<()> {
    let url = format!("{}/admin/routes", gateway.trim_end_matches('/'));
    println!("Querying gateway: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;
    let response = client.get(&url).send().await?;
    let status = response.status();
    if !status.is_success() {
        eprintln!("❌ Gateway answered {}", status);
        std::process::exit(1);
    }

    let body: serde_json::Value = response.json().await?;
    println!("🗺  Route Table ({} routes)", body["count"]);
    println!("==================");
    if let Some(routes) = body["routes"].as_array() {
        for route in routes {
            println!(
                "{}  {} -> {:?} (strip_prefix: {})",
                route["id"].as_str().unwrap_or("?"),
                route["path"].as_str().unwrap_or("?"),
                route["target"],
                route["strip_prefix"]
            );
        }
    }
    Ok(())
}

/// 生成配置文件
fn generate_config_file(output_path: &str) -> Result<()> {
    let config_content = r#"# Switchyard Gateway Configuration File
# This is a basic configuration example

[server]
bind_address = "127.0.0.1:8080"

[proxy]
# Global path prefix; empty means routes match from the root
mapping = ""
strip_mapping = false
add_proxy_headers = true
ignored_services = []
request_timeout_seconds = 30

[discovery]
poll_interval_seconds = 30

[loadbalance]
strategy = "round_robin"
approximate_zone_from_hostname = true
prefer_ip_address = false
refresh_interval_seconds = 30
stats_window_size = 100

# Explicit Routes
# A route targets either a discovered service (load balanced) or a literal URL.
# Discovered services without an explicit route get '/<service>/**' automatically.

[routes.users]
service_id = "users-service"
# path defaults to "/users/**"

[routes.legacy]
path = "/legacy/**"
url = "http://localhost:7777/legacy"
strip_prefix = true
"#;

    std::fs::write(output_path, config_content)?;
    Ok(())
}
