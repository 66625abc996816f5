//! Storefront - Main Entry Point

use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::{RuntimeMode, StaticTenantTable, StorefrontConfig, start_server};

fn cli() -> Command {
    Command::new("storefront")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Multi-tenant NFT storefront")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("storefront.toml"),
        )
        .arg(
            Arg::new("tenants")
                .short('t')
                .long("tenants")
                .value_name("FILE")
                .help("Tenant table, overriding the configured path"),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .value_parser(["production", "development"])
                .help("Apply or skip the development override layers"),
        )
        .arg(
            Arg::new("check-tenants")
                .long("check-tenants")
                .help("Validate the tenant table, list its hosts and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("routes")
                .long("routes")
                .help("Print available routes and exit")
                .action(clap::ArgAction::SetTrue),
        )
}

fn load_config(matches: &ArgMatches) -> StorefrontConfig {
    let config_path = matches
        .get_one::<String>("config")
        .map_or("storefront.toml", String::as_str);
    let mut config = StorefrontConfig::from_file(config_path).unwrap_or_else(|e| {
        warn!(path = %config_path, error = %e, "Config not loaded; using defaults");
        StorefrontConfig::default()
    });

    if let Some(path) = matches.get_one::<String>("tenants") {
        config.tenants.path.clone_from(path);
    }
    match matches.get_one::<String>("mode").map(String::as_str) {
        Some("development") => config.mode = RuntimeMode::Development,
        Some("production") => config.mode = RuntimeMode::Production,
        _ => {}
    }
    config
}

fn check_tenants(config: &StorefrontConfig) -> Result<()> {
    let table = StaticTenantTable::from_file(&config.tenants.path)?;
    let mut hosts: Vec<&str> = table.hostnames().collect();
    hosts.sort_unstable();
    println!("{} tenant(s) in {}", table.len(), config.tenants.path);
    for host in hosts {
        println!("  {host}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let matches = cli().get_matches();

    if matches.get_flag("routes") {
        storefront::server::print_routes();
        return Ok(());
    }

    let config = load_config(&matches);

    if matches.get_flag("check-tenants") {
        return check_tenants(&config);
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        address = %config.server_address(),
        mode = ?config.mode,
        tenants = %config.tenants.path,
        mainnet = %config.read_api.mainnet_base_url,
        testnet = %config.read_api.testnet_base_url,
        social_store = if config.social.database_url.is_some() { "postgres" } else { "memory" },
        "Starting storefront"
    );

    if let Err(e) = start_server(config).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
