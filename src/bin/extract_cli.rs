//! extract-cli — 品牌提取管线的命令行演示工具
//!
//! Usage:
//!   extract-cli <url> [client-id]     Run one extraction and print the envelope
//!   extract-cli --health              Print the aggregated health report
//!
//! Environment:
//!   BRANDLENS_RATE_LIMIT, BRANDLENS_RATE_WINDOW_SECS,
//!   BRANDLENS_BREAKER_FAILURE_THRESHOLD, BRANDLENS_BREAKER_RESET_SECS,
//!   BRANDLENS_CACHE_TTL_SECS, BRANDLENS_ADMIN_TOKEN
//!   RUST_LOG for log filtering (default: info)

use brandlens::client::ExtractorBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let client = ExtractorBuilder::new().build()?;

    match args[1].as_str() {
        "--health" => {
            let report = client.health().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "help" | "--help" | "-h" => print_usage(),
        url => {
            let client_id = args.get(2).map(String::as_str).unwrap_or("extract-cli");
            let response = client.extract(url, client_id).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.success {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn print_usage() {
    println!(
        r#"extract-cli — brandlens 命令行工具

USAGE:
    extract-cli <url> [client-id]    Extract the brand profile for a URL
    extract-cli --health             Print the aggregated health report
    extract-cli help                 Show this help message

ENVIRONMENT:
    RUST_LOG                         Log filter (default: info)
    BRANDLENS_RATE_LIMIT             Requests allowed per window
    BRANDLENS_RATE_WINDOW_SECS       Rate window length in seconds
    BRANDLENS_CACHE_TTL_SECS         Default cache TTL in seconds"#
    );
}
