//! cache-adapter-cli: 通过缓存适配层发送请求的命令行工具
//!
//! Usage:
//!   cache-adapter-cli chat <prompt> [--model <m>] [--stream] [--repeat <n>] [--config <path>]
//!   cache-adapter-cli moderate <text>... [--config <path>]
//!   cache-adapter-cli check-config <path>

use futures::StreamExt;
use llm_cache_adapter::cache::CacheOptions;
use llm_cache_adapter::types::{ChatCompletionRequest, ChatResponse, ModerationRequest};
use llm_cache_adapter::{AdapterConfig, ChatCompletion, Message, Moderation};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "chat" => cmd_chat(&args[2..]).await,
        "moderate" => cmd_moderate(&args[2..]).await,
        "check-config" => cmd_check_config(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("cache-adapter-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"cache-adapter-cli: 缓存适配层命令行工具

USAGE:
    cache-adapter-cli <COMMAND> [OPTIONS]

COMMANDS:
    chat <prompt> [--model <m>] [--stream] [--repeat <n>] [--config <path>]
                                Ask a chat model; repeated asks hit the cache
    moderate <text>... [--config <path>]
                                Moderate one or more inputs
    check-config <path>         Parse and validate a config file
    version                     Show version information
    help                        Show this help message

ENVIRONMENT:
    OPENAI_API_KEY              API key for the live backend
    OPENAI_BASE_URL             Override the API base URL
    RUST_LOG                    Log filter (default: warn)"#
    );
}

/// Value following `--flag`, if present.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Positional arguments, skipping flags and their values.
fn positionals(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--stream" => {}
            a if a.starts_with("--") => {
                iter.next();
            }
            _ => out.push(arg.clone()),
        }
    }
    out
}

fn load_config(args: &[String]) -> anyhow::Result<AdapterConfig> {
    Ok(match flag_value(args, "--config") {
        Some(path) => AdapterConfig::from_path(path)?,
        None => AdapterConfig::default(),
    })
}

async fn cmd_chat(args: &[String]) -> anyhow::Result<()> {
    let prompt = positionals(args).join(" ");
    if prompt.is_empty() {
        anyhow::bail!("chat needs a prompt");
    }
    let config = load_config(args)?;
    let model = flag_value(args, "--model").unwrap_or(DEFAULT_MODEL);
    let stream = args.iter().any(|a| a == "--stream");
    let repeat: usize = flag_value(args, "--repeat").unwrap_or("1").parse()?;

    let chat = ChatCompletion::new(Arc::new(config.openai_client()?));
    let options = CacheOptions::new().with_cache(Arc::new(config.build_cache()));

    for round in 1..=repeat.max(1) {
        let request =
            ChatCompletionRequest::new(model, vec![Message::user(prompt.clone())]).stream(stream);
        match chat.create(request, options.clone()).await? {
            ChatResponse::Completion(resp) => {
                println!("[{round}] cache_hit={}", resp.cache_hit);
                println!("{}", resp.first_content().unwrap_or_default());
                if let Some(cost) = resp.token_cost {
                    println!("saved tokens: {}", cost.total());
                }
            }
            ChatResponse::Stream(mut chunks) => {
                println!("[{round}]");
                while let Some(chunk) = chunks.next().await {
                    let chunk = chunk?;
                    print!("{}", chunk.delta_content());
                    if chunk.cache_hit {
                        print!(" (cached)");
                    }
                }
                println!();
            }
        }
    }
    Ok(())
}

async fn cmd_moderate(args: &[String]) -> anyhow::Result<()> {
    let inputs = positionals(args);
    if inputs.is_empty() {
        anyhow::bail!("moderate needs at least one input");
    }
    let config = load_config(args)?;
    let moderation = Moderation::new(Arc::new(config.openai_client()?));
    let options = CacheOptions::new().with_cache(Arc::new(config.build_cache()));
    let response = moderation
        .create(ModerationRequest::new(inputs), options)
        .await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn cmd_check_config(args: &[String]) -> anyhow::Result<()> {
    let Some(path) = args.first() else {
        anyhow::bail!("check-config needs a path");
    };
    let config = AdapterConfig::from_path(path)?;
    println!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}
