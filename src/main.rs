use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dna_screening_agent::model::Config;
use dna_screening_agent::service::{RigProvider, ScreeningPipeline};
use dna_screening_agent::tools::ToolRegistry;

const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (ignore if missing)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    // Customer info from the command line, or stdin if no args given
    let args: Vec<String> = std::env::args().skip(1).collect();
    let customer_info = if args.is_empty() {
        let mut buffer = String::new();
        tokio::io::stdin().read_to_string(&mut buffer).await?;
        buffer
    } else {
        args.join(" ")
    };
    let customer_info = customer_info.trim().to_string();
    if customer_info.is_empty() {
        eprintln!("Usage: dna-screening-agent <customer info>  (or pipe text on stdin)");
        std::process::exit(2);
    }

    let api_key = match std::env::var(ENV_OPENAI_API_KEY) {
        Ok(key) => key,
        Err(_) => {
            eprintln!("{} is not set", ENV_OPENAI_API_KEY);
            std::process::exit(2);
        }
    };
    let provider = RigProvider::new(&api_key);

    let registry = ToolRegistry::with_default_tools(&config.tools);
    let pipeline = Arc::new(ScreeningPipeline::new(provider, registry, config));

    tracing::info!("Starting screening run");

    let mut failed = false;
    let mut stream = pipeline.run(customer_info);
    while let Some(event) = stream.next().await {
        if matches!(event, dna_screening_agent::ScreeningEvent::Error { .. }) {
            failed = true;
        }
        print!("{}", event.to_sse_frame());
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
