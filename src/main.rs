//! faq-assistant CLI 진입점

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = faq_assistant::cli::Cli::parse();

    // 로깅 초기화 (stderr: stdout carries the answers)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(cli.log_level().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(faq_assistant::cli::run(cli))
}
