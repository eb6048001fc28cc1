use anyhow::Result;
use clap::Parser;
use resnet_transfer::cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("resnet_transfer=info".parse()?),
        )
        .init();

    Cli::parse().run()
}
