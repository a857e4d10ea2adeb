//! articlesmith CLI: generate articles from a topic and apply them to a
//! local article store.
//!
//! Generation runs the full pipeline (outline, body, links, images) and
//! parks the result under a token; `apply` turns a token into an article.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
