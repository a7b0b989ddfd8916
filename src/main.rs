use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use bytebeam_tools::client::{SessionState, Tool, ToolClient, ToolOptions, ToolSession};
use bytebeam_tools::config::GatewayConfig;
use bytebeam_tools::http::AppState;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "bytebeam-tools", about = "HTTP backend for the ByteBeam AI document tools")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "5000", env = "PORT")]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "127.0.0.1", env = "BIND_ADDRESS")]
    bind: String,

    #[command(flatten)]
    gateway: GatewayConfig,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract text from a local file and run it through a tool on a running server
    Process {
        /// Tool to run
        #[arg(short, long, value_enum)]
        tool: Tool,

        /// Base URL of the tools server
        #[arg(long, default_value = "http://127.0.0.1:5000", env = "BYTEBEAM_TOOLS_URL")]
        server: String,

        /// Tesseract language(s) for image OCR, e.g. `eng+ara`
        #[arg(long, default_value = "eng")]
        ocr_lang: String,

        /// Summary language, or source language for translate
        #[arg(long)]
        language: Option<String>,

        /// Summary length: short, medium or long
        #[arg(long)]
        length: Option<String>,

        /// Target language for translate
        #[arg(long)]
        target_language: Option<String>,

        /// Question for chat
        #[arg(long)]
        question: Option<String>,

        /// Clause type to search for (repeatable); defaults to the standard set
        #[arg(long = "clause")]
        clause_types: Vec<String>,

        /// PDF, image or text file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Process {
            tool,
            server,
            ocr_lang,
            language,
            length,
            target_language,
            question,
            clause_types,
            file,
        }) => {
            let options = ToolOptions {
                language,
                length,
                target_language,
                question,
                clause_types,
            };
            let mut session = ToolSession::new(ToolClient::new(&server)?, tool, options, ocr_lang);
            session.select(file);

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_ctrl_c.cancel();
                }
            });

            match session.run(&cancel).await {
                SessionState::Completed(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                SessionState::Error(message) => bail!(message),
                other => bail!("session ended in unexpected state {:?}", other),
            }
        }
        None => {
            let state = AppState::from_config(&cli.gateway)?;
            bytebeam_tools::http::serve(&cli.bind, cli.port, state).await?;
        }
    }

    Ok(())
}
