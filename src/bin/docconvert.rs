//! Server binary for docconvert.
//!
//! Maps CLI flags (and `DOCCONVERT_*` environment variables) onto
//! `ServiceConfig`, installs logging, and serves until Ctrl-C or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use docconvert::{serve, Orchestrator, ServiceConfig};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"ENDPOINTS:
  POST /pdf_to_word     field `pdf`, optional `page_start`, `page_end`
  POST /pdf_to_pptx     field `pdf`
  POST /pdf_to_excel    field `pdf`
  POST /word_to_pdf     field `word`
  POST /image_to_pdf    field `images` (repeated), `orientation`, `margin`
  POST /image_to_excel  field `image`
  GET  /healthz

EXTERNAL TOOLS:
  PDF↔Word needs LibreOffice (`soffice`), image→spreadsheet needs
  `tesseract`, PDF→slides and PDF→spreadsheet need the pdfium library.
  A missing tool only fails the endpoints that use it.
"#;

/// Document conversion HTTP service.
#[derive(Parser, Debug)]
#[command(
    name = "docconvert",
    version,
    about = "HTTP service converting uploads between PDF, Word, slides, spreadsheets and images",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Socket address to listen on.
    #[arg(long, env = "DOCCONVERT_LISTEN", default_value = "0.0.0.0:5000")]
    listen: String,

    /// Per-request upload ceiling in MiB.
    #[arg(long, env = "DOCCONVERT_MAX_REQUEST_MB", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..=4096))]
    max_request_mb: u64,

    /// Directory for transient files (default: OS temp dir).
    #[arg(long, env = "DOCCONVERT_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// LibreOffice executable.
    #[arg(long, env = "DOCCONVERT_SOFFICE", default_value = "soffice")]
    soffice: String,

    /// Tesseract executable.
    #[arg(long, env = "DOCCONVERT_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// Tesseract language pack.
    #[arg(long, env = "DOCCONVERT_TESSERACT_LANG", default_value = "eng")]
    tesseract_lang: String,

    /// Directory holding the pdfium shared library (default: system search path).
    #[arg(long, env = "DOCCONVERT_PDFIUM_LIB_DIR")]
    pdfium_lib_dir: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(short, long, env = "DOCCONVERT_VERBOSE")]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<ServiceConfig> {
        let mut builder = ServiceConfig::builder()
            .listen_addr(self.listen)
            .max_request_bytes(self.max_request_mb * 1024 * 1024)
            .soffice_bin(self.soffice)
            .tesseract_bin(self.tesseract)
            .tesseract_lang(self.tesseract_lang);
        if let Some(dir) = self.storage_dir {
            builder = builder.storage_dir(dir);
        }
        if let Some(dir) = self.pdfium_lib_dir {
            builder = builder.pdfium_lib_dir(dir);
        }
        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = cli.into_config()?;
    let orchestrator =
        Orchestrator::new(config).context("Failed to prepare transient storage")?;
    serve(Arc::new(orchestrator))
        .await
        .context("Server terminated with an error")?;
    Ok(())
}
