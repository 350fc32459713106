use clap::Parser;
use pdfua_tagger::cli::{self, Cli};
use pdfua_tagger::error::PdfError;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli::run(cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            exit_code_for(&err)
        }
    }
}

fn exit_code_for(err: &PdfError) -> std::process::ExitCode {
    match err {
        PdfError::Io(_) | PdfError::BadPdf(_) | PdfError::Encrypted => std::process::ExitCode::from(2),
        PdfError::ValidatorNotInstalled(_) | PdfError::ValidationTimeout => std::process::ExitCode::from(3),
        _ => std::process::ExitCode::FAILURE,
    }
}
