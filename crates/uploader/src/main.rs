use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use clausewatch_onboarding::Identity;
use clausewatch_uploader::client::needs_sign_in;
use clausewatch_uploader::{
    HttpArtifactSubmitter, UploadReport, Uploader, UploaderConfig, UploaderError,
};

/// Hand a contract to Clausewatch, signing in along the way if needed.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Park a contract in a new session; submit it now if a token is given.
    Upload {
        path: PathBuf,
        #[arg(long, env = "CLAUSEWATCH_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
    /// Submit a parked contract after signing in.
    Resume {
        /// Defaults to the most recent unfinished session.
        session_id: Option<String>,
        #[arg(long, env = "CLAUSEWATCH_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Show one session, or all of them.
    Status { session_id: Option<String> },
    /// Forget a session and its parked contract.
    Discard { session_id: String },
    /// Remove every session except the one given.
    Gc {
        #[arg(long)]
        keep: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clausewatch_uploader=info,clausewatch_onboarding=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = UploaderConfig::from_env()?;
    let submitter = Arc::new(HttpArtifactSubmitter::new(config.contracts_url()));
    let uploader = Uploader::open(config, submitter).await?;

    match cli.command {
        Commands::Upload { path, token } => {
            let identity = token.map(Identity::bearer);
            match uploader.upload(&path, identity.as_ref()).await? {
                UploadReport::AwaitingSignIn {
                    session_id,
                    sign_in_link,
                } => {
                    println!("Contract parked in session {session_id}.");
                    println!("Sign in to continue: {sign_in_link}");
                    println!("Then run: clausewatch-uploader resume {session_id} --token <token>");
                }
                UploadReport::Submitted {
                    session_id,
                    outcome,
                } => {
                    println!(
                        "Session {session_id} submitted as contract {}.",
                        outcome.record_id()
                    );
                }
            }
        }
        Commands::Resume { session_id, token } => {
            let identity = Identity::bearer(token);
            match uploader.resume(session_id.as_deref(), &identity).await {
                Ok(report) => println!(
                    "Session {} linked to contract {}.",
                    report.session_id,
                    report.outcome.record_id()
                ),
                Err(e @ (UploaderError::UnknownSession(_) | UploaderError::NoActiveSession)) => {
                    eprintln!("{e}");
                    std::process::exit(2);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Status { session_id } => {
            let sessions = uploader.status(session_id.as_deref()).await?;
            if sessions.is_empty() {
                println!("No sessions.");
            }
            for session in sessions {
                let record = session
                    .linked_record_id
                    .map(|id| format!(" -> contract {id}"))
                    .unwrap_or_default();
                println!(
                    "{}  {:<24} {} ({} bytes){record}",
                    session.id,
                    session.status.as_str(),
                    session.file_name,
                    session.file_size
                );
                if let Some(error) = &session.last_error {
                    println!("    last error: {error}");
                }
                if needs_sign_in(&session) {
                    println!("    sign in, then: clausewatch-uploader resume {}", session.id);
                }
            }
        }
        Commands::Discard { session_id } => {
            uploader.discard(&session_id).await?;
            println!("Session {session_id} discarded.");
        }
        Commands::Gc { keep } => {
            let removed = uploader.gc(keep.as_deref()).await?;
            println!("Removed {removed} session(s).");
        }
    }

    Ok(())
}
