//! Binary entry point for the mooring CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use mooring::{
    AttachmentIdentity, AttachmentLedger, AttachmentReconciler, AttachmentRequest, ConfigError,
    LedgerError, ReconcileConfig, ReconcileError, RequestError, ScalewayClient, ScalewayConfig,
    StateStore,
};

mod cli;

use cli::{AttachmentArgs, Cli};

const LOG_ENV: &str = "MOORING_LOG";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid arguments: {0}")]
    Request(#[from] RequestError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("state file error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("attachment {identity} is not tracked in {path}")]
    NotTracked { identity: String, path: String },
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var(LOG_ENV)
                .from_env_lossy(),
        )
        .init();
}

struct Session {
    reconciler: AttachmentReconciler<ScalewayClient>,
    ledger: StateStore,
    cancel: CancellationToken,
}

impl Session {
    fn open() -> Result<Self, CliError> {
        let scaleway = ScalewayConfig::load_without_cli_args()?;
        let reconcile = ReconcileConfig::load_without_cli_args()?;
        let policy = reconcile.policy()?;
        let client = ScalewayClient::new(&scaleway)?;
        info!(
            zone = client.zone(),
            project_id = scaleway.default_project_id.as_deref().unwrap_or("unset"),
            state_file = %reconcile.state_file,
            "session opened"
        );

        Ok(Self {
            reconciler: AttachmentReconciler::new(client, policy),
            ledger: StateStore::new(reconcile.state_file),
            cancel: cancel_on_interrupt(),
        })
    }

    fn not_tracked(&self, identity: &AttachmentIdentity) -> CliError {
        CliError::NotTracked {
            identity: identity.to_string(),
            path: self.ledger.path().to_string(),
        }
    }
}

fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    let _interrupt_watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, abandoning the current wait");
            watcher.cancel();
        }
    });
    cancel
}

fn build_request(args: &AttachmentArgs) -> Result<AttachmentRequest, RequestError> {
    AttachmentRequest::builder()
        .device_name(&args.device_name)
        .instance_id(&args.instance_id)
        .volume_id(&args.volume_id)
        .force_detach(args.force_detach)
        .skip_destroy(args.skip_destroy)
        .build()
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let (Cli::Attach(args) | Cli::Status(args) | Cli::Detach(args)) = &cli;
    let request = build_request(args)?;
    let session = Session::open()?;
    let outcome = match cli {
        Cli::Attach(_) => attach(&session, &request).await?,
        Cli::Status(_) => status(&session, &request).await?,
        Cli::Detach(_) => detach(&session, &request).await?,
    };
    writeln!(io::stdout(), "{outcome}")?;
    Ok(())
}

async fn attach(session: &Session, request: &AttachmentRequest) -> Result<String, CliError> {
    let identity = session.reconciler.create(request, &session.cancel).await?;
    session.ledger.record(&identity, request)?;
    Ok(identity.to_string())
}

async fn status(session: &Session, request: &AttachmentRequest) -> Result<String, CliError> {
    let identity = AttachmentIdentity::for_request(request);
    let Some(stored) = session.ledger.lookup(&identity)? else {
        return Ok(String::from("untracked"));
    };

    if session.reconciler.read(&identity, &stored).await? {
        return Ok(String::from("attached"));
    }
    session.ledger.forget(&identity)?;
    Ok(String::from("gone"))
}

async fn detach(session: &Session, request: &AttachmentRequest) -> Result<String, CliError> {
    let identity = AttachmentIdentity::for_request(request);
    let stored = session
        .ledger
        .lookup(&identity)?
        .ok_or_else(|| session.not_tracked(&identity))?;
    let effective = merge_flags(stored, request);

    session
        .reconciler
        .delete(&identity, &effective, &session.cancel)
        .await?;
    session.ledger.forget(&identity)?;
    Ok(identity.to_string())
}

/// Flags given on the command line switch behaviour on; flags recorded at
/// attach time stay in force.
fn merge_flags(stored: AttachmentRequest, given: &AttachmentRequest) -> AttachmentRequest {
    AttachmentRequest {
        force_detach: stored.force_detach || given.force_detach,
        skip_destroy: stored.skip_destroy || given.skip_destroy,
        ..stored
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
