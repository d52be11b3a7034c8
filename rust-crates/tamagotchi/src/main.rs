use clap::{
    Args,
    Parser,
    Subcommand,
    ValueEnum,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::{
    ConfigOverrides,
    DeploymentEnv,
    DojoConfig,
};
use generated_bindings::{
    Action,
    felt_to_hex,
    parse_felt,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
use tamagotchi::{
    App,
    AppConfig,
    DojoProvider,
    SignerSource,
    SystemCalls,
    wallets::{
        resolve_keystore,
        resolve_keystore_dir,
    },
};
use tracing::info;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

#[derive(Parser, Debug)]
#[command(
    name = "tamagotchi",
    about = "Look after an on-chain pet from the terminal",
    version
)]
struct Cli {
    /// Dojo profile the world was deployed with
    #[arg(long, value_enum, default_value = "dev", env = "DOJO_PROFILE")]
    profile: Profile,

    /// Path to the Dojo manifest (defaults to ./manifest_<profile>.json)
    #[arg(long, env = "DOJO_MANIFEST")]
    manifest: Option<PathBuf>,

    /// Starknet JSON-RPC endpoint
    #[arg(long, env = "DOJO_RPC_URL")]
    rpc_url: Option<String>,

    /// Torii indexer endpoint
    #[arg(long, env = "DOJO_TORII_URL")]
    torii_url: Option<String>,

    /// Account whose pet is shown and, with --keystore, used to sign
    #[arg(long, env = "DOJO_ACCOUNT_ADDRESS")]
    account_address: Option<String>,

    /// Keystore file, or the name of one inside --keystore-dir
    #[arg(long, conflicts_with = "master")]
    keystore: Option<String>,

    /// Override the keystore directory (defaults to ~/.starkli-wallets/deployer)
    #[arg(long)]
    keystore_dir: Option<String>,

    /// Sign with the master account from the environment
    #[arg(long)]
    master: bool,

    #[arg(long, env = "DOJO_MASTER_ADDRESS", hide_env_values = true)]
    master_address: Option<String>,

    #[arg(long, env = "DOJO_MASTER_PRIVATE_KEY", hide_env_values = true)]
    master_private_key: Option<String>,

    /// Indexer poll interval for live updates
    #[arg(long, default_value_t = 500)]
    poll_ms: u64,

    /// Write logs to a daily rolling file in this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Profile {
    Dev,
    Sepolia,
    Mainnet,
}

impl From<Profile> for DeploymentEnv {
    fn from(profile: Profile) -> Self {
        match profile {
            Profile::Dev => DeploymentEnv::Dev,
            Profile::Sepolia => DeploymentEnv::Sepolia,
            Profile::Mainnet => DeploymentEnv::Mainnet,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the pet once
    Status,
    /// Print the pet every time it changes, until Ctrl-C
    Watch,
    Spawn(ActionArgs),
    Feed(ActionArgs),
    Sleep(ActionArgs),
    Awake(ActionArgs),
    Play(ActionArgs),
    Clean(ActionArgs),
    Revive(ActionArgs),
    DecreaseStats(ActionArgs),
}

#[derive(Args, Debug, Clone, Copy)]
struct ActionArgs {
    /// Send the action even if the pet's state does not allow it
    #[arg(long)]
    force: bool,

    /// Seconds to wait for the indexer to reflect the change (0 = don't wait)
    #[arg(long, default_value_t = 0)]
    wait_secs: u64,
}

impl Command {
    fn action(&self) -> Option<(Action, ActionArgs)> {
        let (action, args) = match self {
            Command::Status | Command::Watch => return None,
            Command::Spawn(args) => (Action::Spawn, args),
            Command::Feed(args) => (Action::Feed, args),
            Command::Sleep(args) => (Action::Sleep, args),
            Command::Awake(args) => (Action::Awake, args),
            Command::Play(args) => (Action::Play, args),
            Command::Clean(args) => (Action::Clean, args),
            Command::Revive(args) => (Action::Revive, args),
            Command::DecreaseStats(args) => (Action::DecreaseStats, args),
        };
        Some((action, *args))
    }
}

fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(rolling::daily(dir, "tamagotchi.log"));
            let _ = fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
            None
        }
    }
}

fn app_config(cli: &Cli) -> Result<AppConfig> {
    let overrides = ConfigOverrides {
        manifest_path: cli.manifest.clone(),
        rpc_url: cli.rpc_url.clone(),
        torii_url: cli.torii_url.clone(),
        master_address: cli.master_address.clone(),
        master_private_key: cli.master_private_key.clone(),
    };
    let dojo = DojoConfig::resolve(cli.profile.into(), overrides).map_err(|e| eyre!("{e:#}"))?;

    let account_address = cli
        .account_address
        .as_deref()
        .map(parse_felt)
        .transpose()
        .wrap_err("Invalid --account-address")?;

    let signer = if cli.master {
        SignerSource::Master
    } else if let Some(raw) = cli.keystore.as_deref() {
        let dir = resolve_keystore_dir(cli.keystore_dir.as_deref())?;
        SignerSource::Keystore(resolve_keystore(raw, &dir)?)
    } else {
        SignerSource::None
    };

    Ok(AppConfig {
        dojo,
        account_address,
        signer,
        poll_interval: Duration::from_millis(cli.poll_ms),
    })
}

async fn run_action(
    app: &mut App<entity_sync::HttpTransport>,
    config: &AppConfig,
    action: Action,
    args: ActionArgs,
) -> Result<()> {
    let signer = config.connect_signer().await?;
    let system_calls = SystemCalls::new(DojoProvider::new(config.dojo.manifest.manifest.clone()));

    let outcome = app
        .act(
            &system_calls,
            &signer,
            action,
            args.force,
            Duration::from_secs(args.wait_secs),
        )
        .await?;
    println!(
        "{action} submitted: {}",
        felt_to_hex(&outcome.submitted.transaction_hash)
    );
    match outcome.confirmed {
        Some(snapshot) => print!("{}", snapshot.render()),
        None if args.wait_secs > 0 => println!("the indexer has not reflected the change yet"),
        None => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_deref());

    let config = app_config(&cli)?;
    info!(
        profile = %config.dojo.env,
        manifest = %config.dojo.manifest.path.display(),
        digest = config.dojo.manifest.digest_preview(),
        "starting tamagotchi client"
    );
    let mut app = App::connect(&config)?;

    if let Some((action, args)) = cli.command.action() {
        return run_action(&mut app, &config, action, args).await;
    }
    match cli.command {
        Command::Watch => {
            let stop = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            app.watch(stop, |snapshot| print!("{}", snapshot.render()))
                .await?;
        }
        _ => {
            let snapshot = app.refresh().await?;
            print!("{}", snapshot.render());
        }
    }
    Ok(())
}
