use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use enroll_core::config::Config;
use enroll_core::core_device::{
    ActiveDeviceRegistry, FileUserConfigStore, ServiceUserLoader, UserConfigStore,
};
use enroll_core::core_identity::DeviceType;
use enroll_core::core_provision::{
    DeviceKeygen, DeviceProvisioner, ProvisionArgs, ProvisionContext, ProvisionDeps,
};
use enroll_core::core_secrets::{DeviceSecretStore, LocalKeySecurity};
use enroll_core::core_service::{IdentityService, LoopbackIdentityService, TimeoutIdentityService};
use enroll_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use enroll_core::metrics::init_metrics;
use enroll_core::shutdown::{install_signal_handlers, ShutdownCoordinator};
use rand::rngs::OsRng;
use rand::TryRngCore;
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const PASSPHRASE_VAR: &str = "ENROLL_PASSPHRASE";
const SALT_LEN: usize = 16;

#[derive(Parser, Debug)]
#[command(name = "enroll")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long, global = true)]
    json_logs: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the persisted user config (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new identity and provision its first device
    Provision {
        #[arg(short, long)]
        username: String,

        #[arg(short = 'n', long)]
        device_name: String,

        /// desktop, mobile or backup
        #[arg(short = 't', long)]
        device_type: Option<DeviceType>,
    },
    /// Print the persisted active device
    Show,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env()?;

    if let Some(dir) = &args.data_dir {
        let expanded = shellexpand::full(dir).context("expanding data dir")?;
        config.store.data_dir = PathBuf::from(expanded.as_ref());
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }

    config.validate()?;
    Ok(config)
}

fn init_observability(config: &Config) -> Result<()> {
    let log_config = match LogConfig::from_config(&config.logging) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}, using 'info'", e);
            LogConfig::new(LogLevel::Info).json_format(config.logging.json_format)
        }
    };
    init_logging_with_config(log_config)?;

    if config.metrics.enabled {
        init_metrics();
    }
    Ok(())
}

fn open_store(config: &Config) -> Result<Arc<dyn UserConfigStore>> {
    let store = FileUserConfigStore::new(&config.store.data_dir, &config.store.user_config_file)
        .with_context(|| format!("opening {}", config.store.data_dir.display()))?;
    Ok(Arc::new(store))
}

async fn provision(
    config: &Config,
    username: String,
    device_name: String,
    device_type: DeviceType,
) -> Result<()> {
    if config.identity_service.endpoint != "loopback" {
        bail!(
            "unsupported identity service endpoint '{}'",
            config.identity_service.endpoint
        );
    }

    let passphrase = std::env::var(PASSPHRASE_VAR)
        .map(SecretString::new)
        .map_err(|_| anyhow!("{} must be set", PASSPHRASE_VAR))?;

    let mut salt = vec![0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| anyhow!("failed to generate salt: {}", e))?;

    let service = Arc::new(LoopbackIdentityService::new());
    let me = service.register_user(&username, salt.clone()).await?;
    let service: Arc<dyn IdentityService> = Arc::new(TimeoutIdentityService::new(
        service,
        config.identity_service.request_timeout,
    ));

    let lks = LocalKeySecurity::from_passphrase(&passphrase, &salt)?;
    let registry = Arc::new(ActiveDeviceRegistry::new(open_store(config)?));
    let deps = ProvisionDeps {
        keygen: Arc::new(DeviceKeygen::new(service.clone())),
        secrets: Arc::new(DeviceSecretStore::new(service.clone(), lks)),
        loader: Arc::new(ServiceUserLoader::new(service, registry.clone())),
        registry,
    };

    let shutdown = Arc::new(ShutdownCoordinator::new(Duration::from_secs(5)));
    install_signal_handlers(shutdown.clone());
    let mut ctx = ProvisionContext::new().with_shutdown(shutdown);
    if let Some(timeout) = config.provisioning.step_timeout {
        ctx = ctx.with_step_timeout(timeout);
    }

    let args = ProvisionArgs::builder(me, device_name)
        .device_type(device_type)
        .eldest()
        .build()?;
    let mut provisioner = DeviceProvisioner::new(args, deps)
        .with_secret_sync(config.provisioning.sync_secrets_after_switch);

    if let Err(e) = provisioner.run(&ctx).await {
        if e.keys_retained() {
            warn!(error = %e, "Keys were generated but not pushed, retrying once");
            provisioner.push_keys(&ctx).await?;
        } else {
            return Err(e.into());
        }
    }

    let active = provisioner.switch_config_and_active_device(&ctx).await?;
    info!(device_id = %active.device_id(), "Device provisioned");

    println!("user:           {}", active.normalized_name());
    println!("uid:            {}", active.uid());
    println!("device id:      {}", active.device_id());
    println!("device name:    {}", active.device_name());
    println!("signing kid:    {}", active.signing_key().kid());
    println!("encryption kid: {}", active.encryption_key().kid());
    Ok(())
}

fn show(config: &Config) -> Result<()> {
    match open_store(config)?.load()? {
        Some(user_config) => println!("{}", serde_json::to_string_pretty(&user_config)?),
        None => println!(
            "No active device in {}",
            config.store.user_config_path().display()
        ),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_observability(&config)?;

    match args.command {
        Command::Provision {
            username,
            device_name,
            device_type,
        } => {
            let device_type = device_type.unwrap_or(config.provisioning.default_device_type);
            provision(&config, username, device_name, device_type).await
        }
        Command::Show => show(&config),
    }
}
