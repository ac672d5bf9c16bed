use alloy::primitives::Address;
use clap::{
    Parser,
    Subcommand,
    ValueEnum,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use slot_spin::{
    NetworkConfig,
    SpinEvent,
    SpinOrchestrator,
    SpinResult,
    deployment::{
        DeploymentEnv,
        DeploymentRecord,
        DeploymentStore,
    },
    logging::init_tracing,
    network::LOCAL_RPC_URL,
    rpc::RpcConfirmationWaiter,
    wallets::{
        LocalWallet,
        find_wallet,
        resolve_wallet_dir,
        unlock_wallet,
    },
};
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::info;
use url::Url;

#[derive(Parser, Debug)]
#[command(
    name = "slot-spin",
    about = "Play the on-chain slot machine from the terminal",
    version
)]
struct Args {
    /// Network to play on
    #[arg(long, value_enum, default_value = "testnet")]
    network: NetworkArg,

    /// Override the RPC URL used by the wallet
    #[arg(long)]
    rpc_url: Option<String>,

    /// Read-only RPC URL used while waiting for receipts (defaults to the RPC URL)
    #[arg(long)]
    confirm_rpc_url: Option<String>,

    /// Slot machine contract address (defaults to the recorded deployment)
    #[arg(long)]
    contract: Option<String>,

    /// Keystore name to play with
    #[arg(long)]
    wallet: Option<String>,

    /// Override keystore directory (defaults to ~/.foundry/keystores)
    #[arg(long)]
    wallet_dir: Option<String>,

    /// Write logs to a daily rolling file in this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NetworkArg {
    Testnet,
    Local,
}

impl NetworkArg {
    fn env(self) -> DeploymentEnv {
        match self {
            NetworkArg::Testnet => DeploymentEnv::Testnet,
            NetworkArg::Local => DeploymentEnv::Local,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show balance, spins, discount, reward pool and the next spin's cost
    Status,
    /// Spin the reels
    Spin {
        /// Number of sequential spins
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Remember a contract address for the selected network
    Record {
        #[arg(long)]
        contract: String,
    },
}

type Orchestrator = SpinOrchestrator<LocalWallet, RpcConfirmationWaiter>;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let _log_guard = init_tracing(args.log_dir.as_deref());
    info!(network = ?args.network, "starting slot-spin");

    let store = DeploymentStore::new(args.network.env()).wrap_err("opening deployment store")?;

    if let Command::Record { contract } = &args.command {
        return record(&args, &store, contract);
    }

    let network = resolve_network(&args, &store)?;
    let orchestrator = connect(&args, network).await?;
    match args.command {
        Command::Status => print_status(&orchestrator),
        Command::Spin { count } => spin(&orchestrator, count).await,
        Command::Record { .. } => Ok(()),
    }
}

fn record(args: &Args, store: &DeploymentStore, contract: &str) -> Result<()> {
    let address: Address = contract
        .parse()
        .wrap_err_with(|| format!("Invalid contract address {contract}"))?;
    let network = base_network(args.network, args.rpc_url.clone(), address);
    store
        .append(DeploymentRecord::new(address, &network.rpc_url, network.chain_id))
        .wrap_err("recording deployment")?;
    println!(
        "Recorded {} on {} ({}) in {}",
        address,
        network.name,
        network.rpc_url,
        store.path().display()
    );
    Ok(())
}

fn base_network(network: NetworkArg, rpc_url: Option<String>, contract: Address) -> NetworkConfig {
    match network {
        NetworkArg::Testnet => {
            let mut config = NetworkConfig::monad_testnet(contract);
            if let Some(url) = rpc_url {
                config.confirm_rpc_url = url.clone();
                config.rpc_url = url;
            }
            config
        }
        NetworkArg::Local => {
            NetworkConfig::local(rpc_url.unwrap_or_else(|| LOCAL_RPC_URL.to_string()), contract)
        }
    }
}

/// Flags win over the deployment record; the record fills in what the flags
/// leave out.
fn resolve_network(args: &Args, store: &DeploymentStore) -> Result<NetworkConfig> {
    let chain_id = base_network(args.network, None, Address::ZERO).chain_id;
    let record = store
        .latest_for_chain(chain_id)
        .wrap_err("loading deployment records")?;
    let contract = match (&args.contract, &record) {
        (Some(raw), _) => raw
            .parse()
            .wrap_err_with(|| format!("Invalid contract address {raw}"))?,
        (None, Some(record)) => record.address()?,
        (None, None) => {
            return Err(eyre!(
                "No contract address for {}: pass --contract <address> or run `slot-spin record --contract <address>`",
                args.network.env()
            ));
        }
    };
    let rpc_url = args
        .rpc_url
        .clone()
        .or_else(|| record.map(|record| record.rpc_url));
    let mut network = base_network(args.network, rpc_url, contract);
    if let Some(url) = &args.confirm_rpc_url {
        network.confirm_rpc_url = url.clone();
    }
    Ok(network)
}

async fn connect(args: &Args, network: NetworkConfig) -> Result<Orchestrator> {
    let wallet_name = args
        .wallet
        .as_deref()
        .ok_or_else(|| eyre!("Specify --wallet <name> to select a keystore"))?;
    let wallet_dir =
        resolve_wallet_dir(args.wallet_dir.as_deref()).wrap_err("resolving wallet directory")?;
    let descriptor = find_wallet(&wallet_dir, wallet_name).wrap_err("locating requested wallet")?;
    let signer = unlock_wallet(&descriptor).wrap_err("unlocking keystore")?;

    let rpc_url = Url::parse(&network.rpc_url)
        .wrap_err_with(|| format!("Invalid RPC URL {}", network.rpc_url))?;
    let confirm_url = Url::parse(&network.confirm_rpc_url)
        .wrap_err_with(|| format!("Invalid confirmation RPC URL {}", network.confirm_rpc_url))?;

    let orchestrator = SpinOrchestrator::new(network, RpcConfirmationWaiter::connect(confirm_url));
    orchestrator
        .connect(LocalWallet::new(signer, rpc_url))
        .await
        .wrap_err("connecting wallet to network")?;
    Ok(orchestrator)
}

fn print_status(orchestrator: &Orchestrator) -> Result<()> {
    let network = orchestrator.network();
    let symbol = &network.currency.symbol;
    let state = orchestrator.player_state();
    let address = orchestrator
        .address()
        .ok_or_else(|| eyre!("Wallet is not connected"))?;
    println!("Network:          {} (chain {})", network.name, network.chain_id);
    println!("Player:           {address}");
    println!("Balance:          {} {symbol}", state.native_balance);
    println!("Free spins:       {}", state.free_spins_remaining);
    println!(
        "Discounted spins: {}{}",
        state.discounted_spins_remaining,
        if state.has_discount { " (discount active)" } else { "" }
    );
    println!("Reward pool:      {} {symbol}", orchestrator.reward_pool());
    println!("Next spin:        {}", orchestrator.spin_cost().label(symbol));
    if orchestrator.network_degraded() {
        println!("Network looks degraded; spins are paused until the balance can be read.");
    }
    Ok(())
}

async fn spin(orchestrator: &Orchestrator, count: u32) -> Result<()> {
    let mut events = orchestrator.subscribe();
    for round in 1..=count {
        println!(
            "Spin {round}/{count} ({})",
            orchestrator
                .spin_cost()
                .label(&orchestrator.network().currency.symbol)
        );
        let result = orchestrator.request_spin().await;
        report_events(orchestrator, &mut events);
        match result {
            Some(result) => print_result(orchestrator, &result),
            None => {
                let status = orchestrator
                    .last_attempt()
                    .map(|attempt| attempt.status().to_string())
                    .unwrap_or_else(|| "not started".to_string());
                return Err(eyre!("Spin {round} did not complete ({status})"));
            }
        }
    }
    print_status(orchestrator)
}

fn report_events(orchestrator: &Orchestrator, events: &mut broadcast::Receiver<SpinEvent>) {
    let symbol = &orchestrator.network().currency.symbol;
    while let Ok(event) = events.try_recv() {
        match event {
            SpinEvent::Submitted { tx_hash } => println!("  submitted {tx_hash}"),
            SpinEvent::InsufficientFunds => {
                println!("  Not enough {symbol} for this spin. Top up the wallet and try again.")
            }
            SpinEvent::Unconfirmed {
                tx_hash,
                explorer_url,
            } => println!(
                "  No receipt for {tx_hash}. It may still land, check {explorer_url}"
            ),
            SpinEvent::RolledBack(failure) => println!("  rolled back: {failure}"),
            SpinEvent::Started { .. } | SpinEvent::Committed(_) => {}
        }
    }
}

fn print_result(orchestrator: &Orchestrator, result: &SpinResult) {
    let symbol = &orchestrator.network().currency.symbol;
    println!("  [ {} ]", result.symbol_combination.join(" | "));
    println!("  reward: {} {symbol}", result.reward_amount);
    if result.extra_spins_granted > 0 {
        println!("  extra spins: {}", result.extra_spins_granted);
    }
    if result.rare_item_won {
        println!("  rare item won!");
    }
    if result.rare_ticket_pending {
        println!("  rare ticket pending");
    }
    if result.discount_applied {
        println!("  discount applied");
    }
    if result.new_discount_granted {
        println!("  new discount granted");
    }
    println!(
        "  {}",
        orchestrator
            .network()
            .explorer_tx_url(&result.transaction_hash)
    );
}
