//! `clever-todo` command line
//!
//! - `demo`: run a scripted session against an in-memory ledger
//! - `derive`: print the profile and item addresses of an owner

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use clever_address::{Address, AddressDeriver};
use clever_ledger::{KeypairWallet, MemoryLedger, Wallet};
use clever_session::{Outcome, SessionConfig, TodoSession, ViewState};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("clever-todo")
        .version(clever_session::VERSION)
        .about("Client-side todo session for a ledger-backed program")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML session configuration"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("demo")
                .about("Run a scripted session against an in-memory ledger")
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("7")
                        .value_parser(value_parser!(u8))
                        .help("Byte repeated into the wallet's key seed"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the final view as JSON"),
                ),
        )
        .subcommand(
            Command::new("derive")
                .about("Print derived record addresses")
                .arg(
                    Arg::new("owner")
                        .long("owner")
                        .required(true)
                        .help("Owner identity as 64 hex characters"),
                )
                .arg(
                    Arg::new("sequence")
                        .long("sequence")
                        .value_parser(value_parser!(u64))
                        .action(ArgAction::Append)
                        .help("Item sequence (repeatable)"),
                ),
        )
        .subcommand(Command::new("config").about("Print the effective configuration"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let matches = cli().get_matches();
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("demo", args)) => {
            let seed = args.get_one::<u8>("seed").copied().unwrap_or(7);
            let view = run_demo(config, seed).await?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_view(&view);
            }
        }
        Some(("derive", args)) => {
            let owner = args
                .get_one::<String>("owner")
                .context("missing --owner")?;
            let owner = Address::from_str(owner).context("invalid --owner")?;
            let sequences: Vec<u64> = args
                .get_many::<u64>("sequence")
                .map(|values| values.copied().collect())
                .unwrap_or_default();
            print_addresses(&AddressDeriver::new(config.program_id), &owner, &sequences)?;
        }
        Some(("config", _)) => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Some((other, _)) => bail!("unknown command: {other}"),
        None => bail!("no command given"),
    }
    Ok(())
}

fn load_config(matches: &ArgMatches) -> Result<SessionConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => SessionConfig::from_path(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(SessionConfig::default()),
    }
}

async fn run_demo(config: SessionConfig, seed: u8) -> Result<ViewState> {
    let ledger = Arc::new(MemoryLedger::new(config.program_id));
    let wallet = Arc::new(KeypairWallet::from_seed([seed; 32], ledger.clone()));
    let session = TodoSession::new(config, ledger.clone())?;

    println!("Owner: {}", wallet.identity());
    session.set_wallet(Some(wallet)).await;
    session.fetch_todos().await?;

    report("initialize", &session.initialize_user().await?);
    session.handle_input_change("buy milk");
    report("add draft", &session.submit_draft().await?);
    report("add", &session.add_todo("walk the dog").await?);
    report("add blank", &session.add_todo("   ").await?);

    let view = session.snapshot();
    let Some(first) = view.item_by_sequence(0).map(|t| t.address) else {
        bail!("first todo missing after confirmation");
    };
    let Some(second) = view.item_by_sequence(1).map(|t| t.address) else {
        bail!("second todo missing after confirmation");
    };
    report("mark", &session.mark_todo(&first).await?);
    report("mark again", &session.mark_todo(&first).await?);
    report("remove", &session.remove_todo(&second).await?);
    report("add", &session.add_todo("call mom").await?);

    let stats = ledger.stats();
    println!(
        "Ledger: {} submitted, {} confirmed, {} rejected, {} fetches",
        stats.submitted, stats.confirmed, stats.rejected, stats.fetches
    );
    Ok(session.snapshot())
}

fn report(step: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Confirmed(confirmation) => {
            println!("  {step:<12} confirmed at slot {}", confirmation.slot);
        }
        Outcome::Skipped(reason) => println!("  {step:<12} skipped: {reason}"),
    }
}

fn print_view(view: &ViewState) {
    println!();
    println!("Initialized: {}", view.initialized);
    println!("Next sequence: {}", view.next_sequence);
    println!("Incomplete:");
    for item in view.incomplete_todos() {
        println!("  [{:>3}] {}  ({})", item.sequence, item.content, item.address.short());
    }
    println!("Completed:");
    for item in view.completed_todos() {
        println!("  [{:>3}] {}  ({})", item.sequence, item.content, item.address.short());
    }
}

fn print_addresses(deriver: &AddressDeriver, owner: &Address, sequences: &[u64]) -> Result<()> {
    println!("Program: {}", deriver.program_id());
    println!("Owner:   {owner}");
    println!("Profile: {}", deriver.profile_address(owner)?);
    for &sequence in sequences {
        match deriver.todo_address(owner, sequence) {
            Ok(address) => println!("Todo {sequence:>3}: {address}"),
            Err(err) => println!("Todo {sequence:>3}: {err}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn derive_accepts_repeated_sequences() {
        let owner = Address::hash_of(b"alice").to_string();
        let matches = cli()
            .try_get_matches_from([
                "clever-todo",
                "derive",
                "--owner",
                owner.as_str(),
                "--sequence",
                "0",
                "--sequence",
                "255",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        let sequences: Vec<u64> = args.get_many::<u64>("sequence").unwrap().copied().collect();
        assert_eq!(sequences, vec![0, 255]);
    }

    #[tokio::test]
    async fn demo_ends_in_expected_state() {
        let view = run_demo(SessionConfig::default(), 11).await.unwrap();
        assert!(view.initialized);
        assert_eq!(view.next_sequence, 3);
        let contents: Vec<&str> = view.items.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["buy milk", "call mom"]);
        assert!(view.items[0].marked);
        assert!(view.draft_input.is_empty());
    }
}
