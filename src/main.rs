//! Binary entry point: a thin CLI front-end over the `hojicoin` library.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;

use hojicoin::blockchain::transaction::Transaction;
use hojicoin::blockchain::utxo::UtxoSet;
use hojicoin::config::Config;
use hojicoin::crypto::keys::{validate_address, Wallets};
use hojicoin::{Blockchain, Error};

#[derive(Parser)]
#[command(name = "hojicoin", about = "A minimal UTXO blockchain")]
struct Cli {
    /// Directory holding the store and wallet file.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Creates a new blockchain and sends the genesis reward to `address`.
    Createblockchain {
        #[arg(long)]
        address: String,
    },
    /// Generates a new wallet and address.
    Createwallet,
    /// Lists all addresses in the wallet file.
    Listaddresses,
    /// Prints the balance of `address`.
    Getbalance {
        #[arg(long)]
        address: String,
    },
    /// Sends `amount` from `from` to `to`, mining the resulting block.
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
    },
    /// Prints every block in the chain, tip first.
    Printchain,
    /// Rebuilds the UTXO index from the chain.
    Reindexutxo,
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    let config = match cli.data_dir {
        Some(dir) => Config::with_data_dir(dir),
        None => Config::default(),
    };

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

fn run(command: Command, config: &Config) -> hojicoin::Result<()> {
    match command {
        Command::Createblockchain { address } => createblockchain(&address, config),
        Command::Createwallet => createwallet(config),
        Command::Listaddresses => listaddresses(config),
        Command::Getbalance { address } => getbalance(&address, config),
        Command::Send { from, to, amount } => send(&from, &to, amount, config),
        Command::Printchain => printchain(config),
        Command::Reindexutxo => reindexutxo(config),
    }
}

fn createblockchain(address: &str, config: &Config) -> hojicoin::Result<()> {
    if !validate_address(address) {
        return Err(Error::BadRequest);
    }

    let chain = Blockchain::open_or_create(&config.database.data_dir, address, config.mining.target_bits)?;
    let utxo = UtxoSet::new(chain.store());
    utxo.reindex(&chain.all_blocks()?)?;

    println!("blockchain created, tip {}", hex::encode(chain.tip()));
    Ok(())
}

fn createwallet(config: &Config) -> hojicoin::Result<()> {
    let mut wallets = Wallets::load(&config.wallet.wallet_file)?;
    let address = wallets.create_wallet();
    wallets.save(&config.wallet.wallet_file)?;
    println!("{address}");
    Ok(())
}

fn listaddresses(config: &Config) -> hojicoin::Result<()> {
    let wallets = Wallets::load(&config.wallet.wallet_file)?;
    for address in wallets.addresses() {
        println!("{address}");
    }
    Ok(())
}

fn getbalance(address: &str, config: &Config) -> hojicoin::Result<()> {
    if !validate_address(address) {
        return Err(Error::BadRequest);
    }

    let chain = open_existing(config)?;
    let utxo = UtxoSet::new(chain.store());
    println!("{}", utxo.balance(address)?);
    Ok(())
}

fn send(from: &str, to: &str, amount: u64, config: &Config) -> hojicoin::Result<()> {
    if !validate_address(from) || !validate_address(to) {
        return Err(Error::BadRequest);
    }

    let wallets = Wallets::load(&config.wallet.wallet_file)?;
    let wallet = wallets.get(from).ok_or(Error::BadRequest)?;

    let mut chain = Blockchain::open_or_create(&config.database.data_dir, from, config.mining.target_bits)?;
    let utxo = UtxoSet::new(chain.store());

    let spendable = utxo.find_spendable_outputs(from)?;
    let total: u64 = spendable.iter().map(|(_, _, value)| value).sum();
    if total < amount {
        return Err(Error::InsufficientFunds);
    }

    let mut accumulated = 0u64;
    let mut selected = Vec::new();
    for (tx_id, out_index, value) in spendable {
        if accumulated >= amount {
            break;
        }
        accumulated += value;
        selected.push(((tx_id, out_index), value));
    }

    let mut spend_tx = Transaction::new_unsigned(wallet, to, amount, selected, accumulated)?;
    chain.sign_tx(&mut spend_tx, &wallet.signing_key()?)?;

    let coinbase = Transaction::new_coinbase(from, Vec::new())?;
    let block = chain.mine_block(vec![coinbase, spend_tx])?;

    let utxo = UtxoSet::new(chain.store());
    utxo.reindex(&chain.all_blocks()?)?;

    println!("mined block {}", hex::encode(block.hash));
    Ok(())
}

fn printchain(config: &Config) -> hojicoin::Result<()> {
    let chain = open_existing(config)?;
    for block in chain.iter() {
        let block = block?;
        println!("hash:      {}", hex::encode(block.hash));
        println!("prev:      {}", hex::encode(block.prev_block_hash));
        println!("timestamp: {}", block.timestamp);
        println!("nonce:     {}", block.nonce);
        println!("txs:       {}", block.transactions.len());
        println!();
    }
    Ok(())
}

fn reindexutxo(config: &Config) -> hojicoin::Result<()> {
    let chain = open_existing(config)?;
    let utxo = UtxoSet::new(chain.store());
    utxo.reindex(&chain.all_blocks()?)?;
    println!("UTXO index rebuilt");
    Ok(())
}

/// Opens a chain that must already exist: any address works here since we
/// only read the tip, never create a genesis block.
fn open_existing(config: &Config) -> hojicoin::Result<Blockchain> {
    if !config.database.data_dir.exists() {
        return Err(Error::BucketNotExist);
    }
    // A placeholder address is fine: `open_or_create` only uses it if the
    // store turns out to be empty, which we've just ruled out.
    Blockchain::open_or_create(
        &config.database.data_dir,
        "11111111111111111111111111111111",
        config.mining.target_bits,
    )
}
