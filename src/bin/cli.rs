//! CarbonDB CLI Client
//!
//! Command-line interface for interacting with a CarbonDB cluster.

use carbondb::Client;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

/// CarbonDB CLI
#[derive(Parser, Debug)]
#[command(name = "carbon-cli")]
#[command(about = "CLI for the CarbonDB key-value store")]
struct Args {
    /// Node address (host or host:port); repeat to race several nodes
    #[arg(short = 'H', long = "host", default_value = "127.0.0.1:13051")]
    hosts: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read a value by key
    Read {
        /// The key to read
        key: String,
    },

    /// Write a key-value pair
    Write {
        /// The key to write
        key: String,

        /// The value, parsed as JSON when possible and stored as a string otherwise
        value: String,
    },

    /// Delete a key
    Delete {
        /// The key to delete
        key: String,
    },

    /// Authenticate with the selected node
    Auth {
        /// The password to send
        password: String,
    },

    /// Ping the selected node
    Ping,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> carbondb::Result<()> {
    let mut client = Client::connect(&args.hosts)?;
    if let (Some(host), Some(latency)) = (client.active_host(), client.latency()) {
        tracing::info!("Using {} ({:.2}ms)", host, latency.as_secs_f64() * 1000.0);
    }

    match args.command {
        Commands::Read { key } => match client.read::<Value>(&key)? {
            Some(value) => println!("{}", value),
            None => println!("(nil)"),
        },
        Commands::Write { key, value } => {
            let value = serde_json::from_str::<Value>(&value).unwrap_or(Value::String(value));
            client.write(&key, &value)?;
            println!("OK");
        }
        Commands::Delete { key } => {
            client.delete(&key)?;
            println!("OK");
        }
        Commands::Auth { password } => {
            client.auth(&password)?;
            println!("OK");
        }
        Commands::Ping => {
            let elapsed = client.ping()?;
            println!("HELO in {:.2}ms", elapsed.as_secs_f64() * 1000.0);
        }
    }

    Ok(())
}
