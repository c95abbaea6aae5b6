//! otpgate Operator Console
//!
//! Issues and redeems one-time codes against a running store, either one
//! command per invocation or as a long-running line-oriented console.

use std::io::BufRead;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use crossbeam::channel;
use otpgate::{Config, Identity, IssueOutcome, OtpService, StoreClient, VerifyOutcome};
use tracing_subscriber::{fmt, EnvFilter};

/// otpgate CLI
#[derive(Parser, Debug)]
#[command(name = "otpgate")]
#[command(about = "Issue and redeem one-time codes backed by a Redis-compatible store")]
#[command(version)]
struct Args {
    /// Store host (overrides REDIS_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Store port (overrides REDIS_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Per-command reply timeout in milliseconds
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Issue a code for a user (rate limited)
    Issue {
        /// Numeric user id
        #[arg(long)]
        user_id: i64,

        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,
    },

    /// Redeem a code
    Verify {
        /// The 6-digit code
        code: String,
    },

    /// Ping the store
    Ping,

    /// Read `issue`, `verify` and `ping` lines from stdin until EOF or Ctrl+C
    Console,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,otpgate=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::debug!("otpgate v{}", otpgate::VERSION);
    tracing::debug!("Store address: {}", config.store_addr());

    let client = match StoreClient::connect(&config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("Failed to connect to store: {}", e);
            std::process::exit(1);
        }
    };

    let service = OtpService::new(Arc::clone(&client), &config);

    let status = match args.command {
        Commands::Issue {
            user_id,
            username,
            first_name,
            last_name,
        } => {
            let identity = Identity {
                username,
                first_name,
                last_name,
                ..Identity::new(user_id)
            }
            .with_full_name();
            run_issue(&service, &identity)
        }
        Commands::Verify { code } => run_verify(&service, &code),
        Commands::Ping => run_ping(&service),
        Commands::Console => run_console(&service),
    };

    client.close();
    std::process::exit(status);
}

fn load_config(args: &Args) -> otpgate::Result<Config> {
    let mut builder = otpgate::config::ConfigBuilder::from_config(Config::from_env()?);
    if let Some(host) = &args.host {
        builder = builder.store_host(host.as_str());
    }
    if let Some(port) = args.port {
        builder = builder.store_port(port);
    }
    if let Some(ms) = args.timeout_ms {
        builder = builder.command_timeout_ms(ms);
    }

    let config = builder.build();
    config.validate(false)?;
    Ok(config)
}

fn run_issue(service: &OtpService, identity: &Identity) -> i32 {
    match service.issue(identity) {
        IssueOutcome::Issued { code, ttl_secs } => {
            println!("Your code is: {}", code);
            println!("This code will expire in {} minutes.", ttl_secs.div_ceil(60));
            println!("Do not share this code with anyone.");
            0
        }
        IssueOutcome::RateLimited => {
            println!("Please wait before requesting another code.");
            2
        }
        IssueOutcome::Failed => {
            println!("Failed to generate a code. Please try again.");
            1
        }
    }
}

fn run_verify(service: &OtpService, code: &str) -> i32 {
    let outcome = service.verify(code);
    match &outcome {
        VerifyOutcome::Verified(identity) => {
            match serde_json::to_string(identity) {
                Ok(json) => println!("{}", json),
                Err(_) => println!("{}", identity.display_name()),
            }
            0
        }
        VerifyOutcome::Rejected(reason) => {
            tracing::debug!(%reason, "Verification rejected");
            println!("{}", outcome.public_message());
            2
        }
    }
}

fn run_ping(service: &OtpService) -> i32 {
    if service.health() {
        println!("PONG");
        0
    } else {
        println!("Store is not answering");
        1
    }
}

fn run_console(service: &OtpService) -> i32 {
    let (line_tx, line_rx) = channel::unbounded::<String>();
    let (stop_tx, stop_rx) = channel::bounded::<()>(1);

    if let Err(e) = ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    }) {
        tracing::error!("Failed to set Ctrl+C handler: {}", e);
    }

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    tracing::info!("Console ready; commands: issue <id> [username], verify <code>, ping, quit");

    loop {
        channel::select! {
            recv(line_rx) -> line => match line {
                Ok(line) => {
                    if !handle_line(service, line.trim()) {
                        tracing::info!("Console closed");
                        return 0;
                    }
                }
                Err(_) => {
                    tracing::info!("Input closed, shutting down");
                    return 0;
                }
            },
            recv(stop_rx) -> _ => {
                tracing::info!("Received Ctrl+C, shutting down");
                return 0;
            }
        }
    }
}

/// Run one console line; false when the console should stop
fn handle_line(service: &OtpService, line: &str) -> bool {
    let mut words = line.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (None, _, _) => {}
        (Some("quit") | Some("exit"), _, _) => return false,
        (Some("ping"), None, _) => {
            run_ping(service);
        }
        (Some("verify"), Some(code), None) => {
            run_verify(service, code);
        }
        (Some("issue"), Some(id), username) => match id.parse::<i64>() {
            Ok(id) => {
                let identity = Identity {
                    username: username.map(str::to_string),
                    ..Identity::new(id)
                };
                run_issue(service, &identity);
            }
            Err(_) => println!("User id must be a number"),
        },
        _ => println!("Commands: issue <id> [username], verify <code>, ping, quit"),
    }
    true
}
