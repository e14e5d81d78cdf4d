//! # cpectl
//!
//! Command-line client for cellular gateways (CPE) that expose a single
//! JSON-over-HTTP command endpoint.
//!
//! Results are printed to stdout as pretty JSON; logs go to stderr.
//!
//! ## Exit codes
//!
//! | Code | Meaning                                               |
//! |------|-------------------------------------------------------|
//! | 0    | Command completed                                     |
//! | 1    | Configuration, transport or local I/O error           |
//! | 2    | Login failed, or the device rejected the session      |

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, error};

use cpectl::auth::LoginOutcome;
use cpectl::client::{ClientError, CommandClient, Method};
use cpectl::config::Config;
use cpectl::services::network::{ApnAuth, ApnProfile, PdpType};
use cpectl::services::sms::SmsBox;
use cpectl::services::wifi::WifiBand;

/// Command and session client for cellular gateways.
#[derive(Parser)]
#[command(name = "cpectl", version)]
struct Cli {
    /// Path to TOML config file.
    #[arg(long, global = true, env = "CPECTL_CONFIG")]
    config: Option<PathBuf>,
    /// Device base URL, overriding the config file.
    #[arg(long, global = true)]
    url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session id.
    Login {
        #[arg(long, short)]
        username: Option<String>,
        #[arg(long, short, env = "CPECTL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the session on the device and forget it locally.
    Logout,
    /// Check whether the stored session is still accepted.
    Status,
    /// Change the account password.
    Passwd {
        #[arg(long)]
        new_password: String,
        #[arg(long, short)]
        username: Option<String>,
    },
    /// Send a raw command and print the reply.
    Call {
        cmd: u32,
        /// Send as a POST (write) instead of GET.
        #[arg(long)]
        post: bool,
        /// JSON object merged into the envelope.
        #[arg(long)]
        data: Option<String>,
    },
    /// Cellular WAN status.
    Wan,
    /// APN profiles.
    Apn {
        #[command(subcommand)]
        action: ApnCommand,
    },
    /// SMS inbox and outbox.
    Sms {
        #[command(subcommand)]
        action: SmsCommand,
    },
    /// Wi-Fi radios and stations.
    Wifi {
        #[command(subcommand)]
        action: WifiCommand,
    },
    /// Device identity and versions.
    Info,
    /// Reboot the device.
    Reboot,
    /// Upload a firmware image.
    Upgrade { file: PathBuf },
}

#[derive(Subcommand)]
enum ApnCommand {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        apn: String,
        #[arg(long, default_value = "")]
        username: String,
        #[arg(long, default_value = "")]
        password: String,
        /// none, pap, chap or pap_chap
        #[arg(long, default_value = "none", value_parser = parse_apn_auth)]
        auth: ApnAuth,
        /// IPV4, IPV6 or IPV4V6
        #[arg(long, default_value = "IPV4V6", value_parser = parse_pdp_type)]
        pdp: PdpType,
        #[arg(long)]
        default: bool,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
enum SmsCommand {
    List {
        #[arg(long)]
        outbox: bool,
    },
    Send {
        /// Recipient numbers.
        #[arg(required = true)]
        numbers: Vec<String>,
        #[arg(long, short)]
        message: String,
    },
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Subcommand)]
enum WifiCommand {
    Get {
        #[arg(long, default_value = "2.4G")]
        band: WifiBand,
    },
    Clients,
}

impl Commands {
    /// Whether a session rejected while running this command is reported as
    /// exit status 2. Logout succeeds regardless of the session state.
    fn reports_session_expiry(&self) -> bool {
        !matches!(self, Commands::Logout)
    }
}

fn parse_apn_auth(s: &str) -> Result<ApnAuth, String> {
    serde_json::from_value(json!(s.to_ascii_lowercase()))
        .map_err(|_| format!("unknown auth type {s:?}"))
}

fn parse_pdp_type(s: &str) -> Result<PdpType, String> {
    serde_json::from_value(json!(s.to_ascii_uppercase()))
        .map_err(|_| format!("unknown PDP type {s:?}"))
}

/// Outcome of one subcommand.
enum Outcome {
    Done(Value),
    /// Printed, but the process exits with status 2.
    Denied(Value),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("cpectl: configuration error: {e}");
            return ExitCode::from(1);
        }
    };
    if let Some(url) = cli.url {
        config.device.url = url;
    }

    // Logs go to stderr so stdout stays machine-readable.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    let client = match config.connect() {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(1);
        }
    };
    let mut auth_events = client.subscribe();
    let reports_expiry = cli.command.reports_session_expiry();

    let outcome = match run(&client, &config, cli.command).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{e}");
            if e.is_no_auth() {
                return ExitCode::from(2);
            }
            return ExitCode::from(1);
        }
    };

    let (value, denied) = match outcome {
        Outcome::Done(v) => (v, false),
        Outcome::Denied(v) => (v, true),
    };
    match serde_json::to_string_pretty(&value) {
        Ok(text) => println!("{text}"),
        Err(e) => error!("failed to render output: {e}"),
    }

    let expired = reports_expiry
        && !matches!(
            auth_events.try_recv(),
            Err(TryRecvError::Empty | TryRecvError::Closed)
        );
    if expired {
        error!("session rejected by the device; run `cpectl login`");
    }
    if denied || expired {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}

async fn run(
    client: &CommandClient,
    config: &Config,
    command: Commands,
) -> Result<Outcome, ClientError> {
    let username = |u: Option<String>| u.unwrap_or_else(|| config.auth.username.clone());

    let value = match command {
        Commands::Login { username: u, password } => {
            let outcome = client.auth().login(&username(u), &password).await?;
            return Ok(login_output(&outcome));
        }
        Commands::Logout => json!({ "success": client.auth().logout().await }),
        Commands::Status => {
            let authenticated =
                client.session().is_authenticated() && client.auth().check_auth_status().await;
            let out = json!({ "authenticated": authenticated });
            return Ok(if authenticated {
                Outcome::Done(out)
            } else {
                Outcome::Denied(out)
            });
        }
        Commands::Passwd { new_password, username: u } => {
            to_json(client.auth().modify_password(&username(u), &new_password).await?)
        }
        Commands::Call { cmd, post, data } => {
            let payload = match data.as_deref().map(serde_json::from_str::<Map<String, Value>>) {
                None => Map::new(),
                Some(Ok(map)) => map,
                Some(Err(source)) => return Err(ClientError::Encode { cmd, source }),
            };
            let method = if post { Method::Post } else { Method::Get };
            debug!(cmd, method = method.as_str(), "raw call");
            to_json(client.request(cmd, method, &payload).await?)
        }
        Commands::Wan => to_json(client.network().wan_status().await?),
        Commands::Apn { action } => match action {
            ApnCommand::List => to_json(client.network().apn_profiles().await?),
            ApnCommand::Add {
                name,
                apn,
                username,
                password,
                auth,
                pdp,
                default,
            } => {
                let profile = ApnProfile {
                    id: None,
                    profile_name: name,
                    apn,
                    username,
                    password,
                    auth_type: auth,
                    pdp_type: pdp,
                    is_default: default,
                };
                to_json(client.network().save_apn_profile(&profile).await?)
            }
            ApnCommand::Delete { id } => to_json(client.network().delete_apn_profile(&id).await?),
        },
        Commands::Sms { action } => match action {
            SmsCommand::List { outbox } => {
                let mailbox = if outbox { SmsBox::Outbox } else { SmsBox::Inbox };
                to_json(client.sms().list_messages(mailbox).await?)
            }
            SmsCommand::Send { numbers, message } => {
                to_json(client.sms().send_message(numbers.as_slice(), &message).await?)
            }
            SmsCommand::Delete { ids } => {
                to_json(client.sms().delete_messages(ids.as_slice()).await?)
            }
        },
        Commands::Wifi { action } => match action {
            WifiCommand::Get { band } => to_json(client.wifi().settings(band).await?),
            WifiCommand::Clients => to_json(client.wifi().clients().await?),
        },
        Commands::Info => to_json(client.system().device_info().await?),
        Commands::Reboot => to_json(client.system().reboot().await?),
        Commands::Upgrade { file } => to_json(client.system().upload_firmware(&file).await?),
    };
    Ok(Outcome::Done(value))
}

fn login_output(outcome: &LoginOutcome) -> Outcome {
    let mut out = json!({
        "success": outcome.is_success(),
        "message": outcome.message(),
    });
    if let Some(n) = outcome.remaining_attempts() {
        out["remainTimes"] = json!(n);
    }
    if let Some(n) = outcome.lock_seconds() {
        out["lockTime"] = json!(n);
    }
    if outcome.is_success() {
        Outcome::Done(out)
    } else {
        Outcome::Denied(out)
    }
}

fn to_json<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
