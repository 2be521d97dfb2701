use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use compost_transport::Target;

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod echo;
pub mod listen;
pub mod proxy;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one request and print the response.
    Call(CallArgs),
    /// Print notifications and unsolicited frames from a remote endpoint.
    Listen(ListenArgs),
    /// Bridge TCP clients onto a remote endpoint.
    Proxy(ProxyArgs),
    /// Act as a remote endpoint that echoes every request.
    Echo(EchoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Call(args) => block_on(call::run(args, format)),
        Command::Listen(args) => block_on(listen::run(args, format)),
        Command::Proxy(args) => block_on(proxy::run(args)),
        Command::Echo(args) => echo::run(args),
        Command::Version(args) => version::run(args),
    }
}

fn block_on<F: std::future::Future<Output = CliResult<i32>>>(future: F) -> CliResult<i32> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))?;
    runtime.block_on(future)
}

/// Where the remote endpoint is. Exactly one is required.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct TargetArgs {
    /// TCP address of the remote endpoint.
    #[arg(long, value_name = "HOST:PORT", env = "COMPOST_TARGET_TCP")]
    pub tcp: Option<String>,
    /// Unix domain socket of the remote endpoint.
    #[arg(long, value_name = "PATH", env = "COMPOST_TARGET_UNIX")]
    pub unix: Option<PathBuf>,
    /// Command to spawn; the protocol runs over its stdin/stdout.
    #[arg(long, value_name = "COMMAND", env = "COMPOST_TARGET_SPAWN")]
    pub spawn: Option<String>,
}

impl TargetArgs {
    pub fn target(&self) -> CliResult<Target> {
        if let Some(addr) = &self.tcp {
            return Ok(Target::Tcp(addr.clone()));
        }
        if let Some(path) = &self.unix {
            return Ok(Target::Unix(path.clone()));
        }
        if let Some(command) = &self.spawn {
            return Target::spawn_command(command)
                .ok_or_else(|| CliError::new(USAGE, "--spawn command must not be empty"));
        }
        Err(CliError::new(USAGE, "one of --tcp, --unix or --spawn is required"))
    }
}

#[derive(Args, Debug)]
pub struct CallArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// Rpc id, decimal or 0x-prefixed hex.
    #[arg(value_parser = parse_rpc_id)]
    pub rpc_id: u16,
    /// Encoded request payload as hex (e.g. "05000000 02000000").
    #[arg(long, default_value = "")]
    pub payload: String,
    /// Maximum time to wait for the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ProxyArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,
    /// TCP port for clients.
    #[arg(long, default_value_t = compost_session::DEFAULT_PROXY_PORT)]
    pub port: u16,
    /// Timeout for each forwarded call (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Serve one TCP client at a time on this address instead of stdin/stdout.
    #[arg(long, value_name = "HOST:PORT")]
    pub listen: Option<String>,
    /// Rpc ids answered as unsupported (comma-separated).
    #[arg(long, value_delimiter = ',', value_parser = parse_rpc_id)]
    pub reject: Vec<u16>,
    /// Send a notification with this rpc id before each response.
    #[arg(long, value_parser = parse_rpc_id)]
    pub notify: Option<u16>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Accepts `16`, `0x10` or `0X10`, up to 0xfff.
pub fn parse_rpc_id(input: &str) -> Result<u16, String> {
    let input = input.trim();
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => input.parse(),
    };
    match parsed {
        Ok(id) if id <= compost_frame::MAX_RPC_ID => Ok(id),
        Ok(id) => Err(format!("rpc id {id:#x} exceeds 0xfff")),
        Err(_) => Err(format!("invalid rpc id: {input}")),
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_ids_in_hex_and_decimal() {
        assert_eq!(parse_rpc_id("0x010"), Ok(0x010));
        assert_eq!(parse_rpc_id("0XFEF"), Ok(0xFEF));
        assert_eq!(parse_rpc_id("16"), Ok(16));
        assert!(parse_rpc_id("0x1000").is_err());
        assert!(parse_rpc_id("abc").is_err());
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration(" ").is_err());
    }

    #[test]
    fn spawn_target_splits_arguments() {
        let args = TargetArgs {
            tcp: None,
            unix: None,
            spawn: Some("compost echo --notify 0x20".into()),
        };
        match args.target().unwrap() {
            Target::Spawn { program, args } => {
                assert_eq!(program, "compost");
                assert_eq!(args, vec!["echo", "--notify", "0x20"]);
            }
            other => panic!("unexpected target {other:?}"),
        }
    }
}
