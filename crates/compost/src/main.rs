mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "compost", version, about = "Compost RPC command-line tool")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);

    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_call_subcommand() {
        let cli = Cli::try_parse_from([
            "compost",
            "call",
            "0x010",
            "--tcp",
            "127.0.0.1:9000",
            "--payload",
            "05000000",
        ])
        .expect("call args should parse");

        match cli.command {
            Command::Call(args) => {
                assert_eq!(args.rpc_id, 0x010);
                assert_eq!(args.target.tcp.as_deref(), Some("127.0.0.1:9000"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_two_targets() {
        let err = Cli::try_parse_from([
            "compost",
            "listen",
            "--tcp",
            "127.0.0.1:9000",
            "--spawn",
            "device",
        ])
        .expect_err("conflicting targets should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_wide_rpc_id() {
        let err = Cli::try_parse_from(["compost", "call", "0x1000", "--spawn", "device"])
            .expect_err("rpc id above 0xfff should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_echo_reject_list() {
        let cli = Cli::try_parse_from(["compost", "echo", "--reject", "0x11,18", "--notify", "0x20"])
            .expect("echo args should parse");

        match cli.command {
            Command::Echo(args) => {
                assert_eq!(args.reject, vec![0x011, 18]);
                assert_eq!(args.notify, Some(0x020));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn proxy_defaults_to_loopback() {
        let cli = Cli::try_parse_from(["compost", "proxy", "--spawn", "device"])
            .expect("proxy args should parse");

        match cli.command {
            Command::Proxy(args) => {
                assert_eq!(args.bind, "127.0.0.1");
                assert_eq!(args.port, 50051);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
