use std::fmt;
use std::path::PathBuf;

use compost_frame::Frame;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::memory::MemoryTransport;
use crate::process::{self, ProcessTransport};
use crate::tcp::{self, TcpTransport};
use crate::traits::Transport;

#[cfg(unix)]
use crate::uds::{self, UdsTransport};

/// Where a remote endpoint can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `host:port` of a TCP listener.
    Tcp(String),
    /// Path of a Unix domain socket.
    Unix(PathBuf),
    /// A program speaking the protocol on its stdin/stdout.
    Spawn { program: String, args: Vec<String> },
}

impl Target {
    /// Parse a command line such as `"./device --fast"` into a spawn target.
    ///
    /// Arguments are split on whitespace; quoting is not interpreted.
    pub fn spawn_command(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Target::Spawn {
            program,
            args: parts.collect(),
        })
    }

    /// Open a transport to this target.
    pub async fn open(&self) -> Result<Connection> {
        match self {
            Target::Tcp(addr) => Ok(Connection::Tcp(tcp::connect(addr.as_str()).await?)),
            #[cfg(unix)]
            Target::Unix(path) => Ok(Connection::Unix(uds::connect(path).await?)),
            #[cfg(not(unix))]
            Target::Unix(path) => Err(crate::TransportError::Connect {
                addr: path.display().to_string(),
                source: std::io::Error::from(std::io::ErrorKind::Unsupported),
            }),
            Target::Spawn { program, args } => Ok(Connection::Process(process::spawn(program, args)?)),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Tcp(addr) => write!(f, "tcp://{addr}"),
            Target::Unix(path) => write!(f, "unix://{}", path.display()),
            Target::Spawn { program, args } if args.is_empty() => write!(f, "spawn:{program}"),
            Target::Spawn { program, args } => write!(f, "spawn:{program} {}", args.join(" ")),
        }
    }
}

/// Any of the built-in transports, chosen at runtime.
#[derive(Debug)]
pub enum Connection {
    Tcp(TcpTransport),
    #[cfg(unix)]
    Unix(UdsTransport),
    Process(ProcessTransport),
    Memory(MemoryTransport),
}

impl Transport for Connection {
    async fn write_frame(&self, frame: &Frame) -> Result<()> {
        match self {
            Connection::Tcp(t) => t.write_frame(frame).await,
            #[cfg(unix)]
            Connection::Unix(t) => t.write_frame(frame).await,
            Connection::Process(t) => t.write_frame(frame).await,
            Connection::Memory(t) => t.write_frame(frame).await,
        }
    }

    async fn read_frame(&self, cancel: &CancellationToken) -> Result<Frame> {
        match self {
            Connection::Tcp(t) => t.read_frame(cancel).await,
            #[cfg(unix)]
            Connection::Unix(t) => t.read_frame(cancel).await,
            Connection::Process(t) => t.read_frame(cancel).await,
            Connection::Memory(t) => t.read_frame(cancel).await,
        }
    }
}

impl From<MemoryTransport> for Connection {
    fn from(transport: MemoryTransport) -> Self {
        Connection::Memory(transport)
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;
    use crate::memory;

    #[test]
    fn spawn_command_splits_on_whitespace() {
        let target = Target::spawn_command("  ./device   --port 3 ").unwrap();
        assert_eq!(
            target,
            Target::Spawn {
                program: "./device".into(),
                args: vec!["--port".into(), "3".into()],
            }
        );
        assert_eq!(target.to_string(), "spawn:./device --port 3");
        assert!(Target::spawn_command("   ").is_none());
    }

    #[test]
    fn display_names_scheme() {
        assert_eq!(Target::Tcp("127.0.0.1:9".into()).to_string(), "tcp://127.0.0.1:9");
        assert_eq!(
            Target::Unix(PathBuf::from("/tmp/x.sock")).to_string(),
            "unix:///tmp/x.sock"
        );
    }

    #[tokio::test]
    async fn open_tcp_target() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });

        let conn = Target::Tcp(addr.to_string()).open().await.unwrap();
        assert!(matches!(conn, Connection::Tcp(_)));
        accept.await.unwrap();
    }

    #[tokio::test]
    async fn memory_connection_delegates() {
        let (a, b) = memory::pair();
        let a = Connection::from(a);
        let b = Connection::from(b);
        let frame = Frame::from_payload(7, 0x010, false, b"hi").unwrap();

        a.write_frame(&frame).await.unwrap();
        assert_eq!(b.read_frame(&CancellationToken::new()).await.unwrap(), frame);
    }
}
