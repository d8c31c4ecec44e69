//! Subcommands and their execution.

use crate::config::RingArgs;
use anyhow::{anyhow, Context};
use clap::Subcommand;
use corelib::network::{unexpected, NodeStatus, PeerClient, Request, Response};
use corelib::node::NodeInfo;
use node::Node;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use streaming::{TcpClient, TcpServer};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_NODE: &str = "127.0.0.1:7000";
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a node until interrupted, then leave the ring gracefully
    Start {
        /// Address to listen on; the node id is derived from it
        #[arg(long)]
        bind: SocketAddr,

        /// Any member of an existing ring; omit to create a new ring
        #[arg(long)]
        join: Option<SocketAddr>,

        #[command(flatten)]
        ring: RingArgs,
    },

    /// Store a value
    Put {
        #[arg(long, default_value = DEFAULT_NODE)]
        node: SocketAddr,
        key: String,
        value: String,
    },

    /// Read a value
    Get {
        #[arg(long, default_value = DEFAULT_NODE)]
        node: SocketAddr,
        key: String,
    },

    /// Delete a key
    Delete {
        #[arg(long, default_value = DEFAULT_NODE)]
        node: SocketAddr,
        key: String,
    },

    /// Show a node's pointers and record count
    Status {
        #[arg(long, default_value = DEFAULT_NODE)]
        node: SocketAddr,
    },
}

#[derive(Debug)]
pub enum CommandResult {
    Stopped(NodeInfo),
    Stored,
    Deleted,
    Value(Option<Vec<u8>>),
    Status(NodeStatus),
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandResult::Stopped(node) => write!(f, "node {} left the ring", node),
            CommandResult::Stored => write!(f, "OK"),
            CommandResult::Deleted => write!(f, "DELETED"),
            CommandResult::Value(Some(value)) => write!(f, "{}", String::from_utf8_lossy(value)),
            CommandResult::Value(None) => write!(f, "(not found)"),
            CommandResult::Status(status) => {
                writeln!(f, "node:        {}", status.node)?;
                writeln!(f, "state:       {}", status.state)?;
                match status.predecessor {
                    Some(pred) => writeln!(f, "predecessor: {}", pred)?,
                    None => writeln!(f, "predecessor: (unknown)")?,
                }
                let successors: Vec<String> = status.successors.iter().map(|n| n.to_string()).collect();
                writeln!(f, "successors:  {}", successors.join(", "))?;
                write!(f, "records:     {}", status.records)
            }
        }
    }
}

impl Command {
    pub async fn execute(self) -> anyhow::Result<CommandResult> {
        match self {
            Command::Start { bind, join, ring } => run_node(bind, join, ring).await,
            Command::Put { node, key, value } => {
                let request = Request::ClientPut {
                    key: key.into_bytes(),
                    value: value.into_bytes(),
                };
                match remote(node, request).await? {
                    Response::Ack => Ok(CommandResult::Stored),
                    other => Err(unexpected("CLIENT_PUT", &other).into()),
                }
            }
            Command::Get { node, key } => {
                match remote(node, Request::ClientGet { key: key.into_bytes() }).await? {
                    Response::Value(value) => Ok(CommandResult::Value(value)),
                    other => Err(unexpected("CLIENT_GET", &other).into()),
                }
            }
            Command::Delete { node, key } => {
                match remote(node, Request::ClientDelete { key: key.into_bytes() }).await? {
                    Response::Ack => Ok(CommandResult::Deleted),
                    other => Err(unexpected("CLIENT_DELETE", &other).into()),
                }
            }
            Command::Status { node } => match remote(node, Request::Status).await? {
                Response::Status(status) => Ok(CommandResult::Status(status)),
                other => Err(unexpected("STATUS", &other).into()),
            },
        }
    }
}

async fn remote(node: SocketAddr, request: Request) -> anyhow::Result<Response> {
    let name = request.name();
    let response = tokio::time::timeout(CLIENT_TIMEOUT, TcpClient::new().call(node, request))
        .await
        .map_err(|_| anyhow!("{} to {} timed out", name, node))?
        .with_context(|| format!("{} to {}", name, node))?;
    Ok(response.into_result()?)
}

async fn run_node(
    bind: SocketAddr,
    join: Option<SocketAddr>,
    ring: RingArgs,
) -> anyhow::Result<CommandResult> {
    let config = ring.load()?;
    let server = TcpServer::bind(bind).await?;
    let addr = server.local_addr()?;
    let node = Node::new(addr, config, Arc::new(TcpClient::new()))?;

    let shutdown = CancellationToken::new();
    let gateway = tokio::spawn(server.serve(node.clone(), shutdown.clone()));

    match join {
        Some(contact) => node
            .join(contact)
            .await
            .with_context(|| format!("joining via {}", contact))?,
        None => node.create()?,
    }
    info!("Node {} serving; Ctrl-C to leave", node.info());

    tokio::signal::ctrl_c().await?;
    if let Err(err) = node.leave().await {
        warn!("Node {} left with errors: {}", node.info(), err);
    }

    shutdown.cancel();
    gateway.await?;
    Ok(CommandResult::Stopped(node.info()))
}
