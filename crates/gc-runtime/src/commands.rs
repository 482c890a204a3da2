//! Line commands accepted on stdin.

use anyhow::{bail, Context, Result};

use gc_coordinator::NetworkId;

/// Help text printed for `help`.
pub const HELP: &str = "\
commands:
  submit <mg/dL>     encrypt and submit a glucose value
  check              evaluate the risk predicate
  reveal             check and decrypt the result
  network <id>       switch wallet network
  account <address>  switch wallet account
  connect <id> <address>
  disconnect         drop network and account
  status             print readiness and results
  metrics            print Prometheus metrics
  help               print this text
  quit               exit";

/// One parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Submit the given text as a glucose value.
    Submit(String),
    /// Risk check without disclosure.
    Check,
    /// Risk check with disclosure.
    Reveal,
    /// Switch network.
    Network(NetworkId),
    /// Switch account.
    Account(String),
    /// Connect with network and account.
    Connect(NetworkId, String),
    /// Disconnect the wallet.
    Disconnect,
    /// Print status.
    Status,
    /// Print metrics.
    Metrics,
    /// Print help.
    Help,
    /// Exit.
    Quit,
}

impl Command {
    /// Parse a line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("submit", [value]) => Command::Submit(value.to_string()),
            ("submit", _) => bail!("usage: submit <mg/dL>"),
            ("check", []) => Command::Check,
            ("reveal", []) => Command::Reveal,
            ("network", [id]) => Command::Network(parse_network(id)?),
            ("network", _) => bail!("usage: network <chain id>"),
            ("account", [address]) => Command::Account(address.to_string()),
            ("account", _) => bail!("usage: account <address>"),
            ("connect", [id, address]) => Command::Connect(parse_network(id)?, address.to_string()),
            ("connect", _) => bail!("usage: connect <chain id> <address>"),
            ("disconnect", []) => Command::Disconnect,
            ("status", []) => Command::Status,
            ("metrics", []) => Command::Metrics,
            ("help" | "?", []) => Command::Help,
            ("quit" | "exit", []) => Command::Quit,
            (other, _) => bail!("unknown command {other:?}; try `help`"),
        };
        Ok(Some(command))
    }
}

fn parse_network(raw: &str) -> Result<NetworkId> {
    raw.parse::<u64>()
        .map(NetworkId)
        .with_context(|| format!("invalid chain id {raw:?}"))
}
