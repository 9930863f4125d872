use clap::Parser;

use crate::config::{
    Config, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_LINE_BYTES, DEFAULT_MESSAGE_CAPACITY,
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address the server should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen: String,

    /// Lines buffered between connections and the event loop.
    #[arg(long, default_value_t = DEFAULT_MESSAGE_CAPACITY)]
    pub message_capacity: usize,

    /// Longest accepted command line in bytes; longer lines close the connection.
    #[arg(long, default_value_t = DEFAULT_MAX_LINE_BYTES)]
    pub max_line_bytes: usize,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Config {
            listen_addr: cli.listen,
            message_capacity: cli.message_capacity,
            max_line_bytes: cli.max_line_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["kv-event-loop"]).expect("parse defaults");
        assert_eq!(Config::from(cli), Config::default());
    }

    #[test]
    fn listen_address_is_configurable() {
        let cli = Cli::try_parse_from(["kv-event-loop", "--listen", "127.0.0.1:0"])
            .expect("parse listen flag");
        assert_eq!(Config::from(cli).listen_addr, "127.0.0.1:0");
    }
}
