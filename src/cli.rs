use clap::Parser;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: String,
    pub server_args: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Parser, Debug)]
#[command(name = "lsp_smoke")]
#[command(about = "Drive an LSP server over stdio through a definition-jump scenario", long_about = None)]
pub struct Cli {
    /// Language server executable to spawn.
    server: Option<String>,

    /// Arguments passed through to the server.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    server_args: Vec<String>,

    /// Seconds to wait for each response before giving up.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

impl Cli {
    pub fn from_args() -> Self {
        Self::parse()
    }

    pub fn into_config(self) -> Config {
        Config {
            server: self
                .server
                .unwrap_or_else(|| String::from("treesitter-ls")),
            server_args: self.server_args,
            timeout_secs: self.timeout_secs,
        }
    }
}
