use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use clap::Parser;

#[derive(Parser, Debug)]
pub struct Args {
    /// Whether scholboard's clients connect to it over https.
    /// If so, the sessionid cookie is sent as a secure cookie.
    #[arg(short, long)]
    secure: bool,

    /// The address scholboard should listen on. By default
    /// scholboard will listen just on the IPv4 loopback.
    #[arg(short, long)]
    address: Option<String>,

    /// The port scholboard listens on.
    #[arg(short, long, default_value_t = 80)]
    port: u16,

    /// Directory holding the sqlite database.
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,

    /// Superadmin account to create at startup if the email is
    /// unknown. Existing accounts are left untouched.
    #[arg(long, value_name = "EMAIL:PASSWORD", value_parser = parse_bootstrap)]
    bootstrap_superadmin: Option<(String, String)>,
}

fn parse_bootstrap(value: &str) -> Result<(String, String), String> {
    value.split_once(':')
        .filter(|(email, password)| !email.is_empty() && !password.is_empty())
        .map(|(email, password)| (email.to_string(), password.to_string()))
        .ok_or_else(|| "expected EMAIL:PASSWORD".to_string())
}

impl Args {
    pub fn addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.address
            .as_deref()
            .unwrap_or("127.0.0.1")
            .parse()
            .map(|addr: IpAddr| (addr, self.port).into())
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn bootstrap_superadmin(&self) -> Option<(&str, &str)> {
        self.bootstrap_superadmin
            .as_ref()
            .map(|(email, password)| (email.as_str(), password.as_str()))
    }
}
