use std::net::IpAddr;

use clap::Parser;

#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable detailed debug logging (global)
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,

    /// Enable verbose logging (global)
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// JSON config file (missing keys keep defaults)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<String>,

    /// Nameserver to query instead of the system resolver (repeatable)
    #[arg(long = "nameserver", global = true, value_name = "IP")]
    pub nameservers: Vec<IpAddr>,

    /// Write results (JSONL/CSV/TXT) into this directory
    #[arg(short = 'o', long, global = true)]
    pub out: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Look up DNS records for a domain
    Dns {
        domain: String,

        /// Record type (A, AAAA, MX, TXT, NS, CNAME, SOA, ...)
        #[arg(short = 't', long = "type", default_value = "A")]
        record_type: String,
    },

    /// Reverse (PTR) lookup for an IPv4 address
    Reverse {
        ip: String,
    },

    /// Brute-force subdomains from a wordlist
    Subdomains {
        domain: String,

        /// Newline-delimited wordlist (default: built-in common names)
        #[arg(short = 'w', long)]
        wordlist: Option<String>,

        /// Probe resolved subdomains over HTTPS/HTTP
        #[arg(short = 'a', long, default_value_t = false)]
        check_active: bool,

        /// Concurrent liveness probes (overrides config)
        #[arg(short = 'c', long)]
        concurrency: Option<usize>,
    },

    /// Run the port scanner against a host or IPv4 address
    Portscan {
        target: String,

        /// Scan type flag passed to the scanner
        #[arg(short = 's', long, default_value = "-sV", allow_hyphen_values = true)]
        scan_type: String,

        /// Scanner timeout in seconds (overrides config)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Run the SQL injection scanner against a URL
    Sqli {
        url: String,

        /// GET or POST
        #[arg(short = 'm', long, default_value = "GET")]
        method: String,

        /// POST body (used only with --method POST)
        #[arg(short = 'd', long)]
        data: Option<String>,

        /// Scanner timeout in seconds (overrides config)
        #[arg(long)]
        timeout: Option<u64>,
    },
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
