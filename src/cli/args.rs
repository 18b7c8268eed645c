use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "subhound",
    version,
    about = "subdomain enumeration over DNS",
    long_about = "Subhound enumerates subdomains of a target by dictionary words, exhaustive short labels and hosts already indexed by a recon API, then resolves every candidate against a pool of nameservers.\n\nExamples:\n  subhound -t example.com\n  subhound -t example.com -x DLF -f 'me@example.com|KEY' --fetch-title\n  subhound -t example.com -l 1-2 -o ./example.csv\n\nTip: Use --config to persist the recon token and nameservers."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        long = "nc",
        visible_alias = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'o',
        long = "o",
        visible_alias = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "CSV file for results, truncated on every run (default ./out.txt)."
    )]
    pub output: Option<String>,

    #[arg(
        short = 't',
        long = "tg",
        visible_alias = "target",
        value_name = "DOMAIN",
        help_heading = "Input",
        help = "Target domain, e.g. example.com."
    )]
    pub target: Option<String>,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.subhound/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'x',
        long = "tq",
        visible_alias = "techniques",
        value_name = "LETTERS",
        help_heading = "Enumeration",
        help = "Techniques to run: D (dictionary), L (length brute), F (recon API). Default DL."
    )]
    pub techniques: Option<String>,

    #[arg(
        short = 'd',
        long = "df",
        visible_alias = "dict-file",
        value_name = "FILE",
        help_heading = "Enumeration",
        help = "Dictionary file, one label per line (defaults to the built-in list)."
    )]
    pub dict_file: Option<String>,

    #[arg(
        short = 'l',
        long = "bl",
        visible_alias = "brute-length",
        value_name = "N|MIN-MAX",
        help_heading = "Enumeration",
        help = "Label length or length range for technique L (default 1-3)."
    )]
    pub brute_length: Option<String>,

    #[arg(
        long = "nwc",
        visible_alias = "no-wildcard-check",
        help_heading = "Enumeration",
        help = "Skip wildcard DNS detection."
    )]
    pub no_wildcard_check: bool,

    #[arg(
        short = 'f',
        long = "rt",
        visible_alias = "recon-token",
        value_name = "EMAIL|KEY",
        help_heading = "Recon",
        help = "Recon API credential, required by technique F."
    )]
    pub recon_token: Option<String>,

    #[arg(
        long = "ru",
        visible_alias = "recon-url",
        value_name = "URL",
        help_heading = "Recon",
        help = "Recon API search endpoint."
    )]
    pub recon_url: Option<String>,

    #[arg(
        long = "ns",
        visible_alias = "nameserver",
        value_name = "IPS",
        help_heading = "DNS",
        help = "Nameservers to resolve against (comma-separated IPs, port 53)."
    )]
    pub nameserver: Option<String>,

    #[arg(
        long = "ft",
        visible_alias = "fetch-title",
        help_heading = "HTTP",
        help = "Fetch the HTTP title of every live subdomain."
    )]
    pub fetch_title: bool,

    #[arg(
        short = 'n',
        long = "tc",
        visible_alias = "task-count",
        value_name = "N",
        help_heading = "Performance",
        help = "Resolution workers (default 2 x CPU + 1)."
    )]
    pub task_count: Option<usize>,

    #[arg(
        short = 'w',
        long = "wk",
        visible_alias = "workers",
        value_name = "N",
        help_heading = "Performance",
        help = "Number of runtime worker threads (default CPU count)."
    )]
    pub workers: Option<usize>,
}
