use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{error::ErrorKind, Parser};
use colored::Colorize;
use log::debug;
use serde::{Serialize, Serializer};

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::collector::{parse_credential, DEFAULT_RECON_URL};
use crate::config::{self, ConfigFile};
use crate::generator::{
    format_techniques, parse_length_range, parse_techniques, LengthRange, Technique,
    WordlistSource,
};
use crate::logging;
use crate::resolver::nameserver::parse_nameservers_csv;
use crate::runner::{Options, OutputTarget, Runner};
use crate::worker::default_task_count;

fn print_banner() {
    const BANNER: &str = r#"
                 __    __                          __
   _______  __  / /_  / /_  ____  __  ______  ____/ /
  / ___/ / / / / __ \/ __ \/ __ \/ / / / __ \/ __  /
 (__  ) /_/ / / /_/ / / / / /_/ / /_/ / / / / /_/ /
/____/\__,_/ /_.___/_/ /_/\____/\__,_/_/ /_/\__,_/
       v0.1.0 - subdomain enumeration over DNS
    "#;
    print!("{}", BANNER.bold().cyan());
    println!();
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn mask_token<S: Serializer>(token: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    match token.as_deref().and_then(|t| t.split_once('|')) {
        Some((email, _)) => s.serialize_some(&format!("{email}|***")),
        None if token.is_some() => s.serialize_some("***"),
        None => s.serialize_none(),
    }
}

#[derive(Clone, Debug, Serialize)]
struct RunConfig {
    target: String,
    techniques: Vec<Technique>,
    dict_file: Option<String>,
    brute_length: LengthRange,
    #[serde(serialize_with = "mask_token")]
    recon_token: Option<String>,
    recon_url: String,
    task_count: usize,
    check_wildcard: bool,
    nameservers: Vec<SocketAddr>,
    fetch_title: bool,
    output: String,
    workers: usize,
    verbose: u8,
    no_color: bool,
}

impl RunConfig {
    fn to_options(&self) -> Result<Options, String> {
        let recon_credential = self
            .recon_token
            .as_deref()
            .map(parse_credential)
            .transpose()
            .map_err(|e| format!("invalid recon token: {e}"))?;
        Ok(Options {
            target: self.target.clone(),
            techniques: self.techniques.clone(),
            wordlist: match self.dict_file.as_ref() {
                Some(path) => WordlistSource::FilePath(path.clone()),
                None => WordlistSource::Builtin,
            },
            brute_length: self.brute_length,
            recon_credential,
            recon_url: self.recon_url.clone(),
            task_count: self.task_count,
            check_wildcard: self.check_wildcard,
            nameservers: self.nameservers.clone(),
            fetch_title: self.fetch_title,
            output: OutputTarget::Csv(PathBuf::from(&self.output)),
            announce: true,
        })
    }
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let target = args
        .target
        .or(cfg.target)
        .map(|t| t.trim().trim_end_matches('.').to_lowercase())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| "a target domain is required (--target)".to_string())?;

    let techniques_raw = args
        .techniques
        .or(cfg.techniques)
        .unwrap_or_else(|| "DL".to_string());
    let techniques = parse_techniques(&techniques_raw)
        .map_err(|e| format!("invalid --techniques '{techniques_raw}': {e}"))?;

    let brute_length = match args.brute_length.or(cfg.brute_length) {
        Some(raw) => parse_length_range(&raw)
            .map_err(|e| format!("invalid --brute-length '{raw}': {e}"))?,
        None => LengthRange::default(),
    };

    let recon_token = args.recon_token.or(cfg.recon_token);
    if let Some(raw) = recon_token.as_deref() {
        parse_credential(raw).map_err(|e| format!("invalid --recon-token: {e}"))?;
    }
    if techniques.contains(&Technique::Recon) && recon_token.is_none() {
        return Err("technique F needs a recon credential (--recon-token email|key)".to_string());
    }
    let recon_url = args
        .recon_url
        .or(cfg.recon_url)
        .unwrap_or_else(|| DEFAULT_RECON_URL.to_string());

    let nameservers = match args.nameserver {
        Some(raw) => parse_nameservers_csv(&raw)?,
        None => match cfg.nameservers {
            Some(list) if !list.is_empty() => parse_nameservers_csv(&list.join(","))
                .map_err(|e| format!("invalid nameservers in config: {e}"))?,
            _ => Vec::new(),
        },
    };

    let task_count = args
        .task_count
        .or(cfg.task_count)
        .unwrap_or_else(default_task_count);
    if task_count == 0 {
        return Err("invalid task_count, expected positive integer".to_string());
    }
    let workers = args
        .workers
        .or(cfg.workers)
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
        .max(1);

    let check_wildcard = !args.no_wildcard_check && cfg.check_wildcard.unwrap_or(true);
    let fetch_title = args.fetch_title || cfg.fetch_title.unwrap_or(false);
    let no_color = args.no_color || cfg.no_color.unwrap_or(false);
    let verbose = if args.verbose > 0 {
        args.verbose
    } else {
        cfg.verbose.unwrap_or(0)
    };

    let dict_file = args
        .dict_file
        .or(cfg.dict_file)
        .map(|p| config::expand_tilde_string(&p));
    let output = config::expand_tilde_string(
        &args
            .output
            .or(cfg.output)
            .unwrap_or_else(|| "./out.txt".to_string()),
    );

    Ok(RunConfig {
        target,
        techniques,
        dict_file,
        brute_length,
        recon_token,
        recon_url,
        task_count,
        check_wildcard,
        nameservers,
        fetch_title,
        output,
        workers,
        verbose,
        no_color,
    })
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    print_banner();

    format_kv_line("Target", &run.target);
    format_kv_line("Techniques", &format_techniques(&run.techniques));
    if run.techniques.contains(&Technique::Length) {
        format_kv_line("Length", &run.brute_length.to_string());
    }
    format_kv_line(
        "Dictionary",
        run.dict_file.as_deref().unwrap_or("built-in"),
    );
    format_kv_line("Tasks", &run.task_count.to_string());
    format_kv_line(
        "DNS",
        &if run.nameservers.is_empty() {
            "built-in list".to_string()
        } else {
            format!("{} nameservers", run.nameservers.len())
        },
    );
    format_kv_line("Wildcard", format_bool(run.check_wildcard));
    format_kv_line("Title", format_bool(run.fetch_title));
    format_kv_line("Output", &run.output);
    println!();

    match serde_json::to_string_pretty(&run) {
        Ok(json) => debug!("resolved configuration:\n{json}"),
        Err(e) => debug!("could not render configuration: {e}"),
    }

    let runner = Runner::new(run.to_options()?).map_err(|e| e.to_string())?;
    let result = runner.run().await.map_err(|e| e.to_string())?;

    if result.wildcard {
        println!(
            "{}",
            "target has wildcard dns, only recon hosts were checked".yellow()
        );
    }
    println!();
    println!(
        ":: Completed :: {} subdomains in {}s ::",
        result.records.len(),
        result.elapsed.as_secs()
    );

    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = e.print();
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    let cfg = match args.config.as_deref() {
        Some(path) => config::load_config(&config::expand_tilde(path), false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;

    if run.no_color {
        colored::control::set_override(false);
    }
    logging::init_logger(logging::level_for_verbosity(run.verbose))
        .map_err(|e| format!("failed to initialize logger: {e}"))?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(run.workers)
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))?;
    Ok(())
}
