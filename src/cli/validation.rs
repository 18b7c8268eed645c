use crate::cli::args::CliArgs;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(raw) = args.brute_length.as_deref() {
        crate::generator::parse_length_range(raw)
            .map_err(|e| format!("invalid --brute-length '{raw}': {e}"))?;
    }
    if let Some(raw) = args.techniques.as_deref() {
        crate::generator::parse_techniques(raw)
            .map_err(|e| format!("invalid --techniques '{raw}': {e}"))?;
    }
    if let Some(raw) = args.nameserver.as_deref() {
        crate::resolver::nameserver::parse_nameservers_csv(raw)
            .map_err(|e| format!("invalid --nameserver '{raw}': {e}"))?;
    }
    if let Some(raw) = args.recon_token.as_deref() {
        crate::collector::parse_credential(raw)
            .map_err(|e| format!("invalid --recon-token: {e}"))?;
    }
    if let Some(raw) = args.recon_url.as_deref() {
        reqwest::Url::parse(raw).map_err(|e| format!("invalid --recon-url '{raw}': {e}"))?;
    }
    if args.task_count == Some(0) {
        return Err("invalid --task-count, expected positive integer".to_string());
    }
    if args.workers == Some(0) {
        return Err("invalid --workers, expected positive integer".to_string());
    }
    if let Some(target) = args.target.as_deref() {
        if target.contains("://") || target.contains('/') {
            return Err(format!(
                "invalid --target '{target}': expected a bare domain like example.com"
            ));
        }
    }
    Ok(())
}
