use std::error::Error;

use subhound::generator::{LengthRange, Technique, WordlistSource};
use subhound::runner::{Options, OutputTarget, Runner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(Options {
        target: "example.com".to_string(),
        techniques: vec![Technique::Dictionary, Technique::Length],
        wordlist: WordlistSource::Inline(vec![
            "www".to_string(),
            "mail".to_string(),
            "api".to_string(),
        ]),
        brute_length: LengthRange::single(1),
        task_count: 16,
        output: OutputTarget::Memory,
        ..Options::default()
    })?;
    let result = runner.run().await?;

    println!("Nameservers: {}", result.nameservers.len());
    println!("Wildcard: {}", result.wildcard);
    println!("Found: {}", result.records.len());
    for r in result.records.iter() {
        println!(
            "{} cname={:?} a={:?}",
            r.resolve.domain, r.resolve.cname_records, r.resolve.a_records
        );
    }

    Ok(())
}
