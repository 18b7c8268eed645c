use std::io::Write;

use colored::Colorize;
use log::LevelFilter;

/// Maps the `-v` count to a level: none is info, `-v` debug, `-vv` trace.
pub fn level_for_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Starts from `RUST_LOG` and lets the CLI level win. Dependency chatter is
/// capped at warn. Calling this twice is harmless.
pub fn init_logger(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(level);
    builder.filter_module("hickory_proto", LevelFilter::Warn);
    builder.filter_module("reqwest", LevelFilter::Warn);
    builder.filter_module("hyper", LevelFilter::Warn);
    builder.filter_module("subhound", level);

    builder.format(|buf, record| {
        let level = record.level();
        let colored_level = match level {
            log::Level::Error => level.to_string().red(),
            log::Level::Warn => level.to_string().yellow(),
            log::Level::Info => level.to_string().green(),
            log::Level::Debug => level.to_string().blue(),
            log::Level::Trace => level.to_string().purple(),
        };
        writeln!(buf, "[{}] {}", colored_level, record.args())
    });

    builder.try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for_verbosity(0), LevelFilter::Info);
        assert_eq!(level_for_verbosity(1), LevelFilter::Debug);
        assert_eq!(level_for_verbosity(2), LevelFilter::Trace);
        assert_eq!(level_for_verbosity(9), LevelFilter::Trace);
    }

    #[test]
    fn second_init_does_not_panic() {
        let _ = init_logger(LevelFilter::Info);
        assert!(init_logger(LevelFilter::Debug).is_err());
    }
}
