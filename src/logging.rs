//! Logging setup.

/// Map a verbosity count to a level filter: 0=warn, 1=info, 2=debug, 3+=trace.
pub fn level_for(verbose: u8, quiet: bool) -> log::LevelFilter {
    if quiet {
        return log::LevelFilter::Error;
    }
    match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Initialize the global logger. `RUST_LOG` still refines per-module levels.
pub fn init(verbose: u8, quiet: bool) {
    let result = env_logger::Builder::new()
        .filter_level(level_for(verbose, quiet))
        .parse_default_env()
        .format_timestamp(None)
        .try_init();
    if result.is_err() {
        log::debug!("Logger already initialized");
    }
}

/// Route log output through the test harness; safe to call from every test.
pub fn try_init_for_tests() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        assert_eq!(level_for(0, false), log::LevelFilter::Warn);
        assert_eq!(level_for(1, false), log::LevelFilter::Info);
        assert_eq!(level_for(2, false), log::LevelFilter::Debug);
        assert_eq!(level_for(7, false), log::LevelFilter::Trace);
        assert_eq!(level_for(3, true), log::LevelFilter::Error);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        try_init_for_tests();
        init(1, false);
    }
}
