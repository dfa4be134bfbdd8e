fn main() {
    #[cfg(feature = "cli")]
    zipdelta::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("zipdelta: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
