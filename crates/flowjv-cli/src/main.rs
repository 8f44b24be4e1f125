fn main() {
    flowjv_cli::logging::init();
    if let Err(err) = flowjv_cli::run_from_env() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
