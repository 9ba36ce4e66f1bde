fn main() {
    if let Err(err) = dataset_merge::cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
