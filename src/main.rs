fn main() {
    if let Err(err) = auto_eda::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
