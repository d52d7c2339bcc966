fn main() {
    if let Err(err) = rowmap::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
