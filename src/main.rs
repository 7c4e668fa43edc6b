fn main() {
    if let Err(err) = i94_warehouse::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
