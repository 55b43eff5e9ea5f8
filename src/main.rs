fn main() {
    if let Err(e) = specwright_lib::run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
