fn main() {
    if let Err(err) = billing_recon::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
