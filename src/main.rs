fn main() {
    if let Err(err) = breathe_lib::run() {
        eprintln!("breathe: {err:#}");
        std::process::exit(1);
    }
}
