fn main() {
    if let Err(err) = tab_telemetry_lib::run() {
        log::error!("tab-telemetry failed: {err:#}");
        eprintln!("tab-telemetry failed: {err:#}");
        std::process::exit(1);
    }
}
