use ilevel_types::catalog::builtin_streams;

/// Execute the `streams` command: list built-in streams in processing order.
pub fn execute() {
    for stream in builtin_streams() {
        let key = stream.replication_key.as_deref().unwrap_or("-");
        println!(
            "{:26} {:28} {:22} {}",
            stream.name.as_str(),
            stream.strategy.as_str(),
            stream.entity.as_str(),
            key
        );
    }
}
