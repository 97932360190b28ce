// Shared helpers for the end-to-end tests

use yadl::listing::Listing;

pub fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .try_init();
}

pub fn instructions(listing: &Listing) -> Vec<&str> {
    listing.instructions().collect()
}

/// Net bytes a listing leaves on the stack, reading it top to bottom.
/// Calls are balanced by the callee's RET, so only explicit pushes,
/// pops and ESP arithmetic count.
pub fn stack_residue(listing: &Listing) -> i64 {
    let mut depth = 0i64;
    for line in listing.instructions() {
        if let Some(bytes) = line.strip_prefix("SUB ESP, ") {
            depth += bytes.parse::<i64>().unwrap();
        } else if let Some(bytes) = line.strip_prefix("ADD ESP, ") {
            depth -= bytes.parse::<i64>().unwrap();
        } else if line.starts_with("PUSH ") {
            depth += 4;
        } else if line.starts_with("POP ") {
            depth -= 4;
        }
        assert!(depth >= 0, "stack went below the frame in {}", listing.entry_label());
    }
    depth
}
