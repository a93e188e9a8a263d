//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `clinic_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

use std::process::ExitCode;

fn main() -> ExitCode {
    println!("clinic_core ping={}", clinic_core::ping());
    println!("clinic_core version={}", clinic_core::core_version());

    // Opening an in-memory database exercises the migration chain.
    match clinic_core::open_db_in_memory() {
        Ok(_) => {
            println!("clinic_core db=ok");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("clinic_core db=error {err}");
            ExitCode::FAILURE
        }
    }
}
