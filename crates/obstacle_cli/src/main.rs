//! CLI smoke entry point.
//!
//! Verifies `obstacle_core` linkage and that the storage stack boots
//! without the Flutter runtime.

use obstacle_core::db::{migrations::latest_version, open_db_in_memory};
use obstacle_core::{ObstacleStore, SqliteKvStore};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("obstacle_core ping={}", obstacle_core::ping());
    println!("obstacle_core version={}", obstacle_core::core_version());

    let conn = match open_db_in_memory() {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("obstacle_core storage=error error={err}");
            return ExitCode::FAILURE;
        }
    };
    match SqliteKvStore::try_new(&conn).map(ObstacleStore::open_or_empty) {
        Ok(store) => {
            println!(
                "obstacle_core storage=ok schema_version={} obstacles={}",
                latest_version(),
                store.len()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("obstacle_core storage=error error={err}");
            ExitCode::FAILURE
        }
    }
}
