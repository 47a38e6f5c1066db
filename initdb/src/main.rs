//! Applies the schema in `migrations/` to the database named by
//! `SCAPTURE_DB_CONNECTION_STRING`.

use std::env;

use movine::Movine;
use postgres::{Client, NoTls};

use log::{debug, info, initialize_logger};

fn main() {
    dotenv::dotenv().ok();

    let logger = initialize_logger();
    let connection_string = env::var("SCAPTURE_DB_CONNECTION_STRING")
        .expect("could not read SCAPTURE_DB_CONNECTION_STRING");
    let migration_dir =
        env::var("SCAPTURE_MIGRATIONS_DIR").unwrap_or_else(|_| String::from("./migrations"));

    debug!(logger, "Connecting to database...");

    let client = Client::connect(&connection_string, NoTls).expect("could not connect to database");

    let mut movine = Movine::new(client);
    movine.set_migration_dir(&migration_dir);

    if movine.status().is_err() {
        debug!(logger, "Initializing movine...");
        movine.initialize().expect("failed to initialize movine")
    }

    info!(logger, "Running migrations..."; "dir" => &migration_dir);
    movine.up().expect("failed to run migrations");

    debug!(logger, "Completed initialization.");
}
