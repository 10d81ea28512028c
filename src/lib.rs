#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::{
    config::{ConfigFairing, StoreFairing},
    logging::LoggerFairing,
};

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod store;

/// Build the server: routes, catchers, and the fairings that load config and
/// connect the election store at ignition.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .attach(LoggerFairing)
}

/// A server over an already-built store and config, skipping the ignite
/// fairings.
#[cfg(test)]
pub(crate) fn rocket_for_store(store: store::Store, config: config::Config) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .manage(config)
        .manage(store)
        .attach(LoggerFairing)
}

/// A fresh, randomly named database on the test server given by
/// `MONGODB_TEST_URI`.
#[cfg(test)]
pub(crate) async fn test_database() -> mongodb::Database {
    let uri = std::env::var("MONGODB_TEST_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let client = mongodb::Client::with_uri_str(&uri).await.unwrap();
    let random: u32 = rand::random();
    let db = client.database(&format!("test{random}"));
    model::mongodb::ensure_indexes_exist(&db).await.unwrap();
    db
}
