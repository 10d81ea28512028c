use std::{sync::Arc, time::Duration};

use log::{error, info, warn};
use mongodb::{options::ClientOptions, Client as MongoClient};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::{
    model::mongodb::ensure_indexes_exist,
    store::{MemoryElectionStore, MongoElectionStore, Store},
};

/// Which election store to run against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Shared MongoDB database. Safe with any number of server processes.
    #[default]
    Mongodb,
    /// Process-local memory. Single process only; lost on restart.
    Memory,
}

fn default_memory_eligible_voters() -> u64 {
    0
}

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default)]
    store: StoreKind,
    #[serde(default = "default_memory_eligible_voters")]
    memory_eligible_voters: u64,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// The configured store backend.
    pub fn store(&self) -> StoreKind {
        self.store
    }

    /// Eligible voter count reported by the in-memory store.
    pub fn memory_eligible_voters(&self) -> u64 {
        self.memory_eligible_voters
    }

    /// Secret key used to verify JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

fn default_db_name() -> String {
    "campus".to_string()
}

fn default_db_timeout_ms() -> u64 {
    5000
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
    #[serde(default = "default_db_timeout_ms")]
    db_timeout_ms: u64,
    // secrets
    db_uri: String,
}

/// A fairing that builds the configured election store and places it into
/// managed state as a [`Store`].
///
/// For MongoDB this loads the database config, connects, and ensures the
/// indexes exist. Must be attached after [`ConfigFairing`].
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Election store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (kind, eligible_voters) = match rocket.state::<Config>() {
            Some(config) => (config.store(), config.memory_eligible_voters()),
            None => {
                error!("Application config must be loaded before the election store");
                return Err(rocket);
            }
        };

        let store: Store = match kind {
            StoreKind::Memory => {
                warn!("Using the in-memory election store; data will not survive a restart");
                Arc::new(MemoryElectionStore::new(eligible_voters))
            }
            StoreKind::Mongodb => match connect_mongo(&rocket).await {
                Some(store) => Arc::new(store),
                None => return Err(rocket),
            },
        };

        Ok(rocket.manage(store))
    }
}

/// Connect to MongoDB and prepare the database. Errors are logged here.
async fn connect_mongo(rocket: &Rocket<Build>) -> Option<MongoElectionStore> {
    // Load the config.
    let config = match rocket.figment().extract::<DbConfig>() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load database config");
            rocket::config::pretty_print_error(e);
            return None;
        }
    };
    info!("Loaded database config, connecting...");

    // Construct the connection, bounding server selection and connecting.
    let mut options = match ClientOptions::parse(&config.db_uri).await {
        Ok(options) => options,
        Err(e) => {
            error!("Failed to parse database URI: {e}");
            return None;
        }
    };
    let timeout = Duration::from_millis(config.db_timeout_ms);
    options.server_selection_timeout = Some(timeout);
    options.connect_timeout = Some(timeout);
    options.app_name = Some("campus-elections".to_string());
    let client = match MongoClient::with_options(options) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to connect to database: {e}");
            return None;
        }
    };
    let db = client.database(&config.db_name);

    // Ensure the required indexes exist.
    if let Err(e) = ensure_indexes_exist(&db).await {
        error!("Failed to connect to database: {e}");
        return None;
    }
    info!("...database connection online!");

    Some(MongoElectionStore::with_timeout(&db, timeout))
}
