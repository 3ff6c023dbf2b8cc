//! Shared PostgreSQL container for the integration tests.
//!
//! The container is started once per test process and kept alive by a dedicated
//! tokio runtime. Every test gets its own freshly created database on it.

use std::sync::OnceLock;

use postgres::{Client, NoTls};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;
use uuid::Uuid;

const PG_USER: &str = "postgres";
const PG_PASSWORD: &str = "postgres";
const PG_DB: &str = "postgres";

struct SharedPostgres {
    port: u16,
    _container: ContainerAsync<Postgres>,
    _runtime: tokio::runtime::Runtime,
}

static POSTGRES: OnceLock<SharedPostgres> = OnceLock::new();

fn port() -> u16 {
    POSTGRES
        .get_or_init(|| {
            let runtime = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
            let (container, port) = runtime.block_on(async {
                let container = Postgres::default()
                    .start()
                    .await
                    .expect("failed to start postgres container");
                let port = container
                    .get_host_port_ipv4(5432)
                    .await
                    .expect("failed to get postgres port");
                (container, port)
            });
            SharedPostgres {
                port,
                _container: container,
                _runtime: runtime,
            }
        })
        .port
}

pub fn url_with_db(db: &str) -> String {
    format!(
        "postgres://{}:{}@127.0.0.1:{}/{}",
        PG_USER,
        PG_PASSWORD,
        port(),
        db
    )
}

/// Create a uniquely named database and return a client connected to it.
pub fn fresh_postgres_db() -> (Client, String) {
    let mut admin = Client::connect(&url_with_db(PG_DB), NoTls).expect("failed to connect as admin");

    let db_name = format!("test_{}", Uuid::new_v4().simple());
    admin
        .batch_execute(&format!("CREATE DATABASE \"{}\"", db_name))
        .expect("failed to create test database");
    drop(admin);

    let client =
        Client::connect(&url_with_db(&db_name), NoTls).expect("failed to connect to test database");
    (client, db_name)
}

pub fn get_test_client() -> Client {
    fresh_postgres_db().0
}
