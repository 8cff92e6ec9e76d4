#![allow(dead_code)]

use std::sync::{Arc, Once};

use id_validator::{FieldDef, MemoryCollection, MemoryConnection, Schema};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test subscriber once per test binary; honours `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A store seeded the way the car and bike scenarios expect
pub struct Garage {
    pub connection: Arc<MemoryConnection>,
    pub manufacturers: Arc<MemoryCollection>,
    pub colours: Arc<MemoryCollection>,
    pub cars: Arc<MemoryCollection>,
    pub bikes: Arc<MemoryCollection>,
}

impl Garage {
    pub fn new(name: &str) -> Self {
        init_tracing();
        let connection = MemoryConnection::new(name);
        Self {
            manufacturers: connection.create_collection("Manufacturer"),
            colours: connection.create_collection("Colour"),
            cars: connection.create_collection("Car"),
            bikes: connection.create_collection("Bike"),
            connection,
        }
    }

    pub fn manufacturer(&self, name: &str) -> Value {
        self.manufacturers
            .insert(json!({"name": name}))
            .expect("Failed to insert manufacturer")
    }

    pub fn colour(&self, name: &str) -> Value {
        self.colours
            .insert(json!({"name": name}))
            .expect("Failed to insert colour")
    }
}

/// `{ name, manufacturer: ref Manufacturer, colours: [ref Colour] }`
pub fn vehicle_schema() -> Arc<Schema> {
    Schema::with_fields([
        ("name", FieldDef::string()),
        ("manufacturer", FieldDef::reference("Manufacturer")),
        ("colours", FieldDef::array_of(FieldDef::reference("Colour"))),
    ])
}

/// An id that no collection in these tests ever holds
pub fn missing_id() -> Value {
    json!("50136e40c78c4b9403000001")
}
