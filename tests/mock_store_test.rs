use std::sync::Arc;

use async_trait::async_trait;
use id_validator::{
    Collection, Connection, IdFilter, IdValidatorError, QueryFilter, Session, StoreError,
    validate_id, validate_id_array,
};
use mockall::automock;
use serde_json::{Map, Value, json};

/// Query backend the mocked collection forwards every count to
#[automock]
trait CountBackend {
    fn count(&self, filter: &QueryFilter, session: Option<Session>) -> Result<u64, StoreError>;
}

struct MockedCollection {
    name: String,
    backend: MockCountBackend,
}

#[async_trait]
impl Collection for MockedCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn count(&self, filter: &QueryFilter, session: Option<&Session>) -> Result<u64, StoreError> {
        self.backend.count(filter, session.cloned())
    }
}

#[automock]
trait CollectionDirectory {
    fn lookup(&self, name: &str) -> Option<String>;
}

struct MockedConnection {
    directory: MockCollectionDirectory,
    collection: Arc<MockedCollection>,
}

impl Connection for MockedConnection {
    fn name(&self) -> &str {
        "mocked"
    }

    fn model(&self, name: &str) -> Result<Arc<dyn Collection>, StoreError> {
        match self.directory.lookup(name) {
            Some(_) => Ok(self.collection.clone() as Arc<dyn Collection>),
            None => Err(StoreError::UnknownCollection {
                name: name.to_string(),
            }),
        }
    }
}

fn connection(backend: MockCountBackend) -> Arc<dyn Connection> {
    let mut directory = MockCollectionDirectory::new();
    directory
        .expect_lookup()
        .returning(|name| (name == "Manufacturer").then(|| name.to_string()));

    Arc::new(MockedConnection {
        directory,
        collection: Arc::new(MockedCollection {
            name: "Manufacturer".to_string(),
            backend,
        }),
    })
}

fn conditions(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(field, value)| (field.to_string(), value.clone()))
        .collect()
}

#[tokio::test]
async fn test_scalar_check_builds_single_id_filter() {
    let mut backend = MockCountBackend::new();
    backend
        .expect_count()
        .withf(|filter, session| {
            filter.id == IdFilter::Eq(json!("m1"))
                && filter.conditions == vec![("country".to_string(), json!("SE"))]
                && session.is_none()
        })
        .times(1)
        .returning(|_, _| Ok(1));

    let valid = validate_id(
        connection(backend),
        "Manufacturer".to_string(),
        Some(json!("m1")),
        conditions(&[("country", json!("SE"))]),
        None,
    )
    .await
    .unwrap();

    assert!(valid);
}

#[tokio::test]
async fn test_array_check_expects_every_listed_id() {
    let mut backend = MockCountBackend::new();
    backend
        .expect_count()
        .withf(|filter, _| filter.id == IdFilter::In(vec![json!("a"), json!("b"), json!("a")]))
        .times(1)
        .returning(|_, _| Ok(2));

    let valid = validate_id_array(
        connection(backend),
        "Manufacturer".to_string(),
        Some(json!(["a", "b", "a"])),
        Map::new(),
        None,
        false,
    )
    .await
    .unwrap();

    assert!(!valid);
}

#[tokio::test]
async fn test_array_check_deduplicates_when_allowed() {
    let mut backend = MockCountBackend::new();
    backend
        .expect_count()
        .withf(|filter, _| filter.id == IdFilter::In(vec![json!("a"), json!("b")]))
        .times(1)
        .returning(|_, _| Ok(2));

    let valid = validate_id_array(
        connection(backend),
        "Manufacturer".to_string(),
        Some(json!(["a", "b", "a"])),
        Map::new(),
        None,
        true,
    )
    .await
    .unwrap();

    assert!(valid);
}

#[tokio::test]
async fn test_session_reaches_backend() {
    let session = Session::start();
    let expected = session.id();

    let mut backend = MockCountBackend::new();
    backend
        .expect_count()
        .withf(move |_, session| session.as_ref().map(Session::id) == Some(expected))
        .times(1)
        .returning(|_, _| Ok(1));

    let valid = validate_id(
        connection(backend),
        "Manufacturer".to_string(),
        Some(json!("m1")),
        Map::new(),
        Some(session),
    )
    .await
    .unwrap();

    assert!(valid);
}

#[tokio::test]
async fn test_backend_failure_propagates() {
    let mut backend = MockCountBackend::new();
    backend.expect_count().times(1).returning(|_, _| {
        Err(StoreError::Unavailable {
            details: "primary stepped down".to_string(),
        })
    });

    let err = validate_id(
        connection(backend),
        "Manufacturer".to_string(),
        Some(json!("m1")),
        Map::new(),
        None,
    )
    .await
    .unwrap_err();

    assert_eq!(
        err,
        IdValidatorError::Store(StoreError::Unavailable {
            details: "primary stepped down".to_string(),
        })
    );
}

#[tokio::test]
async fn test_unknown_collection_skips_backend() {
    let mut backend = MockCountBackend::new();
    backend.expect_count().times(0);

    let err = validate_id(
        connection(backend),
        "Colour".to_string(),
        Some(json!("c1")),
        Map::new(),
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        IdValidatorError::Store(StoreError::UnknownCollection { name }) if name == "Colour"
    ));
}

#[tokio::test]
async fn test_absent_value_issues_no_query() {
    let mut backend = MockCountBackend::new();
    backend.expect_count().times(0);
    let connection = connection(backend);

    assert!(
        validate_id(connection.clone(), "Manufacturer".to_string(), None, Map::new(), None)
            .await
            .unwrap()
    );
    assert!(
        validate_id_array(
            connection,
            "Manufacturer".to_string(),
            Some(json!([])),
            Map::new(),
            None,
            false,
        )
        .await
        .unwrap()
    );
}
