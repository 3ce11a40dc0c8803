//! Fixtures for tests

use crate::scenario::Scenario;
use crate::technology::{Catalog, Technology};
use rstest::fixture;
use serde_json::Value;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// The bundled catalog
#[fixture]
pub fn catalog() -> Catalog {
    Catalog::load(None).unwrap()
}

/// A French vertical flow constructed wetland, the catalog's first technology
#[fixture]
pub fn technology(catalog: Catalog) -> Technology {
    catalog.get("French_CW").unwrap().as_ref().clone()
}

/// Build a scenario from a request which is known to be valid
pub fn scenario_from(catalog: &Catalog, body: Value) -> Scenario {
    Scenario::from_json(&body, catalog).unwrap()
}
