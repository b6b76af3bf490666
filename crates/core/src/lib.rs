//! Modelbay core domain types and pure logic.
//!
//! No I/O lives here: the model and test-result entities, the error
//! taxonomy shared by every crate, deploy request validation, and the
//! analytics reduction over already-produced data.

pub mod analytics;
pub mod error;
pub mod model;
pub mod test_result;
pub mod types;
