//! Helper functions for creating test fixtures.

use paynotify_store::{Database, StoreConfig};
use paynotify_x402::PaymentRequirement;
use serde_json::{json, Value};
use tempfile::TempDir;

/// A recipient address that passes address validation.
pub const TEST_PAY_TO: &str = "0x1234567890123456789012345678901234567890";

/// Open a file-backed database in a fresh temporary directory.
///
/// Keep the returned `TempDir` alive for as long as the database is used.
pub fn temp_database() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(StoreConfig::new(temp_dir.path())).unwrap();
    (db, temp_dir)
}

/// A `402` challenge body offering the given options.
pub fn challenge_body(accepts: &[PaymentRequirement]) -> Value {
    json!({
        "error": "Payment Required",
        "x402": {
            "version": "1.0",
            "accepts": accepts,
        }
    })
}

/// A `402` challenge body with a single option.
pub fn single_challenge(pay_to: &str, amount: &str) -> Value {
    challenge_body(&[PaymentRequirement::new(pay_to, amount)])
}
