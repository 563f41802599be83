//! services/api/src/bin/openapi.rs
//!
//! Writes the REST API's OpenAPI document for client generation.
//!
//! Usage: `openapi [OUTPUT_PATH]` (defaults to `openapi.json`).

use api_lib::{error::ApiError, web::rest::write_openapi};
use std::path::PathBuf;

fn main() -> Result<(), ApiError> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi.json"));

    write_openapi(&path)?;
    println!("OpenAPI document written to {}", path.display());
    Ok(())
}
