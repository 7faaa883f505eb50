//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document for the REST API to disk so clients can be
//! generated without a running server.
//!
//! Usage: `openapi [OUTPUT_PATH]` (defaults to `openapi.json`).

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "openapi.json";

fn generate_spec(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut api_doc = ApiDoc::openapi();
    api_doc.info.title = "Diet Planner API".to_string();
    api_doc.info.version = env!("CARGO_PKG_VERSION").to_string();

    std::fs::write(path, api_doc.to_pretty_json()?)?;
    println!("OpenAPI specification generated at {}", path);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
    generate_spec(&path)
}
