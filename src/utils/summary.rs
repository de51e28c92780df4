use serde_json::json;
use anyhow::{Result, Context};

use crate::containers::defaults::REPORT;
use crate::multi_processing::ProcessingStatus;
use crate::storage::StoreReader;

/// Create a JSON summary of a closed store.
///
/// Generates an operator facing report containing the session record, the
/// number of containers of every type and the text of the last extraction
/// report. When the summary is produced right after a run, the processing
/// status is included as well.
///
/// # Example Output
///
/// ```json
/// {
///   "store": "/cases/host.rtl",
///   "format_version": 1,
///   "session": {...},
///   "containers": {"event": 12, "preprocess": 1, ...},
///   "report": "Processed 5 of 5 sources ...",
///   "processing": {...}
/// }
/// ```
pub fn create_store_summary(reader: &StoreReader, processing: Option<&ProcessingStatus>) -> Result<String> {
    let containers: serde_json::Map<String, serde_json::Value> = reader
        .container_types()
        .into_iter()
        .map(|container_type| (container_type.to_string(), json!(reader.number_of_containers(container_type))))
        .collect();

    let number_of_reports = reader.number_of_containers(REPORT);
    let report = match number_of_reports.checked_sub(1) {
        Some(last) => reader
            .get_container(REPORT, last)
            .context("Failed to read the extraction report")?
            .and_then(|c| c.get("text").and_then(|v| v.as_str()).map(str::to_string)),
        None => None,
    };

    let mut summary = json!({
        "store": reader.path().display().to_string(),
        "format_version": reader.format_version(),
        "tool_version": env!("CARGO_PKG_VERSION"),
        "session": reader.get_session(),
        "containers": containers,
        "report": report,
    });

    // Add processing status if available
    if let Some(status) = processing {
        if let Some(obj) = summary.as_object_mut() {
            obj.insert("processing".to_string(), serde_json::to_value(status)?);
        }
    }

    serde_json::to_string_pretty(&summary).context("Failed to serialize store summary to JSON")
}
