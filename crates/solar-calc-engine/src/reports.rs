//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::{errors::Result, result::CalculationResult, CalculationRecord};

#[derive(Debug)]
pub struct ReportExporter<'a> {
    record: &'a CalculationRecord,
}

impl<'a> ReportExporter<'a> {
    pub fn new(record: &'a CalculationRecord) -> Self {
        Self { record }
    }

    /// File name used inside the export directory: `<calculator>-<run_id>.json`.
    pub fn file_name(&self) -> String {
        format!("{}-{}.json", self.record.calculator, self.record.run_id)
    }

    /// Writes the enveloped result and returns the path of the new file.
    pub fn export(&self, output_dir: &Path) -> Result<PathBuf> {
        if !output_dir.exists() {
            fs::create_dir_all(output_dir)?;
        }

        let timestamp = self.record.timestamp.to_rfc3339();
        let run_id = self.record.run_id.to_string();
        let envelope = ReportEnvelope {
            timestamp: &timestamp,
            run_id: &run_id,
            calculator: &self.record.calculator,
            schema: calculation_result_schema(),
            data: &self.record.result,
        };

        let path = output_dir.join(self.file_name());
        write_json(&path, &envelope)?;
        info!("Report exported to {}", path.display());
        Ok(path)
    }
}

#[derive(Debug, Serialize)]
struct ReportEnvelope<'a> {
    timestamp: &'a str,
    run_id: &'a str,
    calculator: &'a str,
    schema: serde_json::Value,
    data: &'a CalculationResult,
}

fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized)?;
    Ok(())
}

fn calculation_result_schema() -> serde_json::Value {
    let text_list = json!({"type": "array", "items": {"type": "string"}});
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "CalculationResult",
        "type": "object",
        "properties": {
            "success": {"type": "boolean"},
            "inputs": {
                "type": "object",
                "additionalProperties": {
                    "type": ["number", "string", "array"]
                }
            },
            "outputs": {
                "type": "object",
                "additionalProperties": {
                    "type": ["number", "boolean", "string", "array"]
                }
            },
            "calculations": text_list,
            "assumptions": text_list,
            "insights": text_list,
            "warnings": text_list,
            "errors": text_list
        },
        "required": ["success", "inputs", "outputs", "calculations", "assumptions", "insights"]
    })
}
