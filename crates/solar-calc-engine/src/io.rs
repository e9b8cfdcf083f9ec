//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::{fs, path::Path};

use crate::{
    errors::{CalcEngineError, Result},
    model::InputBag,
};

/// Reads an input bag: JSON when the document opens with `{`, TOML for `.toml`
/// files, YAML otherwise.
pub fn load_input_bag(path: impl AsRef<Path>) -> Result<InputBag> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)?;
    parse_input_bag(&data, path.extension().and_then(|ext| ext.to_str()))
}

pub fn parse_input_bag(data: &str, extension: Option<&str>) -> Result<InputBag> {
    let bag = if data.trim_start().starts_with('{') {
        serde_json::from_str(data)?
    } else if extension.is_some_and(|ext| ext.eq_ignore_ascii_case("toml")) {
        toml::from_str(data)?
    } else {
        serde_yaml::from_str(data).map_err(CalcEngineError::YamlSerializationFailed)?
    };
    Ok(bag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_yaml_and_toml_agree() {
        let json = parse_input_bag(r#"{"current_a": 32, "material": "copper", "skip": null}"#, None).unwrap();
        let yaml = parse_input_bag("current_a: 32\nmaterial: copper\n", Some("yaml")).unwrap();
        let toml = parse_input_bag("current_a = 32\nmaterial = \"copper\"\n", Some("toml")).unwrap();
        assert_eq!(json, yaml);
        assert_eq!(yaml, toml);
        assert_eq!(json.number("current_a"), Some(32.0));
        assert!(!json.contains("skip"));
    }

    #[test]
    fn sequences_load_as_numbers() {
        let bag = parse_input_bag("inverter_catalog_kw: [50, 100.5]\n", None).unwrap();
        assert_eq!(bag.sequence("inverter_catalog_kw"), Some(&[50.0, 100.5][..]));
    }
}
