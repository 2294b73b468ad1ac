//! Loading the units to simulate.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// Units file contents: either an object keyed by unit identifier, or a list
/// of unit objects carrying an `identifier` field.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UnitsFile {
    Keyed(BTreeMap<String, Value>),
    Listed(Vec<Value>),
}

/// Read units from a JSON or YAML file, chosen by extension.
pub fn load_units(path: impl AsRef<Path>) -> Result<Vec<(String, Value)>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read units file {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let file: UnitsFile = if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse units file {}", path.display()))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse units file {}", path.display()))?
    };

    units_from(file)
}

fn units_from(file: UnitsFile) -> Result<Vec<(String, Value)>> {
    match file {
        UnitsFile::Keyed(units) => Ok(units.into_iter().collect()),
        UnitsFile::Listed(items) => {
            let mut seen = HashSet::new();
            let mut units = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                let identifier = match item.get("identifier") {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    Some(other) => bail!("Unit {} has a non-scalar identifier: {}", index, other),
                    None => index.to_string(),
                };
                if !seen.insert(identifier.clone()) {
                    bail!("Duplicate unit identifier '{}'", identifier);
                }
                units.push((identifier, item));
            }
            Ok(units)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_load_keyed_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "stand-2: {{ age: 40 }}\nstand-1: {{ age: 10 }}").unwrap();

        let units = load_units(file.path()).unwrap();
        assert_eq!(
            units,
            vec![
                ("stand-1".to_string(), json!({"age": 10})),
                ("stand-2".to_string(), json!({"age": 40})),
            ]
        );
    }

    #[test]
    fn test_load_listed_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"[{{"identifier": "a", "age": 1}}, {{"identifier": 7}}, {{"age": 3}}]"#).unwrap();

        let units = load_units(file.path()).unwrap();
        let identifiers: Vec<&str> = units.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(identifiers, vec!["a", "7", "2"]);
    }

    #[test]
    fn test_duplicate_identifiers() {
        let file = UnitsFile::Listed(vec![json!({"identifier": "a"}), json!({"identifier": "a"})]);
        assert!(units_from(file).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(load_units("/nonexistent/units.json").is_err());
    }
}
