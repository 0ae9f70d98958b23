use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{Map, Value};

use super::types::{Coil, Dump, Register};

/// Register map used when no seed file is configured.
pub const BUNDLED_SEED: &str = include_str!("../../res/dump.json");

/// Parse a seed document of the form
/// `{"coils": {"0": true}, "discrete_inputs": {..}, "holding_registers": {"0": 12}, "input_registers": {..}}`.
///
/// All four sections are required. Entries come back sorted by address.
pub fn parse_seed(text: &str) -> Result<Dump> {
    let root: Value = serde_json::from_str(text).context("seed is not valid JSON")?;
    let root = root
        .as_object()
        .ok_or_else(|| anyhow!("seed must be a JSON object"))?;

    Ok(Dump {
        coils: bits(root, "coils")?
            .into_iter()
            .map(|(address, value)| Coil { address, value })
            .collect(),
        discrete_inputs: bits(root, "discrete_inputs")?
            .into_iter()
            .map(|(address, value)| Coil { address, value })
            .collect(),
        holding_registers: words(root, "holding_registers")?
            .into_iter()
            .map(|(address, value)| Register { address, value })
            .collect(),
        input_registers: words(root, "input_registers")?
            .into_iter()
            .map(|(address, value)| Register { address, value })
            .collect(),
    })
}

pub fn load_seed(path: impl AsRef<Path>) -> Result<Dump> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    let dump =
        parse_seed(&text).with_context(|| format!("invalid seed file {}", path.display()))?;
    log::info!("loaded {} seeded addresses from {}", dump.len(), path.display());
    Ok(dump)
}

fn section<'a>(root: &'a Map<String, Value>, name: &str) -> Result<&'a Map<String, Value>> {
    root.get(name)
        .ok_or_else(|| anyhow!("seed has no `{name}` section"))?
        .as_object()
        .ok_or_else(|| anyhow!("seed section `{name}` must be an object"))
}

fn parse_address(name: &str, key: &str) -> Result<u16> {
    key.parse::<u16>()
        .with_context(|| format!("`{name}`: `{key}` is not an address in 0..=65535"))
}

fn bits(root: &Map<String, Value>, name: &str) -> Result<Vec<(u16, bool)>> {
    let mut entries = section(root, name)?
        .iter()
        .map(|(key, value)| -> Result<(u16, bool)> {
            let address = parse_address(name, key)?;
            let value = value
                .as_bool()
                .ok_or_else(|| anyhow!("`{name}`: value at `{key}` must be a boolean, got {value}"))?;
            Ok((address, value))
        })
        .collect::<Result<Vec<_>>>()?;
    entries.sort_unstable_by_key(|(address, _)| *address);
    Ok(entries)
}

fn words(root: &Map<String, Value>, name: &str) -> Result<Vec<(u16, u16)>> {
    let mut entries = section(root, name)?
        .iter()
        .map(|(key, value)| -> Result<(u16, u16)> {
            let address = parse_address(name, key)?;
            let Some(raw) = value.as_u64() else {
                bail!("`{name}`: value at `{key}` must be an unsigned integer, got {value}");
            };
            let value = u16::try_from(raw)
                .map_err(|_| anyhow!("`{name}`: value {raw} at `{key}` does not fit in 16 bits"))?;
            Ok((address, value))
        })
        .collect::<Result<Vec<_>>>()?;
    entries.sort_unstable_by_key(|(address, _)| *address);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r#"{
        "coils": {"2": true, "1": false},
        "discrete_inputs": {"10071": false},
        "holding_registers": {"44883": 65535},
        "input_registers": {"30022": 0}
    }"#;

    #[test]
    fn test_parse_seed() {
        let dump = parse_seed(SEED).unwrap();

        assert_eq!(
            dump.coils,
            vec![
                Coil {
                    address: 1,
                    value: false
                },
                Coil {
                    address: 2,
                    value: true
                },
            ]
        );
        assert_eq!(dump.holding_registers[0].value, 65535);
        assert_eq!(dump.len(), 5);
    }

    #[test]
    fn test_bundled_seed_parses() {
        let dump = parse_seed(BUNDLED_SEED).unwrap();
        assert!(dump.discrete_inputs.iter().any(|c| c.address == 10071));
        assert_eq!(dump.holding_registers.len(), 12);
    }

    #[test]
    fn test_missing_section_is_named() {
        let err = parse_seed(r#"{"coils": {}, "discrete_inputs": {}, "holding_registers": {}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("input_registers"));
    }

    #[test]
    fn test_bad_entries_are_rejected() {
        let wrong_type = SEED.replace(r#""2": true"#, r#""2": 1"#);
        assert!(format!("{:#}", parse_seed(&wrong_type).unwrap_err()).contains("`2`"));

        let bad_address = SEED.replace(r#""30022""#, r#""x1""#);
        assert!(format!("{:#}", parse_seed(&bad_address).unwrap_err()).contains("x1"));

        let too_big = SEED.replace("65535", "65536");
        assert!(format!("{:#}", parse_seed(&too_big).unwrap_err()).contains("65536"));
    }
}
