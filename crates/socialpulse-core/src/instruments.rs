use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::instrument::Instrument;
use crate::ConfigError;

#[derive(Debug, Deserialize)]
pub struct InstrumentsFile {
    pub instruments: Vec<Instrument>,
}

/// Load and validate the instrument registry from a YAML file.
///
/// Symbols are uppercased on load so lookups never depend on file casing.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_instruments(path: &Path) -> Result<InstrumentsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::RegistryIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_instruments(&content)
}

fn parse_instruments(content: &str) -> Result<InstrumentsFile, ConfigError> {
    let mut file: InstrumentsFile = serde_yaml::from_str(content)?;

    for instrument in &mut file.instruments {
        instrument.symbol = instrument.symbol.trim().to_uppercase();
        instrument.name = instrument.name.trim().to_string();
    }

    validate_instruments(&file)?;

    Ok(file)
}

fn validate_instruments(file: &InstrumentsFile) -> Result<(), ConfigError> {
    let mut seen_symbols = HashSet::new();

    for instrument in &file.instruments {
        if instrument.symbol.is_empty() {
            return Err(ConfigError::Validation(
                "instrument symbol must be non-empty".to_string(),
            ));
        }

        if !instrument
            .symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(ConfigError::Validation(format!(
                "instrument symbol '{}' contains invalid characters",
                instrument.symbol
            )));
        }

        if instrument.name.is_empty() {
            return Err(ConfigError::Validation(format!(
                "instrument '{}' must have a name",
                instrument.symbol
            )));
        }

        if !seen_symbols.insert(instrument.symbol.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate instrument symbol: '{}'",
                instrument.symbol
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const VALID: &str = r"
instruments:
  - symbol: aapl
    name: Apple Inc.
    aliases: [Apple]
    cik: '0000320193'
  - symbol: TSLA
    name: Tesla, Inc.
";

    #[test]
    fn parses_and_uppercases_symbols() {
        let file = parse_instruments(VALID).unwrap();
        assert_eq!(file.instruments.len(), 2);
        assert_eq!(file.instruments[0].symbol, "AAPL");
        assert_eq!(file.instruments[0].aliases, vec!["Apple".to_string()]);
        assert_eq!(file.instruments[0].cik.as_deref(), Some("0000320193"));
        assert!(file.instruments[1].aliases.is_empty());
        assert!(file.instruments[1].isin.is_none());
    }

    #[test]
    fn rejects_duplicate_symbols_case_insensitively() {
        let yaml = r"
instruments:
  - symbol: AAPL
    name: Apple Inc.
  - symbol: aapl
    name: Apple again
";
        let err = parse_instruments(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("duplicate")));
    }

    #[test]
    fn rejects_empty_name() {
        let yaml = r"
instruments:
  - symbol: MSFT
    name: '  '
";
        let err = parse_instruments(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn rejects_symbol_with_spaces() {
        let yaml = r"
instruments:
  - symbol: 'BR K'
    name: Berkshire
";
        let err = parse_instruments(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("invalid characters")));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = parse_instruments("instruments: [").unwrap_err();
        assert!(matches!(err, ConfigError::RegistryParse(_)));
    }

    #[test]
    fn load_instruments_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VALID.as_bytes()).unwrap();
        let loaded = load_instruments(file.path()).unwrap();
        assert_eq!(loaded.instruments.len(), 2);
    }

    #[test]
    fn load_instruments_reports_missing_file() {
        let err = load_instruments(Path::new("/nonexistent/instruments.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::RegistryIo { .. }));
    }
}
