use serde::{Deserialize, Serialize};

/// Canonical identity of a tradable symbol.
///
/// `symbol` is always uppercase and is the unique key. Registry identifiers
/// are optional because unlisted tickers resolve without them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub cik: Option<String>,
    #[serde(default)]
    pub isin: Option<String>,
    #[serde(default)]
    pub figi: Option<String>,
}

impl Instrument {
    /// An instrument known only by its ticker, with no registry identifiers.
    #[must_use]
    pub fn unlisted(symbol: &str) -> Self {
        let symbol = symbol.to_uppercase();
        Self {
            name: symbol.clone(),
            symbol,
            aliases: Vec::new(),
            cik: None,
            isin: None,
            figi: None,
        }
    }

    /// Company name plus aliases, i.e. every non-ticker string that refers
    /// to this instrument in free text.
    pub fn name_variants(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(self.aliases.iter().map(String::as_str))
            .filter(|n| !n.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlisted_uppercases_symbol_and_uses_it_as_name() {
        let inst = Instrument::unlisted("pltr");
        assert_eq!(inst.symbol, "PLTR");
        assert_eq!(inst.name, "PLTR");
        assert!(inst.cik.is_none());
    }

    #[test]
    fn name_variants_skips_blank_aliases() {
        let inst = Instrument {
            symbol: "AAPL".to_string(),
            name: "Apple Inc.".to_string(),
            aliases: vec!["Apple".to_string(), "  ".to_string()],
            cik: None,
            isin: None,
            figi: None,
        };
        let names: Vec<&str> = inst.name_variants().collect();
        assert_eq!(names, vec!["Apple Inc.", "Apple"]);
    }
}
