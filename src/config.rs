use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::billing::TaxRate;
use crate::cli::Opts;
use crate::error::ConfigError;

/// Settings read from an s-expression file such as
///
/// ```text
/// ((database . "facturare.db")
///  (output_dir . "invoices")
///  (tax_rate . 0.19))
/// ```
///
/// Command line flags take precedence over the file.
#[derive(Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct Config {
    pub database: PathBuf,
    pub output_dir: PathBuf,
    pub tax_rate: TaxRate,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("facturare.db"),
            output_dir: PathBuf::from("."),
            tax_rate: TaxRate::default(),
        }
    }
}

impl Config {
    /// A missing file means defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_lexpr::from_reader(reader)?;
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        TaxRate::new(self.tax_rate.fraction()).ok_or(ConfigError::TaxRate {
            value: self.tax_rate.fraction().to_string(),
        })?;
        Ok(self)
    }

    pub fn with_overrides(mut self, opts: &Opts) -> Result<Self, ConfigError> {
        if let Some(database) = &opts.db {
            self.database = database.clone();
        }
        if let Some(output_dir) = &opts.out_dir {
            self.output_dir = output_dir.clone();
        }
        if let Some(raw) = &opts.tax_rate {
            self.tax_rate = parse_tax_rate(raw)?;
        }
        debug!(config = ?self, "resolved configuration");
        Ok(self)
    }
}

pub fn parse_tax_rate(raw: &str) -> Result<TaxRate, ConfigError> {
    Decimal::from_str(raw.trim())
        .ok()
        .and_then(TaxRate::new)
        .ok_or(ConfigError::TaxRate {
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use const_format::formatcp;
    use rust_decimal_macros::dec;
    use serde_lexpr::from_str;

    const DATABASE_RAW: &str = "(database . \"books.db\")";
    const OUTPUT_RAW: &str = "(output_dir . \"out\")";

    const CONFIG_STR: &str =
        formatcp!("({} {} (tax_rate . 0.09))", DATABASE_RAW, OUTPUT_RAW);

    #[test]
    fn deserialize() {
        let config: Config = from_str(CONFIG_STR).unwrap();
        assert_eq!(config.database, PathBuf::from("books.db"));
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.tax_rate.fraction(), dec!(0.09));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.conf")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.tax_rate.fraction(), dec!(0.19));
    }

    #[test]
    fn load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facturare.conf");
        std::fs::write(&path, CONFIG_STR).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.database, PathBuf::from("books.db"));
    }

    #[test]
    fn negative_rate_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facturare.conf");
        std::fs::write(
            &path,
            formatcp!("({} {} (tax_rate . -0.5))", DATABASE_RAW, OUTPUT_RAW),
        )
        .unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::TaxRate { .. })
        ));
    }

    #[test]
    fn flags_override_file() {
        let opts = Opts::parse_from([
            "facturare",
            "--db",
            "other.db",
            "--tax-rate",
            "0.05",
        ]);
        let config: Config = from_str(CONFIG_STR).unwrap();
        let config = config.with_overrides(&opts).unwrap();
        assert_eq!(config.database, PathBuf::from("other.db"));
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.tax_rate.fraction(), dec!(0.05));
    }

    #[test]
    fn bad_tax_rate_flag() {
        assert!(parse_tax_rate("19%").is_err());
        assert!(parse_tax_rate("-0.19").is_err());
        assert_eq!(parse_tax_rate(" 0.2 ").unwrap().fraction(), dec!(0.2));
    }
}
