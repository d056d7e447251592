use crate::commands::Out;
use crate::model::Accounting;
use crate::sie::{self, AccountMapping, ExportContext, Integrity};
use crate::{fs, Result};
use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// What `giro sie import` found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub accounts: usize,
    pub verifications: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifySummary {
    /// The verified `#KSUMMA` value, if the file has one.
    pub checksum: Option<u32>,
}

/// Imports `file`, optionally through an account mapping, and writes the accounting as JSON to
/// `output` when given.
pub fn sie_import(
    file: &Path,
    mapping: Option<&Path>,
    output: Option<&Path>,
) -> Result<Out<ImportSummary>> {
    let data = fs::read(file)?;
    let mapping = match mapping {
        Some(path) => {
            let mapping = AccountMapping::parse(&fs::read_to_string(path)?);
            debug!("Loaded {} account mappings", mapping.len());
            Some(mapping)
        }
        None => None,
    };
    let result = sie::import_into(Accounting::new(), &data, mapping.as_ref())
        .with_context(|| format!("Unable to import {}", file.display()))?;
    for warning in &result.warnings {
        warn!("{warning}");
    }
    if let Some(output) = output {
        fs::write_json(output, &result.accounting)?;
    }

    let summary = ImportSummary {
        accounts: result.accounting.accounts().count(),
        verifications: result.accounting.verifications().count(),
        warnings: result.warnings,
    };
    Ok(Out::new(
        format!(
            "Imported {} with {} accounts, {} verifications and {} warnings",
            file.display(),
            summary.accounts,
            summary.verifications,
            summary.warnings.len()
        ),
        summary,
    ))
}

/// Runs the flag and checksum checks on `file`.
pub fn sie_verify(file: &Path) -> Result<Out<VerifySummary>> {
    let data = fs::read(file)?;
    let integrity = sie::verify_file(&data)
        .with_context(|| format!("Verification of {} failed", file.display()))?;
    let (message, checksum) = match integrity {
        Integrity::Unchecked => (format!("{} has no checksum", file.display()), None),
        Integrity::Verified(crc) => (format!("{} checksum {crc} is correct", file.display()), Some(crc)),
    };
    Ok(Out::new(message, VerifySummary { checksum }))
}

/// Writes the accounting in the JSON file `input` to the SIE file `output`.
pub fn sie_export(
    input: &Path,
    output: &Path,
    checksum: bool,
    generated_by: &str,
    today: NaiveDate,
) -> Result<Out<()>> {
    let acc: Accounting = fs::read_json(input)?;
    let ctx = ExportContext::new(today, generated_by);
    let data = sie::export(&acc, &ctx, checksum).context("Unable to export the accounting")?;
    fs::write_all(output, &data)?;
    Ok(format!("Wrote {} ({} bytes)", output.display(), data.len()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{TestEnv, SMALL_SIE};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 3, 1).unwrap()
    }

    #[test]
    fn test_import_export_and_verify() {
        let env = TestEnv::new();
        let sie_file = env.write("small.se", SMALL_SIE);
        let json = env.config().root().join("small.json");

        let out = sie_import(&sie_file, None, Some(&json)).unwrap();
        let summary = out.structure().unwrap();
        assert_eq!(summary.accounts, 4);
        assert_eq!(summary.verifications, 2);
        assert!(json.is_file());

        let exported = env.config().root().join("export.se");
        sie_export(&json, &exported, true, "Test", today()).unwrap();
        let verified = sie_verify(&exported).unwrap();
        assert!(verified.structure().unwrap().checksum.is_some());

        let again = sie_import(&exported, None, None).unwrap();
        assert_eq!(again.structure().unwrap().accounts, 4);
        assert_eq!(again.structure().unwrap().verifications, 2);
    }

    #[test]
    fn test_import_with_mapping() {
        let env = TestEnv::new();
        let sie_file = env.write("small.se", SMALL_SIE);
        let mapping = env.write("mapping.txt", b"1930 1910\n3011 3010\n");
        let out = sie_import(&sie_file, Some(&mapping), None).unwrap();
        assert_eq!(out.structure().unwrap().accounts, 2);
    }

    #[test]
    fn test_unchecked_file() {
        let env = TestEnv::new();
        let sie_file = env.write("small.se", SMALL_SIE);
        let out = sie_verify(&sie_file).unwrap();
        assert_eq!(out.structure().unwrap().checksum, None);
        assert!(sie_import(&env.config().root().join("missing.se"), None, None).is_err());
    }
}
