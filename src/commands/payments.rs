use crate::commands::Out;
use crate::giro::toid;
use crate::incoming::totalin::{self, TotalinFile};
use crate::incoming::{parse_lb, parse_payments, Format, LbReport};
use crate::model::incoming::PaymentFile;
use crate::model::EntityId;
use crate::{fs, Result};
use anyhow::{bail, Context};
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;

/// The result of `giro payments parse`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Parsed {
    Payments(PaymentFile),
    Lb(LbReport),
}

/// Reads the incoming file `file` and writes the result as JSON to `output` when given.
pub fn payments_parse(file: &Path, format: Format, output: Option<&Path>) -> Result<Out<Parsed>> {
    let data = fs::read(file)?;
    let context = || format!("Unable to read {} as {format}", file.display());
    let (message, parsed) = match format {
        Format::Pg | Format::Bg => {
            let payments = parse_payments(format, &data).with_context(context)?;
            let message = format!(
                "Read {} transactions on {} accounts from {}",
                payments.transaction_count(),
                payments.accounts.len(),
                file.display()
            );
            (message, Parsed::Payments(payments))
        }
        Format::Lb => {
            let report = parse_lb(&data).with_context(context)?;
            let message = format!(
                "Read {} LB sections from {}",
                report.sections.len(),
                file.display()
            );
            (message, Parsed::Lb(report))
        }
    };
    if let Some(output) = output {
        fs::write_json(output, &parsed)?;
    }
    Ok(Out::new(message, parsed))
}

/// Decodes a reference token. With `known` ids the token must name one of them.
pub fn payments_reference(token: &str, known: &[String]) -> Result<Out<EntityId>> {
    let id = if known.is_empty() {
        toid::decode(token)
    } else {
        let known = known
            .iter()
            .map(|k| EntityId::from_str(k).with_context(|| format!("'{k}' is not an id")))
            .collect::<Result<Vec<_>>>()?;
        toid::find_reference(token, &known)
    };
    match id {
        Some(id) => Ok(Out::new(format!("{token} refers to {id}"), id)),
        None if known.is_empty() => bail!("'{token}' is not a reference token"),
        None => bail!("'{token}' does not refer to any of the given ids"),
    }
}

/// Writes a TOTALIN file for the purchases described in the JSON file `input`.
pub fn payments_totalin(input: &Path, output: &Path) -> Result<Out<()>> {
    let file: TotalinFile = fs::read_json(input)?;
    let data = totalin::generate(&file).context("Unable to generate the TOTALIN file")?;
    fs::write_all(output, &data)?;
    Ok(format!(
        "Wrote TOTALIN file {} with {} purchases to {}",
        file.file_id,
        file.purchases.len(),
        output.display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{TestEnv, TOTALIN_FILE};

    #[test]
    fn test_parse_totalin() {
        let env = TestEnv::new();
        let input = env.write("totalin.txt", TOTALIN_FILE);
        let json = env.config().root().join("totalin.json");
        let out = payments_parse(&input, Format::Pg, Some(&json)).unwrap();
        let Some(Parsed::Payments(payments)) = out.structure() else {
            panic!("not a payment file");
        };
        assert_eq!(payments.transaction_count(), 2);
        assert!(json.is_file());

        assert!(payments_parse(&input, Format::Bg, None).is_err());
    }

    #[test]
    fn test_totalin_command() {
        let env = TestEnv::new();
        let input = env.write(
            "purchases.json",
            r#"{
                "file_id": 42,
                "timestamp": "2017-05-05T12:00:00",
                "pgnum": "1234567-4",
                "start_transaction": 1,
                "purchases": [
                    {
                        "ocr": "1234567897",
                        "total": "100.00",
                        "buyer_name": "Anna Andersson",
                        "buyer_address": "Storgatan 1\n123 45 Småstad"
                    },
                    {"ocr": "9876543217", "total": "250.00"}
                ]
            }"#
            .as_bytes(),
        );
        let output = env.config().root().join("totalin.txt");
        payments_totalin(&input, &output).unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), TOTALIN_FILE);
    }

    #[test]
    fn test_reference() {
        let out = payments_reference("LEKGFNUQPYJUBYH7XVNA", &[]).unwrap();
        assert_eq!(out.structure().unwrap().to_string(), "591462b6907e1340e0ffbd5a");

        let known = vec!["591462b6907e1340e0ffbd5e".to_string()];
        assert!(payments_reference("LEKGFNUQPYJUBYH7XVNA", &known).is_err());
        assert!(payments_reference("LEKGFNUQPYJUBYH7XVPA", &known).is_ok());
        assert!(payments_reference("VERIF 20", &[]).is_err());
        assert!(payments_reference("LEKGFNUQPYJUBYH7XVNA", &["nope".to_string()]).is_err());
    }
}
