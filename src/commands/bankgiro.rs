use crate::charset::{decode_latin1, encode_latin1_lossy};
use crate::commands::Out;
use crate::giro::{bankgiro, seal, sign_order, DeviceSigner, OrderOptions, Signer, SoftwareSigner};
use crate::model::{BankgiroProvider, BgcOrder, PaymentBatch};
use crate::{fs, Config, Result};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{info, warn};

/// The device signer when the configured device exists, otherwise the software signer keyed
/// with `bankgiro.test_key`. `software` skips the device.
pub fn select_signer(config: &Config, software: bool) -> Result<Box<dyn Signer>> {
    if !software {
        let device = config.signer_device();
        if Path::new(device).exists() {
            let signer = DeviceSigner::open(device, config.signer_lock()?, config.signer_key_mode())
                .with_context(|| format!("Unable to open the signing device {device}"))?;
            return Ok(Box::new(signer));
        }
        warn!("Signing device {device} not found, sealing with the software signer");
    }
    Ok(Box::new(SoftwareSigner::from_hex(config.test_key()?)?))
}

fn read_batch(input: &Path) -> Result<(PaymentBatch, BankgiroProvider)> {
    let batch: PaymentBatch = fs::read_json(input)?;
    let provider = batch
        .provider
        .clone()
        .with_context(|| format!("The batch in {} has no bankgiro provider", input.display()))?;
    Ok((batch, provider))
}

/// Writes an LB order for the invoices in `input`, sealed when `seal` is set.
pub fn bankgiro_order(
    config: &Config,
    input: &Path,
    output: &Path,
    seal: bool,
    software_signer: bool,
    now: DateTime<Utc>,
) -> Result<Out<BgcOrder>> {
    let (batch, provider) = read_batch(input)?;
    let today = now.date_naive();
    let mut options = OrderOptions::new(today);
    options.fixed_information = config.fixed_information().map(str::to_string);

    let mut order = bankgiro::create_order(&provider, &batch.invoices, &options, now)
        .context("Unable to create the payment order")?;
    if seal {
        let mut signer = select_signer(config, software_signer)?;
        sign_order(&mut order, today, signer.as_mut()).context("Unable to seal the order")?;
    }
    let text = order
        .order_signed
        .as_deref()
        .unwrap_or(&order.order_unsigned);
    fs::write_all(output, encode_latin1_lossy(text))?;
    info!("Wrote {}", output.display());

    let message = format!(
        "Wrote {} order for {} invoices to {}",
        if order.is_signed() { "a sealed" } else { "an unsealed" },
        batch.invoices.len(),
        output.display()
    );
    Ok(Out::new(message, order))
}

/// Writes an order cancelling the payments of the invoices in `input`.
pub fn bankgiro_cancel(config: &Config, input: &Path, output: &Path) -> Result<Out<()>> {
    let (batch, provider) = read_batch(input)?;
    let content =
        bankgiro::cancellation_order(&provider, &batch.invoices, config.service_bureau_number()?)
            .context("Unable to create the cancellation order")?;
    fs::write_all(output, encode_latin1_lossy(&content))?;
    Ok(format!(
        "Wrote cancellations for {} invoices to {}",
        batch.invoices.len(),
        output.display()
    )
    .into())
}

/// Seals the order in `file` and writes the sealed file to `output`.
pub fn bankgiro_seal(
    config: &Config,
    file: &Path,
    output: &Path,
    software_signer: bool,
    now: DateTime<Utc>,
) -> Result<Out<()>> {
    let order = decode_latin1(&fs::read(file)?);
    let mut signer = select_signer(config, software_signer)?;
    let sealed = seal(&order, now.date_naive(), signer.as_mut())
        .with_context(|| format!("Unable to seal {}", file.display()))?;
    fs::write_all(output, encode_latin1_lossy(&sealed))?;
    Ok(format!("Sealed {} into {}", file.display(), output.display()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BANKGIRO;
    use crate::test::TestEnv;
    use chrono::TimeZone;

    const KEY: &str = "0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f20";

    const BATCH: &str = r#"{
        "provider": {"bgnum": "123-4566"},
        "invoices": [{
            "id": "591462b6907e1340e0ffbd5a",
            "transfer_method": "bgnum",
            "transfer_address": "8888885",
            "invoice_identifier": "56897456986",
            "invoice_identifier_type": "invoiceNumber",
            "invoice_number": "56897456986",
            "amount": "980.00",
            "transfer_date": "2017-05-05"
        }]
    }"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 5, 1, 10, 0, 0).unwrap()
    }

    fn config(env: &TestEnv) -> Config {
        let mut config = env.config();
        config.set(BANKGIRO, "test_key", KEY);
        config.set(BANKGIRO, "signer_device", "/nonexistent/bgsigner");
        config.set(BANKGIRO, "service_bureau_number", "4711");
        config
    }

    #[test]
    fn test_order_sealed_with_software_fallback() {
        let env = TestEnv::new();
        let config = config(&env);
        let input = env.write("batch.json", BATCH.as_bytes());
        let output = config.root().join("order.txt");

        let out = bankgiro_order(&config, &input, &output, true, false, now()).unwrap();
        let order = out.structure().unwrap();
        assert!(order.is_signed());
        let written = decode_latin1(&std::fs::read(&output).unwrap());
        assert!(written.starts_with("00170501"));
        assert!(written.contains("LEKGFNUQPYJUBYH7XVNA"));
        assert_eq!(Some(written.as_str()), order.order_signed.as_deref());
    }

    #[test]
    fn test_order_then_seal_matches() {
        let env = TestEnv::new();
        let config = config(&env);
        let input = env.write("batch.json", BATCH.as_bytes());
        let unsealed = config.root().join("unsealed.txt");
        let sealed = config.root().join("sealed.txt");
        let direct = config.root().join("direct.txt");

        let out = bankgiro_order(&config, &input, &unsealed, false, true, now()).unwrap();
        assert!(!out.structure().unwrap().is_signed());
        bankgiro_seal(&config, &unsealed, &sealed, true, now()).unwrap();
        bankgiro_order(&config, &input, &direct, true, true, now()).unwrap();
        assert_eq!(std::fs::read(&sealed).unwrap(), std::fs::read(&direct).unwrap());
    }

    #[test]
    fn test_cancel() {
        let env = TestEnv::new();
        let config = config(&env);
        let input = env.write("batch.json", BATCH.as_bytes());
        let output = config.root().join("cancel.txt");
        bankgiro_cancel(&config, &input, &output).unwrap();
        let written = String::from_utf8(std::fs::read(&output).unwrap()).unwrap();
        assert!(written.starts_with("LB14004711"));
    }

    #[test]
    fn test_missing_settings() {
        let env = TestEnv::new();
        let input = env.write("batch.json", BATCH.as_bytes());
        let output = env.config().root().join("order.txt");
        let mut config = env.config();
        config.set(BANKGIRO, "signer_device", "/nonexistent/bgsigner");
        let err = bankgiro_order(&config, &input, &output, true, false, now()).unwrap_err();
        assert!(err.to_string().contains("bankgiro.test_key"));
        assert!(bankgiro_cancel(&config, &input, &output).is_err());

        let no_provider = env.write("empty.json", br#"{"invoices": []}"#);
        assert!(bankgiro_order(&config, &no_provider, &output, false, false, now()).is_err());
    }
}
