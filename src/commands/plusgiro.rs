use crate::charset::encode_latin1_lossy;
use crate::commands::Out;
use crate::giro::plusgiro;
use crate::model::PaymentBatch;
use crate::{fs, Config, Result};
use anyhow::Context;
use chrono::NaiveDate;
use std::path::Path;

/// Writes a CFP PO3 order for the invoices in `input`. The batch must carry the paying
/// organisation number; the sending account comes from `plusgiro.sending_bank_account`.
pub fn plusgiro_order(
    config: &Config,
    input: &Path,
    output: &Path,
    today: NaiveDate,
) -> Result<Out<()>> {
    let batch: PaymentBatch = fs::read_json(input)?;
    let orgnum = batch
        .orgnum
        .as_deref()
        .with_context(|| format!("The batch in {} has no orgnum", input.display()))?;
    let content = plusgiro::order(
        orgnum,
        config.sending_bank_account()?,
        &batch.invoices,
        today,
    )
    .context("Unable to create the plusgiro order")?;
    fs::write_all(output, encode_latin1_lossy(&content))?;
    Ok(format!(
        "Wrote plusgiro order for {} invoices to {}",
        batch.invoices.len(),
        output.display()
    )
    .into())
}
