//! The HMAC tamper protection seal Bankgirot requires around payment orders.
//!
//! A sealed file is the order wrapped in an opening record (`00`) and a closing record (`99`).
//! The closing record carries the key verification value, a mac over eight zeros that proves
//! which key was used, and the seal itself, a mac over the normalized opening record and order.

use crate::charset::{decode_latin1, encode_latin1_lossy};
use crate::error::CodecResult;
use crate::giro::fixed::Record;
use crate::giro::signer::{Signer, MAC_LEN};
use crate::model::BgcOrder;
use chrono::NaiveDate;
use tracing::info;

/// The fixed message the key verification value is computed over.
pub const KVV_MESSAGE: &[u8] = b"00000000";

/// Substitutes for the letters outside printable ASCII that Bankgirot accepts.
const LETTERS: [(u8, u8); 10] = [
    (201, 64),  // É
    (196, 91),  // Ä
    (214, 92),  // Ö
    (197, 93),  // Å
    (220, 94),  // Ü
    (233, 96),  // é
    (228, 123), // ä
    (246, 124), // ö
    (229, 125), // å
    (252, 126), // ü
];

/// Every other byte is replaced by this one.
const UNKNOWN: u8 = 195;

/// Prepares Latin-1 bytes for signing: line breaks are removed and every byte is mapped into
/// the character set the seal is defined over.
pub fn normalize(message: &[u8]) -> Vec<u8> {
    message
        .iter()
        .filter(|&&b| b != b'\n' && b != b'\r')
        .map(|&b| match b {
            32..=126 => b,
            _ => LETTERS
                .iter()
                .find(|(from, _)| *from == b)
                .map_or(UNKNOWN, |(_, to)| *to),
        })
        .collect()
}

pub fn opening_record(today: NaiveDate) -> CodecResult<String> {
    Record::new("00")
        .literal(&today.format("%y%m%d").to_string())
        .literal("HMAC")
        .blank(68)
        .finish()
}

pub fn tamper_protection_record(
    today: NaiveDate,
    key_verification_value: &str,
    seal: &str,
) -> CodecResult<String> {
    let line = Record::new("99")
        .literal(&today.format("%y%m%d").to_string())
        .code(key_verification_value, MAC_LEN)?
        .code(seal, MAC_LEN)?
        .blank(8)
        .finish()?;
    Ok(line.to_uppercase())
}

/// Wraps `order` in the seal records. The result is what goes on the wire, decoded as Latin-1:
/// characters the bank file cannot carry have already been replaced.
pub fn seal(order: &str, today: NaiveDate, signer: &mut dyn Signer) -> CodecResult<String> {
    let mut message = opening_record(today)?;
    message.push('\n');
    message.push_str(order);
    let bytes = encode_latin1_lossy(&message);

    let seal = signer.sign(&normalize(&bytes))?;
    let kvv = signer.sign(KVV_MESSAGE)?;

    let mut sealed = decode_latin1(&bytes);
    sealed.push_str(&tamper_protection_record(today, &kvv, &seal)?);
    sealed.push('\n');
    Ok(sealed)
}

/// Seals the unsigned text of `order` into its signed text.
pub fn sign_order(
    order: &mut BgcOrder,
    today: NaiveDate,
    signer: &mut dyn Signer,
) -> CodecResult<()> {
    let signed = seal(&order.order_unsigned, today, signer)?;
    order.order_signed = Some(signed);
    info!("Sealed order created {}", order.created);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::giro::bankgiro::{opening_record as lb_opening, total_amount_record};
    use crate::giro::signer::tests::ScriptedDevice;
    use crate::giro::signer::{DeviceSigner, KeyMode, SoftwareSigner};
    use chrono::Utc;

    const KEY: &str = "0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f20";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn small_order(today: NaiveDate) -> String {
        format!(
            "{}\n{}\n",
            lb_opening("1234566", today).unwrap(),
            total_amount_record("1234566", 0, 0).unwrap()
        )
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(&encode_latin1_lossy("Ärligt é\u{4e2d}ü\tX")),
            b"[rligt `?~\xc3X".to_vec()
        );
        assert_eq!(
            normalize(&encode_latin1_lossy("Åsa Öberg,\r\n Ümit, Émile")),
            b"]sa \\berg, ^mit, @mile".to_vec()
        );
    }

    #[test]
    fn test_normalize_sweep() {
        let all: Vec<u8> = (0..=255).collect();
        let normalized = normalize(&all);
        assert_eq!(normalized.len(), 254);
        assert!(normalized
            .iter()
            .all(|&b| (32..=126).contains(&b) || b == UNKNOWN));
    }

    #[test]
    fn test_opening_record() {
        assert_eq!(
            opening_record(date(2017, 5, 8)).unwrap(),
            format!("00170508HMAC{}", " ".repeat(68))
        );
    }

    #[test]
    fn test_key_verification_value() {
        let mut signer = SoftwareSigner::from_hex(KEY).unwrap();
        assert_eq!(
            signer.sign(KVV_MESSAGE).unwrap(),
            "7f644a959ed7d2f76050ae2ff0952b20"
        );
    }

    #[test]
    fn test_seal() {
        let today = date(2017, 5, 8);
        let order = small_order(today);
        let mut signer = SoftwareSigner::from_hex(KEY).unwrap();
        let sealed = seal(&order, today, &mut signer).unwrap();
        let lines: Vec<&str> = sealed.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], opening_record(today).unwrap());
        assert_eq!(format!("{}\n{}\n", lines[1], lines[2]), order);
        assert_eq!(
            lines[3],
            format!(
                "99170508{}{}{}",
                "7F644A959ED7D2F76050AE2FF0952B20",
                "15A80FA857A1E182D50878073C1770C0",
                " ".repeat(8)
            )
        );
        assert!(sealed.ends_with('\n'));
    }

    #[test]
    fn test_device_and_software_agree() {
        let today = date(2017, 5, 8);
        let order = small_order(today);
        let device = ScriptedDevice::new(
            "OK\r\n15A80FA857A1E182D50878073C1770C0\r\nOK\r\n7F644A959ED7D2F76050AE2FF0952B20\r\n",
        );
        let mut device_signer = DeviceSigner::new(device, "lock", KeyMode::Key128);
        let mut software_signer = SoftwareSigner::from_hex(KEY).unwrap();
        assert_eq!(
            seal(&order, today, &mut device_signer).unwrap(),
            seal(&order, today, &mut software_signer).unwrap()
        );
    }

    #[test]
    fn test_sign_order() {
        let today = date(2017, 5, 8);
        let mut order = BgcOrder::new(small_order(today), Utc::now());
        let mut signer = SoftwareSigner::from_hex(KEY).unwrap();
        sign_order(&mut order, today, &mut signer).unwrap();
        let signed = order.order_signed.as_deref().unwrap();
        assert!(signed.starts_with("00170508HMAC"));
        assert!(signed.contains(&order.order_unsigned));
    }
}
