//! Texts for the rejection codes Bankgirot puts in stopped and rejected payment reports.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Swedish,
}

serde_plain::derive_display_from_serialize!(Language);
serde_plain::derive_fromstr_from_deserialize!(Language);

/// Code, English text, Swedish text.
const REJECTION_CODES: &[(&str, &str, &str)] = &[
    ("MBEV0025", "Payment amount too large.", "Betalningen innehåller ett för stort belopp"),
    ("MTRV0013", "Payee's bank account incorrect.", "Mottagarens bankkonto är felaktigt."),
    ("MTRV0014", "Currency code incorrect or payee's bank cannot process the currency.", "Valutakoden är felaktig eller mottagarens bank kan inte hantera valutan"),
    ("MTRV0015", "Non-numeric amount.", "Beloppet är inte numeriskt."),
    ("MTRV0018", "Zero amount.", "Beloppet är noll"),
    ("MTRV0025", "Deregistered bankgiro number.", "Bankgironumret är avregistrerat."),
    ("MTRV0035", "Bankgiro number lacks payee account.", "Bankgironumret saknar mottagarkonto."),
    ("MTRV0038", "Payee's bank account non-numeric.", "Mottagarens bankkonto är inte numeriskt."),
    ("MTRV0041", "Payment instruction received too late.", "Betalningsuppdraget har kommit in för sent."),
    ("MTRV0042", "Payee's bankgiro number incorrect.", "Mottagarens Bankgironummer är felaktigt."),
    ("MTRV0043", "Payee's clearing number incorrect.", "Mottagarens clearingnummer är felaktigt."),
    ("MTRV0044", "Payee's bankgiro number non-numeric.", "Mottagarens Bankgironummer är inte numeriskt."),
    ("MTRV0046", "No bank account for credit transfer.", "Bankkonto saknas för Kontoinsättning."),
    ("MTRV0050", "No payee.", "Mottagare saknas."),
    ("MTRV0051", "Credit transfer number incorrect.", "Utbetalningsnumret är felaktigt."),
    ("MTRV0052", "Incorrect currency for money order.", "Felaktig valuta för Kontantutbetalning."),
    ("MTRV0055", "Payment approved, excess information record(s) rejected.", "Betalning godkänd, övertalig(a) informationspost(er) avvisas."),
    ("MTRV0056", "Deduction/credit invoice cannot be sent to Swedish Tax Agency bankgiro number.", "Avdrag/Kreditfaktura går ej att skicka till Bankgironummer som tillhör Skatteverket."),
    ("MTRV0057", "Deduction date incorrect.", "Avdragsdag felaktig."),
    ("MTRV0058", "First monitoring date incorrect.", "Första bevakningsdag felaktig."),
    ("MTRV0059", "Final monitoring date incorrect.", "Sista bevakningsdag felaktig."),
    ("MTRV0064", "Unreasonable date.", "Orimligt datum."),
    ("MTRV0081", "Payee's PlusGiro number not found in Bankgirot's directory.", "Mottagarens pgnr saknas i Bankgirots register."),
    ("MTRV0082", "Stopped after balance check inquiry. Contact your bank.", "Stoppad vid Täckningskontroll. Kontakta din bank."),
    ("MTRV0110", "Payee's name and/or address missing.", "Mottagarens namn och/eller adress saknas."),
    ("MTRV0111", "Payee's PlusGiro number non-numeric.", "Mottagarens PGnr är inte numerisk."),
    ("MTRV0113", "Incorrect PlusGiro payment.", "Felaktig PlusGirobetalning."),
    ("MTRV0124", "Error in OCR number; incorrect length.", "Fel i OCR-numret; felaktig längd."),
    ("MTRV0126", "Credit transfer to bank not connected to Bankgirot.", "Kontoinsättning till bank som ej är ansluten till Bankgirot."),
    ("MTRV0130", "Error in OCR number; incorrect check digit.", "Fel i OCR-numret; felaktig Checksiffra."),
    ("MTRV0147", "Incorrect currency for PlusGiro payment.", "Felaktig valuta för PlusGirobetalning."),
    ("MTRV0148", "No agreement for specified currency.", "Avtal saknas för angiven valuta."),
    ("MTRV0149", "Remitting bank has no agreement for PlusGiro numbers.", "Avsändande bank saknar avtal för Plusgironummer"),
    ("MTRV0152", "Deduction record rejected, last payment date passed.", "Avdragspost avvisad, sista betalningsdag passerad."),
    ("MTRV0153", "Original amount. Final monitoring date reached.", "Ursprungligt belopp. Sista bevakningsdag är uppnådd."),
    ("MTRV0155", "Payment rejected, due to following record.", "Betalning avvisad, pga efterkommande Post."),
    ("MTRV0156", "Deduction amount greater than payment or different account numbers/addresses.", "Avdragsbelopp är större än betalning eller olika kontonr/adresser."),
    ("MTRV0302", "Mandatory transaction code missing.", "Obligatorisk transkod saknas."),
    ("MTRV0303", "Records received in incorrect order.", "Posterna inkom i fel ordning."),
];

/// The text for a rejection code such as `MTRV0082`, if the code is known.
pub fn rejection_text(code: &str, language: Language) -> Option<&'static str> {
    let code = code.trim();
    REJECTION_CODES
        .iter()
        .find(|(known, _, _)| *known == code)
        .map(|(_, english, swedish)| match language {
            Language::English => *english,
            Language::Swedish => *swedish,
        })
}

/// All known codes, in ascending order.
pub fn rejection_codes() -> impl Iterator<Item = &'static str> {
    REJECTION_CODES.iter().map(|(code, _, _)| *code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_text() {
        assert_eq!(
            rejection_text("MTRV0082", Language::English),
            Some("Stopped after balance check inquiry. Contact your bank.")
        );
        assert_eq!(
            rejection_text(" MTRV0082 ", Language::Swedish),
            Some("Stoppad vid Täckningskontroll. Kontakta din bank.")
        );
        assert_eq!(rejection_text("MTRV9999", Language::English), None);
    }

    #[test]
    fn test_every_code_has_both_texts() {
        let codes: Vec<_> = rejection_codes().collect();
        assert_eq!(codes.len(), 39);
        let mut sorted = codes.clone();
        sorted.sort();
        assert_eq!(codes, sorted);
        for code in codes {
            assert!(rejection_text(code, Language::English).is_some());
            assert!(rejection_text(code, Language::Swedish).is_some());
        }
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("swedish".parse::<Language>().unwrap(), Language::Swedish);
        assert_eq!(Language::English.to_string(), "english");
    }
}
