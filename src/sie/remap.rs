//! Importing into a different chart of accounts.
//!
//! [`Remapper`] sits in front of another [`RecordSink`] and rewrites the account number of every
//! account-bearing record. Records for accounts missing from the mapping are dropped.

use crate::error::CodecResult;
use crate::sie::builder::RecordSink;
use crate::sie::cursor::Params;
use crate::sie::records::{Label, RecordDef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

/// Old account number to new account number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountMapping(BTreeMap<String, String>);

impl AccountMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a mapping file. Each useful line starts with the new four digit account number,
    /// then something that is not a digit, then the old four digit number. Other lines are
    /// ignored.
    pub fn parse(text: &str) -> Self {
        Self(text.lines().filter_map(parse_line).collect())
    }

    pub fn insert(&mut self, old: impl Into<String>, new: impl Into<String>) {
        self.0.insert(old.into(), new.into());
    }

    pub fn get(&self, old: &str) -> Option<&str> {
        self.0.get(old).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AccountMapping {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(old, new)| (old.into(), new.into()))
                .collect(),
        )
    }
}

fn four_digits(s: &str) -> Option<&str> {
    let head = s.get(..4)?;
    head.bytes().all(|b| b.is_ascii_digit()).then_some(head)
}

/// Returns `(old, new)`.
fn parse_line(line: &str) -> Option<(String, String)> {
    let new = four_digits(line)?;
    let rest = &line[4..];
    let gap = rest.find(|c: char| c.is_ascii_digit())?;
    if gap == 0 {
        return None;
    }
    let old = four_digits(&rest[gap..])?;
    Some((old.to_string(), new.to_string()))
}

/// Position of the account number parameter, for records that carry one.
fn account_index(label: Label) -> Option<usize> {
    match label {
        Label::Konto
        | Label::Ktyp
        | Label::Sru
        | Label::Enhet
        | Label::Momskod
        | Label::Trans
        | Label::Rtrans
        | Label::Btrans => Some(0),
        Label::Ib | Label::Ub | Label::Res | Label::Oib | Label::Oub => Some(1),
        Label::Pbudget | Label::Psaldo => Some(2),
        _ => None,
    }
}

pub(crate) struct Remapper<'m, S> {
    inner: S,
    mapping: &'m AccountMapping,
}

impl<'m, S: RecordSink> Remapper<'m, S> {
    pub(crate) fn new(inner: S, mapping: &'m AccountMapping) -> Self {
        Self { inner, mapping }
    }

    pub(crate) fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: RecordSink> RecordSink for Remapper<'_, S> {
    fn record(&mut self, def: &RecordDef, mut params: Params, line: usize) -> CodecResult<()> {
        if let Some(index) = account_index(def.label) {
            let old = params.text(index);
            match self.mapping.get(old) {
                Some(new) => {
                    let new = new.to_string();
                    params.set_text(index, new);
                }
                None => {
                    trace!("Line {line}: account {old} is not mapped, {} dropped", def.tag);
                    return Ok(());
                }
            }
        }
        self.inner.record(def, params, line)
    }

    fn warning(&mut self, message: String) {
        self.inner.warning(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Accounting;
    use crate::sie::builder::Builder;
    use crate::sie::import::dispatch_line;
    use crate::sie::records::RecordTable;
    use rust_decimal::Decimal;

    fn mapping() -> AccountMapping {
        [
            ("1024", "9999"),
            ("1910", "1911"),
            ("2640", "2641"),
            ("6250", "6251"),
        ]
        .into_iter()
        .collect()
    }

    fn build(lines: &[&str]) -> Accounting {
        let table = RecordTable::sie4();
        let mapping = mapping();
        let mut remapper = Remapper::new(Builder::new(Accounting::new()), &mapping);
        for (n, line) in lines.iter().enumerate() {
            let raw = format!("{line}\n");
            dispatch_line(&mut remapper, &table, raw.as_bytes(), n + 2).unwrap();
        }
        remapper.into_inner().finish().accounting
    }

    #[test]
    fn test_parse_mapping_file() {
        let text = "1911 ; 1910\n9999\t1024 Kassa\nrubrik\n12 3456\n1234 5\n2641 -> 2640\n";
        let mapping = AccountMapping::parse(text);
        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.get("1910"), Some("1911"));
        assert_eq!(mapping.get("1024"), Some("9999"));
        assert_eq!(mapping.get("2640"), Some("2641"));
        assert_eq!(mapping.get("1911"), None);
    }

    #[test]
    fn test_parse_line_needs_separator() {
        assert_eq!(parse_line("19111910"), None);
        assert_eq!(parse_line("1911 191"), None);
        assert_eq!(
            parse_line("1911 19100"),
            Some(("1910".to_string(), "1911".to_string()))
        );
    }

    #[test]
    fn test_account_is_renumbered() {
        let acc = build(&["#KONTO 1024 \"Kassa\"", "#KTYP 1024 T", "#KONTO 3000 \"Skip\""]);
        let accounts: Vec<_> = acc.accounts().map(|(_, a)| a.number.clone()).collect();
        assert_eq!(accounts, vec!["9999"]);
        let kassa = acc.account(acc.find_account("9999").unwrap());
        assert_eq!(kassa.name, "Kassa");
        assert!(kassa.account_type.is_some());
    }

    #[test]
    fn test_balances_use_their_own_index() {
        let acc = build(&[
            "#KONTO 1910 Kassa",
            "#IB 0 1910 10.00",
            "#IB 0 3000 99.00",
            "#PSALDO 0 201201 1910 {} 5.00",
            "#PSALDO 0 201201 3000 {} 5.00",
        ]);
        let id = acc.find_account("1911").unwrap();
        let figures = acc.account(id).balance.as_ref().unwrap();
        assert_eq!(figures.opening_balance, Some(Decimal::new(1000, 2)));
        assert_eq!(acc.balance_budgets().len(), 1);
        assert!(acc.find_account("3000").is_none());
    }

    #[test]
    fn test_unmapped_transaction_is_dropped() {
        let acc = build(&[
            "#KONTO 1910 Kassa",
            "#VER A 1 20120105",
            "{",
            "#TRANS 1910 {} 100.00",
            "#TRANS 3000 {} -100.00",
            "}",
        ]);
        assert_eq!(acc.transactions().len(), 1);
        assert_eq!(acc.account(acc.transactions()[0].account).number, "1911");
    }

    #[test]
    fn test_records_without_account_pass_through() {
        let acc = build(&["#FNAMN \"Open End\"", "#DIM 1 Kst"]);
        assert_eq!(acc.orgname.as_deref(), Some("Open End"));
        assert_eq!(acc.dimensions().count(), 1);
    }
}
