//! The SIE 4 record registry: which labels exist and what parameters each one takes.

use crate::sie::cursor::{parse_format, Slot};
use std::collections::HashMap;

/// Every record label the importer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Gen,
    Program,
    Enhet,
    Format,
    Kptyp,
    Adress,
    Orgnr,
    Fnamn,
    Fnr,
    Ftyp,
    Bkod,
    Omfattn,
    Rar,
    Taxar,
    Sietyp,
    Valuta,
    Prosa,
    Dim,
    Underdim,
    Objekt,
    Konto,
    Ktyp,
    Sru,
    Ib,
    Ub,
    Res,
    Oib,
    Oub,
    Pbudget,
    Psaldo,
    Ver,
    Trans,
    Rtrans,
    Btrans,
    Ksumma,
    /// Extension: the year is closed.
    Avslutat,
    /// Extension: verification series with description.
    Serie,
    /// Extension: VAT code of an account.
    Momskod,
}

const SIE4: &[(&str, Label, &str)] = &[
    ("#GEN", Label::Gen, "D [T]"),
    ("#PROGRAM", Label::Program, "T T"),
    ("#ENHET", Label::Enhet, "T T"),
    ("#FORMAT", Label::Format, "T"),
    ("#KPTYP", Label::Kptyp, "T"),
    ("#ADRESS", Label::Adress, "T T T T"),
    ("#ORGNR", Label::Orgnr, "T [T] [T]"),
    ("#FNAMN", Label::Fnamn, "T"),
    ("#FNR", Label::Fnr, "T"),
    ("#FTYP", Label::Ftyp, "T"),
    ("#BKOD", Label::Bkod, "T"),
    ("#OMFATTN", Label::Omfattn, "D"),
    ("#RAR", Label::Rar, "I D D"),
    ("#TAXAR", Label::Taxar, "T"),
    ("#SIETYP", Label::Sietyp, "T"),
    ("#VALUTA", Label::Valuta, "T"),
    ("#PROSA", Label::Prosa, "T"),
    ("#DIM", Label::Dim, "T T"),
    ("#UNDERDIM", Label::Underdim, "T T T"),
    ("#OBJEKT", Label::Objekt, "T T T"),
    ("#KONTO", Label::Konto, "T T"),
    ("#KTYP", Label::Ktyp, "T T"),
    ("#SRU", Label::Sru, "T T"),
    ("#IB", Label::Ib, "I T N [N]"),
    ("#UB", Label::Ub, "I T N [N]"),
    ("#RES", Label::Res, "I T N [N]"),
    ("#OIB", Label::Oib, "I T* L N [N]"),
    ("#OUB", Label::Oub, "I T* L N [N]"),
    ("#PBUDGET", Label::Pbudget, "I T T L N [N]"),
    ("#PSALDO", Label::Psaldo, "I T T L N [N]"),
    ("#VER", Label::Ver, "T I D [T] [D] [T]"),
    ("#TRANS", Label::Trans, "T* L N [D] [T] [N] [T]"),
    ("#RTRANS", Label::Rtrans, "T* L N [D] [T] [N] [T]"),
    ("#BTRANS", Label::Btrans, "T* L N [D] [T] [N] [T]"),
    ("#KSUMMA", Label::Ksumma, "[T]"),
    ("#AVSLUTAT", Label::Avslutat, ""),
    ("#SERIE", Label::Serie, "T [T]"),
    ("#MOMSKOD", Label::Momskod, "T T"),
];

#[derive(Debug, Clone)]
pub(crate) struct RecordDef {
    pub(crate) label: Label,
    pub(crate) tag: &'static str,
    pub(crate) format: Vec<Slot>,
}

/// Immutable label lookup shared by the checksum pass and the import pass.
#[derive(Debug, Clone)]
pub struct RecordTable {
    defs: HashMap<&'static [u8], RecordDef>,
}

impl RecordTable {
    pub fn sie4() -> Self {
        let defs = SIE4
            .iter()
            .map(|&(tag, label, format)| {
                (
                    tag.as_bytes(),
                    RecordDef {
                        label,
                        tag,
                        format: parse_format(format),
                    },
                )
            })
            .collect();
        Self { defs }
    }

    pub(crate) fn get(&self, label: &[u8]) -> Option<&RecordDef> {
        self.defs.get(label)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

impl Default for RecordTable {
    fn default() -> Self {
        Self::sie4()
    }
}
