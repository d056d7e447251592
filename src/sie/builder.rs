//! Turns parsed SIE records into an [`Accounting`] graph.
//!
//! The builder keeps per-import identity caches for accounts, series and accounting objects,
//! and the one open verification that `#TRANS` records attach to. References to entities that
//! the file never defines are created on the spot and reported as warnings.

use crate::error::{CodecError, CodecResult};
use crate::model::accounting::{
    AccountId, AccountType, AccountingObjectId, BalanceTarget, DimensionId, FiscalYear, SeriesId,
    Transaction, TransactionKind, Verification, VerificationId,
};
use crate::model::Accounting;
use crate::sie::cursor::Params;
use crate::sie::records::{Label, RecordDef};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use tracing::{debug, info, warn};

const AUTOGENERATED: &str = "Autogenererad";

/// Receives records in file order.
pub(crate) trait RecordSink {
    fn record(&mut self, def: &RecordDef, params: Params, line: usize) -> CodecResult<()>;

    /// Reports a recoverable problem.
    fn warning(&mut self, message: String);
}

/// The outcome of an import: the graph and every warning raised while building it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SieImport {
    pub accounting: Accounting,
    pub warnings: Vec<String>,
}

#[derive(Debug, Default)]
pub(crate) struct Builder {
    acc: Accounting,
    accounts: HashMap<String, AccountId>,
    defined_accounts: HashSet<String>,
    series: HashMap<String, SeriesId>,
    objects: HashMap<(String, String), AccountingObjectId>,
    current: Option<VerificationId>,
    added: bool,
    warnings: Vec<String>,
}

impl Builder {
    /// Builds on top of `acc`, whose accounts, dimensions and series are reused when referenced.
    pub(crate) fn new(acc: Accounting) -> Self {
        Self {
            acc,
            ..Self::default()
        }
    }

    pub(crate) fn finish(self) -> SieImport {
        SieImport {
            accounting: self.acc,
            warnings: self.warnings,
        }
    }

    fn get_account(&mut self, number: &str, line: usize) -> AccountId {
        if let Some(&id) = self.accounts.get(number) {
            return id;
        }
        let id = match self.acc.find_account(number) {
            Some(id) => id,
            None => {
                self.warning(format!(
                    "Referenced undefined account {number} at line {line}"
                ));
                self.acc.add_account(number, "")
            }
        };
        self.accounts.insert(number.to_string(), id);
        id
    }

    fn get_series(&mut self, name: &str, description: Option<String>) -> SeriesId {
        let id = match self.series.get(name) {
            Some(&id) => id,
            None => {
                let id = self
                    .acc
                    .find_series(name)
                    .unwrap_or_else(|| self.acc.add_series(name));
                self.series.insert(name.to_string(), id);
                id
            }
        };
        if description.is_some() {
            self.acc.series_mut(id).description = description;
        }
        id
    }

    fn get_dimension(&mut self, number: &str, line: usize) -> DimensionId {
        match self.acc.find_dimension(number) {
            Some(id) => id,
            None => {
                self.warning(format!(
                    "Referenced undefined dimension {number} at line {line}"
                ));
                self.acc.add_dimension(number, AUTOGENERATED, None)
            }
        }
    }

    fn get_object(&mut self, dimension: &str, number: &str, line: usize) -> AccountingObjectId {
        let key = (dimension.to_string(), number.to_string());
        if let Some(&id) = self.objects.get(&key) {
            return id;
        }
        let dim = self.get_dimension(dimension, line);
        let id = match self.acc.find_object(dim, number) {
            Some(id) => id,
            None => {
                self.warning(format!(
                    "Referenced undefined object {number} at line {line}"
                ));
                self.acc.add_object(dim, number, AUTOGENERATED)
            }
        };
        self.objects.insert(key, id);
        id
    }

    fn balance_target(&mut self, account: AccountId, year: i64) -> BalanceTarget {
        if year == 0 {
            return BalanceTarget::Account(account);
        }
        let id = self
            .acc
            .find_account_balance(account, year)
            .unwrap_or_else(|| self.acc.add_account_balance(account, year));
        BalanceTarget::Year(id)
    }

    fn define_account(&mut self, number: &str, name: &str, line: usize) -> CodecResult<()> {
        if !self.defined_accounts.insert(number.to_string()) {
            return Err(CodecError::DuplicateAccount {
                number: number.to_string(),
                line,
            });
        }
        let existing = self
            .accounts
            .get(number)
            .copied()
            .or_else(|| self.acc.find_account(number));
        let id = match existing {
            Some(id) => {
                self.acc.account_mut(id).name = name.to_string();
                id
            }
            None => self.acc.add_account(number, name),
        };
        self.accounts.insert(number.to_string(), id);
        Ok(())
    }

    fn define_dimension(&mut self, number: &str, name: &str, parent: Option<DimensionId>) {
        match self.acc.find_dimension(number) {
            Some(id) => {
                let dim = self.acc.dimension_mut(id);
                dim.name = name.to_string();
                dim.parent = parent;
            }
            None => {
                self.acc.add_dimension(number, name, parent);
            }
        }
    }

    fn define_object(&mut self, dimension: &str, number: &str, name: &str, line: usize) {
        let dim = self.get_dimension(dimension, line);
        let id = match self.acc.find_object(dim, number) {
            Some(id) => {
                self.acc.object_mut(id).name = name.to_string();
                id
            }
            None => self.acc.add_object(dim, number, name),
        };
        self.objects
            .insert((dimension.to_string(), number.to_string()), id);
    }

    fn year(params: &Params, line: usize) -> CodecResult<i64> {
        params
            .integer(0)
            .ok_or_else(|| CodecError::malformed(line, "missing relative year"))
    }

    fn object_pair(list: &[String], line: usize) -> CodecResult<(&str, &str)> {
        match list {
            [dimension, object] => Ok((dimension.as_str(), object.as_str())),
            _ => Err(CodecError::malformed(
                line,
                format!(
                    "expected one dimension and object pair, got {} items",
                    list.len()
                ),
            )),
        }
    }

    fn account_balance(&mut self, label: Label, params: &Params, line: usize) -> CodecResult<()> {
        let year = Self::year(params, line)?;
        let account = self.get_account(params.text(1), line);
        let target = self.balance_target(account, year);
        let amount = params.decimal(2);
        let quantity = params.opt_decimal(3);
        let figures = self.acc.figures_mut(target);
        match label {
            Label::Ib => {
                figures.opening_balance = Some(amount);
                figures.balance = Some(amount);
                if quantity.is_some() {
                    figures.opening_quantity = quantity;
                    figures.balance_quantity = quantity;
                }
            }
            _ => {
                figures.balance = Some(amount);
                if quantity.is_some() {
                    figures.balance_quantity = quantity;
                }
            }
        }
        Ok(())
    }

    fn object_balance(&mut self, label: Label, params: &Params, line: usize) -> CodecResult<()> {
        let year = Self::year(params, line)?;
        let (dimension, object) = Self::object_pair(params.list(2), line)?;
        let account = self.get_account(params.text(1), line);
        let target = self.balance_target(account, year);
        let object = self.get_object(dimension, object, line);
        let amount = params.decimal(3);
        let quantity = params.opt_decimal(4);
        let figures = self.acc.object_balance_mut(object, target, "");
        if label == Label::Oib {
            figures.opening_balance = Some(amount);
            if quantity.is_some() {
                figures.opening_quantity = quantity;
            }
        }
        figures.balance = Some(amount);
        if quantity.is_some() {
            figures.balance_quantity = quantity;
        }
        Ok(())
    }

    fn period_balance(&mut self, label: Label, params: &Params, line: usize) -> CodecResult<()> {
        let year = Self::year(params, line)?;
        let period = params.text(1).to_string();
        let list = params.list(3);
        if !list.is_empty() && list.len() != 2 {
            self.warning(format!(
                "Malformed object list in period record at line {line}"
            ));
            return Ok(());
        }
        let account = self.get_account(params.text(2), line);
        let target = self.balance_target(account, year);
        let figures = match list {
            [dimension, object] => {
                let object = self.get_object(dimension, object, line);
                self.acc.object_balance_mut(object, target, &period)
            }
            _ => self.acc.balance_budget_mut(target, &period),
        };
        let amount = Some(params.decimal(4));
        let quantity = params.opt_decimal(5);
        if label == Label::Pbudget {
            figures.budget = amount;
            if quantity.is_some() {
                figures.budget_quantity = quantity;
            }
        } else {
            figures.balance = amount;
            if quantity.is_some() {
                figures.balance_quantity = quantity;
            }
        }
        Ok(())
    }

    fn verification(&mut self, params: &Params, line: usize) -> CodecResult<()> {
        let series = self.get_series(params.text(0), None);
        let date = params
            .date(2)
            .ok_or_else(|| CodecError::malformed(line, "verification without a date"))?;
        let id = self.acc.add_verification(Verification {
            series,
            number: params.integer(1),
            date,
            text: params.opt_text(3),
            registration_date: params.date(4),
            signature: params.opt_text(5),
        });
        self.current = Some(id);
        self.added = false;
        Ok(())
    }

    fn transaction(
        &mut self,
        def: &RecordDef,
        params: &Params,
        line: usize,
    ) -> CodecResult<()> {
        let verification = self.current.ok_or_else(|| CodecError::NoOpenContext {
            record: def.tag.to_string(),
            context: "verification",
            line,
        })?;
        let kind = match def.label {
            Label::Trans => {
                let suppressed = self.added;
                self.added = false;
                if suppressed {
                    debug!("Line {line}: #TRANS repeats the preceding #RTRANS, skipped");
                    return Ok(());
                }
                TransactionKind::Normal
            }
            Label::Rtrans => {
                self.added = true;
                TransactionKind::Added
            }
            _ => TransactionKind::Deleted,
        };
        let account = self.get_account(params.text(0), line);
        let objects = params
            .list(1)
            .chunks(2)
            .map(|pair| self.get_object(&pair[0], &pair[1], line))
            .collect();
        self.acc.add_transaction(Transaction {
            verification,
            kind,
            account,
            amount: params.decimal(2),
            date: params.date(3),
            text: params.opt_text(4),
            quantity: params.opt_decimal(5),
            signature: params.opt_text(6),
            objects,
        });
        Ok(())
    }
}

impl RecordSink for Builder {
    fn record(&mut self, def: &RecordDef, params: Params, line: usize) -> CodecResult<()> {
        let p = &params;
        match def.label {
            Label::Gen => match p.opt_text(1) {
                Some(by) => info!("Generated {:?} by {by}", p.date(0)),
                None => info!("Generated {:?}", p.date(0)),
            },
            Label::Program => info!("Program: {}, version {}", p.text(0), p.text(1)),
            Label::Enhet => {
                let id = self.get_account(p.text(0), line);
                self.acc.account_mut(id).unit = p.opt_text(1);
            }
            Label::Format => {
                if p.text(0) != "PC8" {
                    return Err(CodecError::UnsupportedFormat(p.text(0).to_string()));
                }
            }
            Label::Kptyp => self.acc.layout = p.opt_text(0),
            Label::Adress => {
                self.acc.contact = p.opt_text(0);
                self.acc.mail_address = p.opt_text(1);
                self.acc.zip_city = p.opt_text(2);
                self.acc.telephone = p.opt_text(3);
            }
            Label::Orgnr => {
                self.acc.orgnum = p.opt_text(0);
                if p.get(1).is_some() {
                    self.acc.purchase_number = p.opt_text(1);
                }
                if p.get(2).is_some() {
                    self.acc.site = p.opt_text(2);
                }
            }
            Label::Fnamn => self.acc.orgname = p.opt_text(0),
            Label::Fnr => {
                info!("Exporting system's internal id is {}", p.text(0));
                self.acc.org_id = p.opt_text(0);
            }
            Label::Ftyp => self.acc.orgtype = p.opt_text(0),
            Label::Bkod => self.acc.industry_code = p.opt_text(0),
            Label::Omfattn => info!("Balances are reported up to {:?}", p.date(0)),
            Label::Rar => {
                let year = Self::year(p, line)?;
                let (start, end) = match (p.date(1), p.date(2)) {
                    (Some(start), Some(end)) => (start, end),
                    _ => return Err(CodecError::malformed(line, "#RAR needs two dates")),
                };
                if year == 0 {
                    self.acc.start = Some(start);
                    self.acc.end = Some(end);
                }
                self.acc.years.insert(year, FiscalYear { start, end });
            }
            Label::Taxar => self.acc.taxation_year = p.opt_text(0),
            Label::Sietyp => {
                if p.text(0) != "4" {
                    return Err(CodecError::UnsupportedSieVersion(p.text(0).to_string()));
                }
            }
            Label::Valuta => self.acc.currency = p.opt_text(0),
            Label::Prosa => info!("Comment: {}", p.text(0)),
            Label::Dim => self.define_dimension(p.text(0), p.text(1), None),
            Label::Underdim => {
                let parent = match self.acc.find_dimension(p.text(2)) {
                    Some(id) => id,
                    None => {
                        self.warning(format!(
                            "Referenced undefined dimension {} at line {line}",
                            p.text(2)
                        ));
                        let name = format!("Överdimension till {}", p.text(1));
                        self.acc.add_dimension(p.text(2), name, None)
                    }
                };
                self.define_dimension(p.text(0), p.text(1), Some(parent));
            }
            Label::Objekt => self.define_object(p.text(0), p.text(1), p.text(2), line),
            Label::Konto => self.define_account(p.text(0), p.text(1), line)?,
            Label::Ktyp => {
                let account_type = AccountType::from_str(p.text(1)).map_err(|_| {
                    CodecError::malformed(line, format!("unknown account type '{}'", p.text(1)))
                })?;
                let id = self.get_account(p.text(0), line);
                self.acc.account_mut(id).account_type = Some(account_type);
            }
            Label::Sru => {
                let id = self.get_account(p.text(0), line);
                self.acc.account_mut(id).sru = p.opt_text(1);
            }
            Label::Ib | Label::Ub | Label::Res => self.account_balance(def.label, p, line)?,
            Label::Oib | Label::Oub => self.object_balance(def.label, p, line)?,
            Label::Pbudget | Label::Psaldo => self.period_balance(def.label, p, line)?,
            Label::Ver => self.verification(p, line)?,
            Label::Trans | Label::Rtrans | Label::Btrans => self.transaction(def, p, line)?,
            Label::Ksumma => {}
            Label::Avslutat => self.acc.closed = true,
            Label::Serie => {
                self.get_series(p.text(0), p.opt_text(1));
            }
            Label::Momskod => {
                let id = self.get_account(p.text(0), line);
                self.acc.account_mut(id).vat_code = p.opt_text(1);
            }
        }
        Ok(())
    }

    fn warning(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }
}
