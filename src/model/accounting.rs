//! The accounting graph that SIE files are read into and written from.
//!
//! Entities live in flat vectors owned by [`Accounting`] and refer to each other through typed
//! indexes. Only `Accounting` hands out indexes, so an index obtained from one accounting is
//! always valid for it. Graphs read from JSON are checked with [`Accounting::validate`].

use anyhow::ensure;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

index_type!(
    /// Index of an [`Account`].
    AccountId
);
index_type!(
    /// Index of a [`Dimension`].
    DimensionId
);
index_type!(
    /// Index of an [`AccountingObject`].
    AccountingObjectId
);
index_type!(
    /// Index of an [`AccountBalance`].
    AccountBalanceId
);
index_type!(
    /// Index of a [`VerificationSeries`].
    SeriesId
);
index_type!(
    /// Index of a [`Verification`].
    VerificationId
);

/// The SIE account type letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    /// Tillgång
    #[serde(rename = "T")]
    Asset,
    /// Skuld
    #[serde(rename = "S")]
    Liability,
    /// Kostnad
    #[serde(rename = "K")]
    Cost,
    /// Intäkt
    #[serde(rename = "I")]
    Income,
}

serde_plain::derive_display_from_serialize!(AccountType);
serde_plain::derive_fromstr_from_deserialize!(AccountType);

impl AccountType {
    /// Balance sheet accounts carry opening and closing balances, result accounts a turnover.
    pub fn is_balance_sheet(self) -> bool {
        matches!(self, AccountType::Asset | AccountType::Liability)
    }

    /// The type implied by the first digit of a BAS account number, for accounts whose file
    /// has no `#KTYP`.
    pub fn for_number(number: &str) -> Option<AccountType> {
        match number.chars().next()? {
            '0' | '1' => Some(AccountType::Asset),
            '2' => Some(AccountType::Liability),
            '3' => Some(AccountType::Income),
            '4'..='9' => Some(AccountType::Cost),
            _ => None,
        }
    }
}

/// Amounts and quantities attached to an account, a year, an object or a period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_balance: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_quantity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance_quantity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_quantity: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub number: String,
    pub name: String,
    #[serde(default)]
    pub account_type: Option<AccountType>,
    #[serde(default)]
    pub sru: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub vat_code: Option<String>,
    /// Figures for the current year (year 0).
    #[serde(default)]
    pub balance: Option<Balance>,
}

impl Account {
    /// The declared type, or the one implied by the account number.
    pub fn effective_type(&self) -> Option<AccountType> {
        self.account_type
            .or_else(|| AccountType::for_number(&self.number))
    }
}

/// Figures of an account for a year other than the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: AccountId,
    pub year: i64,
    pub figures: Balance,
}

/// Where a balance row is booked: on the account itself (year 0) or on a year satellite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceTarget {
    Account(AccountId),
    Year(AccountBalanceId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub number: String,
    pub name: String,
    #[serde(default)]
    pub parent: Option<DimensionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingObject {
    pub dimension: DimensionId,
    pub number: String,
    pub name: String,
}

/// Figures of one accounting object on one account, yearly (`period` empty) or per month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectBalanceBudget {
    pub object: AccountingObjectId,
    pub target: BalanceTarget,
    pub period: String,
    pub figures: Balance,
}

/// Period figures of an account without an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceBudget {
    pub target: BalanceTarget,
    pub period: String,
    pub figures: Balance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSeries {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub series: SeriesId,
    #[serde(default)]
    pub number: Option<i64>,
    pub date: NaiveDate,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub registration_date: Option<NaiveDate>,
    #[serde(default)]
    pub signature: Option<String>,
}

/// `#TRANS`, `#RTRANS` and `#BTRANS` respectively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    #[default]
    Normal,
    Added,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub verification: VerificationId,
    #[serde(default)]
    pub kind: TransactionKind,
    pub account: AccountId,
    pub amount: Decimal,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub objects: Vec<AccountingObjectId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalYear {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// One set of books: organisation details, chart of accounts, objects, balances and the
/// verifications of the exported period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Accounting {
    pub org_id: Option<String>,
    pub orgname: Option<String>,
    pub orgnum: Option<String>,
    pub orgtype: Option<String>,
    pub industry_code: Option<String>,
    pub purchase_number: Option<String>,
    pub site: Option<String>,
    pub contact: Option<String>,
    pub mail_address: Option<String>,
    pub zip_city: Option<String>,
    pub telephone: Option<String>,
    pub layout: Option<String>,
    pub currency: Option<String>,
    pub taxation_year: Option<String>,
    pub closed: bool,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Keyed by relative year: 0 is the current year, -1 the one before.
    pub years: BTreeMap<i64, FiscalYear>,
    accounts: Vec<Account>,
    account_balances: Vec<AccountBalance>,
    dimensions: Vec<Dimension>,
    objects: Vec<AccountingObject>,
    object_balances: Vec<ObjectBalanceBudget>,
    balance_budgets: Vec<BalanceBudget>,
    series: Vec<VerificationSeries>,
    verifications: Vec<Verification>,
    transactions: Vec<Transaction>,
}

impl Accounting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accounts(&self) -> impl Iterator<Item = (AccountId, &Account)> {
        self.accounts.iter().enumerate().map(|(i, a)| (AccountId(i), a))
    }

    pub fn account(&self, id: AccountId) -> &Account {
        &self.accounts[id.0]
    }

    pub fn account_mut(&mut self, id: AccountId) -> &mut Account {
        &mut self.accounts[id.0]
    }

    pub fn find_account(&self, number: &str) -> Option<AccountId> {
        self.accounts
            .iter()
            .position(|a| a.number == number)
            .map(AccountId)
    }

    pub fn add_account(&mut self, number: impl Into<String>, name: impl Into<String>) -> AccountId {
        let number: String = number.into();
        let account_type = AccountType::for_number(&number);
        self.accounts.push(Account {
            number,
            name: name.into(),
            account_type,
            sru: None,
            unit: None,
            vat_code: None,
            balance: None,
        });
        AccountId(self.accounts.len() - 1)
    }

    pub fn account_balances(&self) -> impl Iterator<Item = (AccountBalanceId, &AccountBalance)> {
        self.account_balances
            .iter()
            .enumerate()
            .map(|(i, b)| (AccountBalanceId(i), b))
    }

    pub fn account_balance(&self, id: AccountBalanceId) -> &AccountBalance {
        &self.account_balances[id.0]
    }

    pub fn find_account_balance(&self, account: AccountId, year: i64) -> Option<AccountBalanceId> {
        self.account_balances
            .iter()
            .position(|b| b.account == account && b.year == year)
            .map(AccountBalanceId)
    }

    pub fn add_account_balance(&mut self, account: AccountId, year: i64) -> AccountBalanceId {
        self.account_balances.push(AccountBalance {
            account,
            year,
            figures: Balance::default(),
        });
        AccountBalanceId(self.account_balances.len() - 1)
    }

    /// The account a balance target belongs to.
    pub fn target_account(&self, target: BalanceTarget) -> AccountId {
        match target {
            BalanceTarget::Account(id) => id,
            BalanceTarget::Year(id) => self.account_balances[id.0].account,
        }
    }

    /// The relative year a balance target belongs to.
    pub fn target_year(&self, target: BalanceTarget) -> i64 {
        match target {
            BalanceTarget::Account(_) => 0,
            BalanceTarget::Year(id) => self.account_balances[id.0].year,
        }
    }

    /// The figures a balance target points at, created empty on first use.
    pub fn figures_mut(&mut self, target: BalanceTarget) -> &mut Balance {
        match target {
            BalanceTarget::Account(id) => self.accounts[id.0]
                .balance
                .get_or_insert_with(Balance::default),
            BalanceTarget::Year(id) => &mut self.account_balances[id.0].figures,
        }
    }

    pub fn dimensions(&self) -> impl Iterator<Item = (DimensionId, &Dimension)> {
        self.dimensions
            .iter()
            .enumerate()
            .map(|(i, d)| (DimensionId(i), d))
    }

    pub fn dimension(&self, id: DimensionId) -> &Dimension {
        &self.dimensions[id.0]
    }

    pub fn dimension_mut(&mut self, id: DimensionId) -> &mut Dimension {
        &mut self.dimensions[id.0]
    }

    pub fn find_dimension(&self, number: &str) -> Option<DimensionId> {
        self.dimensions
            .iter()
            .position(|d| d.number == number)
            .map(DimensionId)
    }

    pub fn add_dimension(
        &mut self,
        number: impl Into<String>,
        name: impl Into<String>,
        parent: Option<DimensionId>,
    ) -> DimensionId {
        self.dimensions.push(Dimension {
            number: number.into(),
            name: name.into(),
            parent,
        });
        DimensionId(self.dimensions.len() - 1)
    }

    pub fn objects(&self) -> impl Iterator<Item = (AccountingObjectId, &AccountingObject)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(i, o)| (AccountingObjectId(i), o))
    }

    pub fn object(&self, id: AccountingObjectId) -> &AccountingObject {
        &self.objects[id.0]
    }

    pub fn object_mut(&mut self, id: AccountingObjectId) -> &mut AccountingObject {
        &mut self.objects[id.0]
    }

    pub fn find_object(&self, dimension: DimensionId, number: &str) -> Option<AccountingObjectId> {
        self.objects
            .iter()
            .position(|o| o.dimension == dimension && o.number == number)
            .map(AccountingObjectId)
    }

    pub fn add_object(
        &mut self,
        dimension: DimensionId,
        number: impl Into<String>,
        name: impl Into<String>,
    ) -> AccountingObjectId {
        self.objects.push(AccountingObject {
            dimension,
            number: number.into(),
            name: name.into(),
        });
        AccountingObjectId(self.objects.len() - 1)
    }

    pub fn object_balances(&self) -> &[ObjectBalanceBudget] {
        &self.object_balances
    }

    /// Finds or creates the object figures for `(object, target, period)`.
    pub fn object_balance_mut(
        &mut self,
        object: AccountingObjectId,
        target: BalanceTarget,
        period: &str,
    ) -> &mut Balance {
        let found = self
            .object_balances
            .iter()
            .position(|b| b.object == object && b.target == target && b.period == period);
        let index = match found {
            Some(index) => index,
            None => {
                self.object_balances.push(ObjectBalanceBudget {
                    object,
                    target,
                    period: period.to_string(),
                    figures: Balance::default(),
                });
                self.object_balances.len() - 1
            }
        };
        &mut self.object_balances[index].figures
    }

    pub fn balance_budgets(&self) -> &[BalanceBudget] {
        &self.balance_budgets
    }

    /// Finds or creates the period figures for `(target, period)`.
    pub fn balance_budget_mut(&mut self, target: BalanceTarget, period: &str) -> &mut Balance {
        let found = self
            .balance_budgets
            .iter()
            .position(|b| b.target == target && b.period == period);
        let index = match found {
            Some(index) => index,
            None => {
                self.balance_budgets.push(BalanceBudget {
                    target,
                    period: period.to_string(),
                    figures: Balance::default(),
                });
                self.balance_budgets.len() - 1
            }
        };
        &mut self.balance_budgets[index].figures
    }

    pub fn series(&self, id: SeriesId) -> &VerificationSeries {
        &self.series[id.0]
    }

    pub fn series_mut(&mut self, id: SeriesId) -> &mut VerificationSeries {
        &mut self.series[id.0]
    }

    pub fn all_series(&self) -> impl Iterator<Item = (SeriesId, &VerificationSeries)> {
        self.series.iter().enumerate().map(|(i, s)| (SeriesId(i), s))
    }

    pub fn find_series(&self, name: &str) -> Option<SeriesId> {
        self.series.iter().position(|s| s.name == name).map(SeriesId)
    }

    pub fn add_series(&mut self, name: impl Into<String>) -> SeriesId {
        self.series.push(VerificationSeries {
            name: name.into(),
            description: None,
        });
        SeriesId(self.series.len() - 1)
    }

    pub fn verifications(&self) -> impl Iterator<Item = (VerificationId, &Verification)> {
        self.verifications
            .iter()
            .enumerate()
            .map(|(i, v)| (VerificationId(i), v))
    }

    pub fn verification(&self, id: VerificationId) -> &Verification {
        &self.verifications[id.0]
    }

    pub fn add_verification(&mut self, verification: Verification) -> VerificationId {
        self.verifications.push(verification);
        VerificationId(self.verifications.len() - 1)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn transactions_of(
        &self,
        verification: VerificationId,
    ) -> impl Iterator<Item = &Transaction> {
        self.transactions
            .iter()
            .filter(move |t| t.verification == verification)
    }

    pub fn add_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    /// Checks that every index in the graph points at an existing entity. Graphs built by the
    /// importer always pass; this is for graphs read back from JSON.
    pub fn validate(&self) -> crate::Result<()> {
        let accounts = self.accounts.len();
        let dimensions = self.dimensions.len();
        let objects = self.objects.len();
        let balances = self.account_balances.len();
        let target_ok = |t: &BalanceTarget| match t {
            BalanceTarget::Account(id) => id.0 < accounts,
            BalanceTarget::Year(id) => id.0 < balances,
        };

        for b in &self.account_balances {
            ensure!(b.account.0 < accounts, "Account balance refers to a missing account");
        }
        for d in &self.dimensions {
            if let Some(parent) = d.parent {
                ensure!(parent.0 < dimensions, "Dimension {} has a missing parent", d.number);
            }
        }
        for o in &self.objects {
            ensure!(o.dimension.0 < dimensions, "Object {} has a missing dimension", o.number);
        }
        for b in &self.object_balances {
            ensure!(b.object.0 < objects, "Object balance refers to a missing object");
            ensure!(target_ok(&b.target), "Object balance refers to a missing account");
        }
        for b in &self.balance_budgets {
            ensure!(target_ok(&b.target), "Period balance refers to a missing account");
        }
        for v in &self.verifications {
            ensure!(v.series.0 < self.series.len(), "Verification refers to a missing series");
        }
        for t in &self.transactions {
            ensure!(
                t.verification.0 < self.verifications.len(),
                "Transaction refers to a missing verification"
            );
            ensure!(t.account.0 < accounts, "Transaction refers to a missing account");
            ensure!(
                t.objects.iter().all(|o| o.0 < objects),
                "Transaction refers to a missing object"
            );
        }
        Ok(())
    }
}
