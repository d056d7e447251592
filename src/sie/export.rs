//! SIE 4 export.
//!
//! Every record is produced by its own small function, so the output order is decided in one
//! place ([`export_lines`]) and each record shape mirrors what the importer reads.

use crate::charset::encode_pc8;
use crate::error::CodecResult;
use crate::model::accounting::{
    Account, AccountType, AccountingObject, Balance, BalanceTarget, Dimension, Transaction,
    TransactionKind, Verification,
};
use crate::model::Accounting;
use crate::sie::crc::{fold_lines, Crc32};
use crate::sie::records::RecordTable;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, warn};

const LAYOUTS: &[&str] = &["BAS95", "BAS96", "EUBAS97", "NE2007"];

/// Who wrote the file, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportContext {
    pub program: String,
    pub version: String,
    pub generated: NaiveDate,
    pub generated_by: String,
}

impl ExportContext {
    pub fn new(generated: NaiveDate, generated_by: impl Into<String>) -> Self {
        Self {
            program: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated,
            generated_by: generated_by.into(),
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('"', "\\\"")
}

fn quote(s: &str) -> String {
    format!("\"{}\"", escape(s))
}

fn quoted(s: Option<&str>) -> String {
    quote(s.unwrap_or(""))
}

fn ymd(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

fn with_quantity(mut line: String, quantity: Option<Decimal>) -> String {
    if let Some(q) = quantity.filter(|q| !q.is_zero()) {
        line.push(' ');
        line.push_str(&q.to_string());
    }
    line.push('\n');
    line
}

pub(crate) fn flag() -> String {
    "#FLAGGA 0\n".to_string()
}

pub(crate) fn program(ctx: &ExportContext) -> String {
    format!(
        "#PROGRAM {} {}\n",
        quote(&ctx.program),
        quote(&ctx.version)
    )
}

pub(crate) fn format() -> String {
    "#FORMAT PC8\n".to_string()
}

pub(crate) fn gen(ctx: &ExportContext) -> String {
    format!("#GEN {} {}\n", ymd(ctx.generated), quote(&ctx.generated_by))
}

pub(crate) fn sie_type() -> String {
    "#SIETYP 4\n".to_string()
}

pub(crate) fn optional(tag: &str, value: Option<&str>) -> Option<String> {
    value.map(|v| format!("{tag} {}\n", quote(v)))
}

pub(crate) fn orgnum(acc: &Accounting) -> Option<String> {
    let orgnum = acc.orgnum.as_deref()?;
    let mut line = format!("#ORGNR {}", quote(orgnum));
    if acc.purchase_number.is_some() || acc.site.is_some() {
        line.push(' ');
        line.push_str(&quoted(acc.purchase_number.as_deref()));
    }
    if acc.site.is_some() {
        line.push(' ');
        line.push_str(&quoted(acc.site.as_deref()));
    }
    line.push('\n');
    Some(line)
}

pub(crate) fn address(acc: &Accounting) -> String {
    format!(
        "#ADRESS {} {} {} {}\n",
        quoted(acc.contact.as_deref()),
        quoted(acc.mail_address.as_deref()),
        quoted(acc.zip_city.as_deref()),
        quoted(acc.telephone.as_deref())
    )
}

pub(crate) fn orgname(acc: &Accounting) -> String {
    format!("#FNAMN {}\n", quoted(acc.orgname.as_deref()))
}

pub(crate) fn year(index: i64, start: NaiveDate, end: NaiveDate) -> String {
    format!("#RAR {index} {} {}\n", ymd(start), ymd(end))
}

/// The `#KPTYP` value: BAS95 when unset, EUBAS97 for any `BAS2xxx` chart.
pub(crate) fn layout(acc: &Accounting) -> String {
    let mut layout = acc.layout.as_deref().unwrap_or("BAS95");
    if layout.starts_with("BAS2") {
        layout = "EUBAS97";
    }
    if !LAYOUTS.contains(&layout) {
        warn!("Chart of accounts type {layout} is not one of BAS95, BAS96, EUBAS97, NE2007 or BAS2xxx");
    }
    format!("#KPTYP {}\n", quote(layout))
}

pub(crate) fn currency(acc: &Accounting) -> String {
    format!(
        "#VALUTA {}\n",
        quote(acc.currency.as_deref().unwrap_or("SEK"))
    )
}

pub(crate) fn account(account: &Account) -> Vec<String> {
    let n = &account.number;
    let mut lines = vec![format!("#KONTO {n} {}\n", quote(&account.name))];
    if let Some(t) = account.effective_type() {
        lines.push(format!("#KTYP {n} {t}\n"));
    }
    if let Some(unit) = &account.unit {
        lines.push(format!("#ENHET {n} {}\n", quote(unit)));
    }
    if let Some(sru) = &account.sru {
        lines.push(format!("#SRU {n} {sru}\n"));
    }
    if let Some(code) = &account.vat_code {
        lines.push(format!("#MOMSKOD {n} {}\n", quote(code)));
    }
    lines
}

pub(crate) fn dimension(dim: &Dimension, parent: Option<&Dimension>) -> String {
    match parent {
        None => format!("#DIM {} {}\n", dim.number, quote(&dim.name)),
        Some(parent) => format!(
            "#UNDERDIM {} {} {}\n",
            dim.number,
            quote(&dim.name),
            parent.number
        ),
    }
}

pub(crate) fn object(dim: &Dimension, obj: &AccountingObject) -> String {
    format!(
        "#OBJEKT {} {} {}\n",
        dim.number,
        quote(&obj.number),
        quote(&obj.name)
    )
}

/// `#IB`/`#UB` for balance sheet accounts, `#RES` for the others.
pub(crate) fn balance(
    number: &str,
    account_type: Option<AccountType>,
    year: i64,
    figures: &Balance,
) -> Vec<String> {
    let mut lines = Vec::new();
    let balance_sheet = account_type.map(AccountType::is_balance_sheet).unwrap_or(false);
    if balance_sheet {
        if let Some(opening) = figures.opening_balance {
            lines.push(with_quantity(
                format!("#IB {year} {number} {opening}"),
                figures.opening_quantity,
            ));
        }
        if let Some(closing) = figures.balance {
            lines.push(with_quantity(
                format!("#UB {year} {number} {closing}"),
                figures.balance_quantity,
            ));
        }
    } else if let Some(turnover) = figures.balance {
        lines.push(with_quantity(
            format!("#RES {year} {number} {turnover}"),
            figures.balance_quantity,
        ));
    }
    lines
}

fn object_list(acc: &Accounting, objects: &[&AccountingObject]) -> String {
    let items: Vec<String> = objects
        .iter()
        .map(|o| {
            format!(
                "{} {}",
                acc.dimension(o.dimension).number,
                quote(&o.number)
            )
        })
        .collect();
    format!("{{{}}}", items.join(" "))
}

/// Object figures: yearly ones as `#OIB`/`#OUB`, period ones as `#PBUDGET`/`#PSALDO`.
pub(crate) fn object_balance(
    year: i64,
    number: &str,
    objects: &str,
    period: &str,
    figures: &Balance,
) -> Vec<String> {
    let mut lines = Vec::new();
    if period.is_empty() {
        if let Some(opening) = figures.opening_balance {
            lines.push(with_quantity(
                format!("#OIB {year} {number} {objects} {opening}"),
                figures.opening_quantity,
            ));
        }
        if let Some(closing) = figures.balance {
            lines.push(with_quantity(
                format!("#OUB {year} {number} {objects} {closing}"),
                figures.balance_quantity,
            ));
        }
    } else {
        if let Some(budget) = figures.budget {
            lines.push(with_quantity(
                format!("#PBUDGET {year} {period} {number} {objects} {budget}"),
                figures.budget_quantity,
            ));
        }
        if let Some(actual) = figures.balance {
            lines.push(with_quantity(
                format!("#PSALDO {year} {period} {number} {objects} {actual}"),
                figures.balance_quantity,
            ));
        }
    }
    lines
}

pub(crate) fn verification(acc: &Accounting, ver: &Verification) -> String {
    format!(
        "#VER {} {} {} {} {} {}\n",
        quote(&acc.series(ver.series).name),
        ver.number.map(|n| n.to_string()).unwrap_or_else(|| "\"\"".to_string()),
        ymd(ver.date),
        quoted(ver.text.as_deref()),
        quoted(ver.registration_date.map(ymd).as_deref()),
        quoted(ver.signature.as_deref())
    )
}

pub(crate) fn transaction(acc: &Accounting, trans: &Transaction) -> Vec<String> {
    let objects: Vec<&AccountingObject> = trans.objects.iter().map(|&o| acc.object(o)).collect();
    let render = |tag: &str| {
        format!(
            "{tag} {} {} {} {} {} {} {}\n",
            acc.account(trans.account).number,
            object_list(acc, &objects),
            trans.amount,
            quoted(trans.date.map(ymd).as_deref()),
            quoted(trans.text.as_deref()),
            trans.quantity.unwrap_or(Decimal::ZERO),
            quoted(trans.signature.as_deref())
        )
    };
    match trans.kind {
        TransactionKind::Normal => vec![render("#TRANS")],
        TransactionKind::Added => vec![render("#RTRANS"), render("#TRANS")],
        TransactionKind::Deleted => vec![render("#BTRANS")],
    }
}

/// All records of an accounting, in file order, without a checksum.
pub fn export_lines(acc: &Accounting, ctx: &ExportContext) -> Vec<String> {
    let mut lines = vec![flag(), program(ctx), format(), gen(ctx), sie_type()];
    lines.extend(optional("#FTYP", acc.orgtype.as_deref()));
    lines.extend(optional("#FNR", acc.org_id.as_deref()));
    lines.extend(orgnum(acc));
    lines.extend(optional("#BKOD", acc.industry_code.as_deref()));
    lines.push(address(acc));
    lines.push(orgname(acc));

    let current = acc
        .years
        .get(&0)
        .map(|y| (y.start, y.end))
        .or_else(|| acc.start.zip(acc.end));
    if let Some((start, end)) = current {
        lines.push(year(0, start, end));
    }
    for (&index, y) in acc.years.iter().rev().filter(|(i, _)| **i != 0) {
        lines.push(year(index, y.start, y.end));
    }
    lines.extend(optional("#TAXAR", acc.taxation_year.as_deref()));
    lines.push(layout(acc));
    lines.push(currency(acc));

    let mut accounts: Vec<_> = acc.accounts().collect();
    accounts.sort_by(|a, b| a.1.number.cmp(&b.1.number));
    for (_, a) in &accounts {
        lines.extend(account(a));
    }

    let mut dims: Vec<_> = acc.dimensions().collect();
    dims.sort_by(|a, b| a.1.number.cmp(&b.1.number));
    for (id, dim) in &dims {
        let parent = dim.parent.map(|p| acc.dimension(p));
        lines.push(dimension(dim, parent));
        for (_, obj) in acc.objects().filter(|(_, o)| o.dimension == *id) {
            lines.push(object(dim, obj));
        }
    }

    for (id, a) in &accounts {
        if let Some(figures) = &a.balance {
            lines.extend(balance(&a.number, a.effective_type(), 0, figures));
        }
        let mut years: Vec<_> = acc
            .account_balances()
            .filter(|(_, b)| b.account == *id)
            .map(|(_, b)| b)
            .collect();
        years.sort_by(|a, b| b.year.cmp(&a.year));
        for b in years {
            lines.extend(balance(&a.number, a.effective_type(), b.year, &b.figures));
        }
    }

    let target_of = |target: BalanceTarget| {
        (
            acc.target_year(target),
            acc.account(acc.target_account(target)).number.as_str(),
        )
    };
    for ob in acc.object_balances() {
        let (y, number) = target_of(ob.target);
        let objects = object_list(acc, &[acc.object(ob.object)]);
        lines.extend(object_balance(y, number, &objects, &ob.period, &ob.figures));
    }
    for bb in acc.balance_budgets() {
        let (y, number) = target_of(bb.target);
        lines.extend(object_balance(y, number, "{}", &bb.period, &bb.figures));
    }

    for (id, ver) in acc.verifications() {
        lines.push(verification(acc, ver));
        lines.push("{\n".to_string());
        for trans in acc.transactions_of(id) {
            lines.extend(transaction(acc, trans));
        }
        lines.push("}\n".to_string());
    }
    lines
}

/// Encodes an accounting as PC8 bytes, optionally protected by `#KSUMMA`.
pub fn export(acc: &Accounting, ctx: &ExportContext, checksum: bool) -> CodecResult<Vec<u8>> {
    let lines = export_lines(acc, ctx)
        .iter()
        .map(|line| encode_pc8(line))
        .collect::<CodecResult<Vec<_>>>()?;

    let mut out = Vec::with_capacity(lines.iter().map(Vec::len).sum::<usize>() + 32);
    if !checksum {
        for line in &lines {
            out.extend_from_slice(line);
        }
        return Ok(out);
    }

    let Some((first, body)) = lines.split_first() else {
        return Ok(out);
    };
    let body: Vec<&[u8]> = body.iter().map(Vec::as_slice).collect();
    let mut crc = Crc32::new();
    fold_lines(&mut crc, &body, 3, &RecordTable::sie4())?;
    let sum = crc.finish();
    debug!("Export checksum {sum}");

    out.extend_from_slice(first);
    out.extend_from_slice(b"#KSUMMA\n");
    for line in &body {
        out.extend_from_slice(line);
    }
    out.extend_from_slice(format!("#KSUMMA {sum}\n").as_bytes());
    Ok(out)
}
