use crate::domain::money::Amount;
use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of a donations CSV: `amount,ambassador_code`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationRow {
    pub amount: Amount,
    pub ambassador_code: Option<String>,
}

#[derive(Deserialize)]
struct RawRow {
    amount: Decimal,
    #[serde(default)]
    ambassador_code: Option<String>,
}

impl TryFrom<RawRow> for DonationRow {
    type Error = EngineError;

    fn try_from(raw: RawRow) -> Result<Self> {
        Ok(Self {
            amount: Amount::from_reais(raw.amount)?,
            ambassador_code: raw.ambassador_code.filter(|code| !code.is_empty()),
        })
    }
}

/// Reads donations from a CSV source.
///
/// Amounts are decimal reais. Whitespace is trimmed and the ambassador
/// column may be empty or missing.
pub struct DonationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> DonationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily yields one result per row, so a bad row does not stop the rest.
    pub fn donations(self) -> impl Iterator<Item = Result<DonationRow>> {
        self.reader
            .into_deserialize::<RawRow>()
            .map(|result| result.map_err(EngineError::from).and_then(DonationRow::try_from))
    }
}
