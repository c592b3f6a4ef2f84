use crate::domain::money::Amount;
use crate::domain::split::SplitResult;
use crate::error::Result;
use std::io::Write;

/// Writes computed splits as `amount,institute,ambassador,platform` in reais.
pub struct SplitWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> SplitWriter<W> {
    pub fn new(sink: W) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(sink);
        writer.write_record(["amount", "institute", "ambassador", "platform"])?;
        Ok(Self { writer })
    }

    pub fn write_split(&mut self, amount: Amount, split: &SplitResult) -> Result<()> {
        self.writer.write_record([
            reais(amount),
            reais(split.institute_share),
            reais(split.ambassador_share),
            reais(split.platform_share),
        ])?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn reais(amount: Amount) -> String {
    format!("{:.2}", amount.to_reais())
}
