use crate::domain::payment_method::{ChannelType, PaymentMethod};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct MethodRow<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    channel_type: ChannelType,
    min_amount: Decimal,
    max_amount: Decimal,
    fixed_fee: Decimal,
    percentage_fee: Decimal,
    processing_time: &'a str,
}

/// Writes a payment method catalog as CSV.
pub struct MethodWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> MethodWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_methods<'a>(
        &mut self,
        methods: impl IntoIterator<Item = &'a PaymentMethod>,
    ) -> Result<()> {
        for method in methods {
            self.writer.serialize(MethodRow {
                id: &method.id,
                name: &method.display_name,
                channel_type: method.channel_type,
                min_amount: method.min_amount,
                max_amount: method.max_amount,
                fixed_fee: method.fees.fixed,
                percentage_fee: method.fees.percentage,
                processing_time: &method.processing_time_hint,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
