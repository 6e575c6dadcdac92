use chrono::{DateTime, FixedOffset};
use derive_more::Display;
use lumendb_primitives::{Currency, DateTimeRange};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// PriceKey
///

#[derive(
    Clone, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[display("{price_id}/{price_list}/{currency}")]
pub struct PriceKey {
    pub price_id: i32,
    pub price_list: String,
    pub currency: Currency,
}

impl PriceKey {
    #[must_use]
    pub fn new(
        price_id: i32,
        price_list: impl Into<String>,
        currency: impl Into<Currency>,
    ) -> Self {
        Self {
            price_id,
            price_list: price_list.into(),
            currency: currency.into(),
        }
    }
}

///
/// Price
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Price {
    pub key: PriceKey,

    /// Groups prices of one variant for the inner record handling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_record_id: Option<i32>,

    pub price_without_tax: Decimal,
    pub tax_rate: Decimal,
    pub price_with_tax: Decimal,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity: Option<DateTimeRange>,

    /// Only indexed prices take part in the price-for-sale computation.
    pub indexed: bool,
}

impl Price {
    #[must_use]
    pub const fn new(
        key: PriceKey,
        price_without_tax: Decimal,
        tax_rate: Decimal,
        price_with_tax: Decimal,
    ) -> Self {
        Self {
            key,
            inner_record_id: None,
            price_without_tax,
            tax_rate,
            price_with_tax,
            validity: None,
            indexed: true,
        }
    }

    #[must_use]
    pub const fn with_inner_record_id(mut self, inner_record_id: i32) -> Self {
        self.inner_record_id = Some(inner_record_id);
        self
    }

    #[must_use]
    pub const fn with_validity(mut self, validity: DateTimeRange) -> Self {
        self.validity = Some(validity);
        self
    }

    #[must_use]
    pub const fn non_indexed(mut self) -> Self {
        self.indexed = false;
        self
    }

    #[must_use]
    pub fn price_list(&self) -> &str {
        &self.key.price_list
    }

    #[must_use]
    pub fn is_valid_at(&self, moment: DateTime<FixedOffset>) -> bool {
        self.validity.is_none_or(|validity| validity.contains(moment))
    }
}

///
/// PriceInnerRecordHandling
///
/// How prices of inner records (variants) combine into the price for sale.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum PriceInnerRecordHandling {
    LowestPrice,
    #[default]
    None,
    Sum,
}

///
/// PriceContext
///
/// Price lists in priority order (first wins), currency and an optional
/// moment the selling price must be valid at.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PriceContext {
    pub price_lists: Vec<String>,
    pub currency: Currency,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_at: Option<DateTime<FixedOffset>>,
}

impl PriceContext {
    pub fn new<I, S>(currency: impl Into<Currency>, price_lists: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            price_lists: price_lists.into_iter().map(Into::into).collect(),
            currency: currency.into(),
            valid_at: None,
        }
    }

    #[must_use]
    pub const fn valid_at(mut self, moment: DateTime<FixedOffset>) -> Self {
        self.valid_at = Some(moment);
        self
    }

    fn priority(&self, price_list: &str) -> Option<usize> {
        self.price_lists.iter().position(|list| list == price_list)
    }

    /// Whether the price is a candidate for sale in this context.
    #[must_use]
    pub fn admits(&self, price: &Price) -> bool {
        price.indexed
            && price.key.currency == self.currency
            && self.priority(price.price_list()).is_some()
            && self.valid_at.is_none_or(|moment| price.is_valid_at(moment))
    }
}

/// Compute the selling price of one entity. Prices are grouped by inner
/// record, each group sells its highest priority price, and the groups
/// combine according to `handling`.
pub fn price_for_sale<'a>(
    prices: impl IntoIterator<Item = &'a Price>,
    handling: PriceInnerRecordHandling,
    context: &PriceContext,
) -> Option<Price> {
    let mut groups: BTreeMap<Option<i32>, Vec<&Price>> = BTreeMap::new();
    for price in prices.into_iter().filter(|price| context.admits(price)) {
        let group = match handling {
            PriceInnerRecordHandling::None => None,
            _ => price.inner_record_id,
        };
        groups.entry(group).or_default().push(price);
    }

    let mut selling = groups
        .into_values()
        .filter_map(|group| {
            group.into_iter().min_by(|a, b| {
                context
                    .priority(a.price_list())
                    .cmp(&context.priority(b.price_list()))
                    .then(a.price_with_tax.cmp(&b.price_with_tax))
            })
        })
        .collect::<Vec<_>>();

    match handling {
        PriceInnerRecordHandling::None | PriceInnerRecordHandling::LowestPrice => selling
            .into_iter()
            .min_by(|a, b| a.price_with_tax.cmp(&b.price_with_tax))
            .cloned(),
        PriceInnerRecordHandling::Sum => {
            selling.sort_by_key(|price| context.priority(price.price_list()));
            let first = selling.first()?;

            let mut sum = Price::new(
                PriceKey::new(0, first.price_list(), first.key.currency.clone()),
                Decimal::ZERO,
                first.tax_rate,
                Decimal::ZERO,
            );
            for price in &selling {
                sum.price_without_tax += price.price_without_tax;
                sum.price_with_tax += price.price_with_tax;
            }

            Some(sum)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(id: i32, list: &str, with_tax: i64) -> Price {
        Price::new(
            PriceKey::new(id, list, "CZK"),
            Decimal::new(with_tax, 0),
            Decimal::new(21, 0),
            Decimal::new(with_tax, 0),
        )
    }

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).expect("valid date")
    }

    #[test]
    fn first_price_list_wins() {
        let prices = [price(1, "basic", 100), price(2, "vip", 120)];
        let context = PriceContext::new("CZK", ["vip", "basic"]);

        let selling = price_for_sale(&prices, PriceInnerRecordHandling::None, &context)
            .expect("price for sale");
        assert_eq!(selling.key.price_id, 2);
    }

    #[test]
    fn non_indexed_other_currency_and_expired_prices_are_skipped() {
        let expired = price(1, "vip", 10).with_validity(DateTimeRange::until(at(
            "2020-01-01T00:00:00+00:00",
        )));
        let mut euro = price(2, "vip", 20);
        euro.key.currency = Currency::new("EUR");
        let hidden = price(3, "vip", 30).non_indexed();
        let basic = price(4, "basic", 40);

        let prices = [expired, euro, hidden, basic];
        let context =
            PriceContext::new("CZK", ["vip", "basic"]).valid_at(at("2024-01-01T00:00:00+00:00"));

        let selling = price_for_sale(&prices, PriceInnerRecordHandling::None, &context)
            .expect("price for sale");
        assert_eq!(selling.key.price_id, 4);
    }

    #[test]
    fn lowest_price_picks_cheapest_inner_record() {
        let prices = [
            price(1, "basic", 300).with_inner_record_id(1),
            price(2, "basic", 200).with_inner_record_id(2),
            price(3, "vip", 250).with_inner_record_id(2),
        ];
        let context = PriceContext::new("CZK", ["vip", "basic"]);

        let selling = price_for_sale(&prices, PriceInnerRecordHandling::LowestPrice, &context)
            .expect("price for sale");
        assert_eq!(selling.key.price_id, 3);
    }

    #[test]
    fn sum_adds_up_inner_records() {
        let prices = [
            price(1, "basic", 300).with_inner_record_id(1),
            price(2, "basic", 200).with_inner_record_id(2),
        ];
        let context = PriceContext::new("CZK", ["basic"]);

        let selling = price_for_sale(&prices, PriceInnerRecordHandling::Sum, &context)
            .expect("price for sale");
        assert_eq!(selling.price_with_tax, Decimal::new(500, 0));
    }

    #[test]
    fn no_candidate_means_no_price() {
        let prices = [price(1, "basic", 300)];
        let context = PriceContext::new("EUR", ["basic"]);

        assert!(price_for_sale(&prices, PriceInnerRecordHandling::None, &context).is_none());
    }
}
