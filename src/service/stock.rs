//! Quantity reconciliation for general inventory.
//!
//! Balances are never stored; they are recomputed from the full transaction
//! history of an item on every read.

use crate::error::AppError;
use crate::model::inventory::TransactionKind;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StockLevel {
    pub issued: i64,
    pub returned: i64,
}

impl StockLevel {
    pub fn from_history<I>(history: I) -> Self
    where
        I: IntoIterator<Item = (TransactionKind, i64)>,
    {
        history
            .into_iter()
            .fold(Self::default(), |mut acc, (kind, qty)| {
                match kind {
                    TransactionKind::Issue => acc.issued += qty,
                    TransactionKind::Return => acc.returned += qty,
                }
                acc
            })
    }

    /// Builds the level from raw `(kind, quantity)` rows; unknown kinds are skipped.
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a (String, i64)>,
    {
        Self::from_history(rows.into_iter().filter_map(|(kind, qty)| {
            TransactionKind::from_str(kind).ok().map(|k| (k, *qty))
        }))
    }

    /// Quantity still out with employees.
    pub fn outstanding(&self) -> i64 {
        self.issued - self.returned
    }

    pub fn available(&self, quantity_on_hand: i64) -> i64 {
        quantity_on_hand - self.issued + self.returned
    }

    /// Rejects a movement that would make the books go negative.
    pub fn check(
        &self,
        quantity_on_hand: i64,
        kind: TransactionKind,
        quantity: i64,
    ) -> Result<(), AppError> {
        if quantity <= 0 {
            return Err(AppError::bad_request("quantity must be positive"));
        }
        match kind {
            TransactionKind::Issue if quantity > self.available(quantity_on_hand) => {
                Err(AppError::BadRequest(format!(
                    "Only {} available",
                    self.available(quantity_on_hand)
                )))
            }
            TransactionKind::Return if quantity > self.outstanding() => Err(AppError::BadRequest(
                format!("Only {} outstanding to return", self.outstanding()),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransactionKind::{Issue, Return};

    #[test]
    fn available_subtracts_issues_and_adds_returns() {
        let level = StockLevel::from_history([(Issue, 5), (Issue, 3), (Return, 2)]);
        assert_eq!(level.available(20), 14);
        assert_eq!(level.outstanding(), 6);
    }

    #[test]
    fn raw_rows_ignore_unknown_kinds() {
        let rows = vec![
            ("issue".to_string(), 4),
            ("return".to_string(), 1),
            ("adjust".to_string(), 100),
        ];
        let level = StockLevel::from_rows(&rows);
        assert_eq!(level, StockLevel { issued: 4, returned: 1 });
    }

    #[test]
    fn over_issue_is_rejected() {
        let level = StockLevel::from_history([(Issue, 8)]);
        assert!(level.check(10, Issue, 2).is_ok());
        assert!(level.check(10, Issue, 3).is_err());
    }

    #[test]
    fn over_return_is_rejected() {
        let level = StockLevel::from_history([(Issue, 4), (Return, 1)]);
        assert!(level.check(10, Return, 3).is_ok());
        assert!(level.check(10, Return, 4).is_err());
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        let level = StockLevel::default();
        assert!(level.check(10, Issue, 0).is_err());
        assert!(level.check(10, Return, -1).is_err());
    }
}
