//! Test pricing.
//!
//! Turns requested `(test, quantity)` lines into priced line items and a total. The resolver
//! only reads; it is given a lookup function so it can run against the live store inside a
//! transaction or against a fixed catalog snapshot in tests. Any missing or inactive test aborts
//! the whole order.

use crate::error::{LabError, LabResult, LineItemProblem};
use crate::models::booking::{items_total, LineItem};
use crate::models::catalog::LabTest;
use pathlab_types::Quantity;
use pathlab_uuid::RecordId;
use rust_decimal::Decimal;

/// A requested test and how many of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TestLine {
    pub test: RecordId,
    pub quantity: Quantity,
}

impl TestLine {
    pub fn new(test: RecordId, quantity: Quantity) -> Self {
        Self { test, quantity }
    }

    pub fn single(test: RecordId) -> Self {
        Self::new(test, Quantity::ONE)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricedOrder {
    pub items: Vec<LineItem>,
    pub total: Decimal,
}

/// Price `lines` in order, looking each test up with `find_test`.
///
/// # Errors
///
/// - `InvalidInput` when `lines` is empty or the total overflows.
/// - `InvalidLineItem` naming the first test that is missing or inactive.
/// - Whatever `find_test` returns for storage failures.
pub fn price_lines<F>(lines: &[TestLine], mut find_test: F) -> LabResult<PricedOrder>
where
    F: FnMut(&RecordId) -> LabResult<Option<LabTest>>,
{
    if lines.is_empty() {
        return Err(LabError::InvalidInput(
            "at least one test is required".into(),
        ));
    }

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let test = match find_test(&line.test)? {
            Some(test) if test.is_active => test,
            Some(_) => {
                return Err(LabError::InvalidLineItem {
                    test_id: line.test,
                    problem: LineItemProblem::Inactive,
                })
            }
            None => {
                return Err(LabError::InvalidLineItem {
                    test_id: line.test,
                    problem: LineItemProblem::Missing,
                })
            }
        };

        items.push(LineItem {
            test: test.id,
            name: test.name.into_inner(),
            unit_price: test.price,
            quantity: line.quantity,
        });
    }

    let total = items_total(&items)
        .ok_or_else(|| LabError::InvalidInput("total price is out of range".into()))?;

    Ok(PricedOrder { items, total })
}
