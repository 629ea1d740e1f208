//! Test catalog.
//!
//! Retiring a test means clearing `is_active`, after which the pricing resolver refuses it.
//! Deleting a test removes the record outright. Bookings keep their own copy of each line's name
//! and price, so existing bookings are unaffected either way.

use crate::actor::Actor;
use crate::error::{LabError, LabResult};
use crate::models::catalog::{LabTest, LabTestFilter, LabTestPatch, NewLabTest};
use crate::repositories::non_blank;
use crate::store::LabStore;
use crate::versioned_files::{CommitAction, CommitDomain, CommitMessage};
use chrono::{DateTime, Utc};
use pathlab_types::NonEmptyText;
use pathlab_uuid::RecordId;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct CatalogService {
    store: Arc<LabStore>,
}

/// Result of a bulk seed.
#[derive(Clone, Debug, Default)]
pub struct SeedOutcome {
    pub created: Vec<LabTest>,
    /// Names already present in the catalog (case-insensitive).
    pub skipped: Vec<String>,
}

impl CatalogService {
    pub fn new(store: Arc<LabStore>) -> Self {
        Self { store }
    }

    /// Matching tests, newest first.
    pub fn list(&self, filter: &LabTestFilter) -> LabResult<Vec<LabTest>> {
        let mut tests: Vec<LabTest> = self
            .store
            .list::<LabTest>()?
            .into_iter()
            .filter(|t| filter.matches(t))
            .collect();
        tests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tests)
    }

    pub fn get(&self, id: &RecordId) -> LabResult<LabTest> {
        self.store.require(id)
    }

    pub fn create(&self, actor: &Actor, input: NewLabTest) -> LabResult<LabTest> {
        let test = build_test(input, Utc::now())?;

        self.store.transact(actor, |tx| {
            tx.put(&test)?;
            tx.commit_as(
                CommitMessage::new(CommitDomain::Catalog, CommitAction::Create, "Add catalog test")?
                    .with_trailer("Test-Id", test.id.to_string())?,
            );
            Ok(())
        })?;

        tracing::info!(test_id = %test.id, "catalog test created");
        Ok(test)
    }

    pub fn update(&self, actor: &Actor, id: &RecordId, patch: LabTestPatch) -> LabResult<LabTest> {
        let updated = self.store.transact(actor, |tx| {
            let mut test: LabTest = tx.require(id)?;

            if let Some(name) = patch.name {
                test.name = NonEmptyText::new(name)?;
            }
            if let Some(category) = patch.category {
                test.category = NonEmptyText::new(category)?;
            }
            if let Some(price) = patch.price {
                test.price = checked_price(price)?;
            }
            if patch.sample_type.is_some() {
                test.sample_type = non_blank(patch.sample_type);
            }
            if patch.preparation.is_some() {
                test.preparation = non_blank(patch.preparation);
            }
            if patch.description.is_some() {
                test.description = non_blank(patch.description);
            }
            if let Some(active) = patch.is_active {
                test.is_active = active;
            }
            test.updated_at = Utc::now();

            tx.put(&test)?;
            tx.commit_as(
                CommitMessage::new(
                    CommitDomain::Catalog,
                    CommitAction::Update,
                    "Update catalog test",
                )?
                .with_trailer("Test-Id", test.id.to_string())?,
            );
            Ok(test)
        })?;

        tracing::info!(test_id = %updated.id, active = updated.is_active, "catalog test updated");
        Ok(updated)
    }

    pub fn delete(&self, actor: &Actor, id: &RecordId) -> LabResult<()> {
        self.store.transact(actor, |tx| {
            tx.remove::<LabTest>(id)?;
            tx.commit_as(
                CommitMessage::new(
                    CommitDomain::Catalog,
                    CommitAction::Delete,
                    "Delete catalog test",
                )?
                .with_trailer("Test-Id", id.to_string())?,
            );
            Ok(())
        })?;

        tracing::info!(test_id = %id, "catalog test deleted");
        Ok(())
    }

    /// Add every test whose name is not already in the catalog, in one commit.
    pub fn seed(&self, actor: &Actor, inputs: Vec<NewLabTest>) -> LabResult<SeedOutcome> {
        let now = Utc::now();
        let candidates = inputs
            .into_iter()
            .map(|input| build_test(input, now))
            .collect::<LabResult<Vec<_>>>()?;

        let outcome = self.store.transact(actor, |tx| {
            let mut known: HashSet<String> = tx
                .list::<LabTest>()?
                .into_iter()
                .map(|t| t.name.as_str().to_lowercase())
                .collect();

            let mut outcome = SeedOutcome::default();
            for test in candidates {
                if known.insert(test.name.as_str().to_lowercase()) {
                    tx.put(&test)?;
                    outcome.created.push(test);
                } else {
                    outcome.skipped.push(test.name.into_inner());
                }
            }
            if !outcome.created.is_empty() {
                tx.commit_as(
                    CommitMessage::new(
                        CommitDomain::Catalog,
                        CommitAction::Create,
                        format!("Seed {} catalog tests", outcome.created.len()),
                    )?,
                );
            }
            Ok(outcome)
        })?;

        tracing::info!(
            created = outcome.created.len(),
            skipped = outcome.skipped.len(),
            "catalog seeded"
        );
        Ok(outcome)
    }
}

fn checked_price(price: Decimal) -> LabResult<Decimal> {
    if price < Decimal::ZERO {
        return Err(LabError::InvalidInput("price must not be negative".into()));
    }
    Ok(price)
}

fn build_test(input: NewLabTest, now: DateTime<Utc>) -> LabResult<LabTest> {
    Ok(LabTest {
        id: RecordId::new(),
        name: NonEmptyText::new(&input.name)
            .map_err(|_| LabError::InvalidInput("test name is required".into()))?,
        category: NonEmptyText::new(&input.category)
            .map_err(|_| LabError::InvalidInput("test category is required".into()))?,
        price: checked_price(input.price)?,
        sample_type: non_blank(input.sample_type),
        preparation: non_blank(input.preparation),
        description: non_blank(input.description),
        is_active: input.is_active.unwrap_or(true),
        created_at: now,
        updated_at: now,
    })
}
