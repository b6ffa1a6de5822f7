//! Attribute association reconciliation.
//!
//! Each pass replaces a provider's association set with what the source
//! declares. Declarations naming an attribute with no definition are dropped
//! and reported; the attribute feed is allowed to lag.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use fedsync_model::{AssociationOwner, AttributeAssociation};
use fedsync_storage::StoreTransaction;
use tracing::debug;
use uuid::Uuid;

use crate::error::SyncResult;

/// An attribute a source declares for a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredAttribute {
    /// Attribute name.
    pub name: String,
    /// Whether the provider requires it.
    pub required: bool,
}

impl DeclaredAttribute {
    /// Creates a declaration.
    #[must_use]
    pub fn new(name: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            required,
        }
    }

    /// Merges repeated declarations by name, in first-seen order; a name is
    /// required if any of its declarations is.
    #[must_use]
    pub fn merge(declared: impl IntoIterator<Item = Self>) -> Vec<Self> {
        let mut merged: Vec<Self> = Vec::new();
        for declaration in declared {
            match merged.iter_mut().find(|d| d.name == declaration.name) {
                Some(existing) => existing.required |= declaration.required,
                None => merged.push(declaration),
            }
        }
        merged
    }
}

/// What reconciling one owner changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationChanges {
    /// Associations inserted.
    pub created: usize,
    /// Associations whose flags changed.
    pub updated: usize,
    /// Associations removed because they were not declared.
    pub deleted: usize,
    /// Declared names with no attribute definition.
    pub unknown: Vec<String>,
}

/// Reconciles `owner`'s associations against `declared`.
///
/// `update_fn` sets source-specific flags on each declared association, new
/// or existing. Associations not declared in this call are deleted.
///
/// ## Errors
///
/// Propagates storage failures.
pub async fn reconcile_associations<F>(
    tx: &mut dyn StoreTransaction,
    owner: AssociationOwner,
    declared: &[DeclaredAttribute],
    update_fn: F,
) -> SyncResult<AssociationChanges>
where
    F: Fn(&mut AttributeAssociation, &DeclaredAttribute) + Send + Sync,
{
    let mut changes = AssociationChanges::default();
    let mut existing: BTreeMap<Uuid, AttributeAssociation> = tx
        .list_associations(owner)
        .await?
        .into_iter()
        .map(|a| (a.saml_attribute_id, a))
        .collect();
    let mut kept = BTreeSet::new();

    for declaration in declared {
        let Some(attribute) = tx.find_attribute_by_name(&declaration.name).await? else {
            debug!(attribute = %declaration.name, "skipping undefined attribute");
            changes.unknown.push(declaration.name.clone());
            continue;
        };
        kept.insert(attribute.id);

        match existing.get(&attribute.id) {
            Some(current) => {
                let mut association = current.clone();
                update_fn(&mut association, declaration);
                if association != *current {
                    association.updated_at = Utc::now();
                    tx.update_association(&association).await?;
                    existing.insert(attribute.id, association);
                    changes.updated += 1;
                }
            }
            None => {
                let mut association = AttributeAssociation::new(owner, attribute.id);
                update_fn(&mut association, declaration);
                tx.insert_association(&association).await?;
                existing.insert(attribute.id, association);
                changes.created += 1;
            }
        }
    }

    for (attribute_id, association) in &existing {
        if !kept.contains(attribute_id) {
            tx.delete_association(association).await?;
            changes.deleted += 1;
        }
    }

    Ok(changes)
}

/// Flag update for service provider associations.
pub fn apply_requirement(association: &mut AttributeAssociation, declared: &DeclaredAttribute) {
    association.optional = !declared.required;
}

/// Identity provider associations carry no flags.
pub fn no_flags(_: &mut AttributeAssociation, _: &DeclaredAttribute) {}
