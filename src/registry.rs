//! The synchronous facet store. `FacetRegistry` only ever holds facets that
//! have already completed `init`; [`crate::subsystem::Subsystem`] is
//! responsible for calling `init`/contract enforcement before [`FacetRegistry::install`]
//! and for driving `dispose` over everything it holds.
//!
//! Multiple facets can register under the same kind (ordered by
//! [`crate::facet::Facet::order_index`], unassigned indices sorting last);
//! at most one of them may additionally occupy the kind's "attach slot",
//! tracked internally per [`KindSlot`] and governed by each facet's
//! `should_attach`/`should_overwrite` flags in [`FacetRegistry::install`].

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::facet::{Facet, OperationValue};

struct KindSlot {
    facets: Vec<Facet>,
    attach_holder: Option<usize>,
}

impl KindSlot {
    fn empty() -> Self {
        KindSlot { facets: Vec::new(), attach_holder: None }
    }
}

#[derive(Default)]
pub struct FacetRegistry {
    kinds: HashMap<String, KindSlot>,
    kind_order: Vec<String>,
}

impl FacetRegistry {
    pub fn new() -> Self {
        FacetRegistry::default()
    }

    /// Install an already-initialized facet under `kind`. A facet with
    /// `overwrite == false` registering against an occupied, non-overwritable
    /// slot is a [`Error::DuplicateFacet`]; one that wants to `attach` but
    /// finds the attach slot held by a non-overwritable facet is an
    /// [`Error::AttachConflict`].
    ///
    /// DESIGN DECISION: return the facets an overwrite displaces instead of
    /// dropping them here.
    /// WHY: disposing a facet means running its `dispose_callback`, which is
    /// async; `FacetRegistry` is a plain synchronous store with no executor
    /// access of its own.
    ///
    /// REASONING CHAIN:
    /// 1. An overwrite install can legitimately knock out facets that still
    ///    hold open resources (the register phase's contract is "dispose
    ///    existing facets of this kind, best-effort, then append").
    /// 2. Silently dropping the displaced `Facet` values would run their
    ///    destructors without ever calling `dispose`, leaking whatever the
    ///    `init_callback` acquired.
    /// 3. Handing the displaced facets back lets [`crate::subsystem::Subsystem::build`]
    ///    (which already runs inside an async context) `dispose` them once
    ///    the registry lock is released.
    pub fn install(&mut self, kind: String, facet: Facet) -> Result<Vec<Facet>> {
        if !self.kinds.contains_key(&kind) {
            self.kind_order.push(kind.clone());
        }
        let slot = self.kinds.entry(kind.clone()).or_insert_with(KindSlot::empty);

        if let Some(existing_idx) = slot.attach_holder {
            let existing = &slot.facets[existing_idx];
            if facet.should_attach() && !existing.should_overwrite() && !facet.should_overwrite() {
                return Err(Error::AttachConflict(kind));
            }
        } else if !slot.facets.is_empty() {
            let conflicting = slot.facets.iter().any(|f| !f.should_overwrite());
            if conflicting && !facet.should_overwrite() {
                return Err(Error::DuplicateFacet(kind));
            }
        }

        let mut displaced = Vec::new();
        if facet.should_overwrite() {
            let mut kept = Vec::with_capacity(slot.facets.len());
            for existing in slot.facets.drain(..) {
                if existing.should_overwrite() {
                    kept.push(existing);
                } else {
                    displaced.push(existing);
                }
            }
            slot.facets = kept;
            slot.attach_holder = None;
        }

        let will_attach = facet.should_attach();
        slot.facets.push(facet);
        slot.facets.sort_by_key(|f| f.order_index().unwrap_or(u64::MAX));

        if will_attach {
            let new_idx = slot.facets.iter().position(|f| f.should_attach()).unwrap_or(slot.facets.len() - 1);
            slot.attach_holder = Some(new_idx);
        }

        Ok(displaced)
    }

    /// Resolve `operation` against `kind`'s facets. `facets` is kept sorted
    /// ascending by `order_index` (absent treated as the sentinel maximum),
    /// so the greatest-`order_index` facet is the last one exposing the
    /// operation.
    pub fn find_operation(&self, kind: &str, operation: &str) -> Option<OperationValue> {
        let slot = self.kinds.get(kind)?;
        slot.facets.iter().rev().find_map(|f| f.get_operation(operation).cloned())
    }

    /// The facet with the greatest `order_index` for `kind`, regardless of
    /// which operations it exposes.
    pub fn find_facet(&self, kind: &str) -> Option<&Facet> {
        self.kinds.get(kind)?.facets.last()
    }

    /// By list position (registration order within the kind), not `order_index`.
    pub fn get_by_index(&self, kind: &str, index: usize) -> Option<&Facet> {
        self.kinds.get(kind)?.facets.get(index)
    }

    pub fn facets_for_kind(&self, kind: &str) -> impl Iterator<Item = &Facet> {
        self.kinds.get(kind).into_iter().flat_map(|slot| slot.facets.iter())
    }

    pub fn installed_kinds(&self) -> Vec<String> {
        self.kind_order.clone()
    }

    pub fn kind_count(&self, kind: &str) -> usize {
        self.kinds.get(kind).map(|slot| slot.facets.len()).unwrap_or(0)
    }

    /// True once a kind has more than one facet registered against it.
    pub fn has_multiple(&self, kind: &str) -> bool {
        self.kind_count(kind) > 1
    }

    /// Dispose every facet registered under `kind` and drop the slot
    /// entirely, including the attach holder. A no-op if the kind was never
    /// installed.
    pub async fn remove(&mut self, kind: &str) {
        if let Some(slot) = self.kinds.remove(kind) {
            for facet in slot.facets.iter().rev() {
                facet.dispose().await;
            }
        }
        self.kind_order.retain(|k| k != kind);
    }

    /// Dispose every facet across every kind. Errors from individual
    /// dispose callbacks are already swallowed and logged by
    /// [`crate::facet::Facet::dispose`]; this just drives that for all of
    /// them and then clears the registry.
    ///
    /// Ordering mirrors the runtime's documented guarantee: kinds are
    /// disposed in reverse registration order, and within a kind, facets
    /// are disposed in reverse `order_index`.
    pub async fn dispose_all(&mut self) {
        for kind in self.kind_order.iter().rev() {
            if let Some(slot) = self.kinds.get(kind) {
                for facet in slot.facets.iter().rev() {
                    facet.dispose().await;
                }
            }
        }
        self.kinds.clear();
        self.kind_order.clear();
    }
}
