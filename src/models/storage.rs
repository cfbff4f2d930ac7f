//! A holder's storage is their bank box: a capacity-limited container of
//! currency items. Balances are computed from whatever live items it holds.
//!
//! Storage also knows how to place stacked currency (in chunks no bigger than
//! the maximum denomination) and how to cash an instrument back into coin
//! without losing value when the box is crowded.

use chrono::{DateTime, Utc};
use crate::{
    error::{Error, Result},
    models::currency::{Currency, CurrencyItem, CurrencyItemID, CurrencyKind},
};
use getset::{CopyGetters, Getters};
use serde::{Serialize, Deserialize};
use std::cmp;

/// What came out of cashing an instrument.
#[derive(Clone, Debug, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct Cashed {
    /// The instrument that was cashed (now deleted)
    instrument: CurrencyItem,
    /// Stacks of coin created in its place
    stacks: Vec<CurrencyItem>,
    /// If the box couldn't hold all the coin, the rest comes back as a smaller
    /// instrument
    replacement: Option<CurrencyItem>,
}

/// Holds a list of currency items, up to `capacity` live ones.
#[derive(Clone, Debug, PartialEq, Getters, CopyGetters, Serialize, Deserialize)]
pub struct Storage {
    /// How many live items this storage can hold
    #[getset(get_copy = "pub")]
    capacity: usize,
    /// The items, in placement order. May contain deleted items until they
    /// are purged.
    #[getset(get = "pub")]
    items: Vec<CurrencyItem>,
}

impl Storage {
    /// Create an empty storage.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::new(),
        }
    }

    /// Create a storage that already holds some items.
    pub fn with_items(capacity: usize, items: Vec<CurrencyItem>) -> Self {
        Self {
            capacity,
            items,
        }
    }

    /// Iterate over the items that haven't been deleted.
    pub fn live_items(&self) -> impl Iterator<Item = &CurrencyItem> {
        self.items.iter().filter(|item| !item.is_deleted())
    }

    /// Total value across all live items.
    pub fn balance(&self) -> u64 {
        self.live_items().map(|item| item.value()).sum()
    }

    /// Total value split by kind, returned as `(stacked, instrument)`.
    pub fn balance_by_kind(&self) -> (u64, u64) {
        self.live_items()
            .fold((0, 0), |(stacked, instrument), item| {
                match item.currency() {
                    Currency::Stacked(qty) => (stacked + qty, instrument),
                    Currency::Instrument(worth) => (stacked, instrument + worth),
                }
            })
    }

    /// The live items split by kind, returned as `(stacked, instrument)`. Each
    /// list keeps storage order.
    pub fn items_by_kind(&self) -> (Vec<&CurrencyItem>, Vec<&CurrencyItem>) {
        self.live_items().partition(|item| item.kind() == CurrencyKind::Stacked)
    }

    /// Find a live item by ID.
    pub fn item(&self, id: &CurrencyItemID) -> Option<&CurrencyItem> {
        self.live_items().find(|item| item.id() == id)
    }

    pub(crate) fn item_mut(&mut self, id: &CurrencyItemID) -> Option<&mut CurrencyItem> {
        self.items.iter_mut().find(|item| item.id() == id && !item.is_deleted())
    }

    /// How many slots are taken by live items.
    pub fn slots_used(&self) -> usize {
        self.live_items().count()
    }

    /// How many more items fit.
    pub fn free_slots(&self) -> usize {
        self.capacity.saturating_sub(self.slots_used())
    }

    /// Add an item to storage, as long as there's room and no live item
    /// already has its ID.
    pub(crate) fn insert(&mut self, item: CurrencyItem) -> Result<()> {
        if self.item(item.id()).is_some() {
            Err(Error::DuplicateItem(item.id().to_string()))?;
        }
        if self.free_slots() == 0 {
            Err(Error::StorageFull)?;
        }
        self.items.push(item);
        Ok(())
    }

    /// Drop deleted items, returning them.
    pub(crate) fn purge(&mut self) -> Vec<CurrencyItem> {
        let (deleted, live): (Vec<CurrencyItem>, Vec<CurrencyItem>) = self.items
            .drain(..)
            .partition(|item| item.is_deleted());
        self.items = live;
        deleted
    }

    /// Mark a live item deleted without touching its value. This is what it
    /// looks like when something outside the bank destroys an item.
    pub(crate) fn discard(&mut self, id: &CurrencyItemID, now: &DateTime<Utc>) -> Result<CurrencyItem> {
        let item = self.item_mut(id).ok_or(Error::ObjectNotFound("currency item".into()))?;
        item.set_deleted(Some(now.clone()));
        Ok(item.clone())
    }

    /// How many new stacks it takes to hold `amount`.
    fn stacks_needed(amount: u64, max_stack: u64) -> usize {
        let whole = amount / max_stack;
        let partial = if amount % max_stack > 0 { 1 } else { 0 };
        (whole + partial) as usize
    }

    /// Work out whether `amount` of coin fits, counting room left in the
    /// existing stacks and the free slots.
    pub fn can_place_stacked(&self, amount: u64, max_stack: u64) -> bool {
        let headroom: u64 = self.live_items()
            .filter(|item| item.kind() == CurrencyKind::Stacked)
            .map(|item| max_stack.saturating_sub(item.value()))
            .sum();
        let rest = amount.saturating_sub(headroom);
        Self::stacks_needed(rest, max_stack) <= self.free_slots()
    }

    /// Place coin into storage. Existing stacks are topped up to `max_stack`
    /// first, then new stacks are created with IDs derived from `id`.
    ///
    /// Returns `(updated, created)` items. Fails without touching anything if
    /// the full amount can't be placed.
    pub(crate) fn place_stacked(&mut self, id: &CurrencyItemID, amount: u64, max_stack: u64, now: &DateTime<Utc>) -> Result<(Vec<CurrencyItem>, Vec<CurrencyItem>)> {
        if !self.can_place_stacked(amount, max_stack) {
            Err(Error::StorageFull)?;
        }
        let mut remaining = amount;
        let mut updated = Vec::new();
        for item in self.items.iter_mut().filter(|item| !item.is_deleted()) {
            if remaining == 0 {
                break;
            }
            if let Currency::Stacked(qty) = *item.currency() {
                let add = cmp::min(max_stack.saturating_sub(qty), remaining);
                if add == 0 {
                    continue;
                }
                item.set_currency(Currency::Stacked(qty + add));
                item.set_updated(now.clone());
                remaining -= add;
                updated.push(item.clone());
            }
        }
        let mut created = Vec::new();
        while remaining > 0 {
            let chunk = cmp::min(remaining, max_stack);
            let stack = CurrencyItem::new(id.child("stack", created.len()), Currency::Stacked(chunk), now);
            self.insert(stack.clone())?;
            created.push(stack);
            remaining -= chunk;
        }
        Ok((updated, created))
    }

    /// Convert an instrument into coin of the same total value.
    ///
    /// The coin is split into new stacks of at most `max_stack`. If the box
    /// can't hold every stack, whatever doesn't fit is written onto a
    /// replacement instrument instead of being thrown away. Removing the
    /// instrument always frees a slot, so something always fits.
    pub(crate) fn cash(&mut self, id: &CurrencyItemID, max_stack: u64, now: &DateTime<Utc>) -> Result<Cashed> {
        let item = self.item_mut(id).ok_or(Error::ObjectNotFound("currency item".into()))?;
        let worth = match *item.currency() {
            Currency::Instrument(worth) => worth,
            Currency::Stacked(_) => Err(Error::NotAnInstrument)?,
        };
        item.set_deleted(Some(now.clone()));
        item.set_updated(now.clone());
        let instrument = item.clone();

        let slots = self.free_slots();
        let needed = Self::stacks_needed(worth, max_stack);
        // if it doesn't all fit, hold back one slot for the replacement
        let stack_count = if needed <= slots { needed } else { slots.saturating_sub(1) };

        let mut remaining = worth;
        let mut stacks = Vec::with_capacity(stack_count);
        for n in 0..stack_count {
            let chunk = cmp::min(remaining, max_stack);
            let stack = CurrencyItem::new(id.child("cash", n), Currency::Stacked(chunk), now);
            self.items.push(stack.clone());
            stacks.push(stack);
            remaining -= chunk;
        }
        let replacement = if remaining > 0 {
            let note = CurrencyItem::new(id.child("note", 0), Currency::Instrument(remaining), now);
            self.items.push(note.clone());
            Some(note)
        } else {
            None
        };
        Ok(Cashed {
            instrument,
            stacks,
            replacement,
        })
    }
}
