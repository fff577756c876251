//! Resident accounts and their slot bindings.
//!
//! An account stays resident after its client disconnects, so a reconnect
//! re-homes the same object with [`AccountRegistry::update_pointer`]
//! instead of rebuilding it. [`AccountRegistry::evict_idle`] drops accounts
//! that stayed offline long enough with nothing left to save.

use std::collections::HashMap;

use tickward_protocol::{AccountId, ClientSlot};
use tracing::{debug, info};

use crate::{Account, AccountError, Aggregates, MembershipChange};

#[derive(Debug, Default)]
pub struct AccountRegistry {
    accounts: HashMap<AccountId, Account>,
    by_slot: HashMap<ClientSlot, AccountId>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `account` resident, replacing any previous copy, and binds it
    /// to `slot`.
    pub fn attach(&mut self, mut account: Account, slot: ClientSlot) -> &mut Account {
        let id = account.id();
        if let Some(old) = self.accounts.get(&id).and_then(Account::slot) {
            self.by_slot.remove(&old);
        }
        if let Some(previous) = self.by_slot.insert(slot, id) {
            if previous != id {
                if let Some(acc) = self.accounts.get_mut(&previous) {
                    acc.set_slot(None);
                }
            }
        }
        account.set_slot(Some(slot));
        info!(account = %id, %slot, "account attached");
        self.accounts.entry(id).insert_entry(account).into_mut()
    }

    /// Re-homes a resident account onto `slot` without touching its data.
    ///
    /// # Errors
    /// [`AccountError::NotResident`] if the account was never attached.
    pub fn update_pointer(&mut self, id: AccountId, slot: ClientSlot) -> Result<&mut Account, AccountError> {
        let old = self
            .accounts
            .get(&id)
            .ok_or(AccountError::NotResident(id))?
            .slot();
        if let Some(old) = old {
            self.by_slot.remove(&old);
        }
        if let Some(previous) = self.by_slot.insert(slot, id) {
            if previous != id {
                if let Some(acc) = self.accounts.get_mut(&previous) {
                    acc.set_slot(None);
                }
            }
        }
        let account = self
            .accounts
            .get_mut(&id)
            .ok_or(AccountError::NotResident(id))?;
        account.set_slot(Some(slot));
        debug!(account = %id, %slot, "account re-homed");
        Ok(account)
    }

    /// Unbinds whatever account is on `slot` and stamps it offline at
    /// `tick`. The account stays resident.
    pub fn detach(&mut self, slot: ClientSlot, tick: u64) -> Option<AccountId> {
        let id = self.by_slot.remove(&slot)?;
        if let Some(account) = self.accounts.get_mut(&id) {
            account.set_slot(None);
            account.set_offline_since(tick);
        }
        info!(account = %id, %slot, "account detached");
        Some(id)
    }

    /// Drops a resident account entirely.
    pub fn remove(&mut self, id: AccountId) -> Option<Account> {
        let account = self.accounts.remove(&id)?;
        if let Some(slot) = account.slot() {
            self.by_slot.remove(&slot);
        }
        Some(account)
    }

    /// Drops accounts offline for at least `after_ticks` at `tick` whose
    /// saves have all been handed out. Returns the evicted ids.
    pub fn evict_idle(&mut self, tick: u64, after_ticks: u64) -> Vec<AccountId> {
        let idle: Vec<AccountId> = self
            .accounts
            .values()
            .filter(|a| a.slot().is_none() && !a.has_pending_saves())
            .filter(|a| {
                a.offline_since()
                    .is_some_and(|since| tick.saturating_sub(since) >= after_ticks)
            })
            .map(Account::id)
            .collect();
        for &id in &idle {
            self.remove(id);
        }
        if !idle.is_empty() {
            info!(evicted = idle.len(), "idle accounts evicted");
        }
        idle
    }

    pub fn get(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    pub fn get_mut(&mut self, id: AccountId) -> Option<&mut Account> {
        self.accounts.get_mut(&id)
    }

    pub fn by_slot(&self, slot: ClientSlot) -> Option<&Account> {
        self.by_slot.get(&slot).and_then(|id| self.accounts.get(id))
    }

    pub fn by_slot_mut(&mut self, slot: ClientSlot) -> Option<&mut Account> {
        let id = self.by_slot.get(&slot)?;
        self.accounts.get_mut(id)
    }

    /// Is the account currently bound to a slot?
    pub fn is_online(&self, id: AccountId) -> bool {
        self.get(id).is_some_and(|a| a.slot().is_some())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Account> {
        self.accounts.values_mut()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Replays the membership change log against resident accounts.
    /// Returns the number of references re-resolved.
    pub fn reconcile(&mut self, aggregates: &mut Aggregates) -> usize {
        let changes = aggregates.take_changes();
        let mut refreshed = 0;
        for change in changes {
            let id = match change {
                MembershipChange::House(id)
                | MembershipChange::Group(id)
                | MembershipChange::Guild(id) => id,
            };
            let Some(account) = self.accounts.get_mut(&id) else {
                continue;
            };
            match change {
                MembershipChange::House(_) => account.reinitialize_house(&aggregates.houses),
                MembershipChange::Group(_) => account.reinitialize_group(&aggregates.groups),
                MembershipChange::Guild(_) => account.reinitialize_guild(&aggregates.guilds),
            }
            refreshed += 1;
        }
        if refreshed > 0 {
            debug!(refreshed, "membership changes reconciled");
        }
        refreshed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SaveKind;

    fn account(id: i64) -> Account {
        Account::new(AccountId(id), format!("user{id}"))
    }

    #[test]
    fn test_attach_binds_slot_both_ways() {
        let mut reg = AccountRegistry::new();
        reg.attach(account(1), ClientSlot(3));
        assert_eq!(reg.by_slot(ClientSlot(3)).unwrap().id(), AccountId(1));
        assert_eq!(reg.get(AccountId(1)).unwrap().slot(), Some(ClientSlot(3)));
        assert!(reg.is_online(AccountId(1)));
    }

    #[test]
    fn test_detach_keeps_account_resident() {
        let mut reg = AccountRegistry::new();
        reg.attach(account(1), ClientSlot(0));
        assert_eq!(reg.detach(ClientSlot(0), 0), Some(AccountId(1)));
        assert!(reg.by_slot(ClientSlot(0)).is_none());
        assert!(!reg.is_online(AccountId(1)));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.detach(ClientSlot(0), 0), None);
    }

    #[test]
    fn test_update_pointer_rehomes_without_rebuilding() {
        let mut reg = AccountRegistry::new();
        reg.attach(account(1), ClientSlot(0)).level = 9;
        reg.detach(ClientSlot(0), 0);

        let acc = reg.update_pointer(AccountId(1), ClientSlot(5)).unwrap();
        assert_eq!(acc.level, 9);
        assert_eq!(reg.by_slot(ClientSlot(5)).unwrap().id(), AccountId(1));
        assert!(reg.by_slot(ClientSlot(0)).is_none());
    }

    #[test]
    fn test_update_pointer_unknown_account_errors() {
        let mut reg = AccountRegistry::new();
        assert!(matches!(
            reg.update_pointer(AccountId(4), ClientSlot(0)),
            Err(AccountError::NotResident(AccountId(4)))
        ));
    }

    #[test]
    fn test_attach_over_occupied_slot_unbinds_previous() {
        let mut reg = AccountRegistry::new();
        reg.attach(account(1), ClientSlot(0));
        reg.attach(account(2), ClientSlot(0));
        assert_eq!(reg.get(AccountId(1)).unwrap().slot(), None);
        assert_eq!(reg.by_slot(ClientSlot(0)).unwrap().id(), AccountId(2));
    }

    #[test]
    fn test_reconcile_skips_non_resident_accounts() {
        let mut reg = AccountRegistry::new();
        reg.attach(account(1), ClientSlot(0));
        let mut agg = Aggregates::new();
        agg.create_group(AccountId(1)).unwrap();
        agg.create_group(AccountId(99)).unwrap();

        assert_eq!(reg.reconcile(&mut agg), 1);
        assert!(reg.get(AccountId(1)).unwrap().group().is_some());
        assert_eq!(agg.pending_changes(), 0);
    }

    #[test]
    fn test_evict_idle_drops_only_long_offline_saved_accounts() {
        let mut reg = AccountRegistry::new();
        reg.attach(account(1), ClientSlot(0));
        reg.attach(account(2), ClientSlot(1));
        reg.attach(account(3), ClientSlot(2)).request_save(SaveKind::Stats);
        reg.detach(ClientSlot(0), 100);
        reg.detach(ClientSlot(2), 100);

        assert!(reg.evict_idle(149, 50).is_empty());
        assert_eq!(reg.evict_idle(150, 50), vec![AccountId(1)]);
        assert!(reg.get(AccountId(1)).is_none());
        // Online, and offline with a save still pending.
        assert!(reg.get(AccountId(2)).is_some());
        assert!(reg.get(AccountId(3)).is_some());
    }

    #[test]
    fn test_update_pointer_clears_offline_stamp() {
        let mut reg = AccountRegistry::new();
        reg.attach(account(1), ClientSlot(0));
        reg.detach(ClientSlot(0), 10);
        assert_eq!(reg.get(AccountId(1)).unwrap().offline_since(), Some(10));

        reg.update_pointer(AccountId(1), ClientSlot(4)).unwrap();
        assert_eq!(reg.get(AccountId(1)).unwrap().offline_since(), None);
        assert!(reg.evict_idle(u64::MAX, 0).is_empty());
    }
}
