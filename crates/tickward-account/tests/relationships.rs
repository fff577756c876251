//! Relationship references stay in step with the registries.

use tickward_account::{Account, AccountRegistry, Aggregates, House};
use tickward_protocol::{AccountId, ClientSlot, HouseId};

fn resident(reg: &mut AccountRegistry, id: i64, slot: u16) {
    reg.attach(Account::new(AccountId(id), format!("user{id}")), ClientSlot(slot));
}

#[test]
fn test_reinitialize_group_sets_containing_group_or_clears() {
    let mut agg = Aggregates::new();
    let group = agg.create_group(AccountId(1)).unwrap();
    agg.join_group(group, AccountId(2)).unwrap();

    let mut member = Account::new(AccountId(2), "oskar");
    member.reinitialize_group(&agg.groups);
    assert_eq!(member.group(), Some(group));

    let mut outsider = Account::new(AccountId(3), "ines");
    outsider.reinitialize_group(&agg.groups);
    assert_eq!(outsider.group(), None);

    agg.leave_group(group, AccountId(2)).unwrap();
    member.reinitialize_group(&agg.groups);
    assert_eq!(member.group(), None);
}

#[test]
fn test_reconcile_applies_group_changes_to_resident_accounts() {
    let mut reg = AccountRegistry::new();
    resident(&mut reg, 1, 0);
    resident(&mut reg, 2, 1);
    let mut agg = Aggregates::new();

    let group = agg.create_group(AccountId(1)).unwrap();
    agg.join_group(group, AccountId(2)).unwrap();
    assert_eq!(reg.get(AccountId(2)).unwrap().group(), None);

    reg.reconcile(&mut agg);
    assert_eq!(reg.get(AccountId(1)).unwrap().group(), Some(group));
    assert_eq!(reg.get(AccountId(2)).unwrap().group(), Some(group));

    agg.disband_group(group).unwrap();
    reg.reconcile(&mut agg);
    assert_eq!(reg.get(AccountId(1)).unwrap().group(), None);
    assert_eq!(reg.get(AccountId(2)).unwrap().group(), None);
}

#[test]
fn test_reconcile_house_sale_clears_reference() {
    let mut reg = AccountRegistry::new();
    resident(&mut reg, 1, 0);
    let mut agg = Aggregates::new();
    agg.houses.insert(House {
        id: HouseId(10),
        owner: None,
        price: 12_000,
    });

    agg.buy_house(HouseId(10), AccountId(1)).unwrap();
    reg.reconcile(&mut agg);
    assert_eq!(reg.get(AccountId(1)).unwrap().house(), Some(HouseId(10)));

    agg.sell_house(HouseId(10)).unwrap();
    reg.reconcile(&mut agg);
    assert_eq!(reg.get(AccountId(1)).unwrap().house(), None);
}

#[test]
fn test_reconcile_guild_dissolve_and_same_guild() {
    let mut reg = AccountRegistry::new();
    resident(&mut reg, 1, 0);
    resident(&mut reg, 2, 1);
    let mut agg = Aggregates::new();

    let guild = agg.create_guild("Anchors", AccountId(1)).unwrap();
    agg.join_guild(guild, AccountId(2)).unwrap();
    reg.reconcile(&mut agg);

    let a = reg.get(AccountId(1)).unwrap();
    let b = reg.get(AccountId(2)).unwrap();
    assert!(a.same_guild(b));

    agg.dissolve_guild(guild).unwrap();
    reg.reconcile(&mut agg);
    let a = reg.get(AccountId(1)).unwrap();
    let b = reg.get(AccountId(2)).unwrap();
    assert_eq!(a.guild(), None);
    assert!(!a.same_guild(b));
}

#[test]
fn test_offline_account_is_refreshed_on_reconcile_too() {
    let mut reg = AccountRegistry::new();
    resident(&mut reg, 1, 0);
    reg.detach(ClientSlot(0), 0);
    let mut agg = Aggregates::new();

    let group = agg.create_group(AccountId(1)).unwrap();
    assert_eq!(reg.reconcile(&mut agg), 1);
    assert_eq!(reg.get(AccountId(1)).unwrap().group(), Some(group));
}
