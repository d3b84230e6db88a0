//! Targeting, block-lagged damage and kills through the pipeline

mod common;

use std::collections::{BTreeMap, BTreeSet};

use common::{fixed_attack, mv, RecordingFame, TestWorld};
use hexrealm::core::types::Faction;
use hexrealm::logic::FameTransfer;
use hexrealm::store::{AccountsTable, GroundLootTable};
use hexrealm::{Command, HexCoord};

fn armour(w: &TestWorld, id: u64) -> u32 {
    w.with_character(id, |c| c.hp().armour)
}

#[test]
fn test_damage_applied_in_next_block() {
    let mut w = TestWorld::new();
    w.account("domob", Faction::Red);
    w.account("andy", Faction::Blue);
    let attacker = w.character("domob", HexCoord::new(0, 0));
    let target = w.character("andy", HexCoord::new(2, 0));
    w.arm(attacker, 100, Some(fixed_attack(5, 1)));
    w.arm(target, 100, None);

    w.block(&[]);
    assert_eq!(armour(&w, target), 100);
    assert_eq!(w.with_character(attacker, |c| c.data().unwrap().target), Some(target));

    w.block(&[]);
    assert_eq!(armour(&w, target), 99);
}

#[test]
fn test_nearest_target_then_lowest_id() {
    let mut w = TestWorld::new();
    w.account("domob", Faction::Red);
    w.account("andy", Faction::Blue);
    w.account("bob", Faction::Green);
    let attacker = w.character("domob", HexCoord::new(0, 0));
    let far = w.character("andy", HexCoord::new(3, 0));
    let near_a = w.character("bob", HexCoord::new(0, 2));
    let near_b = w.character("andy", HexCoord::new(2, 0));
    w.arm(attacker, 100, Some(fixed_attack(5, 1)));
    for id in [far, near_a, near_b] {
        w.arm(id, 100, None);
    }

    w.block(&[]);
    assert_eq!(w.with_character(attacker, |c| c.data().unwrap().target), Some(near_a));
}

#[test]
fn test_shield_absorbs_before_armour() {
    let mut w = TestWorld::new();
    w.account("domob", Faction::Red);
    w.account("andy", Faction::Blue);
    let attacker = w.character("domob", HexCoord::new(0, 0));
    let target = w.character("andy", HexCoord::new(1, 0));
    w.arm(attacker, 100, Some(fixed_attack(1, 5)));
    w.arm(target, 10, None);
    w.with_character(target, |c| c.mutable_hp().shield = 3);

    w.idle(2);
    let hp = w.with_character(target, |c| *c.hp());
    assert_eq!(hp.shield, 0);
    assert_eq!(hp.armour, 8);
}

#[test]
fn test_killed_character_drops_loot_for_same_block_pickup() {
    let mut w = TestWorld::new();
    w.account("domob", Faction::Red);
    w.account("andy", Faction::Blue);
    let pos = HexCoord::new(10, 20);
    let attacker = w.character("domob", HexCoord::new(11, 20));
    let victim = w.character("andy", pos);
    let picker = w.character("domob", pos);
    w.arm(attacker, 100, Some(fixed_attack(1, 10)));
    w.arm(victim, 1, None);
    w.arm(picker, 100, None);
    w.with_character(victim, |c| c.mutable_data().unwrap().inventory.add("foo", 10));

    w.block(&[]);
    assert!(w.exists(victim));

    let items = BTreeMap::from([("foo".to_string(), 3)]);
    let report = w.block(&[mv(
        "domob",
        Command::PickUp {
            character: picker,
            items,
        },
    )]);
    assert_eq!(report.kills, vec![victim]);
    assert_eq!(report.commands_ignored, 0);
    assert!(!w.exists(victim));
    assert_eq!(w.with_character(picker, |c| c.data().unwrap().inventory.count("foo")), 3);

    let mut loot = GroundLootTable::new(&w.db).get_by_coord(pos).unwrap();
    assert_eq!(loot.inventory().unwrap().count("foo"), 7);
}

#[test]
fn test_killed_character_no_longer_blocks() {
    let mut w = TestWorld::new();
    w.account("domob", Faction::Red);
    w.account("andy", Faction::Blue);
    let attacker = w.character("domob", HexCoord::new(0, 0));
    let obstacle = w.character("andy", HexCoord::new(1, 0));
    w.arm(attacker, 100, Some(fixed_attack(1, 10)));
    w.arm(obstacle, 1, None);

    w.block(&[]);
    w.block(&[mv(
        "domob",
        common::waypoints(attacker, &[HexCoord::new(1, 0)]),
    )]);
    assert!(!w.exists(obstacle));
    assert_eq!(w.pos(attacker), HexCoord::new(1, 0));
}

#[test]
fn test_kill_happens_before_regeneration() {
    let mut w = TestWorld::new();
    w.account("domob", Faction::Red);
    w.account("andy", Faction::Blue);
    let attacker = w.character("domob", HexCoord::new(0, 0));
    let victim = w.character("andy", HexCoord::new(1, 0));
    // Regeneration brings the shield to 2 before the first hit
    w.arm(attacker, 100, Some(fixed_attack(1, 2)));
    w.with_character(victim, |c| {
        c.mutable_hp().shield = 1;
        let regen = c.mutable_regen_data().unwrap();
        regen.max_hp.shield = 10;
        regen.shield_regeneration_mhp = 1000;
    });

    w.idle(2);
    assert!(!w.exists(victim));
}

#[test]
fn test_mutual_kill_credits_both() {
    let mut w = TestWorld::new();
    w.account("domob", Faction::Red);
    w.account("andy", Faction::Blue);
    let red = w.character("domob", HexCoord::new(0, 0));
    let blue = w.character("andy", HexCoord::new(1, 0));
    w.arm(red, 1, Some(fixed_attack(1, 5)));
    w.arm(blue, 1, Some(fixed_attack(1, 5)));

    let mut fame = FameTransfer::new(&w.params);
    w.block_with(&[], &mut fame);
    let report = w.block_with(&[], &mut fame);
    assert_eq!(report.kills, vec![red, blue]);

    let accounts = AccountsTable::new(&w.db, w.params.initial_fame);
    for name in ["domob", "andy"] {
        let a = accounts.get_by_name(name).unwrap();
        assert_eq!(a.kills(), 1);
        assert_eq!(a.fame(), 100);
        a.close().unwrap();
    }
}

#[test]
fn test_damage_list_credit_expires_after_window() {
    for (kill_height, expect_old) in [(199, true), (200, false)] {
        let mut w = TestWorld::new();
        w.account("domob", Faction::Red);
        w.account("andy", Faction::Blue);
        w.account("bob", Faction::Green);
        let old = w.character("domob", HexCoord::new(0, 0));
        let victim = w.character("andy", HexCoord::new(1, 0));
        w.arm(old, 100, Some(fixed_attack(1, 1)));
        w.arm(victim, 1000, None);

        // Targets at 99, hit at 100
        w.height = 98;
        w.block(&[]);
        w.block(&[]);
        w.with_character(old, |c| {
            let data = c.mutable_data().unwrap();
            data.combat.attacks.clear();
            data.target = None;
        });

        let finisher = w.character("bob", HexCoord::new(2, 0));
        w.arm(finisher, 100, Some(fixed_attack(1, 5000)));
        w.height = kill_height - 2;
        w.block(&[]);

        let mut fame = RecordingFame::default();
        w.block_with(&[], &mut fame);
        assert_eq!(w.height, kill_height);

        let mut expected = BTreeSet::from([finisher]);
        if expect_old {
            expected.insert(old);
        }
        assert_eq!(fame.kills, vec![(victim, expected)]);
    }
}
