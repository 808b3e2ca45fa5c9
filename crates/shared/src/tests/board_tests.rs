use super::*;

fn board(tiers: &[(&str, &[&str])], bin: &[&str]) -> Board {
    Board {
        tiers: tiers
            .iter()
            .map(|(id, items)| Tier {
                id: (*id).to_string(),
                items: items.iter().map(|item| (*item).to_string()).collect(),
            })
            .collect(),
        bin: bin.iter().map(|name| (*name).to_string()).collect(),
    }
}

#[test]
fn moves_from_bin_onto_empty_tier() {
    let before = board(&[("S", &["Alice"]), ("A", &[])], &["Bob"]);
    let after = before
        .reassign("Bob", &DropTarget::Container(ContainerId::Tier("A".into())))
        .expect("valid move");
    assert_eq!(after, board(&[("S", &["Alice"]), ("A", &["Bob"])], &[]));
    // Input snapshot is untouched.
    assert_eq!(before.bin, vec!["Bob".to_string()]);
}

#[test]
fn inserts_at_anchor_position_in_destination_tier() {
    let before = board(&[("S", &["Alice", "Charlie"])], &["Bob"]);
    let after = before
        .reassign("Bob", &DropTarget::Item("Charlie".into()))
        .expect("valid move");
    assert_eq!(after, board(&[("S", &["Alice", "Bob", "Charlie"])], &[]));
}

#[test]
fn reorders_within_a_single_tier() {
    let before = board(&[("S", &["Alice", "Bob", "Charlie"])], &[]);
    let after = before
        .reassign("Charlie", &DropTarget::Item("Alice".into()))
        .expect("valid move");
    assert_eq!(after, board(&[("S", &["Charlie", "Alice", "Bob"])], &[]));
}

#[test]
fn moves_back_to_the_bin() {
    let before = board(&[("S", &["Alice"])], &["Bob"]);
    let after = before
        .reassign("Alice", &DropTarget::Container(ContainerId::Bin))
        .expect("valid move");
    assert_eq!(after, board(&[("S", &[])], &["Bob", "Alice"]));
}

#[test]
fn drop_onto_self_is_a_noop() {
    let before = board(&[("S", &["Alice", "Bob"])], &[]);
    assert!(before
        .reassign("Alice", &DropTarget::Item("Alice".into()))
        .is_none());
}

#[test]
fn drop_at_current_position_is_a_noop() {
    let before = board(&[("S", &["Alice", "Bob"])], &["Charlie"]);
    // Appending to the container the item already ends.
    assert!(before
        .reassign("Bob", &DropTarget::Container(ContainerId::Tier("S".into())))
        .is_none());
    assert!(before
        .reassign("Charlie", &DropTarget::Container(ContainerId::Bin))
        .is_none());
}

#[test]
fn unknown_dragged_item_is_a_noop() {
    let before = board(&[("S", &["Alice"])], &[]);
    assert!(before
        .reassign("Mallory", &DropTarget::Container(ContainerId::Bin))
        .is_none());
}

#[test]
fn unknown_target_is_a_noop() {
    let before = board(&[("S", &["Alice"])], &["Bob"]);
    assert!(before
        .reassign("Bob", &DropTarget::Item("Mallory".into()))
        .is_none());
    assert!(before
        .reassign("Bob", &DropTarget::Container(ContainerId::Tier("Z".into())))
        .is_none());
}

#[test]
fn reassignment_preserves_single_occurrence() {
    let mut current = Board::default();
    let moves = [
        ("Bob", DropTarget::Container(ContainerId::Tier("A".into()))),
        ("Alice", DropTarget::Item("Bob".into())),
        ("Frank", DropTarget::Container(ContainerId::Tier("S".into()))),
        ("Bob", DropTarget::Container(ContainerId::Bin)),
        ("Eve", DropTarget::Item("Alice".into())),
    ];
    for (dragged, target) in moves {
        current = current
            .reassign(dragged, &target)
            .expect("every move in this sequence changes the board");
        let total = current.members().count();
        assert_eq!(total, 6, "membership count must not drift");
        assert!(
            current.duplicate_members().is_empty(),
            "no member may appear twice after {dragged:?}"
        );
    }
}

#[test]
fn duplicate_members_reports_each_name_once() {
    let tainted = board(&[("S", &["Alice", "Bob"]), ("A", &["Alice"])], &["Alice"]);
    assert_eq!(tainted.duplicate_members(), vec!["Alice".to_string()]);
}

#[test]
fn default_board_matches_seed_state() {
    let seeded = Board::default();
    assert_eq!(seeded.tiers.len(), 3);
    assert!(seeded.tiers.iter().all(|tier| tier.items.is_empty()));
    assert_eq!(seeded.bin.len(), 6);
}
