use super::*;
use serde_json::json;

fn set_of(n: usize) -> BoardSet {
    let snaps = (0..n).map(|i| Snapshot::new(json!({ "board": i }))).collect();
    BoardSet::from_snapshots(snaps, None)
}

fn board_tag(set: &BoardSet, index: usize) -> u64 {
    set.get(index)
        .and_then(|b| b.history.current())
        .and_then(|s| s.doc().get("board"))
        .and_then(serde_json::Value::as_u64)
        .expect("board should carry a tag")
}

#[test]
fn empty_load_seeds_one_empty_board() {
    let set = BoardSet::from_snapshots(Vec::new(), None);
    assert_eq!(set.len(), 1);
    assert_eq!(set.active(), 0);
    assert!(set.active_board().history.current().unwrap().is_empty_doc());
}

#[test]
fn push_appends_and_activates() {
    let mut set = BoardSet::new(None);
    assert_eq!(set.push_with(Snapshot::empty()), 1);
    assert_eq!(set.len(), 2);
    assert_eq!(set.active(), 1);
    assert_eq!(set.active_board().history.len(), 1);
}

#[test]
fn set_active_rejects_same_and_missing() {
    let mut set = set_of(3);
    assert!(!set.set_active(0));
    assert!(!set.set_active(3));
    assert!(set.set_active(2));
    assert_eq!(set.active(), 2);
}

#[test]
fn remove_last_board_is_rejected() {
    let mut set = BoardSet::new(None);
    assert_eq!(set.remove(0), Err(BoardSetError::LastBoard));
    assert_eq!(set.len(), 1);
    assert_eq!(set.active(), 0);
}

#[test]
fn remove_out_of_range_leaves_set_unchanged() {
    let mut set = set_of(2);
    assert_eq!(set.remove(5), Err(BoardSetError::OutOfRange(5)));
    assert_eq!(set.len(), 2);
}

#[test]
fn remove_active_selects_previous_board() {
    let mut set = set_of(4);
    set.set_active(2);
    assert_eq!(set.remove(2), Ok(1));
    assert_eq!(set.len(), 3);
    assert_eq!(board_tag(&set, 2), 3);
}

#[test]
fn remove_active_first_board_stays_at_zero() {
    let mut set = set_of(3);
    assert_eq!(set.remove(0), Ok(0));
    assert_eq!(board_tag(&set, 0), 1);
}

#[test]
fn remove_before_active_shifts_active_down() {
    let mut set = set_of(4);
    set.set_active(3);
    assert_eq!(set.remove(1), Ok(2));
    assert_eq!(board_tag(&set, set.active()), 3);
}

#[test]
fn remove_after_active_keeps_active() {
    let mut set = set_of(4);
    set.set_active(1);
    assert_eq!(set.remove(3), Ok(1));
    assert_eq!(board_tag(&set, set.active()), 1);
}

#[test]
fn active_after_delete_covers_all_positions() {
    for n in 2..6 {
        for active in 0..n {
            for deleted in 0..n {
                let next = active_after_delete(active, deleted);
                assert!(next < n - 1, "n={n} active={active} deleted={deleted}");
            }
        }
    }
}

#[test]
fn new_boards_inherit_history_limit() {
    let mut set = BoardSet::new(Some(2));
    let index = set.push_with(Snapshot::empty());
    let board = set.get_mut(index).unwrap();
    for n in 0..5 {
        board.history.capture(Snapshot::new(json!(n)));
    }
    assert_eq!(board.history.len(), 2);
}
