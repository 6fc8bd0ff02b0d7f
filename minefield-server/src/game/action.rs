//! Action Processing
//!
//! Pure state transitions for reveal and flag requests. Callers hand in
//! `&mut GameState`; nothing here touches I/O or time, so the hub can
//! apply actions one at a time in a strict total order.

use std::collections::{BTreeMap, VecDeque};
use serde::{Serialize, Deserialize};

use crate::game::board::{Board, Cell, FlagState};
use crate::game::config::GameConfig;
use crate::game::events::{CellEventKind, ScoreboardEvent, UpdateResult};
use crate::game::state::{GameState, Player, PlayerId};

/// Requested action kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    /// Reveal a cell (flood-filling from zero cells)
    Reveal,
    /// Toggle a flag
    Flag,
}

/// A player's request against one cell. Coordinates are unchecked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    /// What to do
    pub kind: ActionKind,
    /// Row
    pub x: i64,
    /// Column
    pub y: i64,
    /// Requesting player
    pub player_id: PlayerId,
}

/// Result of applying an action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Coordinates outside the board. State untouched.
    OutOfBounds,
    /// Valid but no effect (already revealed, unknown player, foreign flag).
    Ignored,
    /// State changed; events to broadcast.
    Applied(UpdateResult),
}

/// Validate coordinates and dispatch to [`reveal`] or [`flag`].
pub fn apply_action(state: &mut GameState, config: &GameConfig, action: &Action) -> ActionOutcome {
    let Some(coords) = state.board.checked_coords(action.x, action.y) else {
        return ActionOutcome::OutOfBounds;
    };

    let result = match action.kind {
        ActionKind::Reveal => reveal(state, config, coords, &action.player_id),
        ActionKind::Flag => flag(state, coords, &action.player_id),
    };

    match result {
        Some(updates) => ActionOutcome::Applied(updates),
        None => ActionOutcome::Ignored,
    }
}

/// Reveal the cell at `(x, y)` for `player_id`.
///
/// A mine costs the player `mine_hit_penalty` points (floored at 0) and
/// play continues. A safe cell is revealed together with its flood-fill
/// region: zero cells propagate, numbered cells form the border.
///
/// Returns `None` when the cell is already revealed or the player is
/// unknown.
pub fn reveal(
    state: &mut GameState,
    config: &GameConfig,
    (x, y): (usize, usize),
    player_id: &PlayerId,
) -> Option<UpdateResult> {
    let GameState { board, players, .. } = state;

    if board.cell(x, y).is_revealed || !players.contains_key(player_id) {
        return None;
    }

    let mut updates = UpdateResult::default();

    if board.cell(x, y).is_mine {
        hit_mine(board, players, config, (x, y), player_id, &mut updates);
        return Some(updates);
    }

    let mut gained: i64 = 0;
    reveal_safe_cell(board, players, config, (x, y), player_id, &mut gained, &mut updates);

    // Breadth-first over zero cells
    let mut queue = VecDeque::from([(x, y)]);
    while let Some((cx, cy)) = queue.pop_front() {
        if board.cell(cx, cy).adjacent_mines != 0 {
            continue;
        }

        for (nx, ny) in board.neighbors(cx, cy) {
            let neighbor = board.cell(nx, ny);
            if neighbor.is_revealed || neighbor.is_mine {
                continue;
            }

            reveal_safe_cell(board, players, config, (nx, ny), player_id, &mut gained, &mut updates);

            if board.cell(nx, ny).adjacent_mines == 0 {
                queue.push_back((nx, ny));
            }
        }
    }

    if gained > 0 {
        updates.push_scoreboard(ScoreboardEvent::score(player_id.clone(), gained));
    }

    Some(updates)
}

/// Toggle the flag at `(x, y)` for `player_id`.
///
/// Anyone may flag an empty cell; only the owner may remove a placed flag.
/// Returns `None` for revealed cells, unknown players, foreign flags and
/// any other flag state.
pub fn flag(
    state: &mut GameState,
    (x, y): (usize, usize),
    player_id: &PlayerId,
) -> Option<UpdateResult> {
    let GameState { board, players, .. } = state;

    let cell = board.cell_mut(x, y);
    if cell.is_revealed {
        return None;
    }
    let player = players.get_mut(player_id)?;

    let mut updates = UpdateResult::default();

    match cell.flag_state {
        FlagState::Empty => {
            cell.flag_state = FlagState::Placed;
            cell.flag_owner = Some(player_id.clone());
            player.active_flag_count += 1;
            updates.push_scoreboard(ScoreboardEvent::flag_increment(player_id.clone()));
        }
        FlagState::Placed if cell.flag_owner.as_ref() == Some(player_id) => {
            cell.flag_state = FlagState::Empty;
            cell.flag_owner = None;
            player.active_flag_count = player.active_flag_count.saturating_sub(1);
            updates.push_scoreboard(ScoreboardEvent::flag_decrement(player_id.clone()));
        }
        FlagState::Placed | FlagState::Validated => return None,
    }

    updates.push_cell(CellEventKind::Flag, (x, y), player_id, cell.view());
    Some(updates)
}

fn hit_mine(
    board: &mut Board,
    players: &mut BTreeMap<PlayerId, Player>,
    config: &GameConfig,
    (x, y): (usize, usize),
    player_id: &PlayerId,
    updates: &mut UpdateResult,
) {
    let cell = board.cell_mut(x, y);
    clear_flag(cell, players, updates);
    cell.is_revealed = true;
    let view = cell.view();

    if let Some(player) = players.get_mut(player_id) {
        player.total_mine_hits += 1;
        player.apply_penalty(config.mine_hit_penalty);
    }

    // The event carries the full penalty even when the score floors at 0
    let penalty = -i64::from(config.mine_hit_penalty);
    updates.push_cell(CellEventKind::Hit, (x, y), player_id, view);
    updates.push_scoreboard(ScoreboardEvent::score(player_id.clone(), penalty));
    updates.push_scoreboard(ScoreboardEvent::mine_hit(player_id.clone()));
}

fn reveal_safe_cell(
    board: &mut Board,
    players: &mut BTreeMap<PlayerId, Player>,
    config: &GameConfig,
    (x, y): (usize, usize),
    player_id: &PlayerId,
    gained: &mut i64,
    updates: &mut UpdateResult,
) {
    let cell = board.cell_mut(x, y);
    clear_flag(cell, players, updates);
    cell.is_revealed = true;
    let points = config.reveal_reward.saturating_add(u32::from(cell.adjacent_mines));
    let view = cell.view();

    board.cells_to_reveal = board.cells_to_reveal.saturating_sub(1);

    if let Some(player) = players.get_mut(player_id) {
        player.score = player.score.saturating_add(points);
        *gained += i64::from(points);
    }

    updates.push_cell(CellEventKind::Revealed, (x, y), player_id, view);
}

/// Remove any flag from a cell being revealed.
///
/// The owner's flag count drops only if the owner is still connected.
fn clear_flag(
    cell: &mut Cell,
    players: &mut BTreeMap<PlayerId, Player>,
    updates: &mut UpdateResult,
) {
    if !cell.has_flag() {
        return;
    }
    cell.flag_state = FlagState::Empty;

    if let Some(owner_id) = cell.flag_owner.take() {
        if let Some(owner) = players.get_mut(&owner_id) {
            owner.active_flag_count = owner.active_flag_count.saturating_sub(1);
            updates.push_scoreboard(ScoreboardEvent::flag_decrement(owner_id));
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::ScoreboardEventKind;

    fn config() -> GameConfig {
        GameConfig {
            reveal_reward: 1,
            mine_hit_penalty: 10,
            ..Default::default()
        }
    }

    fn state_with(board: Board, ids: &[&str]) -> GameState {
        let mut state = GameState::new(board, 0);
        for id in ids {
            let pid = PlayerId::from(*id);
            state.players.insert(pid.clone(), Player::new(pid, id.to_uppercase(), false));
        }
        state
    }

    fn action(kind: ActionKind, x: i64, y: i64, id: &str) -> Action {
        Action { kind, x, y, player_id: PlayerId::from(id) }
    }

    fn kinds(updates: &UpdateResult) -> Vec<ScoreboardEventKind> {
        updates.scoreboard_updates.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_flood_reveal_three_by_three() {
        let mut state = state_with(Board::with_mines(3, &[(2, 2)]), &["a"]);
        let a = PlayerId::from("a");

        let updates = reveal(&mut state, &config(), (0, 0), &a).unwrap();

        // All 8 safe cells revealed, the mine untouched
        assert_eq!(updates.cell_updates.len(), 8);
        assert!(updates.cell_updates.iter().all(|e| e.kind == CellEventKind::Revealed));
        assert_eq!(state.board.cells_to_reveal, 0);
        assert!(state.board.is_cleared());
        assert!(!state.board.cell(2, 2).is_revealed);
        assert!(state.board.cell(2, 2).is_mine);

        // Five zero cells at 1 point, three border cells at 1 + 1
        let player = state.get_player(&a).unwrap();
        assert_eq!(player.score, 11);
        assert_eq!(updates.scoreboard_updates, vec![ScoreboardEvent::score(a, 11)]);
    }

    #[test]
    fn test_origin_is_revealed_first() {
        let mut state = state_with(Board::with_mines(3, &[(2, 2)]), &["a"]);
        let updates = reveal(&mut state, &config(), (0, 0), &PlayerId::from("a")).unwrap();

        let first = &updates.cell_updates[0];
        assert_eq!((first.x, first.y), (0, 0));
    }

    #[test]
    fn test_numbered_cell_does_not_propagate() {
        let mut state = state_with(Board::with_mines(3, &[(2, 2)]), &["a"]);
        let updates = reveal(&mut state, &config(), (1, 1), &PlayerId::from("a")).unwrap();

        assert_eq!(updates.cell_updates.len(), 1);
        assert_eq!(state.board.cells_to_reveal, 7);
        assert_eq!(state.get_player(&PlayerId::from("a")).unwrap().score, 2);
    }

    #[test]
    fn test_flood_stops_at_numbered_border() {
        // Mine column at y = 2 splits a 5x5 board
        let mines: Vec<_> = (0..5).map(|x| (x, 2)).collect();
        let mut state = state_with(Board::with_mines(5, &mines), &["a"]);

        let updates = reveal(&mut state, &config(), (0, 0), &PlayerId::from("a")).unwrap();

        // Columns 0 (zeros) and 1 (border) only
        assert_eq!(updates.cell_updates.len(), 10);
        for x in 0..5 {
            assert!(state.board.cell(x, 0).is_revealed);
            assert!(state.board.cell(x, 1).is_revealed);
            assert!(!state.board.cell(x, 3).is_revealed);
            assert!(!state.board.cell(x, 4).is_revealed);
        }
        assert_eq!(state.board.cells_to_reveal, 10);
    }

    #[test]
    fn test_reveal_already_revealed_is_noop() {
        let mut state = state_with(Board::with_mines(3, &[(2, 2)]), &["a"]);
        let a = PlayerId::from("a");
        reveal(&mut state, &config(), (1, 1), &a).unwrap();

        let before_score = state.get_player(&a).unwrap().score;
        let before_remaining = state.board.cells_to_reveal;

        assert!(reveal(&mut state, &config(), (1, 1), &a).is_none());
        assert_eq!(state.get_player(&a).unwrap().score, before_score);
        assert_eq!(state.board.cells_to_reveal, before_remaining);
    }

    #[test]
    fn test_reveal_unknown_player_is_noop() {
        let mut state = state_with(Board::with_mines(3, &[(2, 2)]), &["a"]);

        assert!(reveal(&mut state, &config(), (0, 0), &PlayerId::from("ghost")).is_none());
        assert!(!state.board.cell(0, 0).is_revealed);
        assert_eq!(state.board.cells_to_reveal, 8);
    }

    #[test]
    fn test_mine_hit_penalty_and_continuation() {
        let mut state = state_with(Board::with_mines(3, &[(2, 2)]), &["a"]);
        let a = PlayerId::from("a");
        state.get_player_mut(&a).unwrap().score = 25;

        let updates = reveal(&mut state, &config(), (2, 2), &a).unwrap();

        assert_eq!(updates.cell_updates.len(), 1);
        assert_eq!(updates.cell_updates[0].kind, CellEventKind::Hit);
        assert_eq!(updates.cell_updates[0].cell.is_mine, Some(true));
        assert_eq!(
            kinds(&updates),
            vec![ScoreboardEventKind::Score, ScoreboardEventKind::MineHitIncrement]
        );
        assert_eq!(updates.scoreboard_updates[0].value, Some(-10));

        let player = state.get_player(&a).unwrap();
        assert_eq!(player.score, 15);
        assert_eq!(player.total_mine_hits, 1);

        // Mines never count toward cells to reveal
        assert_eq!(state.board.cells_to_reveal, 8);
        assert!(state.board.cell(2, 2).is_revealed);
    }

    #[test]
    fn test_mine_hit_never_goes_negative() {
        let mut state = state_with(Board::with_mines(2, &[(0, 0), (1, 1)]), &["a"]);
        let a = PlayerId::from("a");
        state.get_player_mut(&a).unwrap().score = 3;

        let updates = reveal(&mut state, &config(), (0, 0), &a).unwrap();
        assert_eq!(updates.scoreboard_updates[0].value, Some(-10));
        assert_eq!(state.get_player(&a).unwrap().score, 0);

        // Already at zero: the delta still reports the full penalty
        let updates = reveal(&mut state, &config(), (1, 1), &a).unwrap();
        assert_eq!(updates.scoreboard_updates[0].value, Some(-10));
        let player = state.get_player(&a).unwrap();
        assert_eq!(player.score, 0);
        assert_eq!(player.total_mine_hits, 2);
    }

    #[test]
    fn test_flag_toggle_roundtrip() {
        let mut state = state_with(Board::with_mines(3, &[(2, 2)]), &["a"]);
        let a = PlayerId::from("a");
        let original = state.board.cell(1, 1).clone();

        let placed = flag(&mut state, (1, 1), &a).unwrap();
        assert_eq!(kinds(&placed), vec![ScoreboardEventKind::FlagIncrement]);
        assert_eq!(placed.cell_updates[0].kind, CellEventKind::Flag);
        assert_eq!(placed.cell_updates[0].cell.flag_state, FlagState::Placed);
        assert_eq!(state.board.cell(1, 1).flag_owner, Some(a.clone()));
        assert_eq!(state.get_player(&a).unwrap().active_flag_count, 1);

        let removed = flag(&mut state, (1, 1), &a).unwrap();
        assert_eq!(kinds(&removed), vec![ScoreboardEventKind::FlagDecrement]);
        assert_eq!(removed.cell_updates[0].cell.flag_state, FlagState::Empty);

        assert_eq!(state.board.cell(1, 1), &original);
        assert_eq!(state.get_player(&a).unwrap().active_flag_count, 0);
    }

    #[test]
    fn test_foreign_flag_cannot_be_removed() {
        let mut state = state_with(Board::with_mines(3, &[(2, 2)]), &["a", "b"]);
        let a = PlayerId::from("a");
        let b = PlayerId::from("b");

        flag(&mut state, (0, 1), &a).unwrap();
        assert!(flag(&mut state, (0, 1), &b).is_none());

        let cell = state.board.cell(0, 1);
        assert_eq!(cell.flag_state, FlagState::Placed);
        assert_eq!(cell.flag_owner, Some(a.clone()));
        assert_eq!(state.get_player(&a).unwrap().active_flag_count, 1);
        assert_eq!(state.get_player(&b).unwrap().active_flag_count, 0);
        assert_eq!(state.get_player(&b).unwrap().score, 0);
    }

    #[test]
    fn test_flag_on_revealed_or_unknown_is_noop() {
        let mut state = state_with(Board::with_mines(3, &[(2, 2)]), &["a"]);
        let a = PlayerId::from("a");
        reveal(&mut state, &config(), (1, 1), &a).unwrap();

        assert!(flag(&mut state, (1, 1), &a).is_none());
        assert!(flag(&mut state, (0, 0), &PlayerId::from("ghost")).is_none());
        assert_eq!(state.board.cell(0, 0).flag_state, FlagState::Empty);
    }

    #[test]
    fn test_validated_flag_is_inert() {
        let mut state = state_with(Board::with_mines(3, &[(2, 2)]), &["a"]);
        let a = PlayerId::from("a");
        state.board.cell_mut(0, 0).flag_state = FlagState::Validated;
        state.board.cell_mut(0, 0).flag_owner = Some(a.clone());

        assert!(flag(&mut state, (0, 0), &a).is_none());
        assert_eq!(state.board.cell(0, 0).flag_state, FlagState::Validated);
    }

    #[test]
    fn test_reveal_clears_flags_in_region() {
        let mut state = state_with(Board::with_mines(3, &[(2, 2)]), &["a", "b"]);
        let a = PlayerId::from("a");
        let b = PlayerId::from("b");

        flag(&mut state, (0, 2), &b).unwrap();
        flag(&mut state, (1, 1), &b).unwrap();
        assert_eq!(state.get_player(&b).unwrap().active_flag_count, 2);

        let updates = reveal(&mut state, &config(), (0, 0), &a).unwrap();

        assert_eq!(state.get_player(&b).unwrap().active_flag_count, 0);
        assert!(!state.board.cell(0, 2).has_flag());
        assert_eq!(state.board.cell(0, 2).flag_owner, None);

        let decrements: Vec<_> = updates.scoreboard_updates.iter()
            .filter(|e| e.kind == ScoreboardEventKind::FlagDecrement)
            .map(|e| e.player_id.clone())
            .collect();
        assert_eq!(decrements, vec![b.clone(), b]);

        // Revealer still gets the full reward
        assert_eq!(state.get_player(&a).unwrap().score, 11);
    }

    #[test]
    fn test_mine_hit_clears_flag() {
        let mut state = state_with(Board::with_mines(3, &[(2, 2)]), &["a", "b"]);
        let a = PlayerId::from("a");
        let b = PlayerId::from("b");

        flag(&mut state, (2, 2), &b).unwrap();
        let updates = reveal(&mut state, &config(), (2, 2), &a).unwrap();

        assert_eq!(
            kinds(&updates),
            vec![
                ScoreboardEventKind::FlagDecrement,
                ScoreboardEventKind::Score,
                ScoreboardEventKind::MineHitIncrement,
            ]
        );
        assert_eq!(updates.scoreboard_updates[0].player_id, b);
        assert_eq!(state.get_player(&b).unwrap().active_flag_count, 0);
        assert!(!state.board.cell(2, 2).has_flag());
    }

    #[test]
    fn test_flag_of_departed_owner_clears_silently() {
        let mut state = state_with(Board::with_mines(3, &[(2, 2)]), &["a", "b"]);
        let a = PlayerId::from("a");
        let b = PlayerId::from("b");

        flag(&mut state, (1, 1), &b).unwrap();
        state.players.remove(&b);

        let updates = reveal(&mut state, &config(), (1, 1), &a).unwrap();
        assert_eq!(kinds(&updates), vec![ScoreboardEventKind::Score]);
        assert!(!state.board.cell(1, 1).has_flag());
    }

    #[test]
    fn test_apply_action_out_of_bounds() {
        let mut state = state_with(Board::with_mines(3, &[(2, 2)]), &["a"]);

        for (x, y) in [(-1, 0), (0, -1), (3, 0), (0, 3)] {
            assert_eq!(
                apply_action(&mut state, &config(), &action(ActionKind::Reveal, x, y, "a")),
                ActionOutcome::OutOfBounds
            );
            assert_eq!(
                apply_action(&mut state, &config(), &action(ActionKind::Flag, x, y, "a")),
                ActionOutcome::OutOfBounds
            );
        }
        assert_eq!(state.board.cells_to_reveal, 8);
    }

    #[test]
    fn test_apply_action_dispatch() {
        let mut state = state_with(Board::with_mines(3, &[(2, 2)]), &["a", "b"]);

        let outcome = apply_action(&mut state, &config(), &action(ActionKind::Flag, 0, 1, "a"));
        assert!(matches!(outcome, ActionOutcome::Applied(_)));

        // Arrival order A then B: B's toggle is ignored
        let outcome = apply_action(&mut state, &config(), &action(ActionKind::Flag, 0, 1, "b"));
        assert_eq!(outcome, ActionOutcome::Ignored);

        let outcome = apply_action(&mut state, &config(), &action(ActionKind::Reveal, 1, 1, "b"));
        assert!(matches!(outcome, ActionOutcome::Applied(_)));
    }

    #[test]
    fn test_random_interleavings_keep_counters_consistent() {
        use rand::{Rng, SeedableRng};
        use rand::rngs::StdRng;
        use crate::core::rng::DeterministicRng;

        let ids = ["a", "b", "c"];

        for seed in 0..20u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let board = Board::generate(8, 0.2, &mut DeterministicRng::new(seed));
            let mut state = state_with(board, &ids);

            for _ in 0..200 {
                let kind = if rng.gen_bool(0.5) { ActionKind::Reveal } else { ActionKind::Flag };
                let id = ids[rng.gen_range(0..ids.len())];
                let act = action(kind, rng.gen_range(-1..9), rng.gen_range(-1..9), id);
                apply_action(&mut state, &config(), &act);

                let hidden_safe = (0..8)
                    .flat_map(|x| (0..8).map(move |y| (x, y)))
                    .filter(|&(x, y)| {
                        let cell = state.board.cell(x, y);
                        !cell.is_mine && !cell.is_revealed
                    })
                    .count();
                assert_eq!(state.board.cells_to_reveal, hidden_safe);

                for player in state.players.values() {
                    let owned = (0..8)
                        .flat_map(|x| (0..8).map(move |y| (x, y)))
                        .filter(|&(x, y)| {
                            state.board.cell(x, y).flag_owner.as_ref() == Some(&player.player_id)
                        })
                        .count();
                    assert_eq!(player.active_flag_count as usize, owned);
                }
            }
        }
    }
}
