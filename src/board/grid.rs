//! Pure match-3 board rules: jewel data model, match scanning, population,
//! drop/refill and bomb blasts. Nothing in here touches web types so the whole
//! module runs under native `cargo test`.
//!
//! The board is an unordered `Vec<Jewel>` keyed by (col, row). Invariants:
//! at most one jewel per cell while the board is at rest, every cell populated
//! after a settle phase, adjacency = Manhattan distance 1.

use std::collections::HashSet;

pub const COLS: u8 = 10;
pub const ROWS: u8 = 10;

/// Shortest run that clears.
pub const MIN_RUN: usize = 3;
/// Run length that converts the swapped jewel into a bomb.
pub const BOMB_RUN: usize = 5;
/// Chebyshev radius of a bomb blast (radius 2 => 5x5 neighborhood).
pub const BLAST_RADIUS: i16 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JewelColor {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
}

pub const COLORS: [JewelColor; 5] = [
    JewelColor::Red,
    JewelColor::Blue,
    JewelColor::Green,
    JewelColor::Yellow,
    JewelColor::Purple,
];

impl JewelColor {
    /// CSS color string used by the canvas renderer.
    pub fn css(self) -> &'static str {
        match self {
            JewelColor::Red => "red",
            JewelColor::Blue => "blue",
            JewelColor::Green => "green",
            JewelColor::Yellow => "yellow",
            JewelColor::Purple => "purple",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JewelKind {
    Color(JewelColor),
    Bomb,
}

impl JewelKind {
    pub fn color(self) -> Option<JewelColor> {
        match self {
            JewelKind::Color(c) => Some(c),
            JewelKind::Bomb => None,
        }
    }

    pub fn is_bomb(self) -> bool {
        matches!(self, JewelKind::Bomb)
    }
}

/// Per-jewel animation state. Input is ignored while any jewel is not `Idle`,
/// serializing user interactions with board mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JewelState {
    Idle,
    Swapping,
    Falling,
    Clearing,
}

/// A single grid piece. Pixel coordinates are the cell center; `target_y`
/// drives the drop animation and `alpha` the clear fade.
#[derive(Clone, Debug)]
pub struct Jewel {
    pub col: u8,
    pub row: u8,
    pub kind: JewelKind,
    pub x: f64,
    pub y: f64,
    pub target_y: f64,
    pub alpha: f64,
    pub state: JewelState,
}

impl Jewel {
    pub fn new(col: u8, row: u8, kind: JewelKind, cell: f64) -> Self {
        let (x, y) = Self::center(col, row, cell);
        Self {
            col,
            row,
            kind,
            x,
            y,
            target_y: y,
            alpha: 1.0,
            state: JewelState::Idle,
        }
    }

    /// Pixel center of a cell for the given cell size.
    pub fn center(col: u8, row: u8, cell: f64) -> (f64, f64) {
        (
            col as f64 * cell + cell / 2.0,
            row as f64 * cell + cell / 2.0,
        )
    }
}

pub fn jewel_at(jewels: &[Jewel], col: u8, row: u8) -> Option<&Jewel> {
    jewels.iter().find(|j| j.col == col && j.row == row)
}

/// Color occupying a cell; bombs and empty cells yield `None` so they break runs.
fn color_at(jewels: &[Jewel], col: u8, row: u8) -> Option<JewelColor> {
    jewel_at(jewels, col, row).and_then(|j| j.kind.color())
}

/// Adjacency: exactly one cell apart horizontally or vertically.
pub fn are_neighbors(a: (u8, u8), b: (u8, u8)) -> bool {
    let dc = (a.0 as i16 - b.0 as i16).abs();
    let dr = (a.1 as i16 - b.1 as i16).abs();
    (dc == 1 && dr == 0) || (dc == 0 && dr == 1)
}

/// Would placing `color` at (col, row) complete a horizontal or vertical run
/// of `MIN_RUN`? Used to keep the initial population match-free.
pub fn completes_run(jewels: &[Jewel], col: u8, row: u8, color: JewelColor) -> bool {
    let mut h = 1usize;
    for dx in [-1i16, 1] {
        let mut c = col as i16 + dx;
        while (0..COLS as i16).contains(&c) && color_at(jewels, c as u8, row) == Some(color) {
            h += 1;
            c += dx;
        }
    }
    if h >= MIN_RUN {
        return true;
    }
    let mut v = 1usize;
    for dy in [-1i16, 1] {
        let mut r = row as i16 + dy;
        while (0..ROWS as i16).contains(&r) && color_at(jewels, col, r as u8) == Some(color) {
            v += 1;
            r += dy;
        }
    }
    v >= MIN_RUN
}

fn rand_index(len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let mut buf = [0u8; 4];
    // A zeroed buffer on failure degrades to index 0; acceptable for gameplay.
    let _ = getrandom::getrandom(&mut buf);
    u32::from_le_bytes(buf) as usize % len
}

pub fn random_color() -> JewelColor {
    COLORS[rand_index(COLORS.len())]
}

/// Fill every cell with a random color, rejecting colors that would complete
/// a run so the freshly populated board has no immediate matches.
pub fn populate(jewels: &mut Vec<Jewel>, cell: f64) {
    for col in 0..COLS {
        for row in 0..ROWS {
            let color = loop {
                let c = random_color();
                if !completes_run(jewels, col, row, c) {
                    break c;
                }
            };
            jewels.push(Jewel::new(col, row, JewelKind::Color(color), cell));
        }
    }
}

/// Scan every row and column for runs of equal color. Runs >= `MIN_RUN` mark
/// their jewels `Clearing`. A run >= `BOMB_RUN` containing `swapped` converts
/// that jewel into a bomb instead of clearing it (at most one bomb per scan).
/// Returns whether any jewel started clearing.
pub fn scan_matches(jewels: &mut [Jewel], swapped: Option<(u8, u8)>) -> bool {
    let mut clear: HashSet<(u8, u8)> = HashSet::new();
    let mut bomb_cell: Option<(u8, u8)> = None;

    for row in 0..ROWS {
        scan_line(
            jewels,
            (0..COLS).map(|col| (col, row)),
            swapped,
            &mut clear,
            &mut bomb_cell,
        );
    }
    for col in 0..COLS {
        scan_line(
            jewels,
            (0..ROWS).map(|row| (col, row)),
            swapped,
            &mut clear,
            &mut bomb_cell,
        );
    }

    if let Some((bc, br)) = bomb_cell {
        clear.remove(&(bc, br));
        if let Some(j) = jewels.iter_mut().find(|j| j.col == bc && j.row == br) {
            j.kind = JewelKind::Bomb;
        }
    }

    let mut any = false;
    for j in jewels.iter_mut() {
        if clear.contains(&(j.col, j.row)) {
            j.state = JewelState::Clearing;
            any = true;
        }
    }
    any
}

fn scan_line(
    jewels: &[Jewel],
    cells: impl Iterator<Item = (u8, u8)>,
    swapped: Option<(u8, u8)>,
    clear: &mut HashSet<(u8, u8)>,
    bomb_cell: &mut Option<(u8, u8)>,
) {
    let mut streak: Vec<(u8, u8)> = Vec::new();
    let mut current: Option<JewelColor> = None;
    for (col, row) in cells {
        let color = color_at(jewels, col, row);
        match (color, current) {
            (Some(c), Some(cur)) if c == cur => streak.push((col, row)),
            _ => {
                flush_streak(&streak, swapped, clear, bomb_cell);
                streak.clear();
                if color.is_some() {
                    streak.push((col, row));
                }
                current = color;
            }
        }
    }
    flush_streak(&streak, swapped, clear, bomb_cell);
}

fn flush_streak(
    streak: &[(u8, u8)],
    swapped: Option<(u8, u8)>,
    clear: &mut HashSet<(u8, u8)>,
    bomb_cell: &mut Option<(u8, u8)>,
) {
    if streak.len() >= BOMB_RUN
        && bomb_cell.is_none()
        && swapped.is_some_and(|sw| streak.contains(&sw))
    {
        *bomb_cell = swapped;
    }
    if streak.len() >= MIN_RUN {
        clear.extend(streak.iter().copied());
    }
}

/// Mark every jewel within `BLAST_RADIUS` (Chebyshev) of the bomb cell as
/// `Clearing`, bomb included; clipped at board edges. Returns how many were hit.
pub fn blast(jewels: &mut [Jewel], col: u8, row: u8) -> usize {
    let mut hit = 0;
    for j in jewels.iter_mut() {
        let dc = (j.col as i16 - col as i16).abs();
        let dr = (j.row as i16 - row as i16).abs();
        if dc <= BLAST_RADIUS && dr <= BLAST_RADIUS && j.state != JewelState::Clearing {
            j.state = JewelState::Clearing;
            hit += 1;
        }
    }
    hit
}

/// Gravity pass: per column, survivors are re-rowed bottom-up (deepest first)
/// and start falling toward their new cell; vacated upper cells get fresh
/// random jewels placed directly at rest. Refill is not subject to the
/// population no-match rule; cascades clear any run it forms.
pub fn drop_and_refill(jewels: &mut Vec<Jewel>, cell: f64) {
    for col in 0..COLS {
        let mut survivors: Vec<usize> = jewels
            .iter()
            .enumerate()
            .filter(|(_, j)| j.col == col)
            .map(|(i, _)| i)
            .collect();
        survivors.sort_by(|&a, &b| jewels[b].row.cmp(&jewels[a].row));

        let mut next = survivors.into_iter();
        for row in (0..ROWS).rev() {
            match next.next() {
                Some(i) => {
                    let (_, cy) = Jewel::center(col, row, cell);
                    let j = &mut jewels[i];
                    j.row = row;
                    j.target_y = cy;
                    if j.y < j.target_y {
                        j.state = JewelState::Falling;
                    }
                }
                None => {
                    jewels.push(Jewel::new(col, row, JewelKind::Color(random_color()), cell));
                }
            }
        }
    }
}

/// True while any jewel animates; pointer input is dropped during that window.
pub fn any_animating(jewels: &[Jewel]) -> bool {
    jewels.iter().any(|j| j.state != JewelState::Idle)
}

/// Rest-state invariant: all cells populated, none doubly occupied.
pub fn one_jewel_per_cell(jewels: &[Jewel]) -> bool {
    if jewels.len() != COLS as usize * ROWS as usize {
        return false;
    }
    let mut seen = HashSet::new();
    jewels.iter().all(|j| {
        j.col < COLS && j.row < ROWS && seen.insert((j.col, j.row))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CELL: f64 = 40.0;

    // Build a board from row strings; 'r','b','g','y','p' are colors, 'B' a
    // bomb, '.' leaves the cell empty. Rows may be shorter than the grid.
    fn board_from_rows(rows: &[&str]) -> Vec<Jewel> {
        let mut jewels = Vec::new();
        for (row, line) in rows.iter().enumerate() {
            for (col, ch) in line.chars().enumerate() {
                let kind = match ch {
                    'r' => JewelKind::Color(JewelColor::Red),
                    'b' => JewelKind::Color(JewelColor::Blue),
                    'g' => JewelKind::Color(JewelColor::Green),
                    'y' => JewelKind::Color(JewelColor::Yellow),
                    'p' => JewelKind::Color(JewelColor::Purple),
                    'B' => JewelKind::Bomb,
                    _ => continue,
                };
                jewels.push(Jewel::new(col as u8, row as u8, kind, CELL));
            }
        }
        jewels
    }

    fn clearing_cells(jewels: &[Jewel]) -> Vec<(u8, u8)> {
        let mut cells: Vec<(u8, u8)> = jewels
            .iter()
            .filter(|j| j.state == JewelState::Clearing)
            .map(|j| (j.col, j.row))
            .collect();
        cells.sort_unstable();
        cells
    }

    #[test]
    fn neighbors_are_manhattan_distance_one() {
        assert!(are_neighbors((3, 3), (4, 3)));
        assert!(are_neighbors((3, 3), (3, 2)));
        assert!(!are_neighbors((3, 3), (4, 4)));
        assert!(!are_neighbors((3, 3), (5, 3)));
        assert!(!are_neighbors((3, 3), (3, 3)));
    }

    #[test]
    fn completes_run_detects_both_axes() {
        let jewels = board_from_rows(&["rr.", "b..", "b.."]);
        assert!(completes_run(&jewels, 2, 0, JewelColor::Red));
        assert!(completes_run(&jewels, 0, 3, JewelColor::Blue));
        assert!(!completes_run(&jewels, 2, 0, JewelColor::Blue));
    }

    #[test]
    fn completes_run_counts_through_both_sides() {
        // Placing red between two reds makes a run even with no pair on one side.
        let jewels = board_from_rows(&["r.r"]);
        assert!(completes_run(&jewels, 1, 0, JewelColor::Red));
    }

    #[test]
    fn scan_clears_horizontal_run_of_three() {
        let jewels_rows = &["rrrb", "bgyp"];
        let mut jewels = board_from_rows(jewels_rows);
        assert!(scan_matches(&mut jewels, None));
        assert_eq!(clearing_cells(&jewels), vec![(0, 0), (1, 0), (2, 0)]);
    }

    #[test]
    fn scan_clears_vertical_run_of_three() {
        let mut jewels = board_from_rows(&["gb", "gy", "gp"]);
        assert!(scan_matches(&mut jewels, None));
        assert_eq!(clearing_cells(&jewels), vec![(0, 0), (0, 1), (0, 2)]);
    }

    #[test]
    fn scan_ignores_runs_of_two() {
        let mut jewels = board_from_rows(&["rrb", "ggy"]);
        assert!(!scan_matches(&mut jewels, None));
        assert!(clearing_cells(&jewels).is_empty());
    }

    #[test]
    fn bombs_break_color_runs() {
        let mut jewels = board_from_rows(&["rrBrr"]);
        assert!(!scan_matches(&mut jewels, None));
    }

    #[test]
    fn run_of_five_with_swapped_cell_makes_one_bomb() {
        let mut jewels = board_from_rows(&["rrrrr"]);
        assert!(scan_matches(&mut jewels, Some((2, 0))));
        let bomb = jewel_at(&jewels, 2, 0).unwrap();
        assert_eq!(bomb.kind, JewelKind::Bomb);
        assert_eq!(bomb.state, JewelState::Idle);
        assert_eq!(
            clearing_cells(&jewels),
            vec![(0, 0), (1, 0), (3, 0), (4, 0)]
        );
    }

    #[test]
    fn run_of_five_without_swap_clears_whole_run() {
        let mut jewels = board_from_rows(&["yyyyy"]);
        assert!(scan_matches(&mut jewels, None));
        assert!(jewels.iter().all(|j| j.state == JewelState::Clearing));
        assert!(jewels.iter().all(|j| !j.kind.is_bomb()));
    }

    #[test]
    fn crossing_runs_of_five_still_make_exactly_one_bomb() {
        // Row 2 and column 2 are both all-purple runs crossing at (2, 2).
        let mut jewels = board_from_rows(&[
            "rbpyb",
            "gyprg",
            "ppppp",
            "gbpry",
            "rypgb",
        ]);
        assert!(scan_matches(&mut jewels, Some((2, 2))));
        let bombs: Vec<_> = jewels.iter().filter(|j| j.kind.is_bomb()).collect();
        assert_eq!(bombs.len(), 1);
        assert_eq!((bombs[0].col, bombs[0].row), (2, 2));
        assert_eq!(bombs[0].state, JewelState::Idle);
        // Every other member of both runs clears.
        let cleared = clearing_cells(&jewels);
        assert_eq!(
            cleared,
            vec![
                (0, 2),
                (1, 2),
                (2, 0),
                (2, 1),
                (2, 3),
                (2, 4),
                (3, 2),
                (4, 2)
            ]
        );
    }

    #[test]
    fn run_of_five_not_containing_swapped_cell_just_clears() {
        let mut jewels = board_from_rows(&["ggggg", "rbyrb"]);
        assert!(scan_matches(&mut jewels, Some((0, 1))));
        assert!(jewels.iter().all(|j| !j.kind.is_bomb()));
        assert_eq!(clearing_cells(&jewels).len(), 5);
    }

    #[test]
    fn blast_covers_five_by_five() {
        let mut jewels = Vec::new();
        populate(&mut jewels, CELL);
        let hit = blast(&mut jewels, 5, 5);
        assert_eq!(hit, 25);
        for j in &jewels {
            let inside = (j.col as i16 - 5).abs() <= 2 && (j.row as i16 - 5).abs() <= 2;
            assert_eq!(j.state == JewelState::Clearing, inside);
        }
    }

    #[test]
    fn blast_is_clipped_at_board_corners() {
        let mut jewels = Vec::new();
        populate(&mut jewels, CELL);
        assert_eq!(blast(&mut jewels, 0, 0), 9);
    }

    #[test]
    fn populate_fills_board_without_matches() {
        for _ in 0..10 {
            let mut jewels = Vec::new();
            populate(&mut jewels, CELL);
            assert!(one_jewel_per_cell(&jewels));
            assert!(!scan_matches(&mut jewels, None));
        }
    }

    #[test]
    fn drop_refills_cleared_column_and_keeps_invariant() {
        let mut jewels = Vec::new();
        populate(&mut jewels, CELL);
        // Clear a vertical stripe in the middle of column 4.
        jewels.retain(|j| !(j.col == 4 && (3..=5).contains(&j.row)));
        drop_and_refill(&mut jewels, CELL);
        assert!(one_jewel_per_cell(&jewels));
        // Survivors above the hole fall; rows 0..=2 are freshly spawned at rest.
        let fallers: Vec<_> = jewels
            .iter()
            .filter(|j| j.state == JewelState::Falling)
            .collect();
        assert_eq!(fallers.len(), 3);
        assert!(fallers.iter().all(|j| j.col == 4 && j.y < j.target_y));
    }

    #[test]
    fn drop_preserves_column_order_of_survivors() {
        let mut jewels = board_from_rows(&["r", "g", "b"]);
        // Remove the bottom jewel; the two survivors keep their relative
        // vertical order and land at the bottom of the full-height column,
        // with fresh jewels filling the rows above.
        jewels.retain(|j| j.row != 2);
        drop_and_refill(&mut jewels, CELL);
        let col0: Vec<_> = (0..ROWS)
            .map(|row| jewel_at(&jewels, 0, row).unwrap())
            .collect();
        assert_eq!(col0.len(), ROWS as usize);
        assert_eq!(col0[ROWS as usize - 1].kind, JewelKind::Color(JewelColor::Green));
        assert_eq!(col0[ROWS as usize - 2].kind, JewelKind::Color(JewelColor::Red));
    }

    #[test]
    fn drop_moves_bombs_like_any_jewel() {
        let mut jewels = board_from_rows(&["B"]);
        drop_and_refill(&mut jewels, CELL);
        let bomb = jewels.iter().find(|j| j.kind.is_bomb()).unwrap();
        assert_eq!(bomb.row, ROWS - 1);
        assert_eq!(bomb.state, JewelState::Falling);
    }

    #[test]
    fn refill_after_blast_restores_full_board() {
        let mut jewels = Vec::new();
        populate(&mut jewels, CELL);
        blast(&mut jewels, 4, 4);
        jewels.retain(|j| j.state != JewelState::Clearing);
        drop_and_refill(&mut jewels, CELL);
        assert!(one_jewel_per_cell(&jewels));
    }
}
