//! Jewel Rush core crate.
//!
//! A browser match-3: a fixed 10x10 grid of colored jewels the player swaps to
//! form runs of three or more, cleared for score with gravity refill. Runs of
//! five containing the swapped jewel create a bomb that clears a 5x5 area on
//! double-click. `start_game()` is the single JS entrypoint; all board rules
//! live in [`board::grid`] and are natively testable.

use wasm_bindgen::prelude::*;

pub mod board;

pub use board::grid::{COLORS, COLS, ROWS};

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

#[wasm_bindgen]
pub fn start_game() -> Result<(), JsValue> {
    board::start_match_mode()
}
