//! Browser glue for the match-3 board: canvas and score-element setup, click /
//! touch listeners, the `requestAnimationFrame` loop, per-frame animation
//! stepping and canvas rendering. All board rules live in [`grid`]; this module
//! only moves pixels and routes input.

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, window};

pub mod grid;

use grid::{COLS, Jewel, JewelKind, JewelState, ROWS};

/// Swap animation progress added per frame (20 frames to completion).
const SWAP_STEP: f64 = 0.05;
/// Alpha subtracted per frame while a jewel fades out.
const FADE_STEP: f64 = 0.05;
/// Pixels a falling jewel moves per frame.
const FALL_SPEED: f64 = 5.0;
/// Two bomb clicks within this window count as a double-click.
const DOUBLE_CLICK_MS: f64 = 300.0;
/// Delay between clears starting and the gravity pass.
const DROP_DELAY_MS: f64 = 500.0;
const SCORE_PER_JEWEL: i64 = 10;

/// In-flight swap of two jewels, identified by index into the jewel vec.
/// Indices stay valid for the animation's lifetime: nothing is removed from
/// the vec while input is blocked and no jewel is clearing.
struct SwapAnim {
    a: usize,
    b: usize,
    progress: f64,
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
}

/// Runtime game state shared between the frame loop and input listeners.
struct GameState {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    jewel_size: f64,
    jewels: Vec<Jewel>,
    score: i64,
    /// Cell of the currently selected jewel, if any.
    selected: Option<(u8, u8)>,
    swap: Option<SwapAnim>,
    /// When set, a gravity pass runs once this timestamp passes and fades finish.
    drop_due_ms: Option<f64>,
    last_click_ms: f64,
}

// RefCell::new isn't const on this toolchain; allow Clippy lint until a const initializer is feasible.
thread_local! {
    static GAME_STATE: std::cell::RefCell<Option<GameState>> = std::cell::RefCell::new(None);
}

type FrameCallback = std::rc::Rc<std::cell::RefCell<Option<Closure<dyn FnMut(f64)>>>>;

pub fn start_match_mode() -> Result<(), JsValue> {
    let win = window().ok_or_else(|| JsValue::from_str("no window"))?;
    let doc = win
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    // Board edge tracks the viewport: 90% of the smaller window dimension.
    let inner_w = win.inner_width()?.as_f64().unwrap_or(640.0);
    let inner_h = win.inner_height()?.as_f64().unwrap_or(640.0);
    let jewel_size = (inner_w.min(inner_h) * 0.9) / COLS as f64;
    let edge = (jewel_size * COLS as f64) as u32;

    // Create / reuse the board canvas.
    let canvas: HtmlCanvasElement = if let Some(el) = doc.get_element_by_id("jr-board-canvas") {
        el.dyn_into()?
    } else {
        let c: HtmlCanvasElement = doc.create_element("canvas")?.dyn_into()?;
        c.set_id("jr-board-canvas");
        c.set_attribute("style", "position:fixed; left:50%; top:50%; transform:translate(-50%,-50%); box-shadow:0 0 32px 0 rgba(0,0,0,0.18); border-radius:12px; border:2px solid #222; background:#181818; z-index:20;").ok();
        doc.body()
            .ok_or_else(|| JsValue::from_str("no body"))?
            .append_child(&c)?;
        c
    };
    canvas.set_width(edge);
    canvas.set_height((jewel_size * ROWS as f64) as u32);
    let ctx: CanvasRenderingContext2d = canvas.get_context("2d")?.unwrap().dyn_into()?;

    // Ensure score overlay exists (top-left)
    if doc.get_element_by_id("jr-score").is_none() {
        if let Some(body) = doc.body() {
            let div = doc.create_element("div")?;
            div.set_id("jr-score");
            div.set_text_content(Some("Score: 0"));
            div.set_attribute("style", "position:fixed; top:10px; left:12px; font-family:'Fira Code', monospace; font-size:15px; padding:4px 8px; background:rgba(0,0,0,0.42); border:1px solid #333; border-radius:6px; color:#ffd166; z-index:45; letter-spacing:0.5px;").ok();
            body.append_child(&div)?;
        }
    }

    let mut jewels = Vec::with_capacity(COLS as usize * ROWS as usize);
    grid::populate(&mut jewels, jewel_size);

    GAME_STATE.with(|cell| {
        cell.replace(Some(GameState {
            canvas: canvas.clone(),
            ctx,
            jewel_size,
            jewels,
            score: 0,
            selected: None,
            swap: None,
            drop_due_ms: None,
            last_click_ms: 0.0,
        }))
    });

    // Click listener: map client coordinates into canvas space.
    {
        let canvas_click = canvas.clone();
        let closure = Closure::wrap(Box::new(move |evt: web_sys::MouseEvent| {
            let rect = canvas_click.get_bounding_client_rect();
            let x = evt.client_x() as f64 - rect.left();
            let y = evt.client_y() as f64 - rect.top();
            dispatch_pointer(x, y);
        }) as Box<dyn FnMut(_)>);
        canvas.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    // Touch listener; registered non-passive so preventDefault suppresses the
    // synthetic click that would otherwise follow.
    {
        let canvas_touch = canvas.clone();
        let closure = Closure::wrap(Box::new(move |evt: web_sys::TouchEvent| {
            evt.prevent_default();
            if let Some(touch) = evt.touches().get(0) {
                let rect = canvas_touch.get_bounding_client_rect();
                let x = touch.client_x() as f64 - rect.left();
                let y = touch.client_y() as f64 - rect.top();
                dispatch_pointer(x, y);
            }
        }) as Box<dyn FnMut(_)>);
        let opts = web_sys::AddEventListenerOptions::new();
        opts.set_passive(false);
        canvas.add_event_listener_with_callback_and_add_event_listener_options(
            "touchstart",
            closure.as_ref().unchecked_ref(),
            &opts,
        )?;
        closure.forget();
    }

    start_game_loop();
    Ok(())
}

fn now_ms() -> f64 {
    window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}

fn dispatch_pointer(x: f64, y: f64) {
    let now = now_ms();
    GAME_STATE.with(|cell| {
        if let Some(state) = cell.borrow_mut().as_mut() {
            pointer_input(state, x, y, now);
        }
    });
}

fn start_game_loop() {
    let f: FrameCallback = std::rc::Rc::new(std::cell::RefCell::new(None));
    let g = f.clone();
    *g.borrow_mut() = Some(Closure::wrap(Box::new(move |ts: f64| {
        GAME_STATE.with(|cell| {
            if let Some(state) = cell.borrow_mut().as_mut() {
                game_tick(state, ts);
            }
        });
        if let Some(w) = window() {
            let _ =
                w.request_animation_frame(f.borrow().as_ref().unwrap().as_ref().unchecked_ref());
        }
    }) as Box<dyn FnMut(f64)>));
    if let Some(w) = window() {
        let _ = w.request_animation_frame(g.borrow().as_ref().unwrap().as_ref().unchecked_ref());
    }
}

// --- Per-frame tick ----------------------------------------------------------

fn game_tick(state: &mut GameState, now: f64) {
    advance_swap(state, now);
    advance_clearing(state);
    maybe_drop(state, now);
    advance_falling(state, now);
    render(state);
    update_score_display(state);
}

/// Step the swap animation; on completion commit the cell exchange and run a
/// match scan with the previously selected jewel as bomb candidate. The swap
/// commits whether or not it produced a match (no revert).
fn advance_swap(state: &mut GameState, now: f64) {
    let Some(anim) = state.swap.as_mut() else {
        return;
    };
    anim.progress += SWAP_STEP;
    let t = anim.progress.min(1.0);
    let (ax, ay, bx, by) = (anim.ax, anim.ay, anim.bx, anim.by);
    let (ia, ib) = (anim.a, anim.b);
    {
        let j = &mut state.jewels[ia];
        j.x = ax + (bx - ax) * t;
        j.y = ay + (by - ay) * t;
    }
    {
        let j = &mut state.jewels[ib];
        j.x = bx + (ax - bx) * t;
        j.y = by + (ay - by) * t;
    }
    if t < 1.0 {
        return;
    }
    state.swap = None;

    let cell = state.jewel_size;
    let (ac, ar) = (state.jewels[ia].col, state.jewels[ia].row);
    let (bc, br) = (state.jewels[ib].col, state.jewels[ib].row);
    for (i, (col, row)) in [(ia, (bc, br)), (ib, (ac, ar))] {
        let j = &mut state.jewels[i];
        j.col = col;
        j.row = row;
        let (cx, cy) = Jewel::center(col, row, cell);
        j.x = cx;
        j.y = cy;
        j.target_y = cy;
        j.state = JewelState::Idle;
    }

    // Bomb candidate is the jewel the player had selected, at its new cell.
    let swapped = (state.jewels[ia].col, state.jewels[ia].row);
    if grid::scan_matches(&mut state.jewels, Some(swapped)) {
        schedule_drop(state, now);
    }
}

/// Fade out clearing jewels; remove them at zero alpha and bank the score.
fn advance_clearing(state: &mut GameState) {
    let mut gained = 0i64;
    state.jewels.retain_mut(|j| {
        if j.state != JewelState::Clearing {
            return true;
        }
        j.alpha -= FADE_STEP;
        if j.alpha <= 0.0 {
            gained += SCORE_PER_JEWEL;
            false
        } else {
            true
        }
    });
    state.score += gained;
}

/// Run the scheduled gravity pass once its delay elapsed and all fades ended.
fn maybe_drop(state: &mut GameState, now: f64) {
    let Some(due) = state.drop_due_ms else {
        return;
    };
    if now < due || state.jewels.iter().any(|j| j.state == JewelState::Clearing) {
        return;
    }
    state.drop_due_ms = None;
    grid::drop_and_refill(&mut state.jewels, state.jewel_size);
    // Nothing had to fall (clears were confined to the top rows): cascade now
    // instead of waiting for a fall that will never finish.
    if !state.jewels.iter().any(|j| j.state == JewelState::Falling)
        && grid::scan_matches(&mut state.jewels, None)
    {
        schedule_drop(state, now);
    }
}

/// Move falling jewels toward their target row; when the last one lands, run
/// the cascade match scan.
fn advance_falling(state: &mut GameState, now: f64) {
    let mut was_falling = false;
    let mut still_falling = false;
    for j in state.jewels.iter_mut() {
        if j.state != JewelState::Falling {
            continue;
        }
        was_falling = true;
        j.y += FALL_SPEED;
        if j.y >= j.target_y {
            j.y = j.target_y;
            j.state = JewelState::Idle;
        } else {
            still_falling = true;
        }
    }
    if was_falling && !still_falling && grid::scan_matches(&mut state.jewels, None) {
        schedule_drop(state, now);
    }
}

fn schedule_drop(state: &mut GameState, now: f64) {
    state.drop_due_ms = Some(now + DROP_DELAY_MS);
}

// --- Rendering ---------------------------------------------------------------

fn render(state: &mut GameState) {
    let ctx = &state.ctx;
    let size = state.jewel_size;
    let half = size / 2.0;
    ctx.clear_rect(
        0.0,
        0.0,
        state.canvas.width() as f64,
        state.canvas.height() as f64,
    );

    for j in &state.jewels {
        ctx.set_global_alpha(if j.state == JewelState::Clearing {
            j.alpha.max(0.0)
        } else {
            1.0
        });
        match j.kind {
            JewelKind::Bomb => {
                ctx.set_fill_style_str("black");
                ctx.begin_path();
                ctx.arc(j.x, j.y, half - 1.0, 0.0, std::f64::consts::TAU).ok();
                ctx.fill();
            }
            JewelKind::Color(c) => {
                ctx.set_fill_style_str(c.css());
                ctx.fill_rect(j.x - half, j.y - half, size - 2.0, size - 2.0);
            }
        }
        if state.selected == Some((j.col, j.row)) && state.swap.is_none() {
            ctx.set_stroke_style_str("white");
            ctx.set_line_width(3.0);
            if j.kind.is_bomb() {
                ctx.begin_path();
                ctx.arc(j.x, j.y, half - 1.0, 0.0, std::f64::consts::TAU).ok();
                ctx.stroke();
            } else {
                ctx.stroke_rect(j.x - half, j.y - half, size - 2.0, size - 2.0);
            }
        }
    }
    ctx.set_global_alpha(1.0);
}

fn update_score_display(state: &GameState) {
    if let Some(doc) = window().and_then(|w| w.document()) {
        if let Some(el) = doc.get_element_by_id("jr-score") {
            el.set_text_content(Some(&format!("Score: {}", state.score)));
        }
    }
}

// --- Input -------------------------------------------------------------------

/// Selection / swap / bomb logic for one pointer event in canvas coordinates.
/// Ignored entirely while any animation is in flight.
fn pointer_input(state: &mut GameState, x: f64, y: f64, now: f64) {
    if state.swap.is_some() || state.drop_due_ms.is_some() || grid::any_animating(&state.jewels) {
        return;
    }
    let half = state.jewel_size / 2.0;
    let Some(hit) = state
        .jewels
        .iter()
        .position(|j| (j.x - x).abs() < half && (j.y - y).abs() < half)
    else {
        return;
    };
    let hit_cell = (state.jewels[hit].col, state.jewels[hit].row);

    // Double-click on a bomb detonates it.
    if state.jewels[hit].kind.is_bomb() {
        if now - state.last_click_ms < DOUBLE_CLICK_MS {
            state.selected = None;
            activate_bomb(state, hit_cell.0, hit_cell.1, now);
            return;
        }
        state.last_click_ms = now;
    }

    match state.selected {
        None => state.selected = Some(hit_cell),
        Some(sel) if sel != hit_cell && grid::are_neighbors(sel, hit_cell) => {
            state.selected = None;
            let Some(sel_idx) = state.jewels.iter().position(|j| (j.col, j.row) == sel) else {
                return;
            };
            if state.jewels[sel_idx].kind.is_bomb() {
                // Clicking next to a selected bomb also detonates it.
                activate_bomb(state, sel.0, sel.1, now);
            } else {
                start_swap(state, sel_idx, hit);
            }
        }
        Some(_) => state.selected = None,
    }
}

fn start_swap(state: &mut GameState, a: usize, b: usize) {
    let (ax, ay) = (state.jewels[a].x, state.jewels[a].y);
    let (bx, by) = (state.jewels[b].x, state.jewels[b].y);
    state.jewels[a].state = JewelState::Swapping;
    state.jewels[b].state = JewelState::Swapping;
    state.swap = Some(SwapAnim {
        a,
        b,
        progress: 0.0,
        ax,
        ay,
        bx,
        by,
    });
}

fn activate_bomb(state: &mut GameState, col: u8, row: u8, now: f64) {
    if grid::blast(&mut state.jewels, col, row) > 0 {
        schedule_drop(state, now);
    }
}
