//! Gesture router state machine

use std::time::Duration;

use crossterm::event::KeyEvent;
use log::debug;
use serde::{Deserialize, Serialize};

use super::GestureConfig;
use super::keys::{self, PageTurn};
use super::popup::{PopupAnchor, place_popup};
use super::zone::{Zone, classify};
use crate::clock::Timestamp;
use crate::engine::{Point, Surface};

/// Coordinate space an input point is expressed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputOrigin {
    /// Inner rendering frame, frame-local coordinates
    #[default]
    Frame,
    /// Outer reading surface
    Surface,
}

/// Raw input delivered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GestureInput {
    PointerDown {
        point: Point,
        #[serde(default)]
        origin: InputOrigin,
    },
    PointerUp {
        point: Point,
        #[serde(default)]
        origin: InputOrigin,
    },
    Click {
        point: Point,
        #[serde(default)]
        origin: InputOrigin,
    },
    TouchStart {
        point: Point,
        #[serde(default)]
        origin: InputOrigin,
    },
    TouchMove {
        point: Point,
        #[serde(default)]
        origin: InputOrigin,
    },
    TouchEnd {
        point: Point,
        #[serde(default)]
        origin: InputOrigin,
    },
    SelectionChanged,
    Key {
        #[serde(with = "keys::serde_key")]
        key: KeyEvent,
    },
    /// A task previously returned in [`RouterOutput::Schedule`] became due
    #[serde(skip)]
    Timer(RouterTask),
}

/// Delayed work owned by the router. Generations make stale tasks no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouterTask {
    CommitClick { generation: u64 },
    HoldElapsed { generation: u64 },
    SelectionDebounce { generation: u64 },
    SelectionSettled { generation: u64 },
    HandleSelection { generation: u64 },
}

/// A completed text selection ready for the annotation popup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionDetail {
    pub text: String,
    pub position_id: String,
    pub section_index: usize,
    pub anchor: PopupAnchor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GestureEvent {
    Previous,
    Next,
    MenuTap { point: Point },
    TextSelected(SelectionDetail),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouterOutput {
    Emit(GestureEvent),
    Schedule { after: Duration, task: RouterTask },
    Cancel(RouterTask),
    /// Suppress the platform's default handling of the current input
    PreventDefault,
}

#[derive(Debug, Clone, Copy)]
struct PendingClick {
    generation: u64,
    zone: Zone,
    point: Point,
    at: Timestamp,
    armed: bool,
}

#[derive(Debug, Clone, Copy)]
struct TouchTrack {
    start: Point,
    started_at: Timestamp,
}

#[derive(Debug)]
pub struct GestureRouter {
    config: GestureConfig,

    last_click: Option<(Timestamp, Zone)>,
    pending_click: Option<PendingClick>,
    click_generation: u64,

    /// Cleared when a press is held past the long-press threshold
    tap_armed: bool,
    press_started: Option<Timestamp>,
    press_generation: u64,

    navigation_locked_until: Option<Timestamp>,

    touch: Option<TouchTrack>,
    last_touch_end: Option<Timestamp>,
    text_selecting: bool,

    debounce_generation: u64,
    selection_generation: u64,
}

impl Default for GestureRouter {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

impl GestureRouter {
    #[must_use]
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            last_click: None,
            pending_click: None,
            click_generation: 0,
            tap_armed: false,
            press_started: None,
            press_generation: 0,
            navigation_locked_until: None,
            touch: None,
            last_touch_end: None,
            text_selecting: false,
            debounce_generation: 0,
            selection_generation: 0,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// True while a text selection gesture is being tracked on touch.
    pub fn is_text_selection_in_progress(&self) -> bool {
        self.text_selecting
    }

    /// Reduce one input to its outputs.
    #[must_use]
    pub fn handle(
        &mut self,
        input: GestureInput,
        now: Timestamp,
        surface: &dyn Surface,
    ) -> Vec<RouterOutput> {
        let mut out = Vec::new();

        match input {
            GestureInput::PointerDown { .. } => self.arm_press(now, &mut out),
            GestureInput::PointerUp { .. } => self.request_selection_handling(&mut out),
            GestureInput::Click { point, origin } => {
                if self.is_synthetic_click(now) {
                    debug!("Click {}ms after touch end suppressed", self.since_touch_end(now));
                } else {
                    let point = to_outer(point, origin, surface);
                    self.classify_click(point, now, surface, &mut out);
                }
            }
            GestureInput::TouchStart { point, origin } => {
                self.touch = Some(TouchTrack {
                    start: to_outer(point, origin, surface),
                    started_at: now,
                });
                self.text_selecting = false;
                self.arm_press(now, &mut out);
            }
            GestureInput::TouchMove { .. } => {
                if surface.has_live_selection() {
                    self.text_selecting = true;
                    out.push(RouterOutput::PreventDefault);
                }
            }
            GestureInput::TouchEnd { point, origin } => {
                let point = to_outer(point, origin, surface);
                self.touch_end(point, now, surface, &mut out);
            }
            GestureInput::SelectionChanged => self.debounce_selection(&mut out),
            GestureInput::Key { key } => {
                if surface.focus_in_editable() {
                    return out;
                }
                if let Some(turn) = keys::page_turn_for(&key) {
                    self.navigate(turn, now, &mut out);
                }
            }
            GestureInput::Timer(task) => self.fire(task, now, surface, &mut out),
        }

        out
    }

    fn arm_press(&mut self, now: Timestamp, out: &mut Vec<RouterOutput>) {
        self.press_generation += 1;
        self.tap_armed = true;
        self.press_started = Some(now);
        out.push(RouterOutput::Schedule {
            after: self.config.long_press(),
            task: RouterTask::HoldElapsed {
                generation: self.press_generation,
            },
        });
    }

    fn tap_is_armed(&self, now: Timestamp) -> bool {
        self.tap_armed
            && self
                .press_started
                .is_some_and(|t| now.since(t) < self.config.long_press())
    }

    fn since_touch_end(&self, now: Timestamp) -> u64 {
        self.last_touch_end
            .map_or(u64::MAX, |t| now.as_millis().saturating_sub(t.as_millis()))
    }

    fn is_synthetic_click(&self, now: Timestamp) -> bool {
        self.last_touch_end
            .is_some_and(|t| now.since(t) < self.config.synthetic_click())
    }

    fn classify_click(
        &mut self,
        point: Point,
        now: Timestamp,
        surface: &dyn Surface,
        out: &mut Vec<RouterOutput>,
    ) {
        let armed = self.tap_is_armed(now);
        self.tap_armed = false;

        if surface.has_live_selection() {
            debug!("Click ends a text selection, not a tap");
            return;
        }

        let zone = classify(point.x, surface.viewport().width, &self.config);

        if let Some((at, last_zone)) = self.last_click {
            if last_zone == zone && now.since(at) < self.config.double_tap() {
                debug!("Double tap in {zone:?} zone ignored");
                if let Some(pending) = self.pending_click.take() {
                    out.push(RouterOutput::Cancel(RouterTask::CommitClick {
                        generation: pending.generation,
                    }));
                }
                self.last_click = None;
                return;
            }
        }

        self.last_click = Some((now, zone));

        if let Some(pending) = self.pending_click.take() {
            debug!("Pending {:?} click superseded by {zone:?}", pending.zone);
            out.push(RouterOutput::Cancel(RouterTask::CommitClick {
                generation: pending.generation,
            }));
        }

        self.click_generation += 1;
        self.pending_click = Some(PendingClick {
            generation: self.click_generation,
            zone,
            point,
            at: now,
            armed,
        });
        out.push(RouterOutput::Schedule {
            after: self.config.double_tap(),
            task: RouterTask::CommitClick {
                generation: self.click_generation,
            },
        });
    }

    fn commit_click(&mut self, generation: u64, now: Timestamp, out: &mut Vec<RouterOutput>) {
        let Some(pending) = self.pending_click else {
            return;
        };
        if pending.generation != generation {
            return;
        }

        let elapsed = now.since(pending.at);
        let window = self.config.double_tap();
        if elapsed < window {
            out.push(RouterOutput::Schedule {
                after: window - elapsed,
                task: RouterTask::CommitClick { generation },
            });
            return;
        }

        self.pending_click = None;

        if !pending.armed {
            debug!("{:?} click without an armed tap discarded", pending.zone);
            return;
        }

        match pending.zone {
            Zone::Left => self.navigate(PageTurn::Previous, now, out),
            Zone::Right => self.navigate(PageTurn::Next, now, out),
            Zone::Middle => out.push(RouterOutput::Emit(GestureEvent::MenuTap {
                point: pending.point,
            })),
        }
    }

    fn navigate(&mut self, turn: PageTurn, now: Timestamp, out: &mut Vec<RouterOutput>) {
        if let Some(until) = self.navigation_locked_until {
            if now < until {
                debug!("Navigation {turn:?} dropped, lock held");
                return;
            }
        }
        self.navigation_locked_until = Some(now + self.config.navigation_lock());

        debug!("Navigate {turn:?}");
        out.push(RouterOutput::Emit(match turn {
            PageTurn::Previous => GestureEvent::Previous,
            PageTurn::Next => GestureEvent::Next,
        }));
    }

    fn touch_end(
        &mut self,
        point: Point,
        now: Timestamp,
        surface: &dyn Surface,
        out: &mut Vec<RouterOutput>,
    ) {
        self.last_touch_end = Some(now);
        let track = self.touch.take();
        let selecting = std::mem::take(&mut self.text_selecting);

        if selecting || surface.has_live_selection() {
            self.tap_armed = false;
            out.push(RouterOutput::PreventDefault);
            self.selection_generation += 1;
            out.push(RouterOutput::Schedule {
                after: Duration::from_millis(self.config.selection_settle_ms),
                task: RouterTask::SelectionSettled {
                    generation: self.selection_generation,
                },
            });
            return;
        }

        let Some(track) = track else {
            self.tap_armed = false;
            return;
        };

        let dx = point.x - track.start.x;
        let dy = point.y - track.start.y;

        if dx.abs() > self.config.swipe_threshold_px && dx.abs() > dy.abs() {
            self.tap_armed = false;
            let turn = if dx < 0.0 {
                PageTurn::Next
            } else {
                PageTurn::Previous
            };
            debug!("Swipe dx={dx:.0} -> {turn:?}");
            self.navigate(turn, now, out);
            return;
        }

        let still = dx.abs() < self.config.tap_slop_px && dy.abs() < self.config.tap_slop_px;
        if still && now.since(track.started_at) < self.config.long_press() {
            self.classify_click(point, now, surface, out);
        } else {
            self.tap_armed = false;
        }
    }

    fn debounce_selection(&mut self, out: &mut Vec<RouterOutput>) {
        if self.debounce_generation > 0 {
            out.push(RouterOutput::Cancel(RouterTask::SelectionDebounce {
                generation: self.debounce_generation,
            }));
        }
        self.debounce_generation += 1;
        out.push(RouterOutput::Schedule {
            after: Duration::from_millis(self.config.selection_debounce_ms),
            task: RouterTask::SelectionDebounce {
                generation: self.debounce_generation,
            },
        });
    }

    fn request_selection_handling(&mut self, out: &mut Vec<RouterOutput>) {
        self.selection_generation += 1;
        out.push(RouterOutput::Schedule {
            after: Duration::from_millis(self.config.selection_defer_ms),
            task: RouterTask::HandleSelection {
                generation: self.selection_generation,
            },
        });
    }

    fn handle_selection(&mut self, surface: &dyn Surface, out: &mut Vec<RouterOutput>) {
        let Some(selection) = surface.selection().filter(|s| !s.is_collapsed()) else {
            return;
        };

        let rect = surface.frame_rect().rect_to_outer(selection.rect);
        let anchor = place_popup(
            rect,
            surface.viewport(),
            self.config.popup_width,
            self.config.popup_min_room_above,
        );

        if let Some(pending) = self.pending_click.take() {
            out.push(RouterOutput::Cancel(RouterTask::CommitClick {
                generation: pending.generation,
            }));
        }

        debug!(
            "Text selected at {} ({} chars)",
            selection.position_id,
            selection.text.chars().count()
        );
        out.push(RouterOutput::Emit(GestureEvent::TextSelected(SelectionDetail {
            text: selection.text,
            position_id: selection.position_id,
            section_index: selection.section_index,
            anchor,
        })));
    }

    fn fire(
        &mut self,
        task: RouterTask,
        now: Timestamp,
        surface: &dyn Surface,
        out: &mut Vec<RouterOutput>,
    ) {
        match task {
            RouterTask::CommitClick { generation } => self.commit_click(generation, now, out),
            RouterTask::HoldElapsed { generation } => {
                if generation == self.press_generation {
                    self.tap_armed = false;
                }
            }
            RouterTask::SelectionDebounce { generation } => {
                if generation == self.debounce_generation
                    && surface.is_touch_capable()
                    && surface.has_live_selection()
                {
                    self.request_selection_handling(out);
                }
            }
            RouterTask::SelectionSettled { generation } => {
                if generation == self.selection_generation {
                    self.request_selection_handling(out);
                }
            }
            RouterTask::HandleSelection { generation } => {
                if generation == self.selection_generation {
                    self.handle_selection(surface, out);
                }
            }
        }
    }
}

fn to_outer(point: Point, origin: InputOrigin, surface: &dyn Surface) -> Point {
    match origin {
        InputOrigin::Frame => surface.frame_rect().to_outer(point),
        InputOrigin::Surface => point,
    }
}
