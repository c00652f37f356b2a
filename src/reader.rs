//! Interaction loop
//!
//! [`Reader`] owns the gesture router, its timers, the selection session,
//! the chrome visibility machine and the toasts, and wires them to the
//! rendering engine and the annotation store. Hosts feed it raw input,
//! engine events and UI commands together with the current [`Timestamp`],
//! and drain [`ReaderEvent`]s from its outbox.

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::annotation::{Annotation, AnnotationPatch, AnnotationStyle, Bookmark, Color};
use crate::clock::{Scheduler, Timestamp};
use crate::engine::{EngineEvent, RenderingEngine};
use crate::gesture::{
    GestureConfig, GestureEvent, GestureInput, GestureRouter, RouterOutput, RouterTask,
};
use crate::notification::{Notification, NotificationLevel, NotificationManager};
use crate::session::{SelectionPrompt, SelectionSession, SessionError};
use crate::store::{AnnotationStore, StoreError};
use crate::visibility::{ChromeConfig, ChromeState, ChromeVisibility, Edge};

/// UI-level commands: popup buttons, bookmark actions and chrome input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReaderCommand {
    Preview {
        color: Color,
        #[serde(default)]
        style: AnnotationStyle,
    },
    ChangeColor {
        color: Color,
    },
    ChangeStyle {
        style: AnnotationStyle,
    },
    Commit {
        #[serde(default)]
        note: Option<String>,
    },
    Dismiss,
    DeleteOverlapping,
    UpdateAnnotation {
        id: String,
        patch: AnnotationPatch,
    },
    AddBookmark {
        #[serde(default)]
        label: Option<String>,
    },
    DeleteBookmark {
        id: String,
    },
    GoTo {
        target: String,
    },
    PointerY {
        y: f32,
    },
    PointerLeft,
    ZoneEntered {
        edge: Edge,
    },
    TogglePinned,
    ViewportHeight {
        height: f32,
    },
}

/// Everything observable that the reader did, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReaderEvent {
    Gesture { gesture: GestureEvent },
    Prompt { prompt: SelectionPrompt },
    Annotated { annotation: Annotation },
    AnnotationUpdated { annotation: Annotation },
    AnnotationDeleted { id: String },
    Bookmarked { bookmark: Bookmark },
    BookmarkDeleted { id: String },
    Chrome { state: ChromeState },
    Toast { notification: Notification },
}

pub struct Reader<E, S> {
    engine: E,
    store: S,
    router: GestureRouter,
    timers: Scheduler<RouterTask>,
    session: SelectionSession,
    chrome: ChromeVisibility,
    notifications: NotificationManager,
    position: Option<String>,
    outbox: Vec<ReaderEvent>,
    now: Timestamp,
}

impl<E: RenderingEngine, S: AnnotationStore> Reader<E, S> {
    pub fn new(
        book_id: &str,
        engine: E,
        store: S,
        gestures: GestureConfig,
        chrome: ChromeConfig,
    ) -> Self {
        let viewport_height = engine.viewport().height;
        Self {
            engine,
            store,
            router: GestureRouter::new(gestures),
            timers: Scheduler::new(),
            session: SelectionSession::new(book_id),
            chrome: ChromeVisibility::new(chrome, viewport_height),
            notifications: NotificationManager::new(),
            position: None,
            outbox: Vec::new(),
            now: Timestamp::default(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn session(&self) -> &SelectionSession {
        &self.session
    }

    pub fn chrome(&self) -> ChromeState {
        self.chrome.state()
    }

    /// Register the header/footer visibility listener.
    pub fn set_chrome_listener(&mut self, listener: impl FnMut(bool, bool) + 'static) {
        self.chrome.set_listener(listener);
    }

    pub fn notifications(&self) -> &NotificationManager {
        &self.notifications
    }

    pub fn router(&self) -> &GestureRouter {
        &self.router
    }

    /// Earliest pending timer, for hosts that sleep between inputs.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timers.next_deadline()
    }

    pub fn take_events(&mut self) -> Vec<ReaderEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Load the book's annotations into the session mirror.
    pub fn open(&mut self) -> bool {
        let book_id = self.session.book_id().to_string();
        match self.session.load(&mut self.store, &book_id) {
            Ok(_) => true,
            Err(err) => {
                self.report(&err);
                false
            }
        }
    }

    /// Run every timer due at or before `now`, in deadline order.
    pub fn advance(&mut self, now: Timestamp) {
        while let Some(deadline) = self.timers.next_deadline() {
            if deadline > now {
                break;
            }
            for (at, task) in self.timers.pop_due(deadline) {
                self.now = at;
                let outputs = self.router.handle(GestureInput::Timer(task), at, &self.engine);
                self.apply_outputs(outputs, at);
            }
        }
        self.now = self.now.max(now);
        self.notifications.update(self.now);
    }

    /// Run timers until none are left. Returns the time of the last one.
    pub fn settle(&mut self) -> Timestamp {
        while let Some(deadline) = self.timers.next_deadline() {
            self.advance(deadline);
        }
        self.now
    }

    /// Feed one raw input. Returns true when the host should suppress the
    /// platform's default handling of it.
    pub fn handle_input(&mut self, input: GestureInput, now: Timestamp) -> bool {
        self.advance(now);
        let outputs = self.router.handle(input, now, &self.engine);
        self.apply_outputs(outputs, now)
    }

    pub fn handle_engine_event(&mut self, event: EngineEvent, now: Timestamp) {
        self.advance(now);
        match event {
            EngineEvent::Loaded { section_index } => {
                let rendered = self.session.render_all(&mut self.engine);
                debug!("Section {section_index} loaded, re-rendered {rendered} annotations");
            }
            EngineEvent::Relocated {
                position_id,
                fraction,
                section_index,
            } => {
                debug!("Relocated to {position_id} (section {section_index}, {fraction:.3})");
                let book_id = self.session.book_id().to_string();
                if let Err(err) = self.store.save_progress(&book_id, &position_id, fraction) {
                    warn!("Failed to save reading progress: {err}");
                }
                self.position = Some(position_id);
            }
        }
    }

    pub fn command(&mut self, command: ReaderCommand, now: Timestamp) {
        self.advance(now);
        if let Err(err) = self.run_command(command) {
            self.report(&err);
        }
    }

    fn run_command(&mut self, command: ReaderCommand) -> Result<(), SessionError> {
        let engine = &mut self.engine;
        match command {
            ReaderCommand::Preview { color, style } => self.session.preview(color, style, engine)?,
            ReaderCommand::ChangeColor { color } => self.session.change_color(color, engine)?,
            ReaderCommand::ChangeStyle { style } => self.session.change_style(style, engine)?,
            ReaderCommand::Commit { note } => {
                let annotation = self.session.commit(&mut self.store, engine, note)?;
                self.outbox.push(ReaderEvent::Annotated { annotation });
            }
            ReaderCommand::Dismiss => self.session.dismiss(engine),
            ReaderCommand::DeleteOverlapping => {
                let removed = self.session.delete_overlapping(&mut self.store, engine)?;
                self.outbox.push(ReaderEvent::AnnotationDeleted { id: removed.id });
            }
            ReaderCommand::UpdateAnnotation { id, patch } => {
                let annotation = self.session.update(&mut self.store, engine, &id, &patch)?;
                self.outbox.push(ReaderEvent::AnnotationUpdated { annotation });
            }
            ReaderCommand::AddBookmark { label } => self.add_bookmark(label)?,
            ReaderCommand::DeleteBookmark { id } => {
                self.store.delete_bookmark(&id)?;
                info!("Deleted bookmark {id}");
                self.outbox.push(ReaderEvent::BookmarkDeleted { id });
            }
            ReaderCommand::GoTo { target } => {
                self.session.dismiss(engine);
                engine.go_to(&target)?;
            }
            ReaderCommand::PointerY { y } => {
                let change = self.chrome.on_pointer_y(y);
                self.chrome_changed(change);
            }
            ReaderCommand::PointerLeft => {
                let change = self.chrome.pointer_left();
                self.chrome_changed(change);
            }
            ReaderCommand::ZoneEntered { edge } => {
                let change = self.chrome.zone_entered(edge);
                self.chrome_changed(change);
            }
            ReaderCommand::TogglePinned => {
                let change = self.chrome.toggle_pinned();
                self.chrome_changed(change);
            }
            ReaderCommand::ViewportHeight { height } => {
                let change = self.chrome.set_viewport_height(height);
                self.chrome_changed(change);
            }
        }
        Ok(())
    }

    fn add_bookmark(&mut self, label: Option<String>) -> Result<(), SessionError> {
        let Some(position_id) = self.position.clone() else {
            debug!("No reading position yet, bookmark ignored");
            return Ok(());
        };
        let book_id = self.session.book_id().to_string();
        let bookmark = self.store.create_bookmark(&book_id, &position_id, label)?;
        info!("Bookmarked {position_id}");
        self.outbox.push(ReaderEvent::Bookmarked { bookmark });
        Ok(())
    }

    fn apply_outputs(&mut self, outputs: Vec<RouterOutput>, now: Timestamp) -> bool {
        let mut prevented = false;
        for output in outputs {
            match output {
                RouterOutput::Emit(gesture) => self.dispatch(gesture),
                RouterOutput::Schedule { after, task } => {
                    self.timers.schedule(now, after, task);
                }
                RouterOutput::Cancel(task) => {
                    self.timers.cancel_where(|t| *t == task);
                }
                RouterOutput::PreventDefault => prevented = true,
            }
        }
        prevented
    }

    fn dispatch(&mut self, gesture: GestureEvent) {
        match &gesture {
            GestureEvent::Previous => self.engine.prev(),
            GestureEvent::Next => self.engine.next(),
            GestureEvent::MenuTap { .. } => {}
            GestureEvent::TextSelected(detail) => {
                let prompt = self.session.select(detail.clone(), &mut self.engine);
                self.outbox.push(ReaderEvent::Gesture { gesture });
                self.outbox.push(ReaderEvent::Prompt { prompt });
                return;
            }
        }
        self.outbox.push(ReaderEvent::Gesture { gesture });
    }

    fn chrome_changed(&mut self, change: Option<ChromeState>) {
        if let Some(state) = change {
            self.outbox.push(ReaderEvent::Chrome { state });
        }
    }

    fn report(&mut self, err: &SessionError) {
        let (level, message) = match err {
            SessionError::Store(StoreError::Conflict { .. }) => {
                (NotificationLevel::Warning, "Already saved at this position".to_string())
            }
            SessionError::Store(err) => {
                error!("Store request failed: {err}");
                (NotificationLevel::Error, format!("Could not save changes: {err}"))
            }
            SessionError::Engine(err) => {
                warn!("Rendering engine rejected a command: {err}");
                return;
            }
            other => {
                debug!("Ignored command: {other}");
                return;
            }
        };
        let notification = self.notifications.notify(message, level, self.now).clone();
        self.outbox.push(ReaderEvent::Toast { notification });
    }
}
