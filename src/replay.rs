//! Scripted rendering engine and replay driver.
//!
//! [`ScriptedEngine`] stands in for the book renderer: its surface state
//! (selection, frame, viewport) is set by the script and every command sent
//! to it is recorded. [`run`] pushes a [`Script`] through a [`Reader`].

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::annotation::{AnnotationStyle, Color};
use crate::clock::Timestamp;
use crate::engine::{EngineError, LiveSelection, Overlay, Rect, RenderingEngine, Size, Surface};
use crate::event_source::{InputSource, Script, ScriptAction, ScriptedInputSource};
use crate::reader::{Reader, ReaderEvent};
use crate::settings::Settings;
use crate::store::MemoryAnnotationStore;

/// Renderer-side state the script controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceState {
    pub selection: Option<LiveSelection>,
    pub frame: Rect,
    pub viewport: Size,
    pub touch: bool,
    pub editable_focus: bool,
}

impl Default for SurfaceState {
    fn default() -> Self {
        Self {
            selection: None,
            frame: Rect::new(0.0, 0.0, 1000.0, 800.0),
            viewport: Size::new(1000.0, 800.0),
            touch: false,
            editable_focus: false,
        }
    }
}

/// One change to [`SurfaceState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceChange {
    Selection(Option<LiveSelection>),
    Frame(Rect),
    Viewport(Size),
    Touch(bool),
    EditableFocus(bool),
}

/// A command the renderer received.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EngineCommand {
    AddAnnotation {
        position_id: String,
        color: Color,
        style: AnnotationStyle,
    },
    DeleteAnnotation {
        position_id: String,
    },
    ClearSelection,
    Next,
    Prev,
    GoTo {
        target: String,
    },
}

#[derive(Debug, Default)]
pub struct ScriptedEngine {
    surface: SurfaceState,
    overlays: Vec<Overlay>,
    commands: Vec<EngineCommand>,
}

impl ScriptedEngine {
    pub fn new(surface: SurfaceState) -> Self {
        Self {
            surface,
            ..Self::default()
        }
    }

    pub fn surface(&self) -> &SurfaceState {
        &self.surface
    }

    pub fn set_selection(&mut self, selection: Option<LiveSelection>) {
        self.surface.selection = selection;
    }

    pub fn apply(&mut self, change: SurfaceChange) {
        match change {
            SurfaceChange::Selection(selection) => self.surface.selection = selection,
            SurfaceChange::Frame(frame) => self.surface.frame = frame,
            SurfaceChange::Viewport(viewport) => self.surface.viewport = viewport,
            SurfaceChange::Touch(touch) => self.surface.touch = touch,
            SurfaceChange::EditableFocus(focus) => self.surface.editable_focus = focus,
        }
    }

    /// Overlays currently drawn, in the order they were added.
    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn commands(&self) -> &[EngineCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<EngineCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl Surface for ScriptedEngine {
    fn selection(&self) -> Option<LiveSelection> {
        self.surface.selection.clone()
    }

    fn frame_rect(&self) -> Rect {
        self.surface.frame
    }

    fn viewport(&self) -> Size {
        self.surface.viewport
    }

    fn is_touch_capable(&self) -> bool {
        self.surface.touch
    }

    fn focus_in_editable(&self) -> bool {
        self.surface.editable_focus
    }
}

impl RenderingEngine for ScriptedEngine {
    fn add_annotation(&mut self, overlay: &Overlay) -> Result<(), EngineError> {
        self.commands.push(EngineCommand::AddAnnotation {
            position_id: overlay.position_id.clone(),
            color: overlay.color.clone(),
            style: overlay.style,
        });
        // The renderer keys overlays by position, adding again replaces.
        self.overlays.retain(|o| o.position_id != overlay.position_id);
        self.overlays.push(overlay.clone());
        Ok(())
    }

    fn delete_annotation(&mut self, position_id: &str) -> Result<(), EngineError> {
        self.commands.push(EngineCommand::DeleteAnnotation {
            position_id: position_id.to_string(),
        });
        let before = self.overlays.len();
        self.overlays.retain(|o| o.position_id != position_id);
        if self.overlays.len() == before {
            return Err(EngineError::Overlay(position_id.to_string()));
        }
        Ok(())
    }

    fn clear_selection(&mut self) {
        self.commands.push(EngineCommand::ClearSelection);
        self.surface.selection = None;
    }

    fn next(&mut self) {
        self.commands.push(EngineCommand::Next);
    }

    fn prev(&mut self) {
        self.commands.push(EngineCommand::Prev);
    }

    fn go_to(&mut self, target: &str) -> Result<(), EngineError> {
        if target.trim().is_empty() {
            return Err(EngineError::UnknownTarget(target.to_string()));
        }
        self.commands.push(EngineCommand::GoTo {
            target: target.to_string(),
        });
        Ok(())
    }
}

/// Outcome of a replay.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub events: Vec<ReaderEvent>,
    pub commands: Vec<EngineCommand>,
    pub annotations: usize,
    pub finished_at: Timestamp,
}

/// Drive a reader through `script` with the scripted engine and an
/// in-memory store seeded from the script.
pub fn run(script: Script, settings: &Settings) -> ReplayReport {
    let Script {
        book_id,
        surface,
        annotations,
        steps,
    } = script;

    let engine = ScriptedEngine::new(surface);
    let store = MemoryAnnotationStore::with_annotations(annotations);
    let mut reader = Reader::new(
        &book_id,
        engine,
        store,
        settings.gestures.clone(),
        settings.chrome.clone(),
    );
    reader.open();

    let mut source = ScriptedInputSource::new(steps);
    let mut events = Vec::new();
    while let Some(step) = source.read() {
        let now = Timestamp(step.at);
        debug!("Replay step at {now:?}: {:?}", step.action);
        match step.action {
            ScriptAction::Input(input) => {
                reader.handle_input(input, now);
            }
            ScriptAction::Surface(change) => {
                reader.advance(now);
                reader.engine_mut().apply(change);
            }
            ScriptAction::Engine(event) => reader.handle_engine_event(event, now),
            ScriptAction::Command(command) => reader.command(command, now),
        }
        events.extend(reader.take_events());
    }
    let finished_at = reader.settle();
    events.extend(reader.take_events());

    let annotations = reader.session().mirror().len();
    let commands = reader.engine_mut().take_commands();
    info!(
        "Replay finished at {}ms: {} events, {} engine commands",
        finished_at.as_millis(),
        events.len(),
        commands.len()
    );

    ReplayReport {
        events,
        commands,
        annotations,
        finished_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::GestureEvent;

    #[test]
    fn engine_records_and_replaces_overlays() {
        let mut engine = ScriptedEngine::default();
        let overlay = Overlay {
            position_id: "epubcfi(/1:0)".to_string(),
            color: Color::default(),
            style: AnnotationStyle::Highlight,
        };
        engine.add_annotation(&overlay).unwrap();
        engine.add_annotation(&overlay).unwrap();
        assert_eq!(engine.overlays().len(), 1);

        engine.delete_annotation("epubcfi(/1:0)").unwrap();
        assert!(engine.delete_annotation("epubcfi(/1:0)").is_err());
        assert_eq!(engine.commands().len(), 4);
    }

    #[test]
    fn surface_changes_apply() {
        let mut engine = ScriptedEngine::default();
        engine.apply(SurfaceChange::Touch(true));
        engine.apply(SurfaceChange::Viewport(Size::new(400.0, 700.0)));
        assert!(engine.is_touch_capable());
        assert_eq!(engine.viewport().width, 400.0);
    }

    #[test]
    fn replays_a_right_click() {
        let script: Script = serde_json::from_str(
            r#"{
                "book_id": "book",
                "steps": [
                    {"at": 0, "input": {"type": "pointer_down", "point": {"x": 900.0, "y": 300.0}}},
                    {"at": 60, "input": {"type": "click", "point": {"x": 900.0, "y": 300.0}}}
                ]
            }"#,
        )
        .unwrap();

        let report = run(script, &Settings::default());
        assert_eq!(report.commands, vec![EngineCommand::Next]);
        assert_eq!(
            report.events,
            vec![ReaderEvent::Gesture {
                gesture: GestureEvent::Next
            }]
        );
        assert!(report.finished_at >= Timestamp(360));
    }
}
