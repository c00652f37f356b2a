use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::annotation::Annotation;
use crate::clock::Timestamp;
use crate::engine::EngineEvent;
use crate::gesture::GestureInput;
use crate::reader::ReaderCommand;
use crate::replay::{SurfaceChange, SurfaceState};

/// Trait for abstracting input sources to enable replay and testing
pub trait InputSource {
    /// Time of the next step, without consuming it
    fn peek(&self) -> Option<Timestamp>;

    /// Take the next step
    fn read(&mut self) -> Option<ScriptStep>;
}

/// What happens at one step of a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptAction {
    Input(GestureInput),
    Surface(SurfaceChange),
    Engine(EngineEvent),
    Command(ReaderCommand),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStep {
    /// Milliseconds since the start of the script
    pub at: u64,
    #[serde(flatten)]
    pub action: ScriptAction,
}

/// A recorded reading session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default = "default_book_id")]
    pub book_id: String,
    #[serde(default)]
    pub surface: SurfaceState,
    /// Annotations already in the store when the book opens
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    pub steps: Vec<ScriptStep>,
}

fn default_book_id() -> String {
    "book".to_string()
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse replay script")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("In {}", path.display()))
    }
}

/// Steps replayed in time order; steps sharing a time keep script order.
pub struct ScriptedInputSource {
    steps: Vec<ScriptStep>,
    current_index: usize,
}

impl ScriptedInputSource {
    pub fn new(mut steps: Vec<ScriptStep>) -> Self {
        steps.sort_by_key(|s| s.at);
        Self {
            steps,
            current_index: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.steps.len() - self.current_index
    }
}

impl InputSource for ScriptedInputSource {
    fn peek(&self) -> Option<Timestamp> {
        self.steps.get(self.current_index).map(|s| Timestamp(s.at))
    }

    fn read(&mut self) -> Option<ScriptStep> {
        let step = self.steps.get(self.current_index).cloned()?;
        self.current_index += 1;
        Some(step)
    }
}
