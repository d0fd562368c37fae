//! Game window discovery through the compositor's IPC CLI.
//!
//! Two compositors are supported, chosen once at startup. Both shell out to
//! the compositor's own client (`hyprctl`, `swaymsg`) and parse its JSON.

use crate::collaborators::WindowProbe;
use crate::{Result, TradelogError};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;
use std::process::Command;
use std::sync::Arc;
use tradelog_types::{WindowHandle, WindowStatus};
use tracing::{debug, trace};

/// Supported window managers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compositor {
    #[default]
    Hyprland,
    Sway,
}

impl Compositor {
    /// Build the probe for this compositor.
    pub fn probe(self, class_hints: Vec<String>) -> Arc<dyn WindowProbe> {
        match self {
            Compositor::Hyprland => Arc::new(HyprlandProbe::new(class_hints)),
            Compositor::Sway => Arc::new(SwayProbe::new(class_hints)),
        }
    }
}

impl std::str::FromStr for Compositor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hyprland" => Ok(Compositor::Hyprland),
            "sway" => Ok(Compositor::Sway),
            _ => Err(format!("Unknown compositor: '{}'. Use 'hyprland' or 'sway'.", s)),
        }
    }
}

/// Turns raw found/not-found polls into lifecycle transitions.
#[derive(Debug, Clone, Default)]
pub struct WindowTracker {
    status: Option<WindowStatus>,
}

impl WindowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one poll. `became_active_at` only moves on an absent-to-present edge.
    pub fn observe(&mut self, found: bool, now: NaiveDateTime) -> WindowStatus {
        let previous = self.status.unwrap_or(WindowStatus {
            active: false,
            became_active_at: None,
        });
        let status = match (previous.active, found) {
            (false, true) => WindowStatus {
                active: true,
                became_active_at: Some(now),
            },
            (_, active) => WindowStatus {
                active,
                became_active_at: previous.became_active_at,
            },
        };
        self.status = Some(status);
        status
    }

    pub fn status(&self) -> Option<WindowStatus> {
        self.status
    }
}

fn matches_hint(value: &str, hints: &[String]) -> bool {
    let value = value.to_lowercase();
    !value.is_empty() && hints.iter().any(|h| value.contains(&h.to_lowercase()))
}

fn run(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program).args(args).output().map_err(|e| {
        TradelogError::Collaborator(format!("failed to spawn {}: {}", program, e))
    })?;

    if !output.status.success() {
        return Err(TradelogError::Collaborator(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[derive(Debug, Deserialize)]
struct HyprlandClient {
    address: String,
    #[serde(default)]
    class: String,
    #[serde(default, rename = "initialClass")]
    initial_class: String,
    #[serde(default)]
    title: String,
}

/// Pick the first Hyprland client whose class or title matches a hint.
pub fn find_hyprland_client(json: &str, hints: &[String]) -> Result<Option<WindowHandle>> {
    let clients: Vec<HyprlandClient> = serde_json::from_str(json)?;
    Ok(clients
        .into_iter()
        .find(|c| {
            matches_hint(&c.class, hints)
                || matches_hint(&c.initial_class, hints)
                || matches_hint(&c.title, hints)
        })
        .map(|c| WindowHandle(c.address)))
}

/// Hyprland via `hyprctl`.
#[derive(Debug, Clone)]
pub struct HyprlandProbe {
    class_hints: Vec<String>,
}

impl HyprlandProbe {
    pub fn new(class_hints: Vec<String>) -> Self {
        Self { class_hints }
    }
}

impl WindowProbe for HyprlandProbe {
    fn find(&self) -> Result<Option<WindowHandle>> {
        let json = run("hyprctl", &["clients", "-j"])?;
        let found = find_hyprland_client(&json, &self.class_hints)?;
        trace!(target: "tradelog::window", "hyprctl lookup: {:?}", found);
        Ok(found)
    }

    fn focus(&self, handle: &WindowHandle) -> Result<()> {
        let target = format!("address:{}", handle);
        run("hyprctl", &["dispatch", "focuswindow", target.as_str()])?;
        debug!(target: "tradelog::window", "Focused {}", handle);
        Ok(())
    }
}

/// Depth-first search of a sway tree for a matching leaf container.
pub fn find_sway_node(json: &str, hints: &[String]) -> Result<Option<WindowHandle>> {
    let tree: Value = serde_json::from_str(json)?;
    Ok(search_sway_node(&tree, hints))
}

fn str_field<'a>(node: &'a Value, name: &str) -> &'a str {
    node.get(name).and_then(Value::as_str).unwrap_or("")
}

fn search_sway_node(node: &Value, hints: &[String]) -> Option<WindowHandle> {
    let class = node
        .get("window_properties")
        .and_then(|p| p.get("class"))
        .and_then(Value::as_str)
        .unwrap_or("");

    let is_window = node.get("pid").is_some();
    if is_window
        && (matches_hint(str_field(node, "app_id"), hints)
            || matches_hint(class, hints)
            || matches_hint(str_field(node, "name"), hints))
    {
        if let Some(id) = node.get("id").and_then(Value::as_i64) {
            return Some(WindowHandle(id.to_string()));
        }
    }

    ["nodes", "floating_nodes"]
        .iter()
        .filter_map(|key| node.get(*key).and_then(Value::as_array))
        .flatten()
        .find_map(|child| search_sway_node(child, hints))
}

/// Sway via `swaymsg`.
#[derive(Debug, Clone)]
pub struct SwayProbe {
    class_hints: Vec<String>,
}

impl SwayProbe {
    pub fn new(class_hints: Vec<String>) -> Self {
        Self { class_hints }
    }
}

impl WindowProbe for SwayProbe {
    fn find(&self) -> Result<Option<WindowHandle>> {
        let json = run("swaymsg", &["-t", "get_tree", "-r"])?;
        let found = find_sway_node(&json, &self.class_hints)?;
        trace!(target: "tradelog::window", "swaymsg lookup: {:?}", found);
        Ok(found)
    }

    fn focus(&self, handle: &WindowHandle) -> Result<()> {
        let criteria = format!("[con_id={}]", handle);
        run("swaymsg", &[criteria.as_str(), "focus"])?;
        debug!(target: "tradelog::window", "Focused {}", handle);
        Ok(())
    }
}
