//! Reconcile result reporting
//!
//! Every manager returns a [`ReconcileReport`]. Lists are mutually exclusive
//! per object: an object is either created, updated, deleted, skipped or
//! recorded in `failed_objects`. Aggregating managers nest child reports in
//! `details` and lift their `changed`/`failed` flags.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// What happened to a single object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemAction {
    Created,
    Updated,
    Deleted,
    Configured,
    Skipped,
    Failed,
}

/// Per-object outcome, used where a reason or a device needs reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub device: String,
    pub object: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,
    pub action: ItemAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ItemOutcome {
    pub fn new(device: impl Into<String>, object: impl Into<String>, action: ItemAction) -> Self {
        Self {
            device: device.into(),
            object: object.into(),
            vlan: None,
            action,
            reason: None,
        }
    }

    pub fn vlan(mut self, vlan: Option<u16>) -> Self {
        self.vlan = vlan;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// `object` or `object.vlan` for subinterfaces
    pub fn label(&self) -> String {
        match self.vlan {
            Some(vlan) => format!("{}.{}", self.object, vlan),
            None => self.object.clone(),
        }
    }
}

/// Structured summary of one reconcile run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub changed: bool,
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub created: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updated: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deleted: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_objects: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_devices: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub details: IndexMap<String, ReconcileReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn push_unique(list: &mut Vec<String>, value: impl Into<String>) {
    let value = value.into();
    if !list.contains(&value) {
        list.push(value);
    }
}

impl ReconcileReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&mut self, name: impl Into<String>) {
        push_unique(&mut self.created, name);
        self.changed = true;
    }

    pub fn updated(&mut self, name: impl Into<String>) {
        push_unique(&mut self.updated, name);
        self.changed = true;
    }

    pub fn deleted(&mut self, name: impl Into<String>) {
        push_unique(&mut self.deleted, name);
        self.changed = true;
    }

    pub fn skipped(&mut self, name: impl Into<String>) {
        push_unique(&mut self.skipped, name);
    }

    /// Object exists but could not be removed; marks the report failed
    pub fn failed_object(&mut self, name: impl Into<String>) {
        push_unique(&mut self.failed_objects, name);
        self.failed = true;
    }

    pub fn device(&mut self, name: impl Into<String>) {
        push_unique(&mut self.devices, name);
    }

    pub fn skipped_device(&mut self, name: impl Into<String>) {
        push_unique(&mut self.skipped_devices, name);
    }

    pub fn item(&mut self, outcome: ItemOutcome) {
        self.items.push(outcome);
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: ReconcileReport) {
        self.changed |= other.changed;
        self.failed |= other.failed;
        for name in other.created {
            push_unique(&mut self.created, name);
        }
        for name in other.updated {
            push_unique(&mut self.updated, name);
        }
        for name in other.deleted {
            push_unique(&mut self.deleted, name);
        }
        for name in other.skipped {
            push_unique(&mut self.skipped, name);
        }
        for name in other.failed_objects {
            push_unique(&mut self.failed_objects, name);
        }
        for name in other.devices {
            push_unique(&mut self.devices, name);
        }
        for name in other.skipped_devices {
            push_unique(&mut self.skipped_devices, name);
        }
        for (label, child) in other.details {
            self.add_detail(label, child);
        }
        self.items.extend(other.items);
        if self.message.is_none() {
            self.message = other.message;
        }
    }

    /// Nest a child report under `label`, lifting its flags
    pub fn add_detail(&mut self, label: impl Into<String>, child: ReconcileReport) {
        self.changed |= child.changed;
        self.failed |= child.failed;
        let label = label.into();
        match self.details.get_mut(&label) {
            Some(existing) => existing.merge(child),
            None => {
                self.details.insert(label, child);
            }
        }
    }

    pub fn with_detail(mut self, label: impl Into<String>, child: ReconcileReport) -> Self {
        self.add_detail(label, child);
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// One line per non-empty list, nested details indented
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = writeln!(
            out,
            "{indent}changed={} failed={}",
            self.changed, self.failed
        );
        if let Some(message) = &self.message {
            let _ = writeln!(out, "{indent}{message}");
        }
        let lists: [(&str, &Vec<String>); 7] = [
            ("created", &self.created),
            ("updated", &self.updated),
            ("deleted", &self.deleted),
            ("skipped", &self.skipped),
            ("failed_objects", &self.failed_objects),
            ("devices", &self.devices),
            ("skipped_devices", &self.skipped_devices),
        ];
        for (name, values) in lists {
            if !values.is_empty() {
                let _ = writeln!(out, "{indent}{name}: {}", values.join(", "));
            }
        }
        for item in &self.items {
            let _ = write!(out, "{indent}- {}:{} {:?}", item.device, item.label(), item.action);
            match &item.reason {
                Some(reason) => {
                    let _ = writeln!(out, " ({reason})");
                }
                None => out.push('\n'),
            }
        }
        for (label, child) in &self.details {
            let _ = writeln!(out, "{indent}[{label}]");
            child.render_into(out, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_lifts_flags_and_dedups() {
        let mut report = ReconcileReport::new();
        report.skipped("site-a");

        let mut other = ReconcileReport::new();
        other.created("site-b");
        other.skipped("site-a");
        report.merge(other);

        assert!(report.changed);
        assert!(!report.failed);
        assert_eq!(report.skipped, vec!["site-a"]);
        assert_eq!(report.created, vec!["site-b"]);
    }

    #[test]
    fn test_detail_failure_propagates() {
        let mut child = ReconcileReport::new();
        child.failed_object("pfx-1");

        let report = ReconcileReport::new().with_detail("prefix_sets", child);
        assert!(report.failed);
        assert!(!report.changed);
        assert_eq!(report.details["prefix_sets"].failed_objects, vec!["pfx-1"]);
    }

    #[test]
    fn test_json_omits_empty_lists() {
        let mut report = ReconcileReport::new();
        report.deleted("ntp-1");
        let json = report.to_json().unwrap();
        assert!(json.contains("\"deleted\""));
        assert!(!json.contains("skipped_devices"));
    }

    #[test]
    fn test_text_rendering_includes_items() {
        let mut report = ReconcileReport::new();
        report.item(
            ItemOutcome::new("edge-1", "GigabitEthernet5/0/0", ItemAction::Skipped)
                .vlan(Some(18))
                .reason("already at default LAN"),
        );
        let text = report.render_text();
        assert!(text.contains("edge-1:GigabitEthernet5/0/0.18 Skipped (already at default LAN)"));
    }
}
