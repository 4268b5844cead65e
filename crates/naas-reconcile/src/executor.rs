//! Device resolution and sequential payload pushes

use indexmap::IndexMap;
use log::{debug, info};
use naas_client::PortalApi;
use naas_core::{ApplyMode, ReconcileError, ReconcileReport, Result};
use serde_json::{Map, Value};

/// Look up a device id by hostname
pub async fn resolve_device(portal: &dyn PortalApi, device: &str) -> Result<i64> {
    match portal.device_id(device).await? {
        Some(id) => Ok(id),
        None => {
            let enterprise = portal.enterprise().await?;
            Err(ReconcileError::DeviceNotFound {
                device: device.to_string(),
                enterprise: enterprise.company_name,
            }
            .into())
        }
    }
}

/// Recursively merge `source` into `target`; objects merge key by key,
/// anything else is replaced
pub fn merge_json(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

/// Wrap `inner` as `{ "edge": { section: inner } }`
pub fn edge_payload(section: &str, inner: Map<String, Value>) -> Value {
    let mut edge = Map::new();
    edge.insert(section.to_string(), Value::Object(inner));
    let mut root = Map::new();
    root.insert("edge".to_string(), Value::Object(edge));
    Value::Object(root)
}

/// Payloads collected per device, pushed once per device in insertion order
pub struct DevicePush<'a> {
    portal: &'a dyn PortalApi,
    mode: ApplyMode,
    queue: IndexMap<String, (i64, Value)>,
}

impl<'a> DevicePush<'a> {
    pub fn new(portal: &'a dyn PortalApi, mode: ApplyMode) -> Self {
        Self {
            portal,
            mode,
            queue: IndexMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Add a payload for `device`, merging with anything already queued
    pub fn queue(&mut self, device: &str, device_id: i64, payload: Value) {
        match self.queue.get_mut(device) {
            Some((_, existing)) => merge_json(existing, payload),
            None => {
                self.queue.insert(device.to_string(), (device_id, payload));
            }
        }
    }

    /// Push every queued payload; pushed devices are recorded in the report
    pub async fn execute(self, report: &mut ReconcileReport, operation: &str) -> Result<()> {
        for (device, (device_id, payload)) in self.queue {
            if self.mode.is_check() {
                info!("Check mode: would push {} to device {}", operation, device);
                debug!("Payload for {}: {}", device, payload);
            } else {
                info!("Pushing {} to device {} (id {})", operation, device, device_id);
                self.portal
                    .put_device_config(device_id, &payload)
                    .await
                    .map_err(|e| {
                        ReconcileError::operation(format!("{} on device {}", operation, device), e)
                    })?;
            }
            report.device(device);
            report.changed = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use naas_test::FakePortal;
    use serde_json::json;

    #[test]
    fn test_merge_json_nested() {
        let mut target = json!({"edge": {"interfaces": {"a": {"interface": {"alias": "x"}}}}});
        merge_json(
            &mut target,
            json!({"edge": {"interfaces": {"b": {"interface": null}}, "circuits": {}}}),
        );
        assert_eq!(target["edge"]["interfaces"]["a"]["interface"]["alias"], "x");
        assert!(target["edge"]["interfaces"]["b"]["interface"].is_null());
        assert!(target["edge"]["circuits"].is_object());
    }

    #[tokio::test]
    async fn test_unknown_device_reports_enterprise() {
        let portal = FakePortal::new().with_enterprise(7, "Globex");
        let err = resolve_device(&portal, "edge-x").await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("edge-x"));
        assert!(message.contains("Globex"));
    }

    #[tokio::test]
    async fn test_check_mode_pushes_nothing() {
        let portal = FakePortal::new();
        let mut push = DevicePush::new(&portal, ApplyMode::Check);
        push.queue("edge-1", 1, json!({"edge": {"a": 1}}));
        push.queue("edge-1", 1, json!({"edge": {"b": 2}}));
        assert_eq!(push.len(), 1);

        let mut report = ReconcileReport::new();
        push.execute(&mut report, "interfaces").await.unwrap();
        assert!(report.changed);
        assert_eq!(report.devices, vec!["edge-1"]);
        assert!(portal.writes().is_empty());
    }

    #[tokio::test]
    async fn test_apply_mode_pushes_in_order() {
        let portal = FakePortal::new();
        let mut push = DevicePush::new(&portal, ApplyMode::Apply);
        push.queue("edge-2", 2, json!({"edge": {}}));
        push.queue("edge-1", 1, json!({"edge": {}}));

        let mut report = ReconcileReport::new();
        push.execute(&mut report, "circuits").await.unwrap();
        let targets: Vec<_> = portal.writes().iter().map(|w| w.target).collect();
        assert_eq!(targets, vec![Some(2), Some(1)]);
        assert_eq!(report.devices, vec!["edge-2", "edge-1"]);
    }
}
