//! Device-keyed configuration sections
//!
//! Sections are written as a list of single-key mappings:
//!
//! ```yaml
//! interfaces:
//!   - edge-1:
//!       - name: GigabitEthernet5/0/0
//!   - edge-2:
//!       - name: GigabitEthernet6/0/0
//! ```
//!
//! Entries for the same device across list items are merged, keeping file
//! order.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Per-device entries in file order
#[derive(Debug, Clone)]
pub struct DeviceList<T> {
    devices: IndexMap<String, Vec<T>>,
}

impl<T> Default for DeviceList<T> {
    fn default() -> Self {
        Self {
            devices: IndexMap::new(),
        }
    }
}

impl<T> DeviceList<T> {
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn get(&self, device: &str) -> Option<&[T]> {
        self.devices.get(device).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[T])> {
        self.devices
            .iter()
            .map(|(name, entries)| (name.as_str(), entries.as_slice()))
    }

    pub fn device_names(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn push(&mut self, device: impl Into<String>, entry: T) {
        self.devices.entry(device.into()).or_default().push(entry);
    }
}

impl<T> FromIterator<(String, T)> for DeviceList<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        let mut list = DeviceList::default();
        for (device, entry) in iter {
            list.push(device, entry);
        }
        list
    }
}

impl<'de, T> Deserialize<'de> for DeviceList<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let items: Option<Vec<IndexMap<String, Option<OneOrMany<T>>>>> =
            Option::deserialize(deserializer)?;

        let mut list = DeviceList::default();
        for item in items.unwrap_or_default() {
            for (device, entries) in item {
                let slot = list.devices.entry(device).or_default();
                match entries {
                    Some(OneOrMany::Many(many)) => slot.extend(many),
                    Some(OneOrMany::One(one)) => slot.push(one),
                    None => {}
                }
            }
        }
        Ok(list)
    }
}
