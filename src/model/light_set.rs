use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::color::Hsbk;
use crate::device::{DeviceError, LightDevices};

/// One light as reported by device discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DiscoveredLight {
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub color: Hsbk,
    #[serde(default)]
    pub multizone: bool,
    /// A grid of cells addressed by row and column, with a separate top.
    #[serde(default)]
    pub matrix: bool,
}

impl DiscoveredLight {
    pub fn new(name: &str, group: &str, location: &str, color: Hsbk, multizone: bool) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            name: name.to_string(),
            group: non_empty(group),
            location: non_empty(location),
            color,
            multizone,
            matrix: false,
        }
    }

    pub fn with_matrix(mut self) -> Self {
        self.matrix = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Light {
    pub name: String,
    pub group: Option<String>,
    pub location: Option<String>,
    pub color: Hsbk,
    pub multizone: bool,
    /// Last time discovery reported this light.
    pub last_seen: Instant,
}

type Membership = BTreeMap<String, BTreeSet<String>>;

/// Lights, groups and locations, each kept in name order so that discovery
/// walks them deterministically.
#[derive(Debug, Clone, Default)]
pub struct SortedLightSet {
    lights: BTreeMap<String, Light>,
    groups: Membership,
    locations: Membership,
}

impl SortedLightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_discovered(discovered: impl IntoIterator<Item = DiscoveredLight>) -> Self {
        let mut set = Self::new();
        set.refresh(discovered, Instant::now());
        set
    }

    /// Merge a discovery pass into the set. Known lights are updated in place
    /// and stamped with `now`; lights missing from the pass are kept until
    /// garbage collection. Group and location membership is rebuilt, so sets
    /// that lost their last member disappear.
    pub fn refresh(&mut self, discovered: impl IntoIterator<Item = DiscoveredLight>, now: Instant) {
        for found in discovered {
            let light = Light {
                name: found.name.clone(),
                group: found.group,
                location: found.location,
                color: found.color,
                multizone: found.multizone,
                last_seen: now,
            };
            self.lights.insert(found.name, light);
        }
        self.rebuild_index();
    }

    /// Drop lights not seen since `cutoff`. Returns how many were removed.
    pub fn garbage_collect(&mut self, cutoff: Instant) -> usize {
        let before = self.lights.len();
        self.lights.retain(|_, light| light.last_seen >= cutoff);
        let removed = before - self.lights.len();
        if removed > 0 {
            self.rebuild_index();
        }
        removed
    }

    fn rebuild_index(&mut self) {
        self.groups.clear();
        self.locations.clear();
        for light in self.lights.values() {
            if let Some(group) = &light.group {
                self.groups
                    .entry(group.clone())
                    .or_default()
                    .insert(light.name.clone());
            }
            if let Some(location) = &light.location {
                self.locations
                    .entry(location.clone())
                    .or_default()
                    .insert(light.name.clone());
            }
        }
    }

    pub fn get_light(&self, name: &str) -> Option<&Light> {
        self.lights.get(name)
    }

    pub fn lights(&self) -> &BTreeMap<String, Light> {
        &self.lights
    }

    pub fn light_names(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.lights.keys().map(String::as_str)
    }

    pub fn groups(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.groups
    }

    pub fn locations(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.locations
    }

    pub fn group(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.groups.get(name)
    }

    pub fn location(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.locations.get(name)
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }
}

// ── Shared handle ───────────────────────────────────────────────

/// Thread-safe owner of the current light set. Readers take an immutable
/// snapshot; writers copy on write, so a running script never observes a
/// refresh halfway through.
#[derive(Clone, Default)]
pub struct LightSetHandle {
    current: Arc<RwLock<Arc<SortedLightSet>>>,
}

impl LightSetHandle {
    pub fn new(set: SortedLightSet) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(set))),
        }
    }

    pub fn snapshot(&self) -> Arc<SortedLightSet> {
        Arc::clone(&self.current.read())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut SortedLightSet) -> R) -> R {
        let mut guard = self.current.write();
        f(Arc::make_mut(&mut guard))
    }

    /// Run one discovery pass against the device layer and merge the result.
    pub fn discover(&self, devices: &dyn LightDevices) -> Result<usize, DeviceError> {
        let found = devices.discover()?;
        let count = found.len();
        self.update(|set| set.refresh(found, Instant::now()));
        debug!(count, "light discovery merged");
        Ok(count)
    }

    /// Drop lights that discovery has not reported within `max_age`.
    pub fn garbage_collect(&self, max_age: Duration) -> usize {
        let Some(cutoff) = Instant::now().checked_sub(max_age) else {
            return 0;
        };
        let removed = self.update(|set| set.garbage_collect(cutoff));
        if removed > 0 {
            info!(removed, "garbage-collected stale lights");
        }
        removed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn light(name: &str, group: &str, location: &str) -> DiscoveredLight {
        DiscoveredLight::new(name, group, location, Hsbk::default(), false)
    }

    fn names(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    fn initial() -> Vec<DiscoveredLight> {
        vec![
            light("light_0", "group_0", "loc_0"),
            light("light_1", "group_0", "loc_0"),
            light("light_2", "group_1", "loc_1"),
            light("light_3", "group_1", "loc_1"),
        ]
    }

    #[test]
    fn discover_sorts_members() {
        let set = SortedLightSet::from_discovered(initial().into_iter().rev());
        assert_eq!(set.light_names().collect::<Vec<_>>(), ["light_0", "light_1", "light_2", "light_3"]);
        assert_eq!(names(set.group("group_0").unwrap()), ["light_0", "light_1"]);
        assert_eq!(names(set.location("loc_1").unwrap()), ["light_2", "light_3"]);
        assert!(set.group("nope").is_none());
    }

    #[test]
    fn refresh_rebuilds_membership() {
        let now = Instant::now();
        let mut set = SortedLightSet::new();
        set.refresh(initial(), now);
        set.refresh(
            vec![
                light("light_0", "group_0", "loc_0"),
                light("light_1", "group_0", "loc_0"),
                light("light_2", "group_0", "loc_1"),
                light("light_3", "group_2", "loc_1"),
            ],
            now,
        );
        assert_eq!(names(set.group("group_0").unwrap()), ["light_0", "light_1", "light_2"]);
        assert!(set.group("group_1").is_none());
        assert_eq!(names(set.group("group_2").unwrap()), ["light_3"]);
        assert_eq!(set.len(), 4);
        let moved = set.get_light("light_3").unwrap();
        assert_eq!(moved.group.as_deref(), Some("group_2"));
        assert!(set.get_light("light_9").is_none());
    }

    #[test]
    fn garbage_collect_prunes_stale_lights() {
        let start = Instant::now();
        let later = start + Duration::from_secs(60);
        let mut set = SortedLightSet::new();
        set.refresh(initial(), start);
        set.refresh(vec![light("light_0", "group_0", "loc_0")], later);

        assert_eq!(set.garbage_collect(later), 3);
        assert_eq!(set.light_names().collect::<Vec<_>>(), ["light_0"]);
        assert!(set.group("group_1").is_none());
        assert!(set.location("loc_1").is_none());
    }

    #[test]
    fn snapshot_is_isolated_from_updates() {
        let handle = LightSetHandle::new(SortedLightSet::from_discovered(initial()));
        let before = handle.snapshot();
        handle.update(|set| set.refresh(vec![light("light_9", "group_9", "")], Instant::now()));
        assert_eq!(before.len(), 4);
        assert_eq!(handle.snapshot().len(), 5);
        assert!(handle.snapshot().location("").is_none());
    }
}
