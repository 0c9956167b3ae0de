use std::collections::BTreeMap;

use parking_lot::Mutex;
use tracing::debug;

use super::{DeviceError, LightDevices, Target};
use crate::model::{ColorMatrix, DiscoveredLight, Hsbk, Rect, BODY_ROW, TOP_CELL};

/// Zones given to every multizone fake.
pub const FAKE_ZONE_COUNT: u32 = 16;

/// Cell grid of every matrix fake: the top row plus a five by five body.
pub const FAKE_MATRIX_HEIGHT: usize = 6;
pub const FAKE_MATRIX_WIDTH: usize = 5;

/// One call recorded by the fake layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetColor {
        color: Hsbk,
        duration: f64,
    },
    SetPower {
        level: u16,
        duration: f64,
    },
    GetColor,
    SetZoneColor {
        first: u32,
        last: u32,
        color: Hsbk,
        duration: f64,
    },
    GetZoneColors {
        first: u32,
        last: u32,
    },
    SetMatrix {
        matrix: ColorMatrix,
        duration: f64,
    },
    GetMatrix,
}

#[derive(Debug)]
struct FakeLight {
    info: DiscoveredLight,
    power: u16,
    zones: Vec<Hsbk>,
    matrix: Option<ColorMatrix>,
    calls: Vec<Action>,
}

impl FakeLight {
    fn new(info: DiscoveredLight) -> Self {
        let zone_count = if info.multizone { FAKE_ZONE_COUNT } else { 0 };
        Self {
            zones: vec![info.color; zone_count as usize],
            matrix: info.matrix.then(|| fake_matrix(info.color)),
            info,
            power: 0,
            calls: Vec::new(),
        }
    }

    fn paint(&mut self, color: Hsbk) {
        self.info.color = color;
        self.zones.iter_mut().for_each(|z| *z = color);
        if let Some(matrix) = &mut self.matrix {
            *matrix = fake_matrix(color);
        }
    }
}

fn fake_matrix(color: Hsbk) -> ColorMatrix {
    let mut matrix = ColorMatrix::new(FAKE_MATRIX_HEIGHT, FAKE_MATRIX_WIDTH, Hsbk::default());
    let body = Rect::new(BODY_ROW, FAKE_MATRIX_HEIGHT - 1, 0, FAKE_MATRIX_WIDTH - 1);
    matrix.overlay(body, color);
    matrix.overlay(TOP_CELL, color);
    matrix
}

/// In-memory light layer that records every call. Used by tests and by the
/// CLI when `use_fakes` is set.
#[derive(Debug, Default)]
pub struct FakeLights {
    lights: Mutex<BTreeMap<String, FakeLight>>,
    global_calls: Mutex<Vec<Action>>,
}

impl FakeLights {
    pub fn new(lights: impl IntoIterator<Item = DiscoveredLight>) -> Self {
        let lights = lights
            .into_iter()
            .map(|info| (info.name.clone(), FakeLight::new(info)))
            .collect();
        Self {
            lights: Mutex::new(lights),
            global_calls: Mutex::new(Vec::new()),
        }
    }

    /// The stock inventory: a pole lamp and some furniture in one home.
    pub fn default_lights() -> Vec<DiscoveredLight> {
        let white = Hsbk::new(0, 0, 65535, 2700);
        vec![
            DiscoveredLight::new("Top", "Pole", "Home", white, false),
            DiscoveredLight::new("Middle", "Pole", "Home", white, false),
            DiscoveredLight::new("Bottom", "Pole", "Home", white, false),
            DiscoveredLight::new("Table", "Furniture", "Home", white, false),
            DiscoveredLight::new("Chair", "Furniture", "Home", white, false),
            DiscoveredLight::new("Strip", "Furniture", "Home", white, true),
        ]
    }

    /// Calls addressed to one light, oldest first.
    pub fn calls(&self, name: &str) -> Vec<Action> {
        self.lights
            .lock()
            .get(name)
            .map(|l| l.calls.clone())
            .unwrap_or_default()
    }

    /// Broadcast calls made with `Target::All`.
    pub fn global_calls(&self) -> Vec<Action> {
        self.global_calls.lock().clone()
    }

    pub fn color(&self, name: &str) -> Option<Hsbk> {
        self.lights.lock().get(name).map(|l| l.info.color)
    }

    pub fn power(&self, name: &str) -> Option<u16> {
        self.lights.lock().get(name).map(|l| l.power)
    }

    pub fn matrix(&self, name: &str) -> Option<ColorMatrix> {
        self.lights.lock().get(name).and_then(|l| l.matrix.clone())
    }

    pub fn clear_calls(&self) {
        self.global_calls.lock().clear();
        for light in self.lights.lock().values_mut() {
            light.calls.clear();
        }
    }

    /// Names with at least one recorded call, in name order.
    pub fn active_lights(&self) -> Vec<String> {
        self.lights
            .lock()
            .values()
            .filter(|l| !l.calls.is_empty())
            .map(|l| l.info.name.clone())
            .collect()
    }

    fn with_light<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut FakeLight) -> Result<R, DeviceError>,
    ) -> Result<R, DeviceError> {
        let mut lights = self.lights.lock();
        let light = lights
            .get_mut(name)
            .ok_or_else(|| DeviceError::UnknownLight(name.to_string()))?;
        f(light)
    }
}

impl LightDevices for FakeLights {
    fn discover(&self) -> Result<Vec<DiscoveredLight>, DeviceError> {
        Ok(self.lights.lock().values().map(|l| l.info.clone()).collect())
    }

    fn set_color(&self, target: &Target, color: Hsbk, duration_ms: f64) -> Result<(), DeviceError> {
        let action = Action::SetColor {
            color,
            duration: duration_ms,
        };
        match target {
            Target::All => {
                debug!(%color, "fake: set color on all lights");
                self.global_calls.lock().push(action);
                self.lights.lock().values_mut().for_each(|l| l.paint(color));
                Ok(())
            }
            Target::Light(name) => self.with_light(name, |light| {
                debug!(light = %name, %color, "fake: set color");
                light.calls.push(action);
                light.paint(color);
                Ok(())
            }),
        }
    }

    fn set_power(&self, target: &Target, level: u16, duration_ms: f64) -> Result<(), DeviceError> {
        let action = Action::SetPower {
            level,
            duration: duration_ms,
        };
        match target {
            Target::All => {
                self.global_calls.lock().push(action);
                self.lights.lock().values_mut().for_each(|l| l.power = level);
                Ok(())
            }
            Target::Light(name) => self.with_light(name, |light| {
                light.calls.push(action);
                light.power = level;
                Ok(())
            }),
        }
    }

    fn get_color(&self, name: &str) -> Result<Hsbk, DeviceError> {
        self.with_light(name, |light| {
            light.calls.push(Action::GetColor);
            Ok(light.info.color)
        })
    }

    fn set_zone_color(
        &self,
        name: &str,
        first_zone: u32,
        last_zone: u32,
        color: Hsbk,
        duration_ms: f64,
    ) -> Result<(), DeviceError> {
        self.with_light(name, |light| {
            if !light.info.multizone {
                return Err(DeviceError::NotMultizone(name.to_string()));
            }
            light.calls.push(Action::SetZoneColor {
                first: first_zone,
                last: last_zone,
                color,
                duration: duration_ms,
            });
            let range = first_zone as usize..(last_zone as usize).min(light.zones.len());
            if let Some(zones) = light.zones.get_mut(range) {
                zones.iter_mut().for_each(|z| *z = color);
            }
            Ok(())
        })
    }

    fn get_zone_colors(
        &self,
        name: &str,
        first_zone: u32,
        last_zone: u32,
    ) -> Result<Vec<Hsbk>, DeviceError> {
        self.with_light(name, |light| {
            if !light.info.multizone {
                return Err(DeviceError::NotMultizone(name.to_string()));
            }
            light.calls.push(Action::GetZoneColors {
                first: first_zone,
                last: last_zone,
            });
            let range = first_zone as usize..(last_zone as usize).min(light.zones.len());
            Ok(light.zones.get(range).map(<[Hsbk]>::to_vec).unwrap_or_default())
        })
    }

    fn get_matrix(&self, name: &str) -> Result<ColorMatrix, DeviceError> {
        self.with_light(name, |light| {
            let matrix = light
                .matrix
                .clone()
                .ok_or_else(|| DeviceError::NotMatrix(name.to_string()))?;
            light.calls.push(Action::GetMatrix);
            Ok(matrix)
        })
    }

    fn set_matrix(
        &self,
        name: &str,
        matrix: &ColorMatrix,
        duration_ms: f64,
    ) -> Result<(), DeviceError> {
        self.with_light(name, |light| {
            let Some(cells) = light.matrix.as_mut() else {
                return Err(DeviceError::NotMatrix(name.to_string()));
            };
            debug!(light = %name, "fake: set matrix");
            *cells = matrix.clone();
            light.calls.push(Action::SetMatrix {
                matrix: matrix.clone(),
                duration: duration_ms,
            });
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn records_per_light_and_global_calls() {
        let fakes = FakeLights::new(FakeLights::default_lights());
        let red = Hsbk::new(0, 65535, 65535, 2700);
        fakes
            .set_color(&Target::Light("Top".into()), red, 0.0)
            .unwrap();
        fakes.set_power(&Target::All, 0, 10.0).unwrap();

        assert_eq!(
            fakes.calls("Top"),
            vec![Action::SetColor { color: red, duration: 0.0 }]
        );
        assert_eq!(
            fakes.global_calls(),
            vec![Action::SetPower { level: 0, duration: 10.0 }]
        );
        assert_eq!(fakes.power("Chair"), Some(0));
        assert_eq!(fakes.active_lights(), ["Top"]);

        fakes.clear_calls();
        assert!(fakes.global_calls().is_empty());
        assert!(fakes.active_lights().is_empty());
        assert_eq!(fakes.color("Top"), Some(red));
    }

    #[test]
    fn matrix_lights_hold_a_cell_grid() {
        let white = Hsbk::new(0, 0, 65535, 2700);
        let red = Hsbk::new(0, 65535, 65535, 2700);
        let candle = DiscoveredLight::new("Candle", "", "", white, false).with_matrix();
        let fakes = FakeLights::new(vec![candle]);

        let mut cells = fakes.get_matrix("Candle").unwrap();
        assert_eq!((cells.height(), cells.width()), (FAKE_MATRIX_HEIGHT, FAKE_MATRIX_WIDTH));
        assert_eq!(cells.get(0, 0), Some(white));
        assert_eq!(cells.get(0, 1), Some(Hsbk::default()));
        assert!(cells.overlay(Rect::cell(3, 3), red));
        fakes.set_matrix("Candle", &cells, 250.0).unwrap();
        assert_eq!(fakes.matrix("Candle").unwrap().get(3, 3), Some(red));

        fakes.set_color(&Target::Light("Candle".into()), red, 0.0).unwrap();
        let painted = fakes.matrix("Candle").unwrap();
        assert_eq!(painted.get(5, 4), Some(red));
        assert_eq!(painted.get(0, 4), Some(Hsbk::default()));

        let plain = FakeLights::new(FakeLights::default_lights());
        assert_eq!(plain.get_matrix("Top"), Err(DeviceError::NotMatrix("Top".into())));
        assert!(plain.calls("Top").is_empty());
    }

    #[test]
    fn zones_require_multizone() {
        let fakes = FakeLights::new(FakeLights::default_lights());
        let blue = Hsbk::new(43690, 65535, 65535, 2700);
        fakes.set_zone_color("Strip", 2, 4, blue, 0.0).unwrap();
        let zones = fakes.get_zone_colors("Strip", 1, 5).unwrap();
        assert_eq!(zones.len(), 4);
        assert_eq!(zones.get(1), Some(&blue));
        assert_ne!(zones.first(), Some(&blue));
        assert_eq!(
            fakes.set_zone_color("Top", 0, 1, blue, 0.0),
            Err(DeviceError::NotMultizone("Top".into()))
        );
    }

    #[test]
    fn unknown_light_is_an_error() {
        let fakes = FakeLights::new(Vec::new());
        assert!(matches!(
            fakes.get_color("Ghost"),
            Err(DeviceError::UnknownLight(name)) if name == "Ghost"
        ));
    }
}
