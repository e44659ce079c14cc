use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("{0} has not been set")]
    Missing(ParameterKind),

    #[error("{kind} must be between {min} and {max}, got {value}")]
    OutOfRange {
        kind: ParameterKind,
        value: i32,
        min: i32,
        max: i32,
    },
}

pub type Result<T> = std::result::Result<T, ProfileError>;

/// The four thermal profile parameters, in the order the firmware expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    SoakTemperature,
    SoakTime,
    ReflowTemperature,
    ReflowTime,
}

impl ParameterKind {
    pub const NEGOTIATION_ORDER: [ParameterKind; 4] = [
        ParameterKind::SoakTemperature,
        ParameterKind::SoakTime,
        ParameterKind::ReflowTemperature,
        ParameterKind::ReflowTime,
    ];

    pub const fn spec(self) -> &'static ParameterSpec {
        match self {
            ParameterKind::SoakTemperature => &SOAK_TEMPERATURE,
            ParameterKind::SoakTime => &SOAK_TIME,
            ParameterKind::ReflowTemperature => &REFLOW_TEMPERATURE,
            ParameterKind::ReflowTime => &REFLOW_TIME,
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().name)
    }
}

/// Static bounds for one parameter. Both ends are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParameterSpec {
    pub kind: ParameterKind,
    pub name: &'static str,
    pub minimum: i32,
    pub maximum: i32,
    pub unit: &'static str,
}

impl ParameterSpec {
    pub fn contains(&self, value: i32) -> bool {
        (self.minimum..=self.maximum).contains(&value)
    }

    pub fn check(&self, value: i32) -> Result<i32> {
        if self.contains(value) {
            Ok(value)
        } else {
            Err(ProfileError::OutOfRange {
                kind: self.kind,
                value,
                min: self.minimum,
                max: self.maximum,
            })
        }
    }

    /// Operator prompt, e.g. `Enter soak temperature (120C - 180C):`.
    pub fn prompt(&self) -> String {
        format!(
            "Enter {} ({}{} - {}{}):",
            self.name, self.minimum, self.unit, self.maximum, self.unit
        )
    }
}

pub const SOAK_TEMPERATURE: ParameterSpec = ParameterSpec {
    kind: ParameterKind::SoakTemperature,
    name: "soak temperature",
    minimum: 120,
    maximum: 180,
    unit: "C",
};

pub const SOAK_TIME: ParameterSpec = ParameterSpec {
    kind: ParameterKind::SoakTime,
    name: "soak time",
    minimum: 30,
    maximum: 90,
    unit: "s",
};

pub const REFLOW_TEMPERATURE: ParameterSpec = ParameterSpec {
    kind: ParameterKind::ReflowTemperature,
    name: "reflow temperature",
    minimum: 200,
    maximum: 240,
    unit: "C",
};

pub const REFLOW_TIME: ParameterSpec = ParameterSpec {
    kind: ParameterKind::ReflowTime,
    name: "reflow time",
    minimum: 15,
    maximum: 60,
    unit: "s",
};

/// A complete, range-checked profile. Only obtainable through
/// [`ProfileBuilder::build`] or [`ThermalProfile::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThermalProfile {
    soak_temperature: i32,
    soak_time: i32,
    reflow_temperature: i32,
    reflow_time: i32,
}

impl ThermalProfile {
    pub fn new(soak_temperature: i32, soak_time: i32, reflow_temperature: i32, reflow_time: i32) -> Result<Self> {
        Ok(Self {
            soak_temperature: SOAK_TEMPERATURE.check(soak_temperature)?,
            soak_time: SOAK_TIME.check(soak_time)?,
            reflow_temperature: REFLOW_TEMPERATURE.check(reflow_temperature)?,
            reflow_time: REFLOW_TIME.check(reflow_time)?,
        })
    }

    pub fn soak_temperature(&self) -> i32 {
        self.soak_temperature
    }

    pub fn soak_time(&self) -> i32 {
        self.soak_time
    }

    pub fn reflow_temperature(&self) -> i32 {
        self.reflow_temperature
    }

    pub fn reflow_time(&self) -> i32 {
        self.reflow_time
    }

    pub fn get(&self, kind: ParameterKind) -> i32 {
        match kind {
            ParameterKind::SoakTemperature => self.soak_temperature,
            ParameterKind::SoakTime => self.soak_time,
            ParameterKind::ReflowTemperature => self.reflow_temperature,
            ParameterKind::ReflowTime => self.reflow_time,
        }
    }
}

impl fmt::Display for ThermalProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "soak {}C for {}s, reflow {}C for {}s",
            self.soak_temperature, self.soak_time, self.reflow_temperature, self.reflow_time
        )
    }
}

/// Collects parameters one at a time while they are negotiated.
#[derive(Debug, Clone, Default)]
pub struct ProfileBuilder {
    soak_temperature: Option<i32>,
    soak_time: Option<i32>,
    reflow_temperature: Option<i32>,
    reflow_time: Option<i32>,
}

impl ProfileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, kind: ParameterKind, value: i32) -> Result<()> {
        let value = kind.spec().check(value)?;
        let slot = match kind {
            ParameterKind::SoakTemperature => &mut self.soak_temperature,
            ParameterKind::SoakTime => &mut self.soak_time,
            ParameterKind::ReflowTemperature => &mut self.reflow_temperature,
            ParameterKind::ReflowTime => &mut self.reflow_time,
        };
        *slot = Some(value);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.soak_temperature.is_some()
            && self.soak_time.is_some()
            && self.reflow_temperature.is_some()
            && self.reflow_time.is_some()
    }

    pub fn build(&self) -> Result<ThermalProfile> {
        ThermalProfile::new(
            self.soak_temperature.ok_or(ProfileError::Missing(ParameterKind::SoakTemperature))?,
            self.soak_time.ok_or(ProfileError::Missing(ParameterKind::SoakTime))?,
            self.reflow_temperature.ok_or(ProfileError::Missing(ParameterKind::ReflowTemperature))?,
            self.reflow_time.ok_or(ProfileError::Missing(ParameterKind::ReflowTime))?,
        )
    }
}
