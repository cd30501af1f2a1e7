use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Radar sweep position
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Radar {
    pub angle: i32,
    pub distance: i32,
}

/// Environment readings plus the vibration pulse flag
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub temp: f64,
    pub hum: f64,
    pub gas: i32,
    /// Pulsed: set on a vibration line, cleared shortly after
    #[serde(serialize_with = "flag_to_int", deserialize_with = "flag_from_int")]
    pub vib: bool,
}

/// Full sensor snapshot broadcast as the hub's `update` message
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub radar: Radar,
    pub sensors: Environment,
}

// Dashboard consumers expect 0/1 for the vibration flag.
fn flag_to_int<S: Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*flag))
}

fn flag_from_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Int(i64),
        Bool(bool),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Int(v) => v != 0,
        Flag::Bool(b) => b,
    })
}
