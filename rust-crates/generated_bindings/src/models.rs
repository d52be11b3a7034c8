//! Record types of the `dojo_starter` world and the static registry describing them.
//!
//! The registry is what decoding leans on: a raw model object coming from the
//! indexer is first normalized against its [`ModelSchema`] (zero defaults for
//! missing fields, legacy field names folded into the current ones) and only
//! then deserialized into the typed model.

use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};
use serde_json::{
    Map,
    Value,
};
use starknet_core::types::Felt;
use std::fmt;

pub const NAMESPACE: &str = "dojo_starter";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Address,
    Felt,
    U8,
    U16,
    U32,
    U64,
    Bool,
}

impl FieldKind {
    pub fn zero(self) -> Value {
        match self {
            FieldKind::Address | FieldKind::Felt => Value::String("0x0".to_string()),
            FieldKind::Bool => Value::Bool(false),
            FieldKind::U8 | FieldKind::U16 | FieldKind::U32 | FieldKind::U64 => {
                Value::from(0u64)
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Names the same field carried in earlier deployments of the world.
    pub aliases: &'static [&'static str],
}

const fn field(name: &'static str, kind: FieldKind) -> FieldSchema {
    FieldSchema {
        name,
        kind,
        aliases: &[],
    }
}

const fn aliased(
    name: &'static str,
    kind: FieldKind,
    aliases: &'static [&'static str],
) -> FieldSchema {
    FieldSchema {
        name,
        kind,
        aliases,
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ModelSchema {
    pub namespace: &'static str,
    pub name: &'static str,
    pub keys: &'static [FieldSchema],
    pub values: &'static [FieldSchema],
    /// Fields kept only when the indexer sends them; they have no default.
    pub optional: &'static [FieldSchema],
}

impl ModelSchema {
    pub fn tag(&self) -> String {
        format!("{}-{}", self.namespace, self.name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSchema> + '_ {
        self.keys.iter().chain(self.values.iter())
    }

    pub fn field_order(&self) -> Vec<&'static str> {
        self.fields().map(|field| field.name).collect()
    }

    pub fn default_record(&self) -> Map<String, Value> {
        self.fields()
            .map(|field| (field.name.to_string(), field.kind.zero()))
            .collect()
    }

    /// Fold a raw model object into the shape of this schema.
    pub fn normalize(&self, raw: &Map<String, Value>) -> Map<String, Value> {
        let mut record = self.default_record();
        for field in self.fields().chain(self.optional.iter()) {
            let found = raw.get(field.name).or_else(|| {
                field.aliases.iter().find_map(|alias| raw.get(*alias))
            });
            if let Some(value) = found {
                record.insert(field.name.to_string(), value.clone());
            }
        }
        record
    }
}

static BEAST_KEYS: [FieldSchema; 1] = [field("player", FieldKind::Address)];

static BEAST_VALUES: [FieldSchema; 13] = [
    field("life", FieldKind::U32),
    field("max_life", FieldKind::U32),
    aliased("hungry", FieldKind::U32, &["hunger"]),
    aliased("max_hungry", FieldKind::U32, &["max_hunger"]),
    field("energy", FieldKind::U32),
    field("max_energy", FieldKind::U32),
    field("happiness", FieldKind::U32),
    field("max_happiness", FieldKind::U32),
    aliased("bath", FieldKind::U32, &["hygiene"]),
    aliased("max_bath", FieldKind::U32, &["max_hygiene"]),
    field("level", FieldKind::U32),
    field("experience", FieldKind::U32),
    field("next_level_experience", FieldKind::U32),
];

static BEAST_FLAGS: [FieldSchema; 2] = [
    field("is_alive", FieldKind::Bool),
    field("is_awake", FieldKind::Bool),
];

pub static BEAST_SCHEMA: ModelSchema = ModelSchema {
    namespace: NAMESPACE,
    name: "Beast",
    keys: &BEAST_KEYS,
    values: &BEAST_VALUES,
    optional: &BEAST_FLAGS,
};

pub static BEAST_VALUE_SCHEMA: ModelSchema = ModelSchema {
    namespace: NAMESPACE,
    name: "BeastValue",
    keys: &[],
    values: &BEAST_VALUES,
    optional: &BEAST_FLAGS,
};

static REGISTRY: [&ModelSchema; 2] = [&BEAST_SCHEMA, &BEAST_VALUE_SCHEMA];

pub fn lookup(namespace: &str, name: &str) -> Option<&'static ModelSchema> {
    REGISTRY
        .iter()
        .copied()
        .find(|schema| schema.namespace == namespace && schema.name == name)
}

pub fn registered() -> impl Iterator<Item = &'static ModelSchema> {
    REGISTRY.iter().copied()
}

/// Models the client reads from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Models {
    Beast,
    BeastValue,
}

impl Models {
    pub fn schema(self) -> &'static ModelSchema {
        match self {
            Models::Beast => &BEAST_SCHEMA,
            Models::BeastValue => &BEAST_VALUE_SCHEMA,
        }
    }

    pub fn namespace(self) -> &'static str {
        self.schema().namespace
    }

    pub fn name(self) -> &'static str {
        self.schema().name
    }

    pub fn tag(self) -> String {
        self.schema().tag()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("model {tag} is not a JSON object")]
    NotAnObject { tag: String },
    #[error("failed to decode model {tag}: {source}")]
    Invalid {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}

pub trait Model: DeserializeOwned + Serialize + Sized {
    const NAMESPACE: &'static str;
    const NAME: &'static str;

    fn schema() -> &'static ModelSchema;

    fn tag() -> String {
        format!("{}-{}", Self::NAMESPACE, Self::NAME)
    }

    fn decode(raw: &Value) -> Result<Self, DecodeError> {
        let Value::Object(map) = raw else {
            return Err(DecodeError::NotAnObject { tag: Self::tag() });
        };
        let normalized = Self::schema().normalize(map);
        serde_json::from_value(Value::Object(normalized)).map_err(|source| {
            DecodeError::Invalid {
                tag: Self::tag(),
                source,
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stat {
    Life,
    Hunger,
    Energy,
    Happiness,
    Hygiene,
}

impl Stat {
    pub const ALL: [Stat; 5] = [
        Stat::Life,
        Stat::Hunger,
        Stat::Energy,
        Stat::Happiness,
        Stat::Hygiene,
    ];
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stat::Life => "life",
            Stat::Hunger => "hunger",
            Stat::Energy => "energy",
            Stat::Happiness => "happiness",
            Stat::Hygiene => "hygiene",
        };
        f.write_str(name)
    }
}

/// A stat together with its ceiling, clamped into `[0, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gauge {
    pub value: u32,
    pub max: u32,
}

impl Gauge {
    pub fn clamped(value: u32, max: u32) -> Self {
        Self {
            value: value.min(max),
            max,
        }
    }

    pub fn percent(&self) -> u8 {
        if self.max == 0 {
            return 0;
        }
        (u64::from(self.value) * 100 / u64::from(self.max)) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beast {
    #[serde(with = "lenient::felt")]
    pub player: Felt,
    #[serde(with = "lenient::uint")]
    pub life: u32,
    #[serde(with = "lenient::uint")]
    pub max_life: u32,
    #[serde(with = "lenient::uint")]
    pub hungry: u32,
    #[serde(with = "lenient::uint")]
    pub max_hungry: u32,
    #[serde(with = "lenient::uint")]
    pub energy: u32,
    #[serde(with = "lenient::uint")]
    pub max_energy: u32,
    #[serde(with = "lenient::uint")]
    pub happiness: u32,
    #[serde(with = "lenient::uint")]
    pub max_happiness: u32,
    #[serde(with = "lenient::uint")]
    pub bath: u32,
    #[serde(with = "lenient::uint")]
    pub max_bath: u32,
    #[serde(with = "lenient::uint")]
    pub level: u32,
    #[serde(with = "lenient::uint")]
    pub experience: u32,
    #[serde(with = "lenient::uint")]
    pub next_level_experience: u32,
    #[serde(
        default,
        with = "lenient::flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_alive: Option<bool>,
    #[serde(
        default,
        with = "lenient::flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_awake: Option<bool>,
}

impl Model for Beast {
    const NAMESPACE: &'static str = NAMESPACE;
    const NAME: &'static str = "Beast";

    fn schema() -> &'static ModelSchema {
        &BEAST_SCHEMA
    }
}

impl Beast {
    pub fn is_alive(&self) -> bool {
        self.is_alive.unwrap_or(self.life > 0)
    }

    pub fn is_awake(&self) -> bool {
        self.is_awake.unwrap_or(true)
    }

    fn raw(&self, stat: Stat) -> (u32, u32) {
        match stat {
            Stat::Life => (self.life, self.max_life),
            Stat::Hunger => (self.hungry, self.max_hungry),
            Stat::Energy => (self.energy, self.max_energy),
            Stat::Happiness => (self.happiness, self.max_happiness),
            Stat::Hygiene => (self.bath, self.max_bath),
        }
    }

    pub fn gauge(&self, stat: Stat) -> Gauge {
        let (value, max) = self.raw(stat);
        Gauge::clamped(value, max)
    }

    pub fn gauges(&self) -> [(Stat, Gauge); 5] {
        Stat::ALL.map(|stat| (stat, self.gauge(stat)))
    }

    pub fn out_of_range_stats(&self) -> Vec<Stat> {
        Stat::ALL
            .into_iter()
            .filter(|stat| {
                let (value, max) = self.raw(*stat);
                value > max
            })
            .collect()
    }
}

/// Value half of [`Beast`], as emitted by the world without the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeastValue {
    #[serde(with = "lenient::uint")]
    pub life: u32,
    #[serde(with = "lenient::uint")]
    pub max_life: u32,
    #[serde(with = "lenient::uint")]
    pub hungry: u32,
    #[serde(with = "lenient::uint")]
    pub max_hungry: u32,
    #[serde(with = "lenient::uint")]
    pub energy: u32,
    #[serde(with = "lenient::uint")]
    pub max_energy: u32,
    #[serde(with = "lenient::uint")]
    pub happiness: u32,
    #[serde(with = "lenient::uint")]
    pub max_happiness: u32,
    #[serde(with = "lenient::uint")]
    pub bath: u32,
    #[serde(with = "lenient::uint")]
    pub max_bath: u32,
    #[serde(with = "lenient::uint")]
    pub level: u32,
    #[serde(with = "lenient::uint")]
    pub experience: u32,
    #[serde(with = "lenient::uint")]
    pub next_level_experience: u32,
}

impl Model for BeastValue {
    const NAMESPACE: &'static str = NAMESPACE;
    const NAME: &'static str = "BeastValue";

    fn schema() -> &'static ModelSchema {
        &BEAST_VALUE_SCHEMA
    }
}

// The indexer is not consistent about number encodings across versions: small
// integers arrive as JSON numbers, wider ones as decimal or hex strings.
mod lenient {
    fn parse_uint(raw: &str) -> Option<u64> {
        let raw = raw.trim();
        match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
            Some(digits) => u64::from_str_radix(digits, 16).ok(),
            None => raw.parse().ok(),
        }
    }

    pub mod uint {
        use super::parse_uint;
        use serde::{
            Deserialize,
            Deserializer,
            Serializer,
            de::Error as _,
        };
        use serde_json::Value;

        pub fn serialize<S: Serializer>(value: &u32, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_u32(*value)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
            let value = Value::deserialize(d)?;
            let wide = match &value {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => parse_uint(s),
                _ => None,
            };
            wide.and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| D::Error::custom(format!("expected a u32, got {value}")))
        }
    }

    pub mod felt {
        use crate::ids::{
            felt_to_hex,
            parse_felt,
        };
        use serde::{
            Deserialize,
            Deserializer,
            Serializer,
            de::Error as _,
        };
        use starknet_core::types::Felt;

        pub fn serialize<S: Serializer>(value: &Felt, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&felt_to_hex(value))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Felt, D::Error> {
            let raw = String::deserialize(d)?;
            parse_felt(&raw).map_err(D::Error::custom)
        }
    }

    pub mod flag {
        use serde::{
            Deserialize,
            Deserializer,
            Serializer,
            de::Error as _,
        };
        use serde_json::Value;

        pub fn serialize<S: Serializer>(
            value: &Option<bool>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(flag) => s.serialize_bool(*flag),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<bool>, D::Error> {
            match Value::deserialize(d)? {
                Value::Null => Ok(None),
                Value::Bool(flag) => Ok(Some(flag)),
                Value::Number(n) if n.as_u64() == Some(0) => Ok(Some(false)),
                Value::Number(n) if n.as_u64() == Some(1) => Ok(Some(true)),
                other => Err(D::Error::custom(format!("expected a bool, got {other}"))),
            }
        }
    }
}
