//! Deserialization of the short and long syntaxes a compose file allows.
//!
//! Most fields of a service accept more than one shape (`ports: ["80"]` as well
//! as `ports: [{target: 80}]`). The raw shapes are decoded here and converted
//! into the single canonical model type with `TryFrom`, so the rest of the
//! crate never sees the alternatives.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use super::{SecretReference, SecretSpec, ServicePort, VolumeMount};

/// Deserialize a map whose values may be `null` (`networks: { back: }`).
pub(super) fn map_with_null_values<'de, D, T>(
    deserializer: D,
) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw: Option<BTreeMap<String, Option<T>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(name, value)| (name, value.unwrap_or_default()))
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    String(String),
    List(Vec<String>),
}

/// `command: npm start` or `command: ["npm", "start"]`.
pub(super) fn command<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrList>::deserialize(deserializer)?.map(|raw| match raw {
        StringOrList::String(line) => line.split_whitespace().map(str::to_string).collect(),
        StringOrList::List(args) => args,
    }))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MapOrList {
    Map(BTreeMap<String, Value>),
    List(Vec<String>),
}

fn scalar_to_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// `environment: {A: 1}` or `environment: ["A=1"]`.
pub(super) fn environment<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<MapOrList> = Option::deserialize(deserializer)?;
    Ok(match raw {
        None => BTreeMap::new(),
        Some(MapOrList::Map(map)) => {
            map.into_iter().map(|(key, value)| (key, scalar_to_string(value))).collect()
        }
        Some(MapOrList::List(entries)) => entries
            .into_iter()
            .map(|entry| match entry.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (entry, String::new()),
            })
            .collect(),
    })
}

/// `depends_on: [db]` or `depends_on: {db: {condition: ...}}`.
pub(super) fn name_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<MapOrList> = Option::deserialize(deserializer)?;
    Ok(match raw {
        None => BTreeSet::new(),
        Some(MapOrList::Map(map)) => map.into_keys().collect(),
        Some(MapOrList::List(names)) => names.into_iter().collect(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

/// `cpus: 0.5` or `cpus: "0.5"`.
pub(super) fn cpus<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid cpu count '{s}'"))),
    }
}

/// `memory: 536870912` or `memory: 512M`.
pub(super) fn memory<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n as u64)),
        Some(NumberOrString::String(s)) => parse_memory(&s)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid memory size '{s}'"))),
    }
}

/// Parse a byte size with an optional binary unit suffix (`b`, `k`, `m`, `g`).
pub(crate) fn parse_memory(raw: &str) -> Option<u64> {
    let lower = raw.trim().to_ascii_lowercase();
    let unit_start = lower.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(lower.len());
    let (number, unit) = lower.split_at(unit_start);
    let value: f64 = number.parse().ok()?;
    let multiplier: u64 = match unit.trim_end_matches('b').trim_end_matches('i') {
        "" => 1,
        "k" => 1 << 10,
        "m" => 1 << 20,
        "g" => 1 << 30,
        _ => return None,
    };
    Some((value * multiplier as f64) as u64)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortNumber {
    Number(u16),
    String(String),
}

impl PortNumber {
    fn into_port(self) -> Result<u16, String> {
        match self {
            PortNumber::Number(n) => Ok(n),
            PortNumber::String(s) => s.parse().map_err(|_| format!("invalid port '{s}'")),
        }
    }
}

/// Every accepted port syntax.
#[derive(Deserialize)]
#[serde(untagged)]
pub(super) enum RawPort {
    Number(u16),
    Short(String),
    Long {
        target: u16,
        #[serde(default)]
        published: Option<PortNumber>,
        #[serde(default)]
        protocol: Option<String>,
    },
}

impl TryFrom<RawPort> for ServicePort {
    type Error = String;

    fn try_from(raw: RawPort) -> Result<Self, Self::Error> {
        match raw {
            RawPort::Number(target) => Ok(ServicePort::tcp(target)),
            RawPort::Long {
                target,
                published,
                protocol,
            } => Ok(ServicePort {
                target,
                published: published.map(PortNumber::into_port).transpose()?.unwrap_or(target),
                protocol: protocol.map_or_else(|| "tcp".to_string(), |p| p.to_lowercase()),
            }),
            RawPort::Short(spec) => parse_short_port(&spec),
        }
    }
}

/// `[HOST_IP:][PUBLISHED:]TARGET[/PROTOCOL]`
fn parse_short_port(spec: &str) -> Result<ServicePort, String> {
    let (ports, protocol) = match spec.rsplit_once('/') {
        Some((ports, protocol)) => (ports, protocol.to_lowercase()),
        None => (spec, "tcp".to_string()),
    };
    let parse = |s: &str| s.parse::<u16>().map_err(|_| format!("invalid port specification '{spec}'"));

    let mut parts = ports.rsplit(':');
    let target = parse(parts.next().unwrap_or_default())?;
    let published = match parts.next() {
        Some(published) if !published.is_empty() => parse(published)?,
        _ => target,
    };
    Ok(ServicePort {
        target,
        published,
        protocol,
    })
}

#[derive(Deserialize)]
struct RawVolumeOptions {
    #[serde(default)]
    subpath: Option<String>,
}

/// Every accepted volume mount syntax.
#[derive(Deserialize)]
#[serde(untagged)]
pub(super) enum RawMount {
    Short(String),
    Long {
        source: String,
        target: String,
        #[serde(default)]
        read_only: bool,
        #[serde(default)]
        subpath: Option<String>,
        #[serde(default)]
        volume: Option<RawVolumeOptions>,
    },
}

impl TryFrom<RawMount> for VolumeMount {
    type Error = String;

    fn try_from(raw: RawMount) -> Result<Self, Self::Error> {
        match raw {
            RawMount::Long {
                source,
                target,
                read_only,
                subpath,
                volume,
            } => Ok(VolumeMount {
                source,
                target,
                subpath: subpath.or_else(|| volume.and_then(|options| options.subpath)),
                read_only,
            }),
            RawMount::Short(spec) => {
                let mut parts = spec.splitn(3, ':');
                let source = parts.next().unwrap_or_default();
                let target = parts
                    .next()
                    .ok_or_else(|| format!("volume mount '{spec}' must be SOURCE:TARGET[:MODE]"))?;
                let read_only = match parts.next() {
                    None | Some("rw") => false,
                    Some("ro") => true,
                    Some(mode) => return Err(format!("unsupported mount mode '{mode}' in '{spec}'")),
                };
                Ok(VolumeMount {
                    source: source.to_string(),
                    target: target.to_string(),
                    subpath: None,
                    read_only,
                })
            }
        }
    }
}

/// `secrets: [db]` or `secrets: [{source: db, target: password}]`.
#[derive(Deserialize)]
#[serde(untagged)]
pub(super) enum RawSecretReference {
    Short(String),
    Long {
        source: String,
        #[serde(default)]
        target: Option<String>,
    },
}

impl From<RawSecretReference> for SecretReference {
    fn from(raw: RawSecretReference) -> Self {
        match raw {
            RawSecretReference::Short(source) => SecretReference {
                source,
                target: None,
            },
            RawSecretReference::Long {
                source,
                target,
            } => SecretReference {
                source,
                target,
            },
        }
    }
}

/// Project-level secret declaration.
#[derive(Deserialize, Serialize)]
pub(super) struct RawSecret {
    #[serde(default)]
    file: Option<PathBuf>,
    #[serde(default)]
    external: bool,
    #[serde(default)]
    name: Option<String>,
}

impl TryFrom<RawSecret> for SecretSpec {
    type Error = String;

    fn try_from(raw: RawSecret) -> Result<Self, Self::Error> {
        match (raw.external, raw.file) {
            (true, Some(_)) => Err("a secret cannot be both external and file-backed".to_string()),
            (true, None) => Ok(SecretSpec::External {
                name: raw.name,
            }),
            (false, Some(path)) => Ok(SecretSpec::File {
                path,
            }),
            // `name` alone refers to an already provisioned secret
            (false, None) if raw.name.is_some() => Ok(SecretSpec::External {
                name: raw.name,
            }),
            (false, None) => Err("a secret must declare `file` or `external: true`".to_string()),
        }
    }
}
