//! The plain-text wire format: one `key value` pair per line, records separated
//! by blank lines.

use super::domain::{ClaimType, Drive, DriveInfo, DriveStatus, Nic, NicModel, Server, ServerInfo, ServerStatus, Vnc};
use crate::utils::error::{CloudError, Result};
use chrono::DateTime;
use std::collections::BTreeMap;

pub type KeyValues = BTreeMap<String, String>;

/// Non-empty lines, trimmed; the body of `servers/list` and `drives/list`.
pub fn split_lines(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_records(body: &str) -> Vec<KeyValues> {
    let mut records = Vec::new();
    let mut current = KeyValues::new();
    for line in body.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                records.push(std::mem::take(&mut current));
            }
            continue;
        }
        let (key, value) = line.split_once(' ').unwrap_or((line, ""));
        current.insert(key.to_string(), value.trim().to_string());
    }
    if !current.is_empty() {
        records.push(current);
    }
    records
}

pub fn parse_single(body: &str, what: &str) -> Result<KeyValues> {
    parse_records(body)
        .into_iter()
        .next()
        .ok_or_else(|| CloudError::parse(what, "empty response body"))
}

fn words(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn number<T: std::str::FromStr>(map: &KeyValues, key: &str, what: &str) -> Result<Option<T>> {
    map.get(key)
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| CloudError::parse(what, format!("{} is not a number: {}", key, v)))
        })
        .transpose()
}

fn required<'a>(map: &'a KeyValues, key: &str, what: &str) -> Result<&'a String> {
    map.get(key)
        .ok_or_else(|| CloudError::parse(what, format!("missing key {}", key)))
}

fn user_metadata(map: &KeyValues) -> BTreeMap<String, String> {
    map.iter()
        .filter_map(|(k, v)| k.strip_prefix("user:").map(|k| (k.to_string(), v.clone())))
        .collect()
}

fn is_device_key(key: &str) -> bool {
    let mut parts = key.split(':');
    let bus = parts.next().unwrap_or_default();
    matches!(bus, "ide" | "scsi" | "block")
        && parts.clone().count() >= 1
        && parts.clone().count() <= 2
        && parts.all(|p| p.chars().all(|c| c.is_ascii_digit()))
}

fn nics(map: &KeyValues) -> Vec<Nic> {
    let mut nics: BTreeMap<u32, Nic> = BTreeMap::new();
    for (key, value) in map {
        let Some(rest) = key.strip_prefix("nic:") else {
            continue;
        };
        let Some((index, field)) = rest.split_once(':') else {
            continue;
        };
        let Ok(index) = index.parse::<u32>() else {
            continue;
        };
        let nic = nics.entry(index).or_default();
        match field {
            "model" => nic.model = NicModel::parse(value),
            "dhcp" => nic.dhcp = Some(value.clone()),
            "vlan" => nic.vlan = Some(value.clone()),
            "mac" => nic.mac = Some(value.clone()),
            _ => {}
        }
    }
    nics.into_values().collect()
}

pub fn server_info_from_map(map: &KeyValues) -> Result<ServerInfo> {
    const WHAT: &str = "server info";
    let smp = match map.get("smp").map(String::as_str) {
        None | Some("auto") => None,
        Some(_) => number(map, "smp", WHAT)?,
    };
    let server = Server {
        name: required(map, "name", WHAT)?.clone(),
        cpu: number(map, "cpu", WHAT)?.unwrap_or_default(),
        smp,
        mem: number(map, "mem", WHAT)?.unwrap_or_default(),
        persistent: map.get("persistent").map(|v| v == "true").unwrap_or(false),
        devices: map
            .iter()
            .filter(|(k, _)| is_device_key(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        boot_device_ids: words(map.get("boot")),
        nics: nics(map),
        vnc: Vnc {
            ip: map.get("vnc:ip").cloned(),
            password: map.get("vnc:password").cloned(),
            tls: map.get("vnc:tls").map(|v| v == "on" || v == "true").unwrap_or(false),
        },
        tags: words(map.get("tags")),
        user_metadata: user_metadata(map),
    };
    Ok(ServerInfo {
        uuid: required(map, "server", WHAT)?.clone(),
        server,
        status: map
            .get("status")
            .map(|s| ServerStatus::parse(s))
            .unwrap_or(ServerStatus::Unrecognized),
        started: number::<i64>(map, "started", WHAT)?.and_then(|s| DateTime::from_timestamp(s, 0)),
        user: map.get("user").cloned(),
        tx_bytes: number(map, "tx", WHAT)?,
        rx_bytes: number(map, "rx", WHAT)?,
    })
}

pub fn drive_info_from_map(map: &KeyValues) -> Result<DriveInfo> {
    const WHAT: &str = "drive info";
    let drive = Drive {
        name: required(map, "name", WHAT)?.clone(),
        size: number(map, "size", WHAT)?.unwrap_or_default(),
        claim_type: map.get("claim:type").and_then(|v| ClaimType::parse(v)),
        readers: words(map.get("readers")),
        tags: words(map.get("tags")),
        uses: words(map.get("use")),
        user_metadata: user_metadata(map),
    };
    Ok(DriveInfo {
        uuid: required(map, "drive", WHAT)?.clone(),
        drive,
        status: map
            .get("status")
            .map(|s| DriveStatus::parse(s))
            .unwrap_or(DriveStatus::Unrecognized),
        user: map.get("user").cloned(),
        claimed: words(map.get("claimed")),
        imaging: map.get("imaging").cloned().filter(|v| !v.is_empty()),
        drive_type: map.get("type").cloned(),
    })
}

pub fn server_to_plain_text(server: &Server) -> String {
    let mut lines = vec![
        format!("name {}", server.name),
        format!("cpu {}", server.cpu),
        match server.smp {
            Some(smp) => format!("smp {}", smp),
            None => "smp auto".to_string(),
        },
        format!("mem {}", server.mem),
        format!("persistent {}", server.persistent),
    ];
    for (device, drive) in &server.devices {
        lines.push(format!("{} {}", device, drive));
    }
    if !server.boot_device_ids.is_empty() {
        lines.push(format!("boot {}", server.boot_device_ids.join(" ")));
    }
    for (index, nic) in server.nics.iter().enumerate() {
        lines.push(format!("nic:{}:model {}", index, nic.model));
        if let Some(dhcp) = &nic.dhcp {
            lines.push(format!("nic:{}:dhcp {}", index, dhcp));
        }
        if let Some(vlan) = &nic.vlan {
            lines.push(format!("nic:{}:vlan {}", index, vlan));
        }
        if let Some(mac) = &nic.mac {
            lines.push(format!("nic:{}:mac {}", index, mac));
        }
    }
    if let Some(ip) = &server.vnc.ip {
        lines.push(format!("vnc:ip {}", ip));
    }
    if let Some(password) = &server.vnc.password {
        lines.push(format!("vnc:password {}", password));
    }
    if server.vnc.tls {
        lines.push("vnc:tls on".to_string());
    }
    if !server.tags.is_empty() {
        lines.push(format!("tags {}", server.tags.join(" ")));
    }
    for (key, value) in &server.user_metadata {
        lines.push(format!("user:{} {}", key, value));
    }
    lines.join("\n")
}

pub fn drive_to_plain_text(drive: &Drive) -> String {
    let mut lines = vec![format!("name {}", drive.name), format!("size {}", drive.size)];
    if let Some(claim) = drive.claim_type {
        lines.push(format!("claim:type {}", claim));
    }
    if !drive.readers.is_empty() {
        lines.push(format!("readers {}", drive.readers.join(" ")));
    }
    if !drive.tags.is_empty() {
        lines.push(format!("tags {}", drive.tags.join(" ")));
    }
    if !drive.uses.is_empty() {
        lines.push(format!("use {}", drive.uses.join(" ")));
    }
    for (key, value) in &drive.user_metadata {
        lines.push(format!("user:{} {}", key, value));
    }
    lines.join("\n")
}
