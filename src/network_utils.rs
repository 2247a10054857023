// Network Fail-Safe - Network Utilities
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Output parsing for the OS network-control tools.
//!
//! `nmcli` is always queried in terse mode (`-t`), where fields are
//! separated by `:` and literal `:` or `\` inside a value are escaped
//! with a backslash. `netsh wlan` output is free-form `Key : Value` text.

use once_cell::sync::Lazy;
use regex::Regex;

static NETSH_PROFILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*Profile\s*:\s*(.+?)\s*$").expect("valid netsh profile regex")
});

static NETSH_SSID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*SSID\s+\d+\s*:\s*(.*?)\s*$").expect("valid netsh ssid regex")
});

/// Split one line of `nmcli -t` output into unescaped fields.
pub fn split_terse_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => current.push('\\'),
            },
            ':' => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    fields.push(current);
    fields
}

/// Check if a connection name belongs to a loopback, bridge or container interface.
fn is_virtual_connection(name: &str) -> bool {
    name == "lo" || name.contains("virbr") || name.contains("docker")
}

/// Push `name` unless it is empty or already present.
fn push_unique(names: &mut Vec<String>, name: String) {
    if !name.is_empty() && !names.contains(&name) {
        names.push(name);
    }
}

/// Parse `nmcli -t -f NAME connection show`.
pub fn parse_nmcli_profiles(output: &str) -> Vec<String> {
    let mut profiles = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let name = split_terse_fields(line).swap_remove(0);
        let name = name.trim().to_string();
        if is_virtual_connection(&name) {
            continue;
        }
        push_unique(&mut profiles, name);
    }
    profiles
}

/// Parse `nmcli -t -f NAME,STATE connection show --active`.
pub fn parse_nmcli_active(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(split_terse_fields)
        .find(|fields| fields.get(1).map(|s| s.trim() == "activated").unwrap_or(false))
        .map(|fields| fields[0].trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Parse `nmcli -t -f SSID dev wifi` into the SSIDs currently in the air.
pub fn parse_nmcli_ssids(output: &str) -> Vec<String> {
    let mut ssids = Vec::new();
    for line in output.lines() {
        let ssid = split_terse_fields(line.trim()).swap_remove(0);
        push_unique(&mut ssids, ssid.trim().to_string());
    }
    ssids
}

/// Parse `netsh wlan show profiles`.
pub fn parse_netsh_profiles(output: &str) -> Vec<String> {
    let mut profiles = Vec::new();
    for line in output.lines() {
        if let Some((_, value)) = line.split_once(':') {
            push_unique(&mut profiles, value.trim().to_string());
        }
    }
    profiles
}

/// Parse `netsh wlan show interfaces` for the connected profile.
pub fn parse_netsh_active(output: &str) -> Option<String> {
    NETSH_PROFILE_RE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|name| !name.is_empty())
}

/// Parse `netsh wlan show networks` into the SSIDs currently in the air.
pub fn parse_netsh_ssids(output: &str) -> Vec<String> {
    let mut ssids = Vec::new();
    for caps in NETSH_SSID_RE.captures_iter(output) {
        if let Some(m) = caps.get(1) {
            push_unique(&mut ssids, m.as_str().to_string());
        }
    }
    ssids
}

/// Fallback failure detection for tools that report errors on a zero exit.
pub fn output_reports_failure(output: &str) -> bool {
    let lower = output.to_lowercase();
    lower.contains("error") || lower.contains("failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_terse_fields_unescapes() {
        assert_eq!(split_terse_fields("Home:activated"), vec!["Home", "activated"]);
        assert_eq!(split_terse_fields(r"Cafe\: Guest:activated"), vec!["Cafe: Guest", "activated"]);
        assert_eq!(split_terse_fields(r"back\\slash"), vec![r"back\slash"]);
    }

    #[test]
    fn test_nmcli_profiles_skip_virtual() {
        let out = "Home\nlo\nvirbr0\ndocker0\nOffice Wi-Fi\n\nHome\n";
        assert_eq!(parse_nmcli_profiles(out), vec!["Home", "Office Wi-Fi"]);
    }

    #[test]
    fn test_nmcli_active() {
        let out = "docker0:activated\n";
        assert_eq!(parse_nmcli_active(out), Some("docker0".to_string()));

        let out = "Home:activating\nPhone:activated\n";
        assert_eq!(parse_nmcli_active(out), Some("Phone".to_string()));

        assert_eq!(parse_nmcli_active(""), None);
        assert_eq!(parse_nmcli_active("Home:deactivating\n"), None);
    }

    #[test]
    fn test_nmcli_ssids() {
        let out = "Home\n\nHome\nNeighbour\n--\n";
        assert_eq!(parse_nmcli_ssids(out), vec!["Home", "Neighbour", "--"]);
    }

    #[test]
    fn test_netsh_profiles() {
        let out = "\
Profiles on interface Wi-Fi:

Group policy profiles (read only)
---------------------------------
    <None>

User profiles
-------------
    All User Profile     : Home
    All User Profile     : Office: 5G
";
        assert_eq!(parse_netsh_profiles(out), vec!["Home", "Office: 5G"]);
    }

    #[test]
    fn test_netsh_active() {
        let out = "\
There is 1 interface on the system:

    Name                   : Wi-Fi
    State                  : connected
    SSID                   : HomeNet
    Profile                : HomeNet
    Signal                 : 92%
";
        assert_eq!(parse_netsh_active(out), Some("HomeNet".to_string()));
        assert_eq!(parse_netsh_active("    State : disconnected\n"), None);
    }

    #[test]
    fn test_netsh_ssids_exact() {
        let out = "\
Interface name : Wi-Fi
There are 2 networks currently visible.

SSID 1 : HomeNet-Guest
    Network type            : Infrastructure
    Authentication          : WPA2-Personal

SSID 2 : Office
    Network type            : Infrastructure
";
        let ssids = parse_netsh_ssids(out);
        assert_eq!(ssids, vec!["HomeNet-Guest", "Office"]);
        assert!(!ssids.contains(&"HomeNet".to_string()));
    }

    #[test]
    fn test_output_reports_failure() {
        assert!(output_reports_failure("Error: Connection activation failed."));
        assert!(output_reports_failure("FAILED"));
        assert!(!output_reports_failure("Device 'wlan0' successfully activated"));
    }
}
