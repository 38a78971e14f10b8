//! Build script for glance-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Checks the CYW43 firmware blobs are present
//! - Validates device.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Keys accepted in each section of device.toml
const SECTIONS: &[(&str, &[&str])] = &[
    ("feed", &["url", "timeout_ms", "refresh_ms"]),
    ("clock", &["refresh_ms", "ntp_servers"]),
    ("settings", &["timezone_offset_s", "brightness_pct"]),
    ("wifi", &["ssid", "password", "hostname"]),
];

const CYW43_BLOBS: &[&str] = &["cyw43-firmware/43439A0.bin", "cyw43-firmware/43439A0_clm.bin"];

fn main() {
    setup_linker();
    check_wifi_firmware();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// The radio firmware is not redistributed here; it is fetched separately.
fn check_wifi_firmware() {
    let missing: Vec<&str> = CYW43_BLOBS
        .iter()
        .copied()
        .inspect(|blob| println!("cargo:rerun-if-changed={}", blob))
        .filter(|blob| !Path::new(blob).exists())
        .collect();

    if !missing.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: CYW43 WiFi firmware not found!                           ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ║                                                                  ║\n\
            ║  Copy 43439A0.bin and 43439A0_clm.bin from embassy's             ║\n\
            ║  cyw43-firmware/ directory into glance-firmware/cyw43-firmware/  ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            missing
                .iter()
                .map(|blob| format!("║  • missing {:<54} ║", blob))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }
}

/// Validate device.toml configuration at compile time
fn validate_config() {
    // Re-run if device.toml changes
    println!("cargo:rerun-if-changed=device.toml");

    let config_path = Path::new("device.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: device.toml not found!                                   ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds a device.toml with WiFi credentials and     ║\n\
            ║  the feed URL. Create one in the glance-firmware directory.      ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read device.toml                               ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    // Parse and validate TOML syntax
    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in device.toml                       ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    validate_layout(&config, &mut errors);
    validate_feed(&config, &mut errors);
    validate_settings(&config, &mut errors);
    validate_wifi(&config, &mut errors);

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid values in device.toml                            ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=device.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Only the known sections and keys, and no top-level values
fn validate_layout(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(table) = config.as_table() else {
        return;
    };

    for (name, value) in table {
        let Some((_, keys)) = SECTIONS.iter().find(|(section, _)| section == name) else {
            errors.push(format!("Unknown section or key '{}'", name));
            continue;
        };
        let Some(section) = value.as_table() else {
            errors.push(format!("'{}' must be a [section]", name));
            continue;
        };
        for key in section.keys() {
            if !keys.contains(&key.as_str()) {
                errors.push(format!("Unknown key '{}' in [{}]", key, name));
            }
        }
    }
}

fn validate_feed(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(feed) = config.get("feed") else {
        println!("cargo:warning=device.toml has no [feed] url, every sync will show Connect Fail");
        return;
    };

    match feed.get("url").map(|url| url.as_str()) {
        Some(Some(url)) if url.len() > 256 => errors.push("[feed] url is longer than 256 bytes".into()),
        Some(Some(url)) if !url.is_empty() && !url.starts_with("https://") => {
            errors.push("[feed] url must start with https://".into())
        }
        Some(None) => errors.push("[feed] url must be a string".into()),
        _ => {}
    }

    for key in ["timeout_ms", "refresh_ms"] {
        if let Some(value) = feed.get(key) {
            match value.as_integer() {
                Some(ms) if ms > 0 && ms <= i64::from(u32::MAX) => {}
                _ => errors.push(format!("[feed] {} must be a positive integer", key)),
            }
        }
    }
}

fn validate_settings(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(settings) = config.get("settings") else {
        return;
    };

    if let Some(value) = settings.get("timezone_offset_s") {
        match value.as_integer() {
            Some(offset) if -43_200 < offset && offset < 50_400 => {}
            _ => errors.push("[settings] timezone_offset_s must be in -43199..=50399".into()),
        }
    }

    if let Some(value) = settings.get("brightness_pct") {
        match value.as_integer() {
            Some(pct) if (0..=100).contains(&pct) => {}
            _ => errors.push("[settings] brightness_pct must be in 0..=100".into()),
        }
    }
}

fn validate_wifi(config: &toml::Value, errors: &mut Vec<String>) {
    let ssid = config
        .get("wifi")
        .and_then(|wifi| wifi.get("ssid"))
        .and_then(|ssid| ssid.as_str())
        .unwrap_or("");

    if ssid.is_empty() {
        errors.push("[wifi] ssid is required".into());
    } else if ssid.len() > 32 {
        errors.push("[wifi] ssid is longer than 32 bytes".into());
    }

    if let Some(password) = config
        .get("wifi")
        .and_then(|wifi| wifi.get("password"))
        .and_then(|password| password.as_str())
    {
        if !password.is_empty() && !(8..=64).contains(&password.len()) {
            errors.push("[wifi] password must be 8..=64 bytes".into());
        }
    }
}
