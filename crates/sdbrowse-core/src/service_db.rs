//! Description table for raw DNS-SD service types.
//!
//! The on-disk format is one `type:Description` entry per line, `#` starts a
//! comment, and `type[lang]:Description` entries carry a translation that
//! wins when it matches the requested locale.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

const BUILTIN: &[(&str, &str)] = &[
    ("_adisk._tcp", "Time Machine Disk"),
    ("_afpovertcp._tcp", "Apple File Sharing"),
    ("_airplay._tcp", "AirPlay"),
    ("_daap._tcp", "iTunes Audio Access"),
    ("_dacp._tcp", "iTunes Remote Control"),
    ("_device-info._tcp", "Device Info"),
    ("_distcc._tcp", "Distributed Compiler"),
    ("_ftp._tcp", "FTP File Transfer"),
    ("_googlecast._tcp", "Google Cast"),
    ("_home-assistant._tcp", "Home Assistant"),
    ("_http._tcp", "Web Site"),
    ("_https._tcp", "Secure Web Site"),
    ("_ipp._tcp", "Internet Printer"),
    ("_ipps._tcp", "Secure Internet Printer"),
    ("_mpd._tcp", "Music Player Daemon"),
    ("_nfs._tcp", "Network File System"),
    ("_pdl-datastream._tcp", "PDL Printer"),
    ("_presence._tcp", "iChat Presence"),
    ("_printer._tcp", "UNIX Printer"),
    ("_raop._tcp", "AirTunes Remote Audio"),
    ("_rfb._tcp", "VNC Remote Access"),
    ("_scanner._tcp", "Scanner"),
    ("_sftp-ssh._tcp", "SFTP File Transfer"),
    ("_smb._tcp", "Microsoft Windows Network"),
    ("_spotify-connect._tcp", "Spotify Connect"),
    ("_ssh._tcp", "SSH Remote Terminal"),
    ("_telnet._tcp", "Telnet Remote Terminal"),
    ("_uscan._tcp", "Scanner (eSCL)"),
    ("_webdav._tcp", "WebDAV File Share"),
    ("_webdavs._tcp", "Secure WebDAV File Share"),
    ("_workstation._tcp", "Workstation"),
];

/// Read-only lookup from raw service type (`_http._tcp`) to description.
#[derive(Debug, Clone, Default)]
pub struct ServiceTypeDatabase {
    entries: HashMap<String, String>,
}

impl ServiceTypeDatabase {
    /// A table with no entries; every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The table compiled into the binary.
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN
                .iter()
                .map(|(stype, description)| (stype.to_string(), description.to_string()))
                .collect(),
        }
    }

    /// Parses the `type:Description` format.
    ///
    /// `locale` is a POSIX-style locale (`de_DE.UTF-8`); an entry tagged with
    /// the full `de_DE` form beats one tagged `de`, which beats the untagged
    /// entry. Malformed lines are skipped.
    pub fn parse(text: &str, locale: Option<&str>) -> Self {
        let (full, lang) = split_locale(locale);
        let mut ranked: HashMap<String, (u8, String)> = HashMap::new();

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, description)) = line.split_once(':') else {
                debug!(line = lineno + 1, "Skipping malformed service type entry");
                continue;
            };

            let (stype, rank) = match key.split_once('[') {
                None => (key, 0),
                Some((stype, tag)) => {
                    let tag = tag.trim_end_matches(']');
                    if full.as_deref() == Some(tag) {
                        (stype, 2)
                    } else if lang.as_deref() == Some(tag) {
                        (stype, 1)
                    } else {
                        continue;
                    }
                }
            };

            let stype = stype.trim();
            if stype.is_empty() {
                continue;
            }

            match ranked.get(stype) {
                Some((existing, _)) if *existing > rank => {}
                _ => {
                    ranked.insert(stype.to_string(), (rank, description.trim().to_string()));
                }
            }
        }

        Self {
            entries: ranked
                .into_iter()
                .map(|(stype, (_, description))| (stype, description))
                .collect(),
        }
    }

    /// Loads and parses a description file.
    pub fn from_file<P: AsRef<Path>>(path: P, locale: Option<&str>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let db = Self::parse(&text, locale);
        debug!(path = %path.display(), entries = db.len(), "Loaded service type database");
        Ok(db)
    }

    /// Adds the entries of `other`, replacing descriptions already present.
    pub fn extend(&mut self, other: ServiceTypeDatabase) {
        self.entries.extend(other.entries);
    }

    pub fn description(&self, service_type: &str) -> Option<&str> {
        self.entries.get(service_type).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `de_DE.UTF-8@euro` -> (`de_DE`, `de`)
fn split_locale(locale: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(locale) = locale else {
        return (None, None);
    };

    let full = locale
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .to_string();
    if full.is_empty() || full == "C" || full == "POSIX" {
        return (None, None);
    }

    let lang = full.split('_').next().unwrap_or_default().to_string();
    (Some(full), Some(lang))
}
