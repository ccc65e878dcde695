//! Bridge configuration file parser.
//!
//! The rc file uses the same line syntax as the rest of the firmware tooling:
//!
//! | Directive | Action |
//! |-----------|--------|
//! | `/set <name>=<value>` or `/set <name> <value>` | set a bridge setting |
//! | Lines starting with `;` | comment, ignored |
//! | Any other `/command` | silently skipped |
//!
//! Recognised settings:
//!
//! | Name | Default | Meaning |
//! |------|---------|---------|
//! | `poll_interval_ms` | 1 | sleep between quiescence polls |
//! | `poll_limit` | 1000 | polls before an injection gives up |
//! | `gc_budget` | 100 | collection budget passed with a pause request |
//! | `eeprom_slots` | 64 | addressable custom EEPROM words |
//! | `tick_rate_hz` | 10000 | system timer ticks per second |

use std::path::Path;
use std::time::Duration;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a config file.
#[derive(Debug)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Timing of the pause/poll/resume handshake used by the event injector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectConfig {
    pub poll_interval: Duration,
    pub poll_limit: u32,
    pub gc_budget: u32,
}

impl Default for InjectConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            poll_limit: 1000,
            gc_budget: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    pub inject: InjectConfig,
    pub eeprom_slots: usize,
    pub tick_rate_hz: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            inject: InjectConfig::default(),
            eeprom_slots: 64,
            tick_rate_hz: 10_000,
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config string.
    ///
    /// Unknown directives are skipped; bad `/set` lines leave the default in
    /// place and are reported in the returned list.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = BridgeConfig::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with(';') {
                continue;
            }

            let Some(rest) = line.strip_prefix('/') else { continue };

            let (cmd, args_str) = rest
                .split_once(|c: char| c.is_ascii_whitespace())
                .unwrap_or((rest, ""));

            if cmd == "set" {
                let tokens: Vec<&str> = args_str.split_ascii_whitespace().collect();
                if let Err(msg) = config.parse_set(&tokens) {
                    errors.push(ConfigError { line: lineno, message: msg });
                }
            }
        }

        (config, errors)
    }

    /// Read and parse a config file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    /// Apply `/set <name>=<value>` or `/set <name> <value>`.
    fn parse_set(&mut self, tokens: &[&str]) -> Result<(), String> {
        let (name, value, rest) = match tokens {
            [] => return Err("/set: requires an argument".into()),
            [first, rest @ ..] => match (first.split_once('='), rest) {
                (Some((n, v)), _) => (n, v, rest),
                (None, [value, rest @ ..]) => (*first, *value, rest),
                (None, []) => return Err(format!("/set: missing value for '{first}'")),
            },
        };
        if !rest.is_empty() {
            return Err(format!("/set: unexpected '{}' after value for '{name}'", rest.join(" ")));
        }

        match name {
            "poll_interval_ms" => {
                self.inject.poll_interval = Duration::from_millis(number(name, value)?);
            }
            "poll_limit" => self.inject.poll_limit = positive(name, value)?,
            "gc_budget" => self.inject.gc_budget = number(name, value)?,
            "eeprom_slots" => self.eeprom_slots = number(name, value)?,
            "tick_rate_hz" => self.tick_rate_hz = positive(name, value)?,
            "" => return Err("/set: setting name cannot be empty".into()),
            _ => return Err(format!("/set: unknown setting '{name}'")),
        }
        Ok(())
    }
}

fn number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("/set: '{name}' expects a non-negative integer, got '{value}'"))
}

fn positive(name: &str, value: &str) -> Result<u32, String> {
    match number(name, value)? {
        0 => Err(format!("/set: '{name}' must be at least 1")),
        n => Ok(n),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // -- /set -----------------------------------------------------------------

    #[test]
    fn defaults() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.inject.poll_interval, Duration::from_millis(1));
        assert_eq!(cfg.inject.poll_limit, 1000);
        assert_eq!(cfg.inject.gc_budget, 100);
        assert_eq!(cfg.eeprom_slots, 64);
        assert_eq!(cfg.tick_rate_hz, 10_000);
    }

    #[test]
    fn set_equals_syntax() {
        let (cfg, errs) = BridgeConfig::load_str("/set poll_limit=25");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.inject.poll_limit, 25);
    }

    #[test]
    fn set_space_syntax() {
        let (cfg, errs) = BridgeConfig::load_str("/set poll_interval_ms 5");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.inject.poll_interval, Duration::from_millis(5));
    }

    #[test]
    fn unknown_setting_is_error() {
        let (cfg, errs) = BridgeConfig::load_str("/set wrap=1");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].line, 1);
        assert_eq!(cfg, BridgeConfig::default());
    }

    #[test]
    fn bad_number_keeps_default() {
        let (cfg, errs) = BridgeConfig::load_str("/set gc_budget=lots\n/set eeprom_slots=-1");
        assert_eq!(errs.len(), 2, "{errs:?}");
        assert_eq!(errs[1].line, 2);
        assert_eq!(cfg.inject.gc_budget, 100);
        assert_eq!(cfg.eeprom_slots, 64);
    }

    #[test]
    fn zero_poll_limit_rejected() {
        let (cfg, errs) = BridgeConfig::load_str("/set poll_limit=0");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("at least 1"));
        assert_eq!(cfg.inject.poll_limit, 1000);
    }

    #[test]
    fn trailing_tokens_are_error() {
        let (cfg, errs) = BridgeConfig::load_str("/set poll_limit 10 20\n/set gc_budget=5 6");
        assert_eq!(errs.len(), 2, "{errs:?}");
        assert_eq!(cfg.inject.poll_limit, 1000);
        assert_eq!(cfg.inject.gc_budget, 100);
    }

    #[test]
    fn quoted_values_are_not_numbers() {
        let (cfg, errs) = BridgeConfig::load_str("/set gc_budget \"50\"");
        assert_eq!(errs.len(), 1);
        assert_eq!(cfg.inject.gc_budget, 100);
    }

    #[test]
    fn missing_value_is_error() {
        let (_, errs) = BridgeConfig::load_str("/set tick_rate_hz");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].to_string().starts_with("line 1:"));
    }

    // -- Comments & skipping --------------------------------------------------

    #[test]
    fn comments_blank_lines_and_unknown_commands_skipped() {
        let src = "\
;; bridge settings\n\
\n\
/load other.rc\n\
; slower polling on the bench supply\n\
/set poll_interval_ms=2\n\
/set tick_rate_hz 1000\n";
        let (cfg, errs) = BridgeConfig::load_str(src);
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.inject.poll_interval, Duration::from_millis(2));
        assert_eq!(cfg.tick_rate_hz, 1000);
    }

    #[test]
    fn load_file_reads_from_disk() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "/set gc_budget=7").unwrap();
        let (cfg, errs) = BridgeConfig::load_file(f.path()).unwrap();
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.inject.gc_budget, 7);
    }

    #[test]
    fn load_file_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BridgeConfig::load_file(&dir.path().join("absent.rc")).is_err());
    }
}
