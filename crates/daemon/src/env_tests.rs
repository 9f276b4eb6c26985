// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

struct EnvGuard(Vec<(&'static str, Option<String>)>);

impl EnvGuard {
    fn set(vars: &[(&'static str, Option<&str>)]) -> Self {
        let saved = vars.iter().map(|(k, _)| (*k, std::env::var(k).ok())).collect();
        for (k, v) in vars {
            match v {
                Some(v) => std::env::set_var(k, v),
                None => std::env::remove_var(k),
            }
        }
        Self(saved)
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (k, v) in &self.0 {
            match v {
                Some(v) => std::env::set_var(k, v),
                None => std::env::remove_var(k),
            }
        }
    }
}

#[test]
#[serial]
fn explicit_state_dir_wins() {
    let _env = EnvGuard::set(&[
        ("CADENCE_STATE_DIR", Some("/srv/cadence")),
        ("XDG_STATE_HOME", Some("/xdg")),
        ("HOME", Some("/home/u")),
    ]);
    assert_eq!(state_dir().unwrap(), Path::new("/srv/cadence"));
}

#[test]
#[serial]
fn xdg_state_home_is_next() {
    let _env = EnvGuard::set(&[
        ("CADENCE_STATE_DIR", None),
        ("XDG_STATE_HOME", Some("/xdg")),
        ("HOME", Some("/home/u")),
    ]);
    assert_eq!(state_dir().unwrap(), Path::new("/xdg/cadence"));
}

#[test]
#[serial]
fn home_fallback_and_blank_values_are_ignored() {
    let _env = EnvGuard::set(&[
        ("CADENCE_STATE_DIR", Some("  ")),
        ("XDG_STATE_HOME", Some("")),
        ("HOME", Some("/home/u")),
    ]);
    assert_eq!(state_dir().unwrap(), Path::new("/home/u/.local/state/cadence"));
}

#[test]
#[serial]
fn no_home_is_an_error() {
    let _env = EnvGuard::set(&[("CADENCE_STATE_DIR", None), ("XDG_STATE_HOME", None), ("HOME", None)]);
    assert!(matches!(state_dir(), Err(LifecycleError::NoStateDir)));
}

/// Log sink for asserting on warnings.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[yare::parameterized(
    unset   = { None, 256, false },
    valid   = { Some("16"), 16, false },
    padded  = { Some(" 32 "), 32, false },
    zero    = { Some("0"), 256, true },
    garbage = { Some("lots"), 256, true },
)]
#[serial]
fn notification_capacity_cases(raw: Option<&str>, expected: usize, warns: bool) {
    let _env = EnvGuard::set(&[("CADENCE_NOTIFY_CAPACITY", raw)]);
    let logs = Captured::default();
    let sink = logs.clone();
    let subscriber = tracing_subscriber::fmt().with_writer(move || sink.clone()).with_ansi(false).finish();

    let capacity = tracing::subscriber::with_default(subscriber, notification_capacity);
    assert_eq!(capacity, expected);
    let text = logs.text();
    assert_eq!(text.contains("invalid value, using default"), warns, "{text}");
    if warns {
        assert!(text.contains("CADENCE_NOTIFY_CAPACITY"), "{text}");
    }
}
