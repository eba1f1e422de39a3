// Note resolver - maps confirmed raw transitions to named logical notes
//
// Sits between the signal listener and the game layer: a small fixed
// binding table associates logical note names with the sensor codes that
// represent them, and every raw edge within the classification window of a
// bound code is forwarded as a named on/off event.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use log::info;

use crate::config::ResolverSettings;
use crate::error::{log_config_error, ConfigError, PortError};
use crate::link::SerialLink;
use crate::listener::{RawEvent, SignalListener};

/// Named note event, the unit the game layer consumes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResolvedNote {
    /// Logical note identifier, e.g. "nota3".
    pub name: String,
    /// True on press, false on release.
    pub on: bool,
}

/// Association between a logical note name and the sensor code expected
/// to represent it. Built once by [NoteResolver::configure], immutable
/// thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteBinding {
    pub name: String,
    pub code: i64,
}

/// Callback invoked with each resolved note, on the polling thread.
pub type ResolvedNoteCallback = Arc<dyn Fn(ResolvedNote) + Send + Sync + 'static>;

/// Maps raw sensor transitions to logical notes.
///
/// Owns its [SignalListener] and delegates lifecycle to it. Bindings are
/// supplied via a one-time [configure](Self::configure) call before
/// [start](Self::start). Bound codes must stay separated by more than
/// twice the tolerance, or one raw event will fire several bindings at
/// once; that separation is the caller's responsibility.
pub struct NoteResolver {
    listener: SignalListener,
    callback: ResolvedNoteCallback,
    tolerance: f64,
    bindings: Arc<Mutex<Vec<NoteBinding>>>,
    callback_registered: bool,
}

impl NoteResolver {
    /// Create a resolver around a listener and the game-facing callback.
    ///
    /// # Errors
    /// `ConfigError::InvalidTolerance` unless `0 < tolerance <= 0.5`.
    pub fn new<F>(
        listener: SignalListener,
        tolerance: f64,
        callback: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(ResolvedNote) + Send + Sync + 'static,
    {
        if !tolerance.is_finite() || tolerance <= 0.0 || tolerance > 0.5 {
            let err = ConfigError::InvalidTolerance { value: tolerance };
            log_config_error(&err, "new");
            return Err(err);
        }
        Ok(Self {
            listener,
            callback: Arc::new(callback),
            tolerance,
            bindings: Arc::new(Mutex::new(Vec::new())),
            callback_registered: false,
        })
    }

    /// Create a resolver from configuration settings, bindings included.
    pub fn from_settings<F>(
        listener: SignalListener,
        settings: &ResolverSettings,
        callback: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(ResolvedNote) + Send + Sync + 'static,
    {
        let mut resolver = Self::new(listener, settings.tolerance, callback)?;
        resolver.configure(
            settings
                .bindings
                .iter()
                .map(|(name, code)| (name.clone(), *code)),
        )?;
        Ok(resolver)
    }

    /// Supply the note binding table. One-time setup call, before start().
    ///
    /// # Errors
    /// `ConfigError::InvalidCode` if a code is not a finite integral
    /// value; `ConfigError::DuplicateName` if a name is bound twice. On
    /// error the previous binding set is left untouched.
    pub fn configure<I>(&mut self, bindings: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let mut validated = Vec::new();
        let mut seen = HashSet::new();
        for (name, code) in bindings {
            // Hard validation here, so run-time resolution never sees a
            // malformed code.
            if !code.is_finite() || code.fract() != 0.0 || code.abs() > i64::MAX as f64 {
                let err = ConfigError::InvalidCode { name, code };
                log_config_error(&err, "configure");
                return Err(err);
            }
            if !seen.insert(name.clone()) {
                let err = ConfigError::DuplicateName { name };
                log_config_error(&err, "configure");
                return Err(err);
            }
            validated.push(NoteBinding {
                name,
                code: code as i64,
            });
        }

        info!("[NoteResolver] {} note bindings configured", validated.len());
        *self.bindings.lock().expect("bindings lock poisoned") = validated;
        Ok(())
    }

    /// Configure the port on the inner listener.
    pub fn set_port(&self, link: Box<dyn SerialLink>) -> Result<(), PortError> {
        self.listener.set_port(link)
    }

    /// Start capturing notes. Returns immediately.
    ///
    /// Registers the resolving callback on the inner listener (exactly
    /// once, across restarts) and forwards start().
    pub fn start(&mut self) -> Result<(), PortError> {
        if !self.callback_registered {
            let bindings = Arc::clone(&self.bindings);
            let tolerance = self.tolerance;
            let callback = Arc::clone(&self.callback);
            self.listener.register_callback(move |event| {
                resolve_event(&bindings, tolerance, event, callback.as_ref());
            })?;
            self.callback_registered = true;
        }
        self.listener.start()
    }

    /// Stop capturing notes. Blocks until the polling thread has exited.
    pub fn stop(&mut self) {
        self.listener.stop();
    }

    /// Stop capturing and close the port.
    pub fn close(&mut self) {
        self.listener.close();
    }

    /// Whether capture is running.
    pub fn is_running(&self) -> bool {
        self.listener.is_running()
    }

    /// Classification window in use.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Access the inner listener, e.g. to adjust its edge tolerance
    /// before start().
    pub fn listener(&self) -> &SignalListener {
        &self.listener
    }
}

/// Classify one raw edge against the binding table.
///
/// Every binding within the window fires; an event matching nothing is
/// dropped silently. The window check is inclusive (`<=`), unlike the
/// listener's strict edge window.
fn resolve_event(
    bindings: &Mutex<Vec<NoteBinding>>,
    tolerance: f64,
    event: RawEvent,
    callback: &dyn Fn(ResolvedNote),
) {
    let matches: Vec<ResolvedNote> = {
        let bindings = match bindings.lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::error!("[NoteResolver] bindings lock poisoned, event dropped");
                return;
            }
        };
        // A handful of bindings at most; a linear scan beats any sorted
        // structure at this size.
        bindings
            .iter()
            .filter(|binding| (event.code - binding.code as f64).abs() <= tolerance)
            .map(|binding| ResolvedNote {
                name: binding.name.clone(),
                on: event.active,
            })
            .collect()
    };
    // Lock released before user code runs.
    for note in matches {
        callback(note);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputConfig;
    use std::sync::mpsc::{self, Receiver, Sender};

    fn canonical_bindings() -> Vec<(String, f64)> {
        (1..=5).map(|i| (format!("nota{}", i), i as f64)).collect()
    }

    fn channel_callback() -> (Sender<ResolvedNote>, Receiver<ResolvedNote>) {
        mpsc::channel()
    }

    fn resolver_with_tolerance(tolerance: f64) -> (NoteResolver, Receiver<ResolvedNote>) {
        let (tx, rx) = channel_callback();
        let resolver = NoteResolver::new(SignalListener::new(), tolerance, move |note| {
            let _ = tx.send(note);
        })
        .unwrap();
        (resolver, rx)
    }

    /// Run one event through resolve_event with the resolver's state.
    fn resolve(resolver: &NoteResolver, event: RawEvent) {
        resolve_event(
            &resolver.bindings,
            resolver.tolerance,
            event,
            resolver.callback.as_ref(),
        );
    }

    #[test]
    fn test_tolerance_upper_bound_inclusive() {
        let (tx, _rx) = channel_callback();
        let result = NoteResolver::new(SignalListener::new(), 0.5, move |note| {
            let _ = tx.send(note);
        });
        assert!(result.is_ok(), "0.5 is valid configuration");
    }

    #[test]
    fn test_tolerance_out_of_range_rejected() {
        for value in [0.51, 0.0, -0.2, f64::NAN, f64::INFINITY] {
            let (tx, _rx) = channel_callback();
            let result = NoteResolver::new(SignalListener::new(), value, move |note| {
                let _ = tx.send(note);
            });
            match result {
                Err(ConfigError::InvalidTolerance { .. }) => {}
                other => panic!("Expected InvalidTolerance for {}, got {:?}", value, other.is_ok()),
            }
        }
    }

    #[test]
    fn test_resolves_single_binding_within_window() {
        let (mut resolver, rx) = resolver_with_tolerance(0.5);
        resolver.configure(canonical_bindings()).unwrap();

        resolve(
            &resolver,
            RawEvent {
                code: 3.0,
                active: true,
            },
        );

        let note = rx.try_recv().unwrap();
        assert_eq!(
            note,
            ResolvedNote {
                name: "nota3".to_string(),
                on: true
            }
        );
        assert!(rx.try_recv().is_err(), "no other binding fires");
    }

    #[test]
    fn test_release_forwards_off_state() {
        let (mut resolver, rx) = resolver_with_tolerance(0.5);
        resolver.configure(canonical_bindings()).unwrap();

        resolve(
            &resolver,
            RawEvent {
                code: 2.0,
                active: false,
            },
        );

        assert_eq!(
            rx.try_recv().unwrap(),
            ResolvedNote {
                name: "nota2".to_string(),
                on: false
            }
        );
    }

    #[test]
    fn test_classification_window_is_inclusive() {
        let (mut resolver, rx) = resolver_with_tolerance(0.5);
        resolver.configure(canonical_bindings()).unwrap();

        // Exactly at the window edge of both 3 and 4: both fire. This is
        // the documented double-fire with codes closer than 2x tolerance.
        resolve(
            &resolver,
            RawEvent {
                code: 3.5,
                active: true,
            },
        );

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.name, "nota3");
        assert_eq!(second.name, "nota4");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unmatched_event_drops_silently() {
        let (mut resolver, rx) = resolver_with_tolerance(0.25);
        resolver.configure(canonical_bindings()).unwrap();

        resolve(
            &resolver,
            RawEvent {
                code: 7.0,
                active: true,
            },
        );

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_empty_bindings_resolve_nothing() {
        let (resolver, rx) = resolver_with_tolerance(0.5);

        resolve(
            &resolver,
            RawEvent {
                code: 1.0,
                active: true,
            },
        );

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_configure_rejects_non_integral_code() {
        let (mut resolver, _rx) = resolver_with_tolerance(0.5);
        let result = resolver.configure(vec![("nota1".to_string(), 1.5)]);
        match result {
            Err(ConfigError::InvalidCode { name, code }) => {
                assert_eq!(name, "nota1");
                assert_eq!(code, 1.5);
            }
            other => panic!("Expected InvalidCode, got ok={}", other.is_ok()),
        }
    }

    #[test]
    fn test_configure_rejects_non_finite_code() {
        let (mut resolver, _rx) = resolver_with_tolerance(0.5);
        assert!(matches!(
            resolver.configure(vec![("nota1".to_string(), f64::NAN)]),
            Err(ConfigError::InvalidCode { .. })
        ));
        assert!(matches!(
            resolver.configure(vec![("nota1".to_string(), f64::INFINITY)]),
            Err(ConfigError::InvalidCode { .. })
        ));
    }

    #[test]
    fn test_configure_rejects_duplicate_name() {
        let (mut resolver, _rx) = resolver_with_tolerance(0.5);
        let result = resolver.configure(vec![
            ("nota1".to_string(), 1.0),
            ("nota1".to_string(), 2.0),
        ]);
        assert!(matches!(result, Err(ConfigError::DuplicateName { name }) if name == "nota1"));
    }

    #[test]
    fn test_failed_configure_keeps_previous_bindings() {
        let (mut resolver, rx) = resolver_with_tolerance(0.5);
        resolver.configure(canonical_bindings()).unwrap();
        assert!(resolver
            .configure(vec![("broken".to_string(), 0.5)])
            .is_err());

        resolve(
            &resolver,
            RawEvent {
                code: 1.0,
                active: true,
            },
        );
        assert_eq!(rx.try_recv().unwrap().name, "nota1");
    }

    #[test]
    fn test_from_settings_uses_config_defaults() {
        let config = InputConfig::default();
        let (tx, rx) = channel_callback();
        let resolver =
            NoteResolver::from_settings(SignalListener::new(), &config.resolver, move |note| {
                let _ = tx.send(note);
            })
            .unwrap();

        resolve(
            &resolver,
            RawEvent {
                code: 5.0,
                active: true,
            },
        );
        assert_eq!(rx.try_recv().unwrap().name, "nota5");
    }
}
