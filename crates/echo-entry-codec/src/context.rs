// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! External collaborators: diagnostics sink and type binder.
//!
//! Every codec owns a [`SerializationContext`], which pairs a
//! [`TypeBinder`] with a [`DebugContext`] and filters diagnostics through a
//! [`LoggingPolicy`].

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

/// Sink for codec diagnostics.
///
/// Readers report malformed input here instead of failing; writers report
/// lossy conversions and reference bookkeeping warnings.
pub trait DebugContext {
    /// Records a recoverable oddity.
    fn log_warning(&self, message: &str);
    /// Records malformed input or a failed conversion.
    fn log_error(&self, message: &str);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDebugContext;

impl DebugContext for TracingDebugContext {
    fn log_warning(&self, message: &str) {
        tracing::warn!(target: "echo_entry_codec", "{message}");
    }

    fn log_error(&self, message: &str) {
        tracing::error!(target: "echo_entry_codec", "{message}");
    }
}

/// Severity of a recorded diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Logged through `log_warning`.
    Warning,
    /// Logged through `log_error`.
    Error,
}

/// One diagnostic kept by [`RecordingDebugContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedMessage {
    /// Severity the message was logged with.
    pub severity: Severity,
    /// Message text.
    pub message: String,
}

/// Keeps every diagnostic in memory and also forwards it to `tracing`.
#[derive(Debug, Default)]
pub struct RecordingDebugContext {
    messages: Mutex<Vec<LoggedMessage>>,
}

impl RecordingDebugContext {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, in order.
    pub fn messages(&self) -> Vec<LoggedMessage> {
        self.lock().clone()
    }

    /// Recorded error texts.
    pub fn errors(&self) -> Vec<String> {
        self.texts(Severity::Error)
    }

    /// Recorded warning texts.
    pub fn warnings(&self) -> Vec<String> {
        self.texts(Severity::Warning)
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn texts(&self, severity: Severity) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|logged| logged.severity == severity)
            .map(|logged| logged.message.clone())
            .collect()
    }

    fn record(&self, severity: Severity, message: &str) {
        self.lock().push(LoggedMessage { severity, message: message.to_owned() });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LoggedMessage>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DebugContext for RecordingDebugContext {
    fn log_warning(&self, message: &str) {
        TracingDebugContext.log_warning(message);
        self.record(Severity::Warning, message);
    }

    fn log_error(&self, message: &str) {
        TracingDebugContext.log_error(message);
        self.record(Severity::Error, message);
    }
}

/// Which diagnostics reach the [`DebugContext`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LoggingPolicy {
    /// Drop everything.
    Silent,
    /// Errors only.
    #[default]
    LogErrors,
    /// Warnings and errors.
    LogWarningsAndErrors,
}

/// Maps between runtime type descriptors and portable type names.
///
/// Binding failures are logged through the supplied [`DebugContext`] and
/// never returned as errors.
pub trait TypeBinder {
    /// Runtime type descriptor carried by node headers.
    type Type: Clone + Eq + Hash + fmt::Debug;

    /// Portable name written to the stream for `ty`.
    fn bind_to_name(&self, ty: &Self::Type, debug: &dyn DebugContext) -> String;

    /// Type for a name read from the stream, `None` if it cannot be bound.
    fn bind_to_type(&self, name: &str, debug: &dyn DebugContext) -> Option<Self::Type>;
}

/// Portable type name, the descriptor used by [`NameBinder`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(Arc<str>);

impl TypeName {
    /// Wraps a name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Borrowed name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity binder: the descriptor is the name.
#[derive(Debug, Default, Clone, Copy)]
pub struct NameBinder;

impl TypeBinder for NameBinder {
    type Type = TypeName;

    fn bind_to_name(&self, ty: &TypeName, _debug: &dyn DebugContext) -> String {
        ty.as_str().to_owned()
    }

    fn bind_to_type(&self, name: &str, debug: &dyn DebugContext) -> Option<TypeName> {
        if name.is_empty() {
            debug.log_error("Cannot bind an empty type name");
            return None;
        }
        Some(TypeName::new(name))
    }
}

/// Explicit registration table between names and descriptors.
#[derive(Debug, Clone)]
pub struct TypeTable<T> {
    by_name: HashMap<String, T>,
    names: HashMap<T, String>,
}

impl<T> Default for TypeTable<T> {
    fn default() -> Self {
        Self { by_name: HashMap::new(), names: HashMap::new() }
    }
}

impl<T: Clone + Eq + Hash> TypeTable<T> {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `ty` under its canonical `name`, used when writing.
    pub fn register(&mut self, name: impl Into<String>, ty: T) -> &mut Self {
        let name = name.into();
        self.by_name.insert(name.clone(), ty.clone());
        self.names.insert(ty, name);
        self
    }

    /// Accepts `name` as an alternative spelling of `ty` when reading.
    pub fn alias(&mut self, name: impl Into<String>, ty: T) -> &mut Self {
        self.by_name.insert(name.into(), ty);
        self
    }
}

impl<T: Clone + Eq + Hash + fmt::Debug> TypeBinder for TypeTable<T> {
    type Type = T;

    fn bind_to_name(&self, ty: &T, debug: &dyn DebugContext) -> String {
        self.names.get(ty).cloned().unwrap_or_else(|| {
            debug.log_error(&format!("No type name registered for {ty:?}"));
            format!("{ty:?}")
        })
    }

    fn bind_to_type(&self, name: &str, debug: &dyn DebugContext) -> Option<T> {
        let ty = self.by_name.get(name).cloned();
        if ty.is_none() {
            debug.log_error(&format!("No type registered for name '{name}'"));
        }
        ty
    }
}

/// Binder, diagnostics sink and logging policy shared by one codec.
#[derive(Clone)]
pub struct SerializationContext<B> {
    binder: B,
    debug: Arc<dyn DebugContext + Send + Sync>,
    policy: LoggingPolicy,
}

impl<B: Default> Default for SerializationContext<B> {
    fn default() -> Self {
        Self::new(B::default())
    }
}

impl<B> fmt::Debug for SerializationContext<B>
where
    B: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializationContext")
            .field("binder", &self.binder)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<B> SerializationContext<B> {
    /// Context logging errors to `tracing`.
    pub fn new(binder: B) -> Self {
        Self { binder, debug: Arc::new(TracingDebugContext), policy: LoggingPolicy::default() }
    }

    /// Replaces the diagnostics sink.
    pub fn with_debug_context(mut self, debug: Arc<dyn DebugContext + Send + Sync>) -> Self {
        self.debug = debug;
        self
    }

    /// Replaces the logging policy.
    pub fn with_logging_policy(mut self, policy: LoggingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Configured binder.
    pub fn binder(&self) -> &B {
        &self.binder
    }

    /// Active logging policy.
    pub fn logging_policy(&self) -> LoggingPolicy {
        self.policy
    }
}

impl<B: TypeBinder> SerializationContext<B> {
    /// Binds `ty` to its portable name.
    pub fn bind_to_name(&self, ty: &B::Type) -> String {
        self.binder.bind_to_name(ty, self)
    }

    /// Binds a portable name back to a type.
    pub fn bind_to_type(&self, name: &str) -> Option<B::Type> {
        self.binder.bind_to_type(name, self)
    }
}

impl<B> DebugContext for SerializationContext<B> {
    fn log_warning(&self, message: &str) {
        if self.policy == LoggingPolicy::LogWarningsAndErrors {
            self.debug.log_warning(message);
        }
    }

    fn log_error(&self, message: &str) {
        if self.policy != LoggingPolicy::Silent {
            self.debug.log_error(message);
        }
    }
}
