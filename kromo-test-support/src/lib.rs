//! Shared test utilities used across kromo crates.

pub mod tracing {
    //! A layer that captures closed spans and emitted events so tests can
    //! assert instrumentation by name and field.

    use std::{
        collections::HashMap,
        fmt,
        sync::{Arc, Mutex, PoisonError},
    };

    use tracing::{
        Event, Level, Subscriber,
        field::{Field, Visit},
        span::{Attributes, Id, Record},
        subscriber::DefaultGuard,
    };
    use tracing_subscriber::{Layer, layer::Context, prelude::*, registry::LookupSpan};

    /// Captured telemetry shared between a layer and its clones.
    #[derive(Default)]
    struct Journal {
        spans: Vec<SpanRecord>,
        events: Vec<EventRecord>,
    }

    /// Recording layer installed during tests.
    ///
    /// Clones share one journal, so a test can keep a handle while the
    /// subscriber owns another.
    #[derive(Clone, Default)]
    pub struct RecordingLayer {
        journal: Arc<Mutex<Journal>>,
    }

    impl RecordingLayer {
        /// Installs a fresh layer as the thread's default subscriber.
        ///
        /// Telemetry is recorded until the returned guard drops.
        ///
        /// # Examples
        /// ```
        /// use kromo_test_support::tracing::RecordingLayer;
        ///
        /// let (layer, _guard) = RecordingLayer::install();
        /// tracing::info_span!("demo.span").in_scope(|| tracing::info!("inside"));
        /// assert!(layer.has_span("demo.span"));
        /// assert_eq!(layer.events().len(), 1);
        /// ```
        #[must_use]
        pub fn install() -> (Self, DefaultGuard) {
            let layer = Self::default();
            let subscriber = tracing_subscriber::registry().with(layer.clone());
            let guard = tracing::subscriber::set_default(subscriber);
            (layer, guard)
        }

        /// Returns closed spans in completion order.
        #[must_use]
        pub fn spans(&self) -> Vec<SpanRecord> {
            self.with_journal(|journal| journal.spans.clone())
        }

        /// Returns events in emission order.
        #[must_use]
        pub fn events(&self) -> Vec<EventRecord> {
            self.with_journal(|journal| journal.events.clone())
        }

        /// Returns whether a span called `name` has closed.
        #[must_use]
        pub fn has_span(&self, name: &str) -> bool {
            self.with_journal(|journal| journal.spans.iter().any(|span| span.name == name))
        }

        /// Returns the first closed span called `name`.
        #[must_use]
        pub fn span(&self, name: &str) -> Option<SpanRecord> {
            self.with_journal(|journal| journal.spans.iter().find(|span| span.name == name).cloned())
        }

        /// Returns events at `level` whose message contains `fragment`.
        #[must_use]
        pub fn events_matching(&self, level: Level, fragment: &str) -> Vec<EventRecord> {
            self.with_journal(|journal| {
                journal
                    .events
                    .iter()
                    .filter(|event| event.level == level && event.message().contains(fragment))
                    .cloned()
                    .collect()
            })
        }

        fn with_journal<T>(&self, read: impl FnOnce(&Journal) -> T) -> T {
            read(&self.journal.lock().unwrap_or_else(PoisonError::into_inner))
        }

        fn push(&self, write: impl FnOnce(&mut Journal)) {
            write(&mut self.journal.lock().unwrap_or_else(PoisonError::into_inner));
        }
    }

    /// A closed span with its name and recorded fields.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SpanRecord {
        /// Span name from its metadata.
        pub name: String,
        /// Fields recorded at creation or later via `Span::record`.
        pub fields: HashMap<String, String>,
    }

    /// An emitted event with its level, target and fields.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct EventRecord {
        /// Event level.
        pub level: Level,
        /// Event target, usually the emitting module path.
        pub target: String,
        /// Structured fields, including `message`.
        pub fields: HashMap<String, String>,
    }

    impl EventRecord {
        /// Returns the event's message, or an empty string.
        #[must_use]
        pub fn message(&self) -> &str {
            self.fields.get("message").map_or("", String::as_str)
        }

        /// Returns a recorded field value.
        #[must_use]
        pub fn field(&self, name: &str) -> Option<&str> {
            self.fields.get(name).map(String::as_str)
        }
    }

    struct OpenSpan {
        name: &'static str,
        fields: HashMap<String, String>,
    }

    impl<S> Layer<S> for RecordingLayer
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
            let Some(span) = ctx.span(id) else {
                return;
            };
            let mut fields = HashMap::new();
            attrs.record(&mut FieldCollector(&mut fields));
            span.extensions_mut().insert(OpenSpan {
                name: attrs.metadata().name(),
                fields,
            });
        }

        fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
            let Some(span) = ctx.span(id) else {
                return;
            };
            if let Some(open) = span.extensions_mut().get_mut::<OpenSpan>() {
                values.record(&mut FieldCollector(&mut open.fields));
            }
        }

        fn on_close(&self, id: Id, ctx: Context<'_, S>) {
            let Some(open) = ctx
                .span(&id)
                .and_then(|span| span.extensions_mut().remove::<OpenSpan>())
            else {
                return;
            };
            self.push(|journal| {
                journal.spans.push(SpanRecord {
                    name: open.name.to_owned(),
                    fields: open.fields,
                });
            });
        }

        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = HashMap::new();
            event.record(&mut FieldCollector(&mut fields));
            let record = EventRecord {
                level: *event.metadata().level(),
                target: event.metadata().target().to_owned(),
                fields,
            };
            self.push(|journal| journal.events.push(record));
        }
    }

    struct FieldCollector<'a>(&'a mut HashMap<String, String>);

    impl FieldCollector<'_> {
        fn put(&mut self, field: &Field, value: String) {
            self.0.insert(field.name().to_owned(), value);
        }
    }

    impl Visit for FieldCollector<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.put(field, format!("{value:?}"));
        }

        fn record_str(&mut self, field: &Field, value: &str) {
            self.put(field, value.to_owned());
        }

        fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
            self.put(field, value.to_string());
        }

        fn record_bool(&mut self, field: &Field, value: bool) {
            self.put(field, value.to_string());
        }

        fn record_i64(&mut self, field: &Field, value: i64) {
            self.put(field, value.to_string());
        }

        fn record_u64(&mut self, field: &Field, value: u64) {
            self.put(field, value.to_string());
        }

        fn record_f64(&mut self, field: &Field, value: f64) {
            self.put(field, value.to_string());
        }
    }
}

pub mod property {
    //! Environment-driven case counts for property suites.

    use std::env;

    /// Environment variable overriding the number of proptest cases.
    pub const KROMO_PBT_CASES_ENV_KEY: &str = "KROMO_PBT_CASES";

    /// Returns the case count for a property suite.
    ///
    /// `KROMO_PBT_CASES` overrides `default_cases` when it holds a positive
    /// integer; other values are logged and ignored.
    ///
    /// # Examples
    /// ```
    /// let cases = kromo_test_support::property::case_count(32);
    /// assert!(cases > 0);
    /// ```
    #[must_use]
    pub fn case_count(default_cases: u32) -> u32 {
        case_count_with(default_cases, |key| env::var(key).ok())
    }

    fn case_count_with(default_cases: u32, lookup: impl Fn(&'static str) -> Option<String>) -> u32 {
        let Some(raw) = lookup(KROMO_PBT_CASES_ENV_KEY) else {
            return default_cases;
        };
        match raw.trim().parse::<u32>() {
            Ok(cases) if cases > 0 => cases,
            _ => {
                tracing::warn!(
                    env = KROMO_PBT_CASES_ENV_KEY,
                    raw = %raw,
                    fallback = default_cases,
                    "invalid property-test case override; using default",
                );
                default_cases
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        use rstest::rstest;

        #[rstest]
        #[case(None, 64)]
        #[case(Some("250"), 250)]
        #[case(Some(" 7 "), 7)]
        #[case(Some("0"), 64)]
        #[case(Some("-1"), 64)]
        #[case(Some("lots"), 64)]
        fn overrides_apply_only_when_positive(#[case] raw: Option<&str>, #[case] expected: u32) {
            let cases = case_count_with(64, |_| raw.map(str::to_owned));
            assert_eq!(cases, expected);
        }
    }
}
