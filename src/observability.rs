use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("cloff.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("cloff.client.request_errors");

pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("cloff.stream.fragments");
pub(crate) static STREAM_BYTES: Counter = Counter::new("cloff.stream.bytes");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("cloff.stream.errors");
pub(crate) static STREAM_TIMEOUTS: Counter = Counter::new("cloff.stream.timeouts");
pub(crate) static STREAM_TTFB: Moments = Moments::new("cloff.stream.ttfb_seconds");

pub(crate) static CHAT_TURNS: Counter = Counter::new("cloff.chat.turns");
pub(crate) static CHAT_TURN_ERRORS: Counter = Counter::new("cloff.chat.turn_errors");
pub(crate) static CHAT_INTERRUPTS: Counter = Counter::new("cloff.chat.interrupts");
pub(crate) static CHAT_TURN_DURATION: Moments = Moments::new("cloff.chat.turn_duration_seconds");
pub(crate) static CHAT_COMMANDS: Counter = Counter::new("cloff.chat.commands");
pub(crate) static SETTINGS_PERSIST_ERRORS: Counter =
    Counter::new("cloff.settings.persist_errors");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);

    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_TIMEOUTS);
    collector.register_moments(&STREAM_TTFB);

    collector.register_counter(&CHAT_TURNS);
    collector.register_counter(&CHAT_TURN_ERRORS);
    collector.register_counter(&CHAT_INTERRUPTS);
    collector.register_moments(&CHAT_TURN_DURATION);
    collector.register_counter(&CHAT_COMMANDS);
    collector.register_counter(&SETTINGS_PERSIST_ERRORS);
}
