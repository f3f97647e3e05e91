/// Initialises a `tracing` subscriber suitable for a host process embedding
/// this engine. No binary ships in this core (chat-surface glue and CLI
/// scaffolding are out of scope), so unlike the gateway-style service this
/// codebase otherwise models, there is no `main.rs` to call
/// `tracing_subscriber::fmt().init()` itself — a host does that instead,
/// and this function is the reusable equivalent for hosts that don't want
/// to hand-roll the `EnvFilter` default.
///
/// Honors `RUST_LOG`, falling back to `questkeeper=info` so phase
/// transitions and lease/timer events are visible without extra setup.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "questkeeper=info".into());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_safe_to_call_more_than_once() {
        // try_init() returns an error on the second call rather than
        // panicking; the host is free to call this from multiple entry
        // points without coordinating who goes first.
        init_tracing();
        init_tracing();
    }
}
