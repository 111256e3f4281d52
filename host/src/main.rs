mod config;
mod state;

use crate::config::{HostConfig, load_catalog};
use crate::state::HostState;
use genui_runtime::protocol::{HostEnvelope, intent_envelope, reader_loop, ready_envelope, writer_loop};
use genui_runtime::{CapabilityRegistry, OutlineHost, UiEvent, default_capabilities, register_catalog};
use std::io;
use std::process;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    init_tracing();

    if let Err(err) = run(HostConfig::from_env()) {
        tracing::error!("genui_host fatal error: {err}");
        process::exit(1);
    }
}

/// Logs go to stderr; stdout carries protocol frames.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(config: HostConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(build_registry(&config)?);
    let components: Vec<_> = registry
        .registered_types()
        .iter()
        .filter_map(|kind| registry.get_capability(kind).cloned())
        .collect();

    let (tx, rx) = mpsc::sync_channel(config.outbound_queue_cap);
    let (event_tx, event_rx) = mpsc::channel();

    let writer_handle = thread::spawn(move || writer_loop(rx, io::stdout().lock()));

    tx.send(ready_envelope(config.sid.clone(), components))
        .map_err(|_| "failed to queue ready envelope")?;

    let intent_tx = tx.clone();
    let intent_sid = config.sid.clone();
    let queue_capacity = config.outbound_queue_cap;
    let intent_handle =
        thread::spawn(move || forward_intents(event_rx, &intent_tx, intent_sid, queue_capacity));

    let mut state = HostState::new(config.sid.clone(), registry, event_tx);
    let read_result = reader_loop(io::stdin().lock(), |envelope| {
        for reply in state.handle(envelope) {
            if tx.send(reply).is_err() {
                tracing::error!("outbound queue closed; dropping reply");
            }
        }
    });

    if let Err(err) = &read_result {
        tracing::error!("reader loop terminated with error: {err}");
    }

    // Dropping the state closes the event sink, which ends the intent thread.
    drop(state);
    if intent_handle.join().is_err() {
        tracing::error!("intent thread panicked");
    }

    drop(tx);
    match writer_handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!("writer thread returned error: {err}"),
        Err(err) => tracing::error!("writer thread join failed: {err:?}"),
    }

    Ok(read_result?)
}

fn build_registry(config: &HostConfig) -> Result<CapabilityRegistry<OutlineHost>, Box<dyn std::error::Error>> {
    let mut registry = CapabilityRegistry::new();
    let factory_for = |capability: &genui_runtime::Capability| OutlineHost::factory(capability.name.clone());

    register_catalog(&mut registry, default_capabilities(), factory_for);

    if let Some(path) = &config.catalog_path {
        let extra = load_catalog(path)?;
        let count = extra.len();
        let replaced = register_catalog(&mut registry, extra, factory_for);
        tracing::info!(path = %path.display(), count, replaced, "loaded extra capabilities");
    }

    Ok(registry)
}

fn forward_intents(
    events: Receiver<UiEvent>,
    tx: &SyncSender<HostEnvelope>,
    sid: String,
    queue_capacity: usize,
) {
    let mut forwarder = IntentForwarder::new(tx, sid, queue_capacity);
    for event in events {
        forwarder.send(event);
    }
}

/// Queues intents without blocking the event source. A full queue drops
/// the intent; the running drop count is logged at powers of two.
struct IntentForwarder<'a> {
    tx: &'a SyncSender<HostEnvelope>,
    sid: String,
    queue_capacity: usize,
    next_id: u64,
    dropped: u64,
}

impl<'a> IntentForwarder<'a> {
    fn new(tx: &'a SyncSender<HostEnvelope>, sid: String, queue_capacity: usize) -> Self {
        Self {
            tx,
            sid,
            queue_capacity,
            next_id: 1,
            dropped: 0,
        }
    }

    fn send(&mut self, event: UiEvent) {
        let id = self.next_id;
        self.next_id += 1;

        match self.tx.try_send(intent_envelope(self.sid.clone(), id, event)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                if self.dropped.is_power_of_two() {
                    tracing::warn!(
                        capacity = self.queue_capacity,
                        dropped = self.dropped,
                        "intent queue full"
                    );
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!(id, "outbound queue closed; intent lost");
            }
        }
    }
}
