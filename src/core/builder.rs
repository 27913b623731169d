use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    channels::ChannelRef,
    config::{BusConfig, GlobalConfig},
    core::Bus,
    error::{BusError, ConfigError, StateError},
    events::Hub,
    state::StateStore,
    subscribers::Subscribe,
};

/// Fluent assembly of a [`Bus`].
///
/// ```rust
/// use serde_json::json;
/// use tickbus::{Bus, ChannelContext, ChannelError, ChannelFn, ChannelRef, Message};
///
/// let echo: ChannelRef = ChannelFn::arc("echo", |_ctx: ChannelContext, _msg: Message| async {
///     Ok::<_, ChannelError>(())
/// });
///
/// let bus = Bus::builder()
///     .with_channels(vec![echo])
///     .with_config(json!({ "websocketHost": "localhost", "websocketPort": 8080 }))
///     .enable_tick(1000)
///     .init_with(json!({ "websocketConnected": false, "messages": [] }))
///     .build()
///     .unwrap();
///
/// assert_eq!(bus.state().get::<bool>("websocketConnected").unwrap(), Some(false));
/// assert_eq!(bus.config().require::<u16>("websocketPort").unwrap(), 8080);
/// ```
pub struct BusBuilder {
    cfg: BusConfig,
    channels: Vec<ChannelRef>,
    config: Result<GlobalConfig, ConfigError>,
    state: Result<Value, StateError>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl BusBuilder {
    /// Creates a builder with the given runtime settings.
    pub fn new(cfg: BusConfig) -> Self {
        Self {
            cfg,
            channels: Vec::new(),
            config: Ok(GlobalConfig::default()),
            state: Ok(Value::Object(Map::new())),
            subscribers: Vec::new(),
        }
    }

    /// Registers channels, appended after any already registered.
    pub fn with_channels(mut self, channels: Vec<ChannelRef>) -> Self {
        self.channels.extend(channels);
        self
    }

    /// Sets the global config record (must be a JSON object). Replaces any previous one.
    pub fn with_config(mut self, config: impl Into<Value>) -> Self {
        self.config = GlobalConfig::from_value(config.into());
        self
    }

    /// Uses an already built config record (e.g. from [`GlobalConfig::from_toml_str`]).
    pub fn with_global_config(mut self, config: GlobalConfig) -> Self {
        self.config = Ok(config);
        self
    }

    /// Publishes a tick every `interval_ms` milliseconds; `0` disables ticking.
    pub fn enable_tick(self, interval_ms: u64) -> Self {
        self.enable_tick_every(Duration::from_millis(interval_ms))
    }

    /// Same as [`enable_tick`](Self::enable_tick) with a [`Duration`].
    pub fn enable_tick_every(mut self, period: Duration) -> Self {
        self.cfg.tick_interval = period;
        self
    }

    /// Sets the initial state record (must be a JSON object). Replaces any previous one.
    pub fn init_with(mut self, state: impl Into<Value>) -> Self {
        self.state = Ok(state.into());
        self
    }

    /// Sets the initial state from any serializable value.
    pub fn init_with_serde<T: Serialize>(mut self, state: &T) -> Self {
        self.state = serde_json::to_value(state).map_err(|source| StateError::Serde {
            key: "*".to_string(),
            source,
        });
        self
    }

    /// Observers that receive every runtime event (logging, metrics).
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers.extend(subscribers);
        self
    }

    /// Replaces the runtime settings, including the tick interval.
    pub fn with_runtime_config(mut self, cfg: BusConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Validates the assembly and returns the bus.
    ///
    /// Fails on duplicate channel names, a non-object config or a non-object
    /// initial state.
    pub fn build(self) -> Result<Bus, BusError> {
        let mut names = HashSet::with_capacity(self.channels.len());
        for channel in &self.channels {
            if !names.insert(channel.name()) {
                return Err(BusError::DuplicateChannel {
                    name: channel.name().to_string(),
                });
            }
        }

        let config = self.config?;
        let hub = Hub::new(self.cfg.hub_capacity_clamped());
        let state = StateStore::new(self.state?, hub.clone())?;

        Ok(Bus::new_internal(
            self.cfg,
            hub,
            self.channels,
            config,
            state,
            self.subscribers,
        ))
    }
}

impl Default for BusBuilder {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ChannelContext, ChannelFn, Message};
    use crate::error::ChannelError;
    use serde_json::json;

    fn noop(name: &'static str) -> ChannelRef {
        ChannelFn::arc(name, |_ctx: ChannelContext, _msg: Message| async {
            Ok::<_, ChannelError>(())
        })
    }

    #[test]
    fn duplicate_channel_names_are_rejected() {
        let err = BusBuilder::default()
            .with_channels(vec![noop("ws"), noop("ui")])
            .with_channels(vec![noop("ws")])
            .build()
            .unwrap_err();
        assert!(matches!(err, BusError::DuplicateChannel { name } if name == "ws"));
    }

    #[test]
    fn non_object_records_fail_at_build() {
        let err = BusBuilder::default().with_config(json!(42)).build().unwrap_err();
        assert!(matches!(err, BusError::Config(ConfigError::NotAnObject { found: "number" })));

        let err = BusBuilder::default().init_with(json!([])).build().unwrap_err();
        assert!(matches!(err, BusError::State(StateError::NotAnObject { found: "array" })));
    }

    #[test]
    fn enable_tick_sets_interval_and_zero_disables() {
        let bus = BusBuilder::default().enable_tick(1000).build().unwrap();
        assert_eq!(bus.runtime_config().tick(), Some(Duration::from_secs(1)));

        let bus = BusBuilder::default().enable_tick(0).build().unwrap();
        assert_eq!(bus.runtime_config().tick(), None);
    }

    #[test]
    fn serde_initial_state() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Initial {
            websocket_connected: bool,
            messages: Vec<String>,
        }

        let bus = BusBuilder::default()
            .init_with_serde(&Initial {
                websocket_connected: false,
                messages: vec![],
            })
            .build()
            .unwrap();
        assert_eq!(
            bus.state().snapshot(),
            json!({ "websocketConnected": false, "messages": [] })
        );
        assert_eq!(bus.state().version(), 0);
        assert!(bus.config().is_empty());
    }
}
