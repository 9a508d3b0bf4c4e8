use anyhow::{Context, Result};
use crossbeam::channel::{Receiver, Sender, TrySendError, bounded};
use log::{debug, info, warn};
use std::sync::Arc;

use crate::audio::buffer::AudioBuffer;
use crate::dsp::chain::ChannelPipeline;
use crate::order::fifo::{self, OrderConsumer, OrderProducer};
use crate::order::{DspOrder, SharedOrder};
use crate::params::ParamStore;
use crate::params::smoother::SmootherBank;
use crate::settings::EngineSettings;
use crate::state::PluginState;

const DEFAULT_SAMPLE_RATE: f32 = 48_000.0;
// A restored order is handed to the editor once per load.
const RESTORE_CAPACITY: usize = 2;
// Pending notifications per subscriber before new ones are skipped.
const SUBSCRIBER_CAPACITY: usize = 16;

/// Render side: owns both channel pipelines and the smoothers.
pub struct Engine {
    params: Arc<ParamStore>,
    smoothers: SmootherBank,
    left: ChannelPipeline,
    right: ChannelPipeline,
    /// Reordering requests from the control side.
    rx_orders: OrderConsumer,
    active_order: DspOrder,
    published_order: Arc<SharedOrder>,
    sub_block_size: usize,
    ramp_seconds: f32,
    sample_rate: f32,
    primed: bool,
}

/// Control side of an [`Engine`]. Lives on the UI or host thread.
pub struct EngineHandle {
    params: Arc<ParamStore>,
    tx_orders: OrderProducer,
    tx_restore: OrderProducer,
    rx_restore: Option<OrderConsumer>,
    published_order: Arc<SharedOrder>,
    /// Last order passed to `push_order`, used when saving.
    last_pushed: DspOrder,
    subscribers: Vec<Sender<DspOrder>>,
}

impl Engine {
    pub fn new(params: Arc<ParamStore>, settings: &EngineSettings) -> (Self, EngineHandle) {
        let (tx_orders, rx_orders) = fifo::channel(settings.order_fifo_capacity);
        let (tx_restore, rx_restore) = fifo::channel(RESTORE_CAPACITY);
        let published_order = Arc::new(SharedOrder::new(DspOrder::default()));

        let engine = Self {
            params: Arc::clone(&params),
            smoothers: SmootherBank::new(),
            left: ChannelPipeline::new(DEFAULT_SAMPLE_RATE),
            right: ChannelPipeline::new(DEFAULT_SAMPLE_RATE),
            rx_orders,
            active_order: DspOrder::default(),
            published_order: Arc::clone(&published_order),
            sub_block_size: settings.sub_block_size.max(1),
            ramp_seconds: settings.ramp_seconds(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            primed: false,
        };

        let handle = EngineHandle {
            params,
            tx_orders,
            tx_restore,
            rx_restore: Some(rx_restore),
            published_order,
            last_pushed: DspOrder::default(),
            subscribers: Vec::new(),
        };

        (engine, handle)
    }

    /// Sizes every stage for `sample_rate`. Smoothers jump to the live
    /// parameter values on the first call and whenever the rate changes.
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize) {
        debug!("Preparing engine: {sample_rate} Hz, {max_block_size} samples");
        self.left.registry_mut().prepare(sample_rate, max_block_size);
        self.right.registry_mut().prepare(sample_rate, max_block_size);

        if !self.primed || sample_rate != self.sample_rate {
            self.sample_rate = sample_rate;
            self.prime();
        }
    }

    fn prime(&mut self) {
        self.smoothers.reset(self.sample_rate, self.ramp_seconds);
        self.smoothers.prime_all(&self.params);
        self.primed = true;
    }

    /// Processes one host block in place. Channels from `num_input_channels`
    /// onwards are silenced; only the first two channels carry audio.
    pub fn process_block(&mut self, buffer: &mut AudioBuffer, num_input_channels: usize) {
        let num_inputs = num_input_channels.min(buffer.num_channels());
        for channel in num_inputs..buffer.num_channels() {
            buffer.clear_channel(channel);
        }

        if let Some(order) = self.rx_orders.drain_latest() {
            self.active_order = order;
            self.published_order.store(order);
        }

        if num_inputs == 0 {
            return;
        }
        if !self.primed {
            self.prime();
        }

        let num_samples = buffer.num_samples();
        let mut start = 0;
        while start < num_samples {
            let len = self.sub_block_size.min(num_samples - start);

            self.smoothers.retarget(&self.params, len);
            self.left
                .registry_mut()
                .update_from_parameters(&self.smoothers, &self.params);
            self.right
                .registry_mut()
                .update_from_parameters(&self.smoothers, &self.params);

            let (left, right) = buffer.left_right_mut(start..start + len);
            self.left.process(left, &self.active_order);
            if num_inputs > 1
                && let Some(right) = right
            {
                self.right.process(right, &self.active_order);
            }

            start += len;
        }
    }

    pub const fn active_order(&self) -> DspOrder {
        self.active_order
    }

    pub const fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub const fn left(&self) -> &ChannelPipeline {
        &self.left
    }

}

impl EngineHandle {
    /// Queues a new processing order. If the render thread has fallen
    /// behind, the oldest pending order is discarded to make room.
    pub fn push_order(&mut self, order: DspOrder) {
        if let Some(stale) = self.tx_orders.push(order) {
            debug!("Order channel full, discarded pending order {stale}");
        }
        debug!("Queued order {order}");
        self.last_pushed = order;
        self.subscribers.retain(|tx| match tx.try_send(order) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Order subscriber is not keeping up, skipping notification");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Receives every order passed to [`EngineHandle::push_order`]. A
    /// subscriber that falls more than a few orders behind misses the newer
    /// ones until it drains.
    pub fn subscribe(&mut self) -> Receiver<DspOrder> {
        let (tx, rx) = bounded(SUBSCRIBER_CAPACITY);
        self.subscribers.push(tx);
        rx
    }

    /// The order the render thread last switched to.
    pub fn active_order(&self) -> DspOrder {
        self.published_order.load()
    }

    pub const fn last_pushed_order(&self) -> DspOrder {
        self.last_pushed
    }

    /// Hands out the editor's end of the restore channel. Only the first
    /// call returns it.
    pub fn take_restore_consumer(&mut self) -> Option<OrderConsumer> {
        self.rx_restore.take()
    }

    pub fn params(&self) -> &Arc<ParamStore> {
        &self.params
    }

    pub fn save_state(&self) -> Result<Vec<u8>> {
        PluginState::capture(&self.params, self.last_pushed).to_json()
    }

    /// Restores parameters and order from a blob made by `save_state`.
    /// Unparseable data is an error and changes nothing.
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<()> {
        let state = PluginState::from_json(bytes).context("Failed to load state")?;
        self.apply_state(&state);
        Ok(())
    }

    pub fn apply_state(&mut self, state: &PluginState) {
        let skipped = state.apply_params(&self.params);
        let order = state.order();
        info!("Restored state with order {order} ({skipped} unknown parameters)");

        self.push_order(order);
        if self.tx_restore.push(order).is_some() {
            debug!("Editor had not read the previous restored order");
        }
    }
}
