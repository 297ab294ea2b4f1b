//! Sleep primitive.  On the host build this is a tokio timer; the firmware
//! only ever asks for whole seconds.

use std::time::Duration;

use tracing::trace;

#[allow(async_fn_in_trait)]
pub trait Power {
    async fn sleep_seconds(&mut self, seconds: u32);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPower;

impl Power for TokioPower {
    async fn sleep_seconds(&mut self, seconds: u32) {
        trace!(seconds, "sleeping");
        tokio::time::sleep(Duration::from_secs(u64::from(seconds))).await;
    }
}
