use crate::lifecycle::LifecycleError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Serving,
    Stopped,
}

/// The engine's shutdown primitive
///
/// Safe to trigger from any task while the serve loop is running; it is the
/// only synchronisation point between serving and the shutdown path.
#[derive(Debug)]
pub struct ShutdownSwitch {
    requested: watch::Sender<bool>,
    phase: watch::Sender<Phase>,
}

impl Default for ShutdownSwitch {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSwitch {
    pub fn new() -> Self {
        let (requested, _) = watch::channel(false);
        let (phase, _) = watch::channel(Phase::Idle);
        Self { requested, phase }
    }

    pub fn is_requested(&self) -> bool {
        *self.requested.borrow()
    }

    /// Ask the serve loop to stop accepting connections.
    pub fn trigger(&self) {
        self.requested.send_replace(true);
    }

    /// Resolves once shutdown has been requested.
    pub fn requested(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.requested.subscribe();
        async move {
            let _ = rx.wait_for(|requested| *requested).await;
        }
    }

    pub(crate) fn mark_serving(&self) {
        self.phase.send_replace(Phase::Serving);
    }

    pub(crate) fn mark_stopped(&self) {
        self.phase.send_replace(Phase::Stopped);
    }

    /// Trigger shutdown and wait up to `grace` for in-flight requests to
    /// finish. Returns immediately when nothing is being served.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), LifecycleError> {
        self.trigger();

        let mut phase = self.phase.subscribe();
        if *phase.borrow() == Phase::Idle {
            return Ok(());
        }

        let drained = tokio::time::timeout(grace, phase.wait_for(|p| *p == Phase::Stopped))
            .await
            .is_ok();
        if drained {
            Ok(())
        } else {
            Err(LifecycleError::ShutdownTimeout(grace))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_idle_shutdown_returns_immediately() {
        let switch = ShutdownSwitch::new();
        switch.shutdown(Duration::from_millis(10)).await.unwrap();
        assert!(switch.is_requested());
    }

    #[tokio::test]
    async fn test_waits_for_serve_loop() {
        let switch = Arc::new(ShutdownSwitch::new());
        switch.mark_serving();

        let serve_loop = {
            let switch = Arc::clone(&switch);
            tokio::spawn(async move {
                switch.requested().await;
                tokio::time::sleep(Duration::from_millis(20)).await;
                switch.mark_stopped();
            })
        };

        switch.shutdown(Duration::from_secs(1)).await.unwrap();
        serve_loop.await.unwrap();
    }

    #[tokio::test]
    async fn test_grace_period_elapses() {
        let switch = ShutdownSwitch::new();
        switch.mark_serving();

        let err = switch.shutdown(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, LifecycleError::ShutdownTimeout(_)));
    }
}
