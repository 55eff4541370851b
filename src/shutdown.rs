//! Cooperative cancellation for scheme loops.
//!
//! The runner holds the [`ShutdownTrigger`]; schemes get a [`Shutdown`]
//! handle. Loops check [`Shutdown::is_triggered`] between iterations and
//! race [`Shutdown::wait`] against their blocking operations, so an external
//! signal lets the current iteration finish and the final snapshot still be
//! reported.

use tokio::sync::watch;

#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

impl Shutdown {
    /// A handle that never fires.
    pub fn never() -> Self {
        channel().1
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been requested. Pends forever if the
    /// trigger is dropped without firing.
    pub async fn wait(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_trigger_wakes_waiter() {
        let (trigger, mut shutdown) = channel();
        assert!(!shutdown.is_triggered());

        let waiter = tokio::spawn(async move {
            shutdown.wait().await;
            shutdown.is_triggered()
        });
        trigger.trigger();
        assert!(timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_already_triggered() {
        let (trigger, _) = channel();
        trigger.trigger();
        let mut late = trigger.subscribe();
        assert!(late.is_triggered());
        timeout(Duration::from_millis(100), late.wait()).await.unwrap();
    }

    #[tokio::test]
    async fn test_never_pends() {
        let mut shutdown = Shutdown::never();
        assert!(timeout(Duration::from_millis(20), shutdown.wait())
            .await
            .is_err());
    }
}
