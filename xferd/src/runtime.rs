//! Process runtime.
//!
//! Console input is read on a blocking thread that cannot be interrupted.
//! The runtime is therefore shut down without waiting for blocking tasks, so
//! an interrupt at a prompt exits at once instead of waiting for Enter.

use std::future::Future;

/// Run `future` to completion on a fresh multi-threaded runtime, then shut
/// the runtime down in the background.
pub fn block_on_detached<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use tokio::sync::oneshot;

    #[test]
    fn test_returns_while_blocking_read_is_pending() {
        // The blocking task only finishes once `unblock` is dropped, which
        // happens after the runtime is gone
        let (unblock, blocked) = mpsc::channel::<()>();

        let output = block_on_detached(async move {
            let (started_tx, started_rx) = oneshot::channel();
            tokio::task::spawn_blocking(move || {
                let _ = started_tx.send(());
                let _ = blocked.recv();
            });
            started_rx.await.unwrap();
            7
        })
        .unwrap();

        assert_eq!(output, 7);
        drop(unblock);
    }
}
