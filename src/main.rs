/*!
 * PAL Synchronization Demo
 *
 * Exercises the wait multiplexer end to end on real threads:
 * - Waiting on a worker thread's handle
 * - Abandoned mutex detection after its owner exits
 * - Wait-all on two events (full policy)
 */

use miette::{IntoDiagnostic, Result};
use pal_sync::{
    init_tracing, Handle, Pal, PalConfig, PalError, Timeout, WaitOutcome, WaitRequest,
    INFINITE, WAIT_OBJECT_0,
};
use std::time::Duration;
use tracing::info;

fn report(label: &str, outcome: &WaitOutcome) -> Result<()> {
    let json = serde_json::to_string(outcome).into_diagnostic()?;
    info!(label, outcome = %json, code = outcome.code(), "wait finished");
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();

    let config = PalConfig::from_env();
    let pal = if config.policy.multi_object {
        Pal::with_config(config)
    } else {
        info!("PAL_WAIT_POLICY not set to full; enabling it for the demo");
        Pal::with_config(PalConfig::full().with_sync(config.sync))
    };

    // Thread handle
    let worker = pal.create_thread(|| {
        std::thread::sleep(Duration::from_millis(20));
        42
    })?;
    let code = pal.wait_for_single_object(worker, INFINITE);
    if code != WAIT_OBJECT_0 {
        return Err(PalError::Internal(format!("unexpected wait result {:#x}", code)).into());
    }
    info!(exit_code = pal.get_exit_code_thread(worker)?, "worker finished");

    // Abandoned mutex
    let mutex_pal = pal.clone();
    let (tx, rx) = std::sync::mpsc::channel::<Handle>();
    let owner = pal.create_thread(move || {
        match mutex_pal.create_mutex(true) {
            Ok(mutex) => {
                let _ = tx.send(mutex);
                0
            }
            Err(_) => 1,
        }
    })?;
    let mutex = rx.recv().into_diagnostic()?;
    pal.wait(&WaitRequest::single(&owner))?;
    let outcome = pal.wait(&WaitRequest::single(&mutex).timeout(Timeout::from_millis(1_000)))?;
    report("abandoned mutex", &outcome)?;
    pal.release_mutex(mutex)?;

    // Wait-all
    let first = pal.create_event(false, false)?;
    let second = pal.create_event(false, false)?;
    let signaler = pal.clone();
    pal.create_thread(move || {
        std::thread::sleep(Duration::from_millis(10));
        let _ = signaler.set_event(first);
        std::thread::sleep(Duration::from_millis(10));
        let _ = signaler.set_event(second);
        0
    })?;
    let outcome = pal.wait(
        &WaitRequest::new(&[first, second])
            .wait_all(true)
            .timeout(Timeout::from_millis(5_000)),
    )?;
    report("wait-all", &outcome)?;

    for handle in [worker, owner, mutex, first, second] {
        pal.close_handle(handle)?;
    }
    Ok(())
}
