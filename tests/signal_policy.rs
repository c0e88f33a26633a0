// tests/signal_policy.rs

mod common;
use crate::common::{TestResult, with_timeout, workers};

use proptest::prelude::*;
use taskfork::model::Environment;
use taskfork::pool::signals::{ShutdownSignal, SignalAction, handle_shutdown_signal};
use taskfork::pool::{ProcessExit, ProcessPool, SpawnRequest, StdioMode, signal_to_code};

#[test]
fn interrupt_exits_parent_while_terminate_and_hangup_do_not() {
    assert_eq!(ShutdownSignal::Interrupt.action(), SignalAction::Exit(130));
    assert_eq!(ShutdownSignal::Terminate.action(), SignalAction::Continue);
    assert_eq!(ShutdownSignal::Hangup.action(), SignalAction::Continue);
}

#[test]
fn shutdown_signals_map_to_shell_exit_codes() {
    assert_eq!(signal_to_code(Some(libc::SIGHUP)), 129);
    assert_eq!(signal_to_code(Some(libc::SIGINT)), 130);
    assert_eq!(signal_to_code(Some(libc::SIGTERM)), 143);
    assert_eq!(signal_to_code(Some(libc::SIGKILL)), 128);
    assert_eq!(signal_to_code(Some(libc::SIGSEGV)), 128);
    assert_eq!(signal_to_code(None), 128);

    assert_eq!(ProcessExit::signaled(libc::SIGHUP).signal_name(), Some("SIGHUP"));
    assert_eq!(ProcessExit::default().derived_code(), 128);
}

proptest! {
    #[test]
    fn normal_exit_code_is_kept(code in 0i32..=255) {
        prop_assert_eq!(ProcessExit::exited(code).derived_code(), code);
    }

    #[test]
    fn other_signals_map_to_128(signal in 1i32..=31) {
        prop_assume!(![libc::SIGHUP, libc::SIGINT, libc::SIGTERM].contains(&signal));
        prop_assert_eq!(ProcessExit::signaled(signal).derived_code(), 128);
    }
}

#[tokio::test]
async fn terminate_signal_kills_children_and_keeps_parent() -> TestResult {
    let pool = ProcessPool::new();
    let env = Environment::new();
    let sleeper = workers::sleeping(30);
    let child = pool.spawn(SpawnRequest {
        command: &sleeper,
        stdio: StdioMode::Pipe,
        env: &env,
        label: "sleeper",
    })?;

    let action = handle_shutdown_signal(&pool, ShutdownSignal::Terminate);

    assert_eq!(action, SignalAction::Continue);
    let exit = with_timeout(child.exit).await?;
    assert_eq!(exit.derived_code(), 143);
    assert_eq!(pool.live_count(), 0);
    Ok(())
}

#[tokio::test]
async fn interrupt_signal_kills_children_before_exit() -> TestResult {
    let pool = ProcessPool::new();
    let env = Environment::new();
    let sleeper = workers::sleeping(30);
    let child = pool.spawn(SpawnRequest {
        command: &sleeper,
        stdio: StdioMode::Pipe,
        env: &env,
        label: "sleeper",
    })?;

    let action = handle_shutdown_signal(&pool, ShutdownSignal::Interrupt);

    assert_eq!(action, SignalAction::Exit(130));
    let exit = with_timeout(child.exit).await?;
    assert_eq!(exit.signal_name(), Some("SIGTERM"));
    Ok(())
}
