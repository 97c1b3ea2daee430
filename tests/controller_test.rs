use std::time::Duration;

use proptest::prelude::*;
use taskctl::{ExecutionController, ExecutionState};

#[derive(Debug, Clone, Copy)]
enum Op {
    Start,
    Pause,
    Stop,
    Cancel,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Start), Just(Op::Pause), Just(Op::Stop), Just(Op::Cancel)]
}

/// Reference transition table for the caller-facing operations
fn expected(state: ExecutionState, op: Op) -> ExecutionState {
    use ExecutionState::*;
    match (op, state) {
        (Op::Start, NotStarted | Paused) => Running,
        (Op::Pause, Running) => Paused,
        (Op::Stop, Running | Paused) => Stopped,
        (Op::Cancel, Completed | Cancelled) => state,
        (Op::Cancel, _) => Cancelled,
        _ => state,
    }
}

proptest! {
    #[test]
    fn controller_follows_transition_table(ops in prop::collection::vec(op_strategy(), 0..32)) {
        let controller = ExecutionController::new();
        let mut model = ExecutionState::NotStarted;

        for op in ops {
            let before = controller.state();
            let changed = match op {
                Op::Start => controller.start(),
                Op::Pause => controller.pause(),
                Op::Stop => controller.stop(),
                Op::Cancel => controller.cancel(),
            };
            model = expected(model, op);

            prop_assert_eq!(controller.state(), model);
            prop_assert_eq!(changed, before != model);
            prop_assert_eq!(controller.gate().is_open(), model != ExecutionState::Paused);
            prop_assert_eq!(
                controller.signal().is_cancelled(),
                matches!(model, ExecutionState::Stopped | ExecutionState::Cancelled)
            );
        }
    }

    #[test]
    fn terminal_states_absorb_everything_but_cancel(ops in prop::collection::vec(op_strategy(), 1..16)) {
        let controller = ExecutionController::new();
        controller.start();
        controller.cancel();

        for op in ops {
            match op {
                Op::Start => controller.start(),
                Op::Pause => controller.pause(),
                Op::Stop => controller.stop(),
                Op::Cancel => controller.cancel(),
            };
            prop_assert_eq!(controller.state(), ExecutionState::Cancelled);
        }
    }
}

#[test]
fn start_is_noop_once_running() {
    let controller = ExecutionController::new();
    assert!(controller.start());
    assert!(!controller.start());
    assert!(controller.is_running());
}

#[test]
fn cancel_and_stop_are_idempotent() {
    let controller = ExecutionController::new();
    controller.start();
    assert!(controller.stop());
    assert!(!controller.stop());
    assert!(controller.is_stopped());

    let controller = ExecutionController::new();
    assert!(controller.cancel());
    assert!(!controller.cancel());
    assert!(controller.is_cancelled());
}

#[test]
fn blocking_waiter_released_by_resume() {
    let controller = ExecutionController::new();
    controller.start();
    controller.pause();

    let waiter = {
        let controller = controller.clone();
        std::thread::spawn(move || controller.wait_if_paused_blocking())
    };

    std::thread::sleep(Duration::from_millis(30));
    assert!(!waiter.is_finished());

    controller.start();
    let outcome = waiter.join().expect("waiter thread panicked");
    assert!(outcome.is_ok());
}

#[test]
fn blocking_waiter_sees_cancellation() {
    let controller = ExecutionController::new();
    controller.start();
    controller.pause();

    let waiter = {
        let controller = controller.clone();
        std::thread::spawn(move || controller.wait_if_paused_blocking())
    };

    std::thread::sleep(Duration::from_millis(30));
    controller.cancel();

    let outcome = waiter.join().expect("waiter thread panicked");
    assert!(outcome.unwrap_err().is_cancellation());
}

#[test]
fn async_waiter_under_block_on() {
    let controller = ExecutionController::new();
    controller.start();
    tokio_test::block_on(async {
        controller.wait_if_paused().await.expect("running controller never blocks");
    });
}

#[test]
fn reset_reuses_terminal_controller() {
    let controller = ExecutionController::new();
    controller.start();
    controller.cancel();
    let stale = controller.signal();

    assert!(controller.reset());
    assert_eq!(controller.state(), ExecutionState::NotStarted);
    assert!(!controller.signal().is_cancelled());
    assert!(stale.is_cancelled());
    assert!(controller.start());
}
