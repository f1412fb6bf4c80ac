//! Ownership exclusivity of a control channel under arbitrary touch sequences.

use proptest::prelude::*;
use ucm_core::{ControlChannel, Side, TouchId};

#[derive(Debug, Clone)]
enum Op {
    Grab(u64),
    Release(u64),
    Leave(u64),
    Move(u64, f64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..4).prop_map(Op::Grab),
        (0u64..4).prop_map(Op::Release),
        (0u64..4).prop_map(Op::Leave),
        ((0u64..4), 0.0f64..1.0).prop_map(|(t, v)| Op::Move(t, v)),
    ]
}

proptest! {
    #[test]
    fn at_most_one_grab_succeeds(touches in prop::collection::vec(0u64..16, 1..12)) {
        let mut c = ControlChannel::new(Side::Df1, 1.0);
        c.enable();
        let won = touches
            .iter()
            .enumerate()
            .filter(|(i, t)| c.grab(TouchId(**t), *i as f64 * 0.01))
            .count();
        prop_assert_eq!(won, 1);
        prop_assert_eq!(c.owner(), Some(TouchId(touches[0])));
    }

    #[test]
    fn owner_only_while_enabled(ops in prop::collection::vec(op(), 0..40)) {
        let mut c = ControlChannel::new(Side::Df2, 1.0);
        c.enable();
        let mut t = 0.0;
        for op in ops {
            t += 0.05;
            let before = c.owner();
            match op {
                Op::Grab(id) => { c.grab(TouchId(id), t); }
                Op::Release(id) => {
                    let ok = c.release(TouchId(id), t);
                    prop_assert_eq!(ok, before == Some(TouchId(id)));
                }
                Op::Leave(id) => {
                    let ok = c.leave(TouchId(id), t);
                    prop_assert_eq!(ok, before == Some(TouchId(id)));
                }
                Op::Move(id, v) => {
                    let old = c.value();
                    if !c.move_to(TouchId(id), v) {
                        prop_assert_eq!(c.value(), old);
                    }
                }
            }
            if c.owner().is_some() {
                prop_assert!(!c.is_disabled());
            }
        }
    }
}
